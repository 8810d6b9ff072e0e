//! Plain heap personality.
//!
//! Memory comes straight from the global allocator. It's the baseline a host uses
//! when it doesn't need anything larger than RAM, and it's the usual delegate of
//! [`crate::passthrough::PassthroughAllocator`].

use std::{
    alloc::{self, Layout},
    mem,
    ptr::NonNull,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    allocator::{AllocationAttributes, AllocatorStats, RawAllocator},
    error::{AllocError, Result},
    registry::AllocationRegistry,
    utils::is_valid_alignment,
};

/// What the heap allocator remembers about a live allocation.
#[derive(Debug, Clone, Copy)]
struct HeapRecord {
    layout: Layout,
    id: u64,
}

#[derive(Debug, Default)]
pub struct HeapAllocator {
    registry: AllocationRegistry<HeapRecord>,
    next_id: AtomicU64,
    stats: Mutex<AllocatorStats>,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `size` bytes aligned to `alignment`.
    ///
    /// # Panics
    ///
    /// If `alignment` is not a power of two or not a multiple of the pointer size.
    pub fn allocate(&self, alignment: usize, size: usize) -> Result<NonNull<u8>> {
        assert!(
            is_valid_alignment(alignment),
            "alignment {alignment} must be a power of two and a multiple of {}",
            mem::size_of::<usize>()
        );

        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let layout = Layout::from_size_align(size, alignment)?;
        let ptr = NonNull::new(unsafe { alloc::alloc(layout) }).ok_or(AllocError::OutOfMemory(size))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.insert(ptr, HeapRecord { layout, id });

        let mut stats = self.stats.lock();
        stats.num_allocs += 1;
        stats.bytes_in_use += size;
        stats.peak_bytes_in_use = stats.peak_bytes_in_use.max(stats.bytes_in_use);
        stats.largest_alloc_size = stats.largest_alloc_size.max(size);

        Ok(ptr)
    }

    /// # Panics
    ///
    /// If `ptr` is not a live allocation of this allocator.
    pub fn deallocate(&self, ptr: NonNull<u8>) {
        let record = self.registry.remove(ptr);

        unsafe { alloc::dealloc(ptr.as_ptr(), record.layout) };

        let mut stats = self.stats.lock();
        stats.bytes_in_use -= record.layout.size();
    }
}

impl RawAllocator for HeapAllocator {
    fn name(&self) -> &str {
        "heap"
    }

    fn allocate_raw_with(
        &self,
        alignment: usize,
        size: usize,
        attributes: &AllocationAttributes,
    ) -> Option<NonNull<u8>> {
        match self.allocate(alignment, size) {
            Ok(ptr) => {
                debug!(
                    alignment,
                    size,
                    ?ptr,
                    tag = attributes.tag.as_ref().map(|tag| tag.as_str()),
                    "Heap allocation"
                );
                Some(ptr)
            }
            Err(e) => {
                warn!(alignment, size, error = %e, "Heap allocation failed");
                None
            }
        }
    }

    fn deallocate_raw(&self, ptr: NonNull<u8>) {
        self.deallocate(ptr);
    }

    fn tracks_allocation_sizes(&self) -> bool {
        true
    }

    fn requested_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.registry.get(ptr).map(|record| record.layout.size())
    }

    /// The global allocator doesn't say how much it really reserved, so this is the
    /// size that was asked for.
    fn allocated_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.requested_size(ptr)
    }

    fn allocation_id(&self, ptr: NonNull<u8>) -> Option<u64> {
        self.registry.get(ptr).map(|record| record.id)
    }

    fn stats(&self) -> Option<AllocatorStats> {
        Some(*self.stats.lock())
    }

    fn clear_stats(&self) -> bool {
        let mut stats = self.stats.lock();
        stats.num_allocs = 0;
        stats.peak_bytes_in_use = stats.bytes_in_use;
        stats.largest_alloc_size = 0;
        true
    }
}

impl Drop for HeapAllocator {
    fn drop(&mut self) {
        let live = self.registry.len();
        if live > 0 {
            warn!(live, "Heap allocator dropped with live allocations");
        }
    }
}
