//! Logging pass-through personality.
//!
//! Wraps any other [`RawAllocator`] and logs every call on its way through. Apart
//! from the logging it behaves exactly like the delegate, optional queries
//! included.

use std::{ptr::NonNull, sync::Arc};

use tracing::info;

use crate::allocator::{AllocationAttributes, AllocatorStats, RawAllocator};

pub struct PassthroughAllocator {
    delegate: Arc<dyn RawAllocator>,
}

impl PassthroughAllocator {
    pub fn new(delegate: Arc<dyn RawAllocator>) -> Self {
        Self { delegate }
    }

    pub fn delegate(&self) -> &Arc<dyn RawAllocator> {
        &self.delegate
    }
}

impl RawAllocator for PassthroughAllocator {
    fn name(&self) -> &str {
        "storage"
    }

    fn allocate_raw(&self, alignment: usize, size: usize) -> Option<NonNull<u8>> {
        info!(delegate = self.delegate.name(), alignment, size, "allocate_raw");
        self.delegate.allocate_raw(alignment, size)
    }

    fn allocate_raw_with(
        &self,
        alignment: usize,
        size: usize,
        attributes: &AllocationAttributes,
    ) -> Option<NonNull<u8>> {
        info!(
            delegate = self.delegate.name(),
            alignment,
            size,
            tag = attributes.tag.as_ref().map(|tag| tag.as_str()),
            "allocate_raw with attributes"
        );
        self.delegate.allocate_raw_with(alignment, size, attributes)
    }

    fn deallocate_raw(&self, ptr: NonNull<u8>) {
        info!(delegate = self.delegate.name(), ?ptr, "deallocate_raw");
        self.delegate.deallocate_raw(ptr);
    }

    fn reports_opaque_handles(&self) -> bool {
        self.delegate.reports_opaque_handles()
    }

    fn tracks_allocation_sizes(&self) -> bool {
        self.delegate.tracks_allocation_sizes()
    }

    fn requested_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.delegate.requested_size(ptr)
    }

    fn allocated_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.delegate.allocated_size(ptr)
    }

    fn allocated_size_slow(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.delegate.allocated_size_slow(ptr)
    }

    fn allocation_id(&self, ptr: NonNull<u8>) -> Option<u64> {
        self.delegate.allocation_id(ptr)
    }

    fn stats(&self) -> Option<AllocatorStats> {
        self.delegate.stats()
    }

    fn clear_stats(&self) -> bool {
        self.delegate.clear_stats()
    }

    fn set_safe_frontier(&self, count: u64) {
        self.delegate.set_safe_frontier(count);
    }
}
