//! The contract every allocator personality exposes to a host.
//!
//! A host (a tensor runtime, an arena, anything that wants raw memory) only talks
//! to `dyn RawAllocator`, which lets it swap the disk backed allocator for the heap
//! one, or wrap either of them in the logging pass-through, without changing code
//! elsewhere. See [`crate::config::AllocatorConfig`].

use std::{borrow::Cow, fmt, ptr::NonNull};

/// Caller supplied name of the place an allocation comes from, e.g. `"conv2d/weights"`.
///
/// Only used for logging, it never changes how memory is allocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AllocationTag(Cow<'static, str>);

impl AllocationTag {
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AllocationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hints attached to a single allocation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationAttributes {
    /// Where the allocation comes from.
    pub tag: Option<AllocationTag>,
    /// The caller would rather have the allocator retry than fail right away.
    pub retry_on_failure: bool,
}

impl AllocationAttributes {
    pub fn tagged(tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tag: Some(AllocationTag::new(tag)),
            ..Self::default()
        }
    }

    pub fn with_retry_on_failure(mut self, retry: bool) -> Self {
        self.retry_on_failure = retry;
        self
    }
}

/// Usage counters of allocators that keep them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Number of successful allocations since the counters were last cleared.
    pub num_allocs: u64,
    pub bytes_in_use: usize,
    pub peak_bytes_in_use: usize,
    pub largest_alloc_size: usize,
}

/// Raw allocation interface shared by every personality.
///
/// Addresses handed out are ordinary, directly dereferenceable memory. Alignment
/// must be a power of two and a multiple of the pointer size: anything else is a
/// caller bug and panics. Running out of resources is not a bug and gives `None`.
///
/// The optional queries return `None` (or `false`) when the personality doesn't
/// support them. That means "unsupported", not "failed".
pub trait RawAllocator: Send + Sync {
    /// Short name of the personality.
    fn name(&self) -> &str;

    fn allocate_raw(&self, alignment: usize, size: usize) -> Option<NonNull<u8>> {
        self.allocate_raw_with(alignment, size, &AllocationAttributes::default())
    }

    fn allocate_raw_with(
        &self,
        alignment: usize,
        size: usize,
        attributes: &AllocationAttributes,
    ) -> Option<NonNull<u8>>;

    /// Releases memory returned by this allocator.
    ///
    /// # Panics
    ///
    /// If `ptr` is not a live allocation of this allocator.
    fn deallocate_raw(&self, ptr: NonNull<u8>);

    /// Whether returned addresses are tokens that need translating before use.
    fn reports_opaque_handles(&self) -> bool {
        false
    }

    fn tracks_allocation_sizes(&self) -> bool {
        false
    }

    /// Size the caller asked for when `ptr` was allocated.
    fn requested_size(&self, _ptr: NonNull<u8>) -> Option<usize> {
        None
    }

    /// Size actually reserved for `ptr`, at least [`RawAllocator::requested_size`].
    fn allocated_size(&self, _ptr: NonNull<u8>) -> Option<usize> {
        None
    }

    /// Like [`RawAllocator::allocated_size`], for allocators that can only work it
    /// out by walking their own bookkeeping.
    fn allocated_size_slow(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.allocated_size(ptr)
    }

    fn allocation_id(&self, _ptr: NonNull<u8>) -> Option<u64> {
        None
    }

    fn stats(&self) -> Option<AllocatorStats> {
        None
    }

    /// Resets the usage counters. Returns whether there were any to reset.
    fn clear_stats(&self) -> bool {
        false
    }

    fn set_safe_frontier(&self, _count: u64) {}
}
