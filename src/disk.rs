//! The disk backed allocator.
//!
//! Every allocation is its own sparse file, mapped into memory:
//!
//! ```text
//!  allocate(alignment, size)
//!     |
//!     |-- BlockIndexGenerator::next()          -> 42
//!     |-- SparseFileFactory::create(size, 42)  -> <dir>/0000042.tmp, `size` bytes, sparse
//!     |-- kernel::map_file(file, size)          -> addr   (file handle closed right after)
//!     |-- AllocationRegistry::insert(addr, size)
//!     +-> addr
//!
//!  deallocate(addr)
//!     |-- AllocationRegistry::remove(addr)      -> size   (panics if addr isn't live)
//!     +-- kernel::unmap(addr, size)
//! ```
//!
//! The logical size of a block can be far bigger than physical memory. Pages are
//! only read from (or written back to) disk when they're touched, so the price is
//! page faults instead of an out of memory error.

use std::{
    mem,
    path::{Path, PathBuf},
    ptr::NonNull,
};

use tracing::{debug, error, info, warn};

use crate::{
    allocator::{AllocationAttributes, RawAllocator},
    block::MappedBlock,
    config::{MapMode, ReleasePolicy, StorageConfig},
    error::{AllocError, Result},
    index::BlockIndexGenerator,
    kernel,
    registry::AllocationRegistry,
    sparse::SparseFileFactory,
    utils::{align, is_valid_alignment},
};

/// Allocator handing out memory mapped sparse files.
///
/// Create one per storage directory and share it by reference (or `Arc`) with every
/// thread that needs memory. Independent instances never share any state.
#[derive(Debug)]
pub struct DiskAllocator {
    indices: BlockIndexGenerator,
    files: SparseFileFactory,
    registry: AllocationRegistry,
    map_mode: MapMode,
    release: ReleasePolicy,
}

impl DiskAllocator {
    /// Creates an allocator storing its blocks in `config.dir`. The directory is only
    /// created once the first block is allocated.
    pub fn new(config: StorageConfig) -> Self {
        info!(
            dir = ?config.dir,
            map_mode = ?config.map_mode,
            release = ?config.release,
            "Initializing disk allocator"
        );

        Self {
            indices: BlockIndexGenerator::new(),
            files: SparseFileFactory::new(&config),
            registry: AllocationRegistry::new(),
            map_mode: config.map_mode,
            release: config.release,
        }
    }

    /// Allocates `size` bytes aligned to `alignment`.
    ///
    /// # Panics
    ///
    /// If `alignment` is not a power of two or not a multiple of the pointer size.
    pub fn allocate(&self, alignment: usize, size: usize) -> Result<NonNull<u8>> {
        self.allocate_tagged(alignment, size, &AllocationAttributes::default())
    }

    /// Same as [`DiskAllocator::allocate`], `attributes` only show up in the logs.
    pub fn allocate_tagged(
        &self,
        alignment: usize,
        size: usize,
        attributes: &AllocationAttributes,
    ) -> Result<NonNull<u8>> {
        assert!(
            is_valid_alignment(alignment),
            "alignment {alignment} must be a power of two and a multiple of {}",
            mem::size_of::<usize>()
        );

        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        // Mappings start on a page boundary, which covers any alignment up to a page.
        let page_size = kernel::page_size();
        if alignment > page_size {
            return Err(AllocError::AlignmentExceedsPage {
                alignment,
                page_size,
            });
        }

        let index = self.indices.next();
        let file = self.files.create(size, index)?;

        let mapped = unsafe { kernel::map_file(&file, size, self.map_mode) };
        drop(file);

        if self.release == ReleasePolicy::UnlinkAfterMap {
            if let Err(e) = self.files.unlink(index) {
                warn!(index, error = %e, "Failed to unlink backing file");
            }
        }

        let addr = mapped.map_err(|source| AllocError::Map { size, source })?;

        self.registry.insert(addr, size);

        debug!(
            index,
            size,
            ?addr,
            pages = align(size, page_size) / page_size,
            tag = attributes.tag.as_ref().map(|tag| tag.as_str()),
            "Mapped block"
        );

        Ok(addr)
    }

    /// Unmaps the block at `ptr`.
    ///
    /// The block is released even if the OS refuses to unmap it, the failure is only
    /// logged. Its backing file stays on disk unless the allocator was configured
    /// with [`ReleasePolicy::UnlinkAfterMap`].
    ///
    /// # Panics
    ///
    /// If `ptr` is not a live block of this allocator.
    pub fn deallocate(&self, ptr: NonNull<u8>) {
        let size = self.registry.remove(ptr);

        match unsafe { kernel::unmap(ptr, size) } {
            Ok(()) => debug!(addr = ?ptr, size, "Unmapped block"),
            Err(e) => error!(addr = ?ptr, size, error = %e, "Failed to unmap block"),
        }
    }

    /// Allocates a block wrapped in a [`MappedBlock`], which releases it when dropped.
    pub fn allocate_block(&self, alignment: usize, size: usize) -> Result<MappedBlock<'_>> {
        let ptr = self.allocate(alignment, size)?;

        Ok(MappedBlock::new(self, ptr, size))
    }

    /// Whether `ptr` is a block that has been allocated and not released yet.
    pub fn is_live(&self, ptr: NonNull<u8>) -> bool {
        self.registry.contains(ptr)
    }

    /// Number of blocks currently allocated.
    pub fn live_blocks(&self) -> usize {
        self.registry.len()
    }

    /// Sum of the sizes of the blocks currently allocated.
    pub fn live_bytes(&self) -> usize {
        self.registry.total_bytes()
    }

    /// Number of block indices handed out so far, failed allocations included.
    pub fn issued_blocks(&self) -> u64 {
        self.indices.issued()
    }

    pub fn storage_dir(&self) -> &Path {
        self.files.dir()
    }

    /// Path of the backing file of the block with the given `index`.
    pub fn backing_path(&self, index: u64) -> PathBuf {
        self.files.path(index)
    }

    pub fn page_size(&self) -> usize {
        kernel::page_size()
    }
}

impl RawAllocator for DiskAllocator {
    fn name(&self) -> &str {
        "disk"
    }

    fn allocate_raw_with(
        &self,
        alignment: usize,
        size: usize,
        attributes: &AllocationAttributes,
    ) -> Option<NonNull<u8>> {
        match self.allocate_tagged(alignment, size, attributes) {
            Ok(ptr) => Some(ptr),
            Err(e) => {
                warn!(alignment, size, error = %e, "Disk allocation failed");
                None
            }
        }
    }

    fn deallocate_raw(&self, ptr: NonNull<u8>) {
        self.deallocate(ptr);
    }
}

impl Drop for DiskAllocator {
    fn drop(&mut self) {
        // Blocks still out there stay mapped, somebody may be using them.
        let live = self.registry.len();
        if live > 0 {
            warn!(live, bytes = self.registry.total_bytes(), "Disk allocator dropped with live blocks");
        }
    }
}
