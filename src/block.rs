use std::{fmt, ptr::NonNull, slice};

use crate::disk::DiskAllocator;

/// A live block of a [`DiskAllocator`], released when dropped.
///
/// The address inside is ordinary memory (numeric code gets a plain pointer out
/// of [`MappedBlock::as_ptr`]), but the block itself can't outlive its allocator
/// and can't be released twice: [`MappedBlock::release`] consumes it.
///
/// ```text
/// +---------------------+
/// |  allocator: &'a     | ----> DiskAllocator (registry: addr -> len)
/// +---------------------+
/// |  ptr                | ----> mapping of <dir>/NNNNNNN.tmp
/// +---------------------+
/// |  len                |
/// +---------------------+
/// ```
///
/// Debug builds check on every access that the allocator still knows the block,
/// which catches a raw [`DiskAllocator::deallocate`] of an address that is owned
/// by a `MappedBlock`.
pub struct MappedBlock<'a> {
    allocator: &'a DiskAllocator,
    ptr: NonNull<u8>,
    len: usize,
}

// The block is the only owner of its mapping.
unsafe impl Send for MappedBlock<'_> {}
unsafe impl Sync for MappedBlock<'_> {}

impl<'a> MappedBlock<'a> {
    pub(crate) fn new(allocator: &'a DiskAllocator, ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            allocator,
            ptr,
            len,
        }
    }

    #[inline]
    fn check_live(&self) {
        debug_assert!(
            self.allocator.is_live(self.ptr),
            "block at {:p} used after it was released",
            self.ptr
        );
    }

    /// Start of the block.
    pub fn as_ptr(&self) -> *mut u8 {
        self.check_live();
        self.ptr.as_ptr()
    }

    /// Size of the block in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Blocks are never empty, zero sized requests are refused.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        self.check_live();
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.check_live();
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Unmaps the block.
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for MappedBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedBlock")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

impl Drop for MappedBlock<'_> {
    fn drop(&mut self) {
        self.allocator.deallocate(self.ptr);
    }
}

#[cfg(test)]
mod tests {
    use crate::{config::StorageConfig, disk::DiskAllocator, error::Result};

    fn allocator(name: &str) -> DiskAllocator {
        let dir = std::env::temp_dir().join(format!("storalloc_block_{}_{}", name, std::process::id()));
        DiskAllocator::new(StorageConfig::new(dir))
    }

    #[test]
    fn explicit_release() -> Result<()> {
        let allocator = allocator("release");

        let mut block = allocator.allocate_block(64, 8192)?;
        assert_eq!(block.len(), 8192);
        assert!(!block.is_empty());

        // Fresh blocks read as zero.
        assert!(block.as_slice().iter().all(|&b| b == 0));

        block.as_mut_slice()[..4].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(&block.as_slice()[..4], &[1, 2, 3, 4]);
        assert_eq!(allocator.live_blocks(), 1);

        block.release();
        assert_eq!(allocator.live_blocks(), 0);

        std::fs::remove_dir_all(allocator.storage_dir()).ok();
        Ok(())
    }

    #[test]
    fn blocks_can_move_across_threads() -> Result<()> {
        let allocator = allocator("threads");

        let mut block = allocator.allocate_block(64, 4096)?;

        std::thread::scope(|scope| {
            scope.spawn(|| block.as_mut_slice().fill(9));
        });

        assert!(block.as_slice().iter().all(|&b| b == 9));
        block.release();

        std::fs::remove_dir_all(allocator.storage_dir()).ok();
        Ok(())
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "used after it was released")]
    fn access_after_raw_release_is_caught() {
        let allocator = allocator("use_after_release");

        let block = allocator.allocate_block(64, 4096).unwrap();
        allocator.deallocate(std::ptr::NonNull::new(block.as_ptr()).unwrap());

        // Dropping the block would release it a second time.
        let block = std::mem::ManuallyDrop::new(block);
        let _ = block.as_slice();
    }
}
