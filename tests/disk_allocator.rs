//! End to end behaviour of the disk backed allocator through its public surface.

use std::{fs, path::PathBuf, ptr::NonNull, sync::Arc};

use storalloc::{
    AllocationAttributes, AllocatorConfig, DiskAllocator, RawAllocator, StorageConfig,
};

/// Unique scratch directory for a test.
fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("storalloc_it_{}_{}", name, std::process::id()))
}

/// Scratch directory removed when dropped, also while unwinding from a panic.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new(name: &str) -> Self {
        Self(scratch_dir(name))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.0).ok();
    }
}

#[test]
fn round_trip_pattern() {
    let dir = scratch_dir("round_trip");
    let allocator = DiskAllocator::new(StorageConfig::new(&dir));

    let ptr = allocator.allocate_raw(64, 4096).expect("allocation should succeed");

    unsafe {
        let bytes = std::slice::from_raw_parts_mut(ptr.as_ptr(), 4096);
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(31) ^ 0x5A;
        }

        let bytes = std::slice::from_raw_parts(ptr.as_ptr(), 4096);
        for (i, byte) in bytes.iter().enumerate() {
            assert_eq!(*byte, (i as u8).wrapping_mul(31) ^ 0x5A, "mismatch at {i}");
        }
    }

    allocator.deallocate_raw(ptr);
    assert!(!allocator.is_live(ptr));

    drop(allocator);
    fs::remove_dir_all(dir).ok();
}

#[test]
fn two_blocks_then_release_both() {
    let dir = scratch_dir("two_blocks");
    let allocator = DiskAllocator::new(StorageConfig::new(&dir));

    let addr0 = allocator.allocate_raw(64, 4096).unwrap();
    let addr1 = allocator.allocate_raw(64, 8192).unwrap();
    assert_ne!(addr0, addr1);

    allocator.deallocate_raw(addr0);
    allocator.deallocate_raw(addr1);
    assert_eq!(allocator.live_blocks(), 0);

    drop(allocator);
    fs::remove_dir_all(dir).ok();
}

#[test]
#[should_panic(expected = "not a live allocation")]
fn third_release_aborts() {
    // Declared first so it's dropped after the allocator.
    let dir = ScratchDir::new("third_release");
    let allocator = DiskAllocator::new(StorageConfig::new(&dir.0));

    let addr0 = allocator.allocate_raw(64, 4096).unwrap();
    let addr1 = allocator.allocate_raw(64, 8192).unwrap();

    allocator.deallocate_raw(addr0);
    allocator.deallocate_raw(addr1);
    allocator.deallocate_raw(addr0);
}

#[test]
#[should_panic(expected = "not a live allocation")]
fn double_free_aborts() {
    // Declared first so it's dropped after the allocator.
    let dir = ScratchDir::new("double_free");
    let allocator = DiskAllocator::new(StorageConfig::new(&dir.0));

    let ptr = allocator.allocate_raw(64, 4096).unwrap();
    allocator.deallocate_raw(ptr);
    allocator.deallocate_raw(ptr);
}

#[test]
#[should_panic(expected = "not a live allocation")]
fn foreign_pointer_aborts() {
    // Declared first so it's dropped after the allocator.
    let dir = ScratchDir::new("foreign");
    let allocator = DiskAllocator::new(StorageConfig::new(&dir.0));

    let mut local = [0u8; 64];
    allocator.deallocate_raw(NonNull::new(local.as_mut_ptr()).unwrap());
}

#[test]
fn scratch_dir_is_removed_after_a_panic() {
    let path = scratch_dir("unwind_cleanup");

    let result = std::panic::catch_unwind(|| {
        let dir = ScratchDir::new("unwind_cleanup");
        let allocator = DiskAllocator::new(StorageConfig::new(&dir.0));
        let ptr = allocator.allocate_raw(64, 4096).unwrap();
        allocator.deallocate_raw(ptr);
        allocator.deallocate_raw(ptr);
    });

    assert!(result.is_err());
    assert!(!path.exists());
}

#[test]
fn every_valid_alignment_gives_writable_memory() {
    let dir = scratch_dir("alignments");
    let allocator = DiskAllocator::new(StorageConfig::new(&dir));
    let word = std::mem::size_of::<usize>();

    let mut alignment = word;
    while alignment <= allocator.page_size() {
        for size in [1, 100, 4096, 70_000] {
            let ptr = allocator.allocate_raw(alignment, size).unwrap();
            assert_eq!(ptr.as_ptr() as usize % alignment, 0);

            unsafe {
                ptr.as_ptr().write(0x11);
                ptr.as_ptr().add(size - 1).write(0x22);
                assert_eq!(ptr.as_ptr().read(), if size == 1 { 0x22 } else { 0x11 });
                assert_eq!(ptr.as_ptr().add(size - 1).read(), 0x22);
            }

            allocator.deallocate_raw(ptr);
        }
        alignment *= 2;
    }

    drop(allocator);
    fs::remove_dir_all(dir).ok();
}

#[test]
fn backing_files_match_requested_sizes_before_any_write() {
    let dir = scratch_dir("file_sizes");
    let allocator = DiskAllocator::new(StorageConfig::new(&dir));

    let sizes = [4096usize, 1 << 20, 12_345];
    let ptrs: Vec<_> = sizes
        .iter()
        .map(|&size| allocator.allocate_raw(64, size).unwrap())
        .collect();

    for (index, &size) in sizes.iter().enumerate() {
        let path = allocator.backing_path(index as u64);
        assert_eq!(path.file_name().unwrap(), format!("{index:07}.tmp").as_str());
        assert_eq!(fs::metadata(&path).unwrap().len(), size as u64);
    }

    let names = fs::read_dir(&dir).unwrap().count();
    assert_eq!(names, sizes.len());

    for ptr in ptrs {
        allocator.deallocate_raw(ptr);
    }

    drop(allocator);
    fs::remove_dir_all(dir).ok();
}

#[test]
fn block_larger_than_a_page_sees_every_byte() {
    let dir = scratch_dir("large");
    let allocator = DiskAllocator::new(StorageConfig::new(&dir));

    let mut block = allocator.allocate_block(64, 16 << 20).unwrap();
    let slice = block.as_mut_slice();

    // Touch one byte per page, the rest stays sparse.
    for offset in (0..slice.len()).step_by(4096) {
        slice[offset] = (offset / 4096) as u8;
    }
    for offset in (0..slice.len()).step_by(4096) {
        assert_eq!(slice[offset], (offset / 4096) as u8);
    }

    block.release();

    drop(allocator);
    fs::remove_dir_all(dir).ok();
}

#[test]
fn personalities_are_interchangeable() {
    let dir = scratch_dir("personalities");

    let heap = AllocatorConfig::heap().build();
    let allocators: Vec<Arc<dyn RawAllocator>> = vec![
        Arc::clone(&heap),
        AllocatorConfig::disk(StorageConfig::new(&dir)).build(),
        AllocatorConfig::passthrough(heap).build(),
    ];

    for allocator in allocators {
        let attributes = AllocationAttributes::tagged("interchangeable");
        let ptr = allocator.allocate_raw_with(64, 4096, &attributes).unwrap();

        unsafe {
            ptr.as_ptr().write_bytes(0x42, 4096);
            assert_eq!(*ptr.as_ptr().add(4095), 0x42);
        }

        allocator.deallocate_raw(ptr);
        assert!(!allocator.reports_opaque_handles());
    }

    fs::remove_dir_all(dir).ok();
}

#[test]
fn independent_instances_number_from_zero() {
    let first_dir = scratch_dir("instances_a");
    let second_dir = scratch_dir("instances_b");
    let first = DiskAllocator::new(StorageConfig::new(&first_dir));
    let second = DiskAllocator::new(StorageConfig::new(&second_dir));

    let a = first.allocate_raw(8, 4096).unwrap();
    let b = first.allocate_raw(8, 4096).unwrap();
    let c = second.allocate_raw(8, 4096).unwrap();

    assert_eq!(first.issued_blocks(), 2);
    assert_eq!(second.issued_blocks(), 1);
    assert!(second.backing_path(0).exists());

    first.deallocate_raw(a);
    first.deallocate_raw(b);
    second.deallocate_raw(c);

    drop(first);
    drop(second);
    fs::remove_dir_all(first_dir).ok();
    fs::remove_dir_all(second_dir).ok();
}
