//! Allocates a couple of disk backed blocks, writes into them and releases them.
//!
//! Run with `RUST_LOG=debug` to see every file and mapping as it happens.

use storalloc::{DiskAllocator, StorageConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = std::env::temp_dir().join("storalloc_basic");
    let allocator = DiskAllocator::new(StorageConfig::new(&dir));

    let small = allocator.allocate(64, 4096).expect("allocate 4 KiB");
    println!("Requested 4096 bytes, received {small:?}");

    // Logical size way past what we touch, the file stays sparse.
    let mut big = allocator.allocate_block(64, 1 << 30).expect("allocate 1 GiB");
    println!("Requested 1 GiB, received {:p}", big.as_ptr());

    unsafe { small.as_ptr().write_bytes(0xAB, 4096) };
    big.as_mut_slice()[..16].copy_from_slice(b"sixteen bytes!!!");

    println!("First bytes of the big block: {:?}", &big.as_slice()[..16]);
    println!("Backing file: {}", allocator.backing_path(1).display());

    big.release();
    allocator.deallocate(small);

    println!("Live blocks after release: {}", allocator.live_blocks());
}
