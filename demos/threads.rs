//! Several threads sharing one disk allocator.

use std::{sync::Arc, thread};

use storalloc::{DiskAllocator, ReleasePolicy, StorageConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = StorageConfig::new(std::env::temp_dir().join("storalloc_threads"))
        .with_release_policy(ReleasePolicy::UnlinkAfterMap);
    let allocator = Arc::new(DiskAllocator::new(config));

    let handles: Vec<_> = (0..8)
        .map(|id| {
            let allocator = Arc::clone(&allocator);
            thread::spawn(move || {
                let mut block = allocator.allocate_block(64, 64 * 1024).unwrap();
                block.as_mut_slice().fill(id as u8);
                println!("Thread {id} got {:p}", block.as_ptr());
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    println!(
        "Issued {} blocks, {} still live",
        allocator.issued_blocks(),
        allocator.live_blocks()
    );
}
