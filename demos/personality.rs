//! Picks an allocator personality from the command line and runs the same host
//! code against it.
//!
//! ```text
//! cargo run --example personality -- disk
//! cargo run --example personality -- heap
//! cargo run --example personality -- logged-heap
//! ```

use std::sync::Arc;

use storalloc::{AllocationAttributes, AllocatorConfig, RawAllocator, StorageConfig};
use tracing_subscriber::EnvFilter;

/// Host code that only knows about the trait.
fn run(allocator: &dyn RawAllocator) {
    let attributes = AllocationAttributes::tagged("demo/tensor");

    let ptr = allocator
        .allocate_raw_with(64, 8 * 1024, &attributes)
        .expect("allocation failed");

    let floats = unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr().cast::<f32>(), 2048) };
    for (i, value) in floats.iter_mut().enumerate() {
        *value = i as f32 * 0.5;
    }
    println!("[{}] sum = {}", allocator.name(), floats.iter().sum::<f32>());

    match allocator.stats() {
        Some(stats) => println!("[{}] {stats:?}", allocator.name()),
        None => println!("[{}] no stats", allocator.name()),
    }

    allocator.deallocate_raw(ptr);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1).as_deref() {
        Some("heap") => AllocatorConfig::heap(),
        Some("logged-heap") => AllocatorConfig::passthrough(AllocatorConfig::heap().build()),
        _ => AllocatorConfig::disk(StorageConfig::new(std::env::temp_dir().join("storalloc_personality"))),
    };

    let allocator: Arc<dyn RawAllocator> = config.build();
    run(allocator.as_ref());
}
