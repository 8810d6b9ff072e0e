//! # storalloc - memory backed by sparse files
//!
//! A raw allocator for hosts (numeric runtimes, tensor arenas) that need logical
//! regions bigger than physical memory. Instead of anonymous RAM, every block is a
//! sparse file on disk mapped into the address space, so touching a page costs a
//! page fault and some disk I/O instead of an out of memory error.
//!
//! ```text
//!                        +--------------------------+
//!   allocate(64, 4096) ->|       DiskAllocator      |-> addr
//!                        +--------------------------+
//!                          |        |        |     |
//!             BlockIndexGenerator   |     Kernel   AllocationRegistry
//!                   (42)            |    (mmap)    (addr -> 4096)
//!                          SparseFileFactory
//!                     <dir>/0000042.tmp (sparse)
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   storalloc
//!   ├── allocator    - RawAllocator trait shared by every personality
//!   ├── block        - MappedBlock, a block released on drop
//!   ├── config       - AllocatorConfig and StorageConfig
//!   ├── disk         - DiskAllocator (sparse file backed)
//!   ├── error        - AllocError
//!   ├── heap         - HeapAllocator (global allocator backed)
//!   ├── index        - BlockIndexGenerator
//!   ├── kernel       - platform mapping syscalls (internal)
//!   ├── passthrough  - PassthroughAllocator (logging wrapper)
//!   ├── registry     - AllocationRegistry
//!   ├── sparse       - SparseFileFactory
//!   └── utils        - alignment helpers
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storalloc::{DiskAllocator, StorageConfig};
//!
//! let allocator = DiskAllocator::new(StorageConfig::new("/var/tmp/blocks"));
//!
//! let ptr = allocator.allocate(64, 1 << 30).expect("disk allocation");
//! unsafe { ptr.as_ptr().write(42) };
//! allocator.deallocate(ptr);
//! ```
//!
//! Hosts that want to pick an allocator at runtime go through
//! [`AllocatorConfig::build`] and only see `Arc<dyn RawAllocator>`.
//!
//! ## Limitations
//!
//! - Backing files are not removed when blocks are released unless
//!   [`ReleasePolicy::UnlinkAfterMap`] is used.
//! - Alignment can't exceed the page size: mappings start on a page boundary.
//! - Every call is synchronous and blocks on the filesystem.

pub mod allocator;
pub mod block;
pub mod config;
pub mod disk;
pub mod error;
pub mod heap;
pub mod index;
mod kernel;
pub mod passthrough;
pub mod registry;
pub mod sparse;
pub mod utils;

pub use allocator::{AllocationAttributes, AllocationTag, AllocatorStats, RawAllocator};
pub use block::MappedBlock;
pub use config::{AllocatorConfig, MapMode, Personality, ReleasePolicy, StorageConfig};
pub use disk::DiskAllocator;
pub use error::{AllocError, Result};
pub use heap::HeapAllocator;
pub use index::BlockIndexGenerator;
pub use passthrough::PassthroughAllocator;
pub use registry::AllocationRegistry;
pub use sparse::SparseFileFactory;
