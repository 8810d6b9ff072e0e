//! Construction time configuration.
//!
//! Which allocator a host ends up talking to is decided by an [`AllocatorConfig`]
//! value, never by compile time switches, so a process can run several differently
//! configured allocators side by side.

use std::{fmt, path::PathBuf, sync::Arc};

use tracing::info;

use crate::{
    allocator::RawAllocator, disk::DiskAllocator, heap::HeapAllocator,
    passthrough::PassthroughAllocator,
};

/// Default width of the zero padded block index in backing file names.
pub const DEFAULT_NAME_WIDTH: usize = 7;

/// Default extension of backing files.
pub const DEFAULT_EXTENSION: &str = "tmp";

/// How a backing file is mapped into the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapMode {
    /// Copy-on-write mapping. Writes never reach the backing file.
    #[default]
    Private,
    /// Writes go through to the backing file, so dirty pages can be written back
    /// to disk instead of being pushed to swap.
    Shared,
}

/// What happens to a backing file once it is no longer needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePolicy {
    /// Backing files stay in the storage directory forever. Disk usage only grows.
    #[default]
    Retain,
    /// The backing file is unlinked as soon as it has been mapped. The mapping keeps
    /// its blocks alive and the OS reclaims them once the mapping is gone.
    UnlinkAfterMap,
}

/// Settings of the disk backed allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding one backing file per allocation.
    pub dir: PathBuf,
    pub map_mode: MapMode,
    pub release: ReleasePolicy,
    /// Minimum number of digits of the block index in a file name.
    pub name_width: usize,
    /// Extension appended to every backing file name, without the dot.
    pub extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("storalloc"),
            map_mode: MapMode::default(),
            release: ReleasePolicy::default(),
            name_width: DEFAULT_NAME_WIDTH,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::default().with_dir(dir)
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn with_map_mode(mut self, map_mode: MapMode) -> Self {
        self.map_mode = map_mode;
        self
    }

    pub fn with_release_policy(mut self, release: ReleasePolicy) -> Self {
        self.release = release;
        self
    }
}

/// The three allocator personalities a host can be handed.
#[derive(Clone)]
pub enum Personality {
    /// Logs every call and forwards it to the given delegate.
    Passthrough(Arc<dyn RawAllocator>),
    /// Ordinary heap memory.
    Heap,
    /// Memory backed by sparse files on disk.
    Disk(StorageConfig),
}

impl fmt::Debug for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Personality::Passthrough(delegate) => f
                .debug_tuple("Passthrough")
                .field(&delegate.name())
                .finish(),
            Personality::Heap => f.write_str("Heap"),
            Personality::Disk(config) => f.debug_tuple("Disk").field(config).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    pub personality: Personality,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::disk(StorageConfig::default())
    }
}

impl AllocatorConfig {
    pub fn passthrough(delegate: Arc<dyn RawAllocator>) -> Self {
        Self {
            personality: Personality::Passthrough(delegate),
        }
    }

    pub fn heap() -> Self {
        Self {
            personality: Personality::Heap,
        }
    }

    pub fn disk(storage: StorageConfig) -> Self {
        Self {
            personality: Personality::Disk(storage),
        }
    }

    /// Builds the configured allocator. All of them share the [`RawAllocator`]
    /// contract so hosts can swap one for another.
    pub fn build(self) -> Arc<dyn RawAllocator> {
        info!(personality = ?self.personality, "Building allocator");

        match self.personality {
            Personality::Passthrough(delegate) => Arc::new(PassthroughAllocator::new(delegate)),
            Personality::Heap => Arc::new(HeapAllocator::new()),
            Personality::Disk(storage) => Arc::new(DiskAllocator::new(storage)),
        }
    }
}
