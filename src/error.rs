//! Recoverable allocation failures.
//!
//! Anything in here is an environmental condition (full disk, missing permission,
//! exhausted address space) and is reported to the caller as a failed allocation.
//! Broken invariants such as a double free never show up as an [`AllocError`]: they
//! panic where they are detected.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AllocError {
    #[error("failed to create storage directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open backing file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to extend backing file {path:?} to {size} bytes: {source}")]
    Truncate {
        path: PathBuf,
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to map {size} bytes: {source}")]
    Map {
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("zero sized allocations are not supported")]
    ZeroSize,

    #[error("alignment {alignment} exceeds the page size {page_size}")]
    AlignmentExceedsPage { alignment: usize, page_size: usize },

    #[error("invalid layout: {0}")]
    Layout(#[from] std::alloc::LayoutError),

    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),
}

pub type Result<T> = std::result::Result<T, AllocError>;
