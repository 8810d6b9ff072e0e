use std::{fs::File, io, ptr::NonNull, sync::OnceLock};

use crate::config::MapMode;

/// Virtual memory page size of the computer. This is usually 4096.
/// We don't know the value at compile time, so it's asked once and cached.
static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// The low level half of the allocator. This is where backing files become memory
/// and platform dependant stuff lives.
///
/// ```text
///            file on disk                         process address space
/// +----------------------------------+       +----------------------------------+
/// | 0000042.tmp (sparse, `len` bytes)| ----> | mapping, `len` bytes, page aligned|
/// +----------------------------------+       +----------------------------------+
///                 ^                                          |
///                 +--------- page faults read/write ---------+
/// ```
///
/// Once a mapping exists it doesn't depend on the [`File`] it came from: callers are
/// free to close the handle right away.
pub(crate) struct Kernel;

/// This trait provides an abstraction over the mapping syscalls. The allocator, our
/// top level view of this, has nothing to do with the concrete APIs offered by each
/// kernel.
trait PlatformMemory {
    /// Maps the first `len` bytes of `file` for reading and writing at an address
    /// chosen by the OS.
    unsafe fn map_file(file: &File, len: usize, mode: MapMode) -> io::Result<NonNull<u8>>;

    /// Releases the mapping of `len` bytes starting at `addr`.
    unsafe fn unmap(addr: NonNull<u8>, len: usize) -> io::Result<()>;

    /// Returns the virtual memory page size of the computer in bytes.
    fn page_size() -> usize;
}

/// Wrapper to calculate the computer's page size.
#[inline]
pub(crate) fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(Kernel::page_size)
}

/// Wrapper to use [`PlatformMemory::map_file`].
///
/// **SAFETY**: `file` must be at least `len` bytes long. Touching the mapping past the
/// end of the file is a bus error, not undefined behaviour we can catch.
#[inline]
pub(crate) unsafe fn map_file(file: &File, len: usize, mode: MapMode) -> io::Result<NonNull<u8>> {
    unsafe { Kernel::map_file(file, len, mode) }
}

/// Wrapper to use [`PlatformMemory::unmap`].
///
/// **SAFETY**: `addr` and `len` must describe a mapping returned by [`map_file`] that
/// nobody is going to touch again.
#[inline]
pub(crate) unsafe fn unmap(addr: NonNull<u8>, len: usize) -> io::Result<()> {
    unsafe { Kernel::unmap(addr, len) }
}

#[cfg(unix)]
mod unix {
    use super::{Kernel, PlatformMemory};
    use crate::config::MapMode;

    use libc::{mmap, munmap, off_t, size_t};

    use std::{
        fs::File,
        io,
        os::{
            fd::AsRawFd,
            raw::{c_int, c_void},
        },
        ptr::NonNull,
    };

    impl PlatformMemory for Kernel {
        unsafe fn map_file(file: &File, len: usize, mode: MapMode) -> io::Result<NonNull<u8>> {
            // mmap parameters.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const OFFSET: off_t = 0;

            let flags = match mode {
                MapMode::Private => libc::MAP_PRIVATE,
                MapMode::Shared => libc::MAP_SHARED,
            };

            unsafe {
                let addr = mmap(ADDR, len as size_t, PROT, flags, file.as_raw_fd(), OFFSET);

                match addr {
                    libc::MAP_FAILED => Err(io::Error::last_os_error()),
                    addr => NonNull::new(addr.cast::<u8>())
                        .ok_or_else(|| io::Error::other("mmap returned a null address")),
                }
            }
        }

        unsafe fn unmap(addr: NonNull<u8>, len: usize) -> io::Result<()> {
            unsafe {
                match munmap(addr.as_ptr().cast::<c_void>(), len as size_t) {
                    0 => Ok(()),
                    _ => Err(io::Error::last_os_error()),
                }
            }
        }

        fn page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{fs::File, io, mem::MaybeUninit, os::windows::io::AsRawHandle, ptr::NonNull};

    use crate::{
        config::MapMode,
        kernel::{Kernel, PlatformMemory},
    };

    use windows::{
        Win32::{
            Foundation::{CloseHandle, HANDLE},
            System::{Memory, SystemInformation},
        },
        core::PCWSTR,
    };

    use tracing::warn;

    impl PlatformMemory for Kernel {
        unsafe fn map_file(file: &File, len: usize, mode: MapMode) -> io::Result<NonNull<u8>> {
            let (protection, access) = match mode {
                MapMode::Private => (Memory::PAGE_WRITECOPY, Memory::FILE_MAP_COPY),
                MapMode::Shared => (Memory::PAGE_READWRITE, Memory::FILE_MAP_WRITE),
            };

            let size = len as u64;

            unsafe {
                let mapping = Memory::CreateFileMappingW(
                    HANDLE(file.as_raw_handle()),
                    None,
                    protection,
                    (size >> 32) as u32,
                    size as u32,
                    PCWSTR::null(),
                )
                .map_err(io::Error::other)?;

                let view = Memory::MapViewOfFile(mapping, access, 0, 0, len);
                let mapped = NonNull::new(view.Value.cast::<u8>()).ok_or_else(io::Error::last_os_error);

                // The view keeps the mapping object alive on its own.
                if let Err(e) = CloseHandle(mapping) {
                    warn!(error = %e, "Failed to close file mapping handle");
                }

                mapped
            }
        }

        unsafe fn unmap(addr: NonNull<u8>, _len: usize) -> io::Result<()> {
            let view = Memory::MEMORY_MAPPED_VIEW_ADDRESS {
                Value: addr.as_ptr().cast(),
            };

            unsafe { Memory::UnmapViewOfFile(view).map_err(io::Error::other) }
        }

        fn page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwAllocationGranularity as usize
            }
        }
    }
}
