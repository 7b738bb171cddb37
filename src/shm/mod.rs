//! Typed POSIX shared memory mappings.
//!
//! A [`SharedRegion<T>`] maps exactly one `T` into the calling process. The creating process owns
//! the object's name and unlinks it when the handle drops; every other process opens the same name
//! and only unmaps on drop.

mod lock;

pub(crate) use lock::ProcessMutex;

use std::ffi::CString;
use std::fs::File;
use std::io;
use std::marker::PhantomData;
use std::mem::size_of;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr::{self, NonNull};

use thiserror::Error;

/// Types whose all-zero bit pattern is a valid value.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, must not hold pointers or handles into process-local
/// memory, and must be valid when every byte is zero.
pub(crate) unsafe trait ZeroInit {}

#[derive(Debug, Error)]
pub(crate) enum ShmError {
    #[error("invalid shared memory name {0:?}")]
    InvalidName(String),
    #[error("failed to open shared memory {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to size shared memory {name}: {source}")]
    Resize {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to map shared memory {name}: {source}")]
    Map {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("shared memory {name} is {actual} bytes, expected {expected}")]
    SizeMismatch { name: String, actual: u64, expected: usize },
}

pub(crate) struct SharedRegion<T: ZeroInit> {
    ptr: NonNull<T>,
    name: Option<CString>,
    owner: bool,
    _marker: PhantomData<T>,
}

impl<T: ZeroInit> SharedRegion<T> {
    /// Creates a new named object sized for one `T`. The kernel zero-fills it.
    pub(crate) fn create(name: &str) -> Result<Self, ShmError> {
        let c_name = shm_name(name)?;
        let fd = unsafe {
            libc::shm_open(c_name.as_ptr(), libc::O_CREAT | libc::O_EXCL | libc::O_RDWR, 0o600)
        };
        if fd < 0 {
            return Err(ShmError::Open {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        let file = File::from(unsafe { OwnedFd::from_raw_fd(fd) });

        let mapped = file
            .set_len(size_of::<T>() as u64)
            .map_err(|source| ShmError::Resize { name: name.to_string(), source })
            .and_then(|_| map::<T>(Some(&file), name));

        match mapped {
            Ok(ptr) => Ok(Self { ptr, name: Some(c_name), owner: true, _marker: PhantomData }),
            Err(err) => {
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                Err(err)
            }
        }
    }

    /// Maps an object previously created by [`SharedRegion::create`].
    pub(crate) fn open(name: &str) -> Result<Self, ShmError> {
        let c_name = shm_name(name)?;
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(ShmError::Open {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        let file = File::from(unsafe { OwnedFd::from_raw_fd(fd) });

        let actual = file
            .metadata()
            .map_err(|source| ShmError::Open { name: name.to_string(), source })?
            .len();
        if actual != size_of::<T>() as u64 {
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                actual,
                expected: size_of::<T>(),
            });
        }

        let ptr = map::<T>(Some(&file), name)?;
        Ok(Self { ptr, name: Some(c_name), owner: false, _marker: PhantomData })
    }

    /// Maps zeroed memory shared with future children but reachable by no name. Threads of the
    /// current process see it like any other region.
    pub(crate) fn anonymous() -> Result<Self, ShmError> {
        let ptr = map::<T>(None, "<anonymous>")?;
        Ok(Self { ptr, name: None, owner: false, _marker: PhantomData })
    }

    #[cfg(test)]
    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref().and_then(|name| name.to_str().ok())
    }

    pub(crate) fn get(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }

    /// # Safety
    ///
    /// No other process may have the region mapped while the returned borrow is alive.
    pub(crate) unsafe fn get_mut(&mut self) -> &mut T {
        self.ptr.as_mut()
    }
}

impl<T: ZeroInit> Drop for SharedRegion<T> {
    fn drop(&mut self) {
        if unsafe { libc::munmap(self.ptr.as_ptr().cast(), size_of::<T>()) } != 0 {
            tracing::warn!(error = %io::Error::last_os_error(), "Failed to unmap shared memory");
        }

        if !self.owner {
            return;
        }
        if let Some(name) = &self.name {
            if unsafe { libc::shm_unlink(name.as_ptr()) } != 0 {
                tracing::warn!(
                    name = ?name,
                    error = %io::Error::last_os_error(),
                    "Failed to unlink shared memory"
                );
            }
        }
    }
}

fn shm_name(name: &str) -> Result<CString, ShmError> {
    let valid = name.len() > 1 && name.starts_with('/') && !name[1..].contains('/');
    if !valid {
        return Err(ShmError::InvalidName(name.to_string()));
    }
    CString::new(name).map_err(|_| ShmError::InvalidName(name.to_string()))
}

fn map<T>(file: Option<&File>, name: &str) -> Result<NonNull<T>, ShmError> {
    let (flags, fd) = match file {
        Some(file) => (libc::MAP_SHARED, file.as_raw_fd()),
        None => (libc::MAP_SHARED | libc::MAP_ANONYMOUS, -1),
    };

    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            size_of::<T>(),
            libc::PROT_READ | libc::PROT_WRITE,
            flags,
            fd,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        return Err(ShmError::Map { name: name.to_string(), source: io::Error::last_os_error() });
    }

    NonNull::new(addr.cast::<T>()).ok_or_else(|| ShmError::Map {
        name: name.to_string(),
        source: io::Error::new(io::ErrorKind::Other, "mmap returned a null address"),
    })
}
