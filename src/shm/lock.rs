use std::cell::UnsafeCell;
use std::io;
use std::ops::{Deref, DerefMut};

use super::ZeroInit;

/// A mutex usable from every process that maps the region it lives in.
///
/// The lock is an unnamed POSIX semaphore stored in place next to the value it guards, so the
/// value can only be reached through a guard. It must be initialised with [`ProcessMutex::init`]
/// before any process calls [`ProcessMutex::lock`], and must not move afterwards.
#[repr(C)]
pub(crate) struct ProcessMutex<T> {
    sem: UnsafeCell<libc::sem_t>,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for ProcessMutex<T> {}
unsafe impl<T: Send> Sync for ProcessMutex<T> {}

unsafe impl<T: ZeroInit> ZeroInit for ProcessMutex<T> {}

impl<T> ProcessMutex<T> {
    pub(crate) fn init(&mut self) -> io::Result<()> {
        if unsafe { libc::sem_init(self.sem.get(), 1, 1) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(crate) fn destroy(&mut self) -> io::Result<()> {
        if unsafe { libc::sem_destroy(self.sem.get()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Blocks until the lock is free. Signal interruptions are retried.
    pub(crate) fn lock(&self) -> io::Result<ProcessMutexGuard<'_, T>> {
        loop {
            if unsafe { libc::sem_wait(self.sem.get()) } == 0 {
                return Ok(ProcessMutexGuard { lock: self });
            }

            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

pub(crate) struct ProcessMutexGuard<'a, T> {
    lock: &'a ProcessMutex<T>,
}

impl<T> Deref for ProcessMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for ProcessMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for ProcessMutexGuard<'_, T> {
    fn drop(&mut self) {
        if unsafe { libc::sem_post(self.lock.sem.get()) } != 0 {
            tracing::error!(error = %io::Error::last_os_error(), "Failed to release process lock");
        }
    }
}
