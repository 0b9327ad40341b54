// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Independently named Win32 mutex paired with a file mapping.

use std::io;

use windows_sys::Win32::Foundation::{
    CloseHandle, HANDLE, WAIT_ABANDONED, WAIT_FAILED, WAIT_OBJECT_0,
};
use windows_sys::Win32::System::Threading::{
    CreateMutexW, ReleaseMutex, WaitForSingleObject, INFINITE,
};

use crate::error::{LockStage, MutexFailure, ShmError, ShmResult};
use crate::lock::{abandoned_error, CrossProcessLock};

/// Encode a name as a NUL-terminated UTF-16 string.
pub(crate) fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

fn last_error() -> MutexFailure {
    MutexFailure::Os(io::Error::last_os_error().to_string())
}

/// Handle to a named kernel mutex.
pub struct NamedMutex {
    handle: HANDLE,
}

// SAFETY: kernel mutex handles may be used from any thread.
unsafe impl Send for NamedMutex {}

// SAFETY: WaitForSingleObject/ReleaseMutex are thread-safe.
unsafe impl Sync for NamedMutex {}

impl NamedMutex {
    /// Create the mutex, or open it if another process already created it.
    pub(crate) fn create_or_open(name: &str) -> ShmResult<Self> {
        let wide = to_wide(name);
        // SAFETY: wide is NUL-terminated and outlives the call.
        let handle = unsafe { CreateMutexW(std::ptr::null(), 0, wide.as_ptr()) };
        if handle.is_null() {
            return Err(ShmError::mutex(LockStage::Init, last_error()));
        }
        Ok(Self { handle })
    }

    /// Close the handle, reporting the OS error if any.
    pub(crate) fn close(mut self) -> ShmResult<()> {
        let handle = std::mem::replace(&mut self.handle, std::ptr::null_mut());
        // SAFETY: handle came from CreateMutexW and is closed exactly once.
        if unsafe { CloseHandle(handle) } == 0 {
            return Err(ShmError::not_open(io::Error::last_os_error().to_string()));
        }
        Ok(())
    }
}

impl CrossProcessLock for NamedMutex {
    fn acquire(&self) -> ShmResult<()> {
        // SAFETY: handle is a live mutex handle.
        let wait = unsafe { WaitForSingleObject(self.handle, INFINITE) };
        match wait {
            WAIT_OBJECT_0 => Ok(()),
            WAIT_ABANDONED => {
                // Ownership was transferred to us; hand it back so others can proceed.
                tracing::warn!("Segment lock owner terminated while holding the lock; recovering");
                // SAFETY: this thread owns the mutex after WAIT_ABANDONED.
                let released = if unsafe { ReleaseMutex(self.handle) } == 0 {
                    Err(last_error())
                } else {
                    Ok(())
                };
                Err(abandoned_error(released))
            }
            WAIT_FAILED => Err(ShmError::mutex(LockStage::Acquire, last_error())),
            other => Err(ShmError::mutex(
                LockStage::Acquire,
                MutexFailure::Os(format!("unexpected wait result {:#x}", other)),
            )),
        }
    }

    fn release(&self) -> ShmResult<()> {
        // SAFETY: handle is a live mutex handle.
        if unsafe { ReleaseMutex(self.handle) } == 0 {
            return Err(ShmError::mutex(LockStage::Release, last_error()));
        }
        Ok(())
    }
}

impl Drop for NamedMutex {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            // SAFETY: handle is live and not closed yet.
            unsafe { CloseHandle(self.handle) };
        }
    }
}
