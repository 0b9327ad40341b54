// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Process-shared pthread mutex embedded in shared memory.
//!
//! On Linux the mutex is robust: if its owner dies while holding it, the next
//! acquirer gets EOWNERDEAD, marks it consistent, and reports the lock as
//! abandoned instead of blocking forever.

use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::error::{LockStage, MutexFailure, ShmError, ShmResult};
#[cfg(target_os = "linux")]
use crate::lock::abandoned_error;
use crate::lock::CrossProcessLock;

/// A `pthread_mutex_t` that lives inside a shared mapping.
///
/// This struct does not own the mutex memory; the mapping does. It is never
/// destroyed by a closing handle because other processes may still use it.
pub struct EmbeddedMutex {
    raw: NonNull<libc::pthread_mutex_t>,
}

// SAFETY: the mutex is process-shared and designed for concurrent use from
// any thread; the pointer stays valid for as long as the owning mapping.
unsafe impl Send for EmbeddedMutex {}

// SAFETY: see above. All mutation goes through pthread calls.
unsafe impl Sync for EmbeddedMutex {}

impl EmbeddedMutex {
    /// Initialize a fresh process-shared mutex at `raw`.
    ///
    /// # Safety
    /// `raw` must point into a live `MAP_SHARED` mapping, be suitably aligned,
    /// and not be in use by any other thread or process yet.
    pub(crate) unsafe fn init_in_place(raw: NonNull<libc::pthread_mutex_t>) -> ShmResult<Self> {
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        check(libc::pthread_mutexattr_init(attr.as_mut_ptr()), LockStage::Init)?;

        let result = Self::init_with_attr(attr.as_mut_ptr(), raw.as_ptr());
        libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
        result?;

        Ok(Self { raw })
    }

    unsafe fn init_with_attr(
        attr: *mut libc::pthread_mutexattr_t,
        raw: *mut libc::pthread_mutex_t,
    ) -> ShmResult<()> {
        check(
            libc::pthread_mutexattr_setpshared(attr, libc::PTHREAD_PROCESS_SHARED),
            LockStage::Init,
        )?;

        #[cfg(target_os = "linux")]
        check(
            libc::pthread_mutexattr_setrobust(attr, libc::PTHREAD_MUTEX_ROBUST),
            LockStage::Init,
        )?;

        check(libc::pthread_mutex_init(raw, attr), LockStage::Init)
    }

    /// Wrap a mutex another handle already initialized.
    ///
    /// # Safety
    /// `raw` must point at a mutex set up by [`EmbeddedMutex::init_in_place`]
    /// in a mapping that outlives the returned value.
    pub(crate) unsafe fn from_initialized(raw: NonNull<libc::pthread_mutex_t>) -> Self {
        Self { raw }
    }

    /// The previous owner died. Make the mutex usable again, give it back,
    /// and tell the caller the protected bytes may be half-written.
    #[cfg(target_os = "linux")]
    fn recover_abandoned(&self) -> ShmError {
        tracing::warn!("Segment lock owner terminated while holding the lock; recovering");

        // SAFETY: we own the mutex after EOWNERDEAD.
        let code = unsafe { libc::pthread_mutex_consistent(self.raw.as_ptr()) };
        // SAFETY: still the owner, consistent or not.
        let unlocked = unsafe { libc::pthread_mutex_unlock(self.raw.as_ptr()) };

        if code != 0 {
            return ShmError::mutex(LockStage::Acquire, failure_from_code(code));
        }
        abandoned_error(released(unlocked))
    }
}

impl CrossProcessLock for EmbeddedMutex {
    fn acquire(&self) -> ShmResult<()> {
        // SAFETY: raw points at an initialized process-shared mutex.
        let code = unsafe { libc::pthread_mutex_lock(self.raw.as_ptr()) };
        match code {
            0 => Ok(()),
            #[cfg(target_os = "linux")]
            libc::EOWNERDEAD => Err(self.recover_abandoned()),
            code => Err(ShmError::mutex(LockStage::Acquire, failure_from_code(code))),
        }
    }

    fn release(&self) -> ShmResult<()> {
        // SAFETY: raw points at an initialized process-shared mutex.
        let code = unsafe { libc::pthread_mutex_unlock(self.raw.as_ptr()) };
        check(code, LockStage::Release)
    }
}

fn check(code: libc::c_int, stage: LockStage) -> ShmResult<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(ShmError::mutex(stage, failure_from_code(code)))
    }
}

#[cfg(target_os = "linux")]
fn released(code: libc::c_int) -> Result<(), MutexFailure> {
    match code {
        0 => Ok(()),
        code => Err(failure_from_code(code)),
    }
}

fn failure_from_code(code: libc::c_int) -> MutexFailure {
    match code {
        libc::EDEADLK => MutexFailure::Deadlock,
        libc::EPERM => MutexFailure::NotOwner,
        libc::EINVAL => MutexFailure::NotInitialized,
        #[cfg(target_os = "linux")]
        libc::ENOTRECOVERABLE => MutexFailure::NotRecoverable,
        other => MutexFailure::Os(std::io::Error::from_raw_os_error(other).to_string()),
    }
}
