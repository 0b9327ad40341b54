// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cross-process mutual exclusion.
//!
//! Two variants sit behind one acquire/release interface:
//! - [`EmbeddedMutex`]: a process-shared `pthread_mutex_t` living inside the
//!   segment header (POSIX).
//! - [`NamedMutex`]: an independently named OS mutex opened next to the
//!   mapping (Windows).
//!
//! The in-memory representation is not portable between the two.

#[cfg(unix)]
mod embedded;
#[cfg(windows)]
mod named;

#[cfg(unix)]
pub use embedded::EmbeddedMutex;
#[cfg(windows)]
pub use named::NamedMutex;
#[cfg(windows)]
pub(crate) use named::to_wide;

use crate::error::{LockStage, MutexFailure, ShmError, ShmResult};

/// A mutual-exclusion lock usable by threads of different processes.
///
/// `acquire` blocks without timeout. Both steps can fail on their own and
/// report a [`crate::ShmError::Mutex`] naming the failed stage.
pub trait CrossProcessLock: Send + Sync {
    fn acquire(&self) -> ShmResult<()>;

    fn release(&self) -> ShmResult<()>;
}

/// Run `f` while holding `lock`.
///
/// If `acquire` fails, `f` never runs. If `release` fails after `f` ran,
/// the release error is returned and the result of `f` is discarded.
pub(crate) fn with_lock<L, F, R>(lock: &L, f: F) -> ShmResult<R>
where
    L: CrossProcessLock + ?Sized,
    F: FnOnce() -> R,
{
    lock.acquire()?;
    let out = f();
    lock.release()?;
    Ok(out)
}

/// Error for a lock taken over from a dead owner, given how handing it back
/// went. A failed release leaves the lock held, so that is what gets reported.
#[cfg_attr(not(any(target_os = "linux", windows)), allow(dead_code))]
pub(crate) fn abandoned_error(released: Result<(), MutexFailure>) -> ShmError {
    match released {
        Ok(()) => ShmError::mutex(LockStage::Acquire, MutexFailure::Abandoned),
        Err(failure) => ShmError::mutex(LockStage::Release, failure),
    }
}
