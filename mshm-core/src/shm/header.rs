// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! In-segment header layout.
//!
//! ```text
//! POSIX:   [ pthread_mutex_t (process-shared) ][ capacity: u64 ][ data ... ]
//! Windows: [ capacity: u64 ][ data ... ]        (mutex is a named kernel object)
//! ```
//!
//! The two layouts are not compatible with each other. There is no version
//! field: an attacher expecting a different layout silently misreads it.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Poll interval while waiting for a creator to publish the header.
pub(crate) const INIT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// When an attacher gives up waiting for the creator. `None` waits forever,
/// which is also what a timeout too large to represent means.
pub(crate) fn init_deadline(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

pub(crate) fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// Header stored at the start of every segment.
#[repr(C)]
pub(crate) struct SegmentHeader {
    /// Process-shared lock guarding the data area.
    #[cfg(unix)]
    lock: std::cell::UnsafeCell<libc::pthread_mutex_t>,
    /// Data capacity in bytes. Written once by the creator, last, with
    /// release ordering; zero means "not initialized yet".
    capacity: AtomicU64,
}

/// Bytes preceding the data area.
pub(crate) const HEADER_SIZE: usize = std::mem::size_of::<SegmentHeader>();

impl SegmentHeader {
    /// Pointer to the embedded mutex.
    #[cfg(unix)]
    pub(crate) fn lock_ptr(&self) -> NonNull<libc::pthread_mutex_t> {
        // SAFETY: UnsafeCell::get never returns null.
        unsafe { NonNull::new_unchecked(self.lock.get()) }
    }

    /// Declared capacity, or 0 while the creator has not finished.
    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire) as usize
    }

    /// Zero the data area and publish the capacity.
    ///
    /// # Safety
    /// `base` must point at a writable mapping of at least
    /// `HEADER_SIZE + capacity` bytes that this process just created, with
    /// the lock already initialized.
    pub(crate) unsafe fn initialize(base: NonNull<SegmentHeader>, capacity: usize) {
        let data = data_ptr(base);
        std::ptr::write_bytes(data, 0, capacity);
        base.as_ref()
            .capacity
            .store(capacity as u64, Ordering::Release);
    }

    /// Wait for the creator to publish the capacity.
    ///
    /// Returns `None` if nothing was published before `deadline`.
    pub(crate) fn await_capacity(&self, deadline: Option<Instant>) -> Option<usize> {
        loop {
            let capacity = self.capacity();
            if capacity != 0 {
                return Some(capacity);
            }
            if deadline_passed(deadline) {
                return None;
            }
            std::thread::sleep(INIT_POLL_INTERVAL);
        }
    }
}

/// First byte of the data area.
pub(crate) fn data_ptr(base: NonNull<SegmentHeader>) -> *mut u8 {
    // SAFETY: every mapping is at least HEADER_SIZE + 1 bytes long.
    unsafe { base.as_ptr().cast::<u8>().add(HEADER_SIZE) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, align(8))]
    struct Backing([u8; 256]);

    #[test]
    fn test_header_keeps_data_aligned() {
        assert_eq!(HEADER_SIZE % std::mem::align_of::<u64>(), 0);
    }

    #[test]
    fn test_initialize_publishes_capacity() {
        let mut backing = Backing([0xAA; 256]);
        let base = NonNull::new(backing.0.as_mut_ptr().cast::<SegmentHeader>()).unwrap();
        let capacity = 256 - HEADER_SIZE;

        unsafe {
            base.as_ref().capacity.store(0, Ordering::Relaxed);
            SegmentHeader::initialize(base, capacity);
        }

        let header = unsafe { base.as_ref() };
        assert_eq!(header.capacity(), capacity);
        assert_eq!(header.await_capacity(init_deadline(Duration::ZERO)), Some(capacity));
        assert!(backing.0[HEADER_SIZE..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_await_times_out_on_uninitialized_header() {
        let mut backing = Backing([0; 256]);
        let base = NonNull::new(backing.0.as_mut_ptr().cast::<SegmentHeader>()).unwrap();
        let header = unsafe { base.as_ref() };
        assert_eq!(header.await_capacity(init_deadline(Duration::from_millis(5))), None);
    }

    #[test]
    fn test_unbounded_timeout_has_no_deadline() {
        assert_eq!(init_deadline(Duration::MAX), None);
        assert!(!deadline_passed(init_deadline(Duration::MAX)));
        assert!(deadline_passed(init_deadline(Duration::ZERO)));

        let mut backing = Backing([0; 256]);
        let base = NonNull::new(backing.0.as_mut_ptr().cast::<SegmentHeader>()).unwrap();
        unsafe { SegmentHeader::initialize(base, 8) };
        let header = unsafe { base.as_ref() };
        assert_eq!(header.await_capacity(init_deadline(Duration::MAX)), Some(8));
    }
}
