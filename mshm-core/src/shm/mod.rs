// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared memory segments.
//!
//! A segment is a named OS object laid out as `[header][data]`. The header
//! holds the data capacity and, on POSIX, the process-shared lock. Two
//! platform backends implement [`SegmentBackend`]; [`Segment`] is the
//! portable handle built on top of whichever one the target provides.

mod header;
#[cfg(unix)]
mod posix;
mod segment;
#[cfg(windows)]
mod windows;

pub use segment::{Segment, SizeMismatch};

use crate::config::SegmentOptions;
use crate::error::ShmResult;
use crate::lock::CrossProcessLock;
use crate::name::SegmentName;
use header::SegmentHeader;

/// Platform contract for creating, mapping and tearing down a segment.
pub(crate) trait SegmentBackend: Sized + Send + Sync {
    type Lock: CrossProcessLock;

    /// Exclusively create the object or attach to the existing one, size it,
    /// map it, and on creation initialize the header and lock.
    ///
    /// Returns the mapping and whether this call created the object. On
    /// failure nothing acquired so far is left behind.
    fn create_or_attach(
        name: &SegmentName,
        requested: usize,
        options: &SegmentOptions,
    ) -> ShmResult<(Self, bool)>;

    fn header(&self) -> &SegmentHeader;

    fn data_ptr(&self) -> *mut u8;

    /// Bytes of data area actually mapped into this process.
    fn data_len(&self) -> usize;

    fn lock(&self) -> &Self::Lock;

    /// Unmap and release every OS handle.
    fn close(self) -> ShmResult<()>;

    /// Remove the OS-visible name.
    fn unlink(name: &SegmentName, options: &SegmentOptions) -> ShmResult<()>;
}

#[cfg(unix)]
pub(crate) type PlatformMapping = posix::PosixMapping;

#[cfg(windows)]
pub(crate) type PlatformMapping = windows::WindowsMapping;
