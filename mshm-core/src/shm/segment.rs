// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Segment handle and the synchronized accessor.
//!
//! Every read and write is bounds-checked against the capacity stored in the
//! shared header, then performed as a single copy while holding the
//! segment's cross-process lock.

use std::time::Duration;

use crate::config::SegmentOptions;
use crate::error::{ShmError, ShmResult};
use crate::lock::with_lock;
use crate::name::{validate_scoped, SegmentName};
use crate::shm::header::HEADER_SIZE;
use crate::shm::{PlatformMapping, SegmentBackend};
use crate::state::{Lifecycle, SegmentState};

/// An attach asked for a size different from the creator's capacity.
///
/// The attach still succeeds and the header is left alone; offsets beyond
/// `capacity` are rejected no matter what was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatch {
    pub requested: usize,
    pub capacity: usize,
}

/// Process-local owning handle to an open shared memory segment.
///
/// Obtained from [`Segment::open`]. Resources are released by
/// [`Segment::close`] (or on drop); afterwards the handle is poisoned and
/// every operation fails with `NotOpen`.
///
/// `read` and `write` take `&self` and may be called from many threads; the
/// segment lock serializes them across every attached process. Closing needs
/// `&mut self`, so it cannot race with in-flight accesses on this handle.
pub struct Segment {
    name: SegmentName,
    requested: usize,
    created: bool,
    mismatch: Option<SizeMismatch>,
    lifecycle: Lifecycle,
    mapping: Option<PlatformMapping>,
}

impl Segment {
    /// Bytes occupied by the header in front of the data area.
    pub const HEADER_SIZE: usize = HEADER_SIZE;

    /// Open `name` with `size` bytes of data, creating it if it does not exist.
    ///
    /// # Errors
    /// `InvalidParameter` for a bad name or a zero size, otherwise the
    /// backend error of the step that failed (open, resize, map, mutex).
    pub fn open(name: &str, size: usize) -> ShmResult<Self> {
        Self::open_with(name, size, &SegmentOptions::default())
    }

    /// Like [`Segment::open`] with explicit permissions, init timeout and
    /// naming policy.
    pub fn open_with(name: &str, size: usize, options: &SegmentOptions) -> ShmResult<Self> {
        let name = SegmentName::new(name)?;
        validate_scoped(options.name_policy(), &name)?;
        if size == 0 {
            return Err(ShmError::invalid("Size must be greater than 0"));
        }

        let (mapping, created) = PlatformMapping::create_or_attach(&name, size, options)?;

        let capacity = mapping.header().capacity();
        let mismatch = (capacity != size).then_some(SizeMismatch {
            requested: size,
            capacity,
        });
        if let Some(m) = mismatch {
            tracing::warn!(
                name = %name,
                requested = m.requested,
                capacity = m.capacity,
                "Attached to a segment whose capacity differs from the requested size"
            );
        }

        Ok(Self {
            name,
            requested: size,
            created,
            mismatch,
            lifecycle: Lifecycle::new(created),
            mapping: Some(mapping),
        })
    }

    /// Unmap the segment and release its OS handles.
    ///
    /// Calling this on a closed handle returns `NotOpen`. The handle is
    /// poisoned even if releasing a resource fails.
    pub fn close(&mut self) -> ShmResult<()> {
        if self.mapping.is_none() {
            return Err(ShmError::not_open("segment handle is already closed"));
        }
        self.lifecycle.transition_to(SegmentState::Closed)?;

        if let Some(mapping) = self.mapping.take() {
            mapping.close()?;
        }

        tracing::debug!(name = %self.name, "Closed shared memory segment");
        Ok(())
    }

    /// Remove `name` so that no future open attaches to it.
    ///
    /// Processes that already have it mapped keep working until they close.
    /// Where the OS reclaims segments automatically this returns
    /// [`ShmError::DeleteUnsupported`], which callers should treat as
    /// expected.
    pub fn delete(name: &str) -> ShmResult<()> {
        Self::delete_with(name, &SegmentOptions::default())
    }

    /// Like [`Segment::delete`] under the naming policy of `options`.
    pub fn delete_with(name: &str, options: &SegmentOptions) -> ShmResult<()> {
        let name = SegmentName::new(name)?;
        validate_scoped(options.name_policy(), &name)?;
        PlatformMapping::unlink(&name, options)
    }

    /// Copy `src` into the data area starting at `offset`.
    pub fn write(&self, src: &[u8], offset: usize) -> ShmResult<()> {
        let mapping = self.mapping()?;
        check_bounds(offset, src.len(), Self::effective_capacity(mapping))?;

        // SAFETY: the range was checked against the mapped capacity and the
        // lock excludes every other accessor.
        with_lock(mapping.lock(), || unsafe {
            std::ptr::copy_nonoverlapping(
                src.as_ptr(),
                mapping.data_ptr().add(offset),
                src.len(),
            );
        })
    }

    /// Fill `dst` from the data area starting at `offset`.
    pub fn read(&self, dst: &mut [u8], offset: usize) -> ShmResult<()> {
        let mapping = self.mapping()?;
        check_bounds(offset, dst.len(), Self::effective_capacity(mapping))?;

        // SAFETY: see `write`.
        with_lock(mapping.lock(), || unsafe {
            std::ptr::copy_nonoverlapping(
                mapping.data_ptr().add(offset),
                dst.as_mut_ptr(),
                dst.len(),
            );
        })
    }

    /// Data capacity declared by the segment's creator.
    pub fn capacity(&self) -> ShmResult<usize> {
        self.mapping().map(Self::effective_capacity)
    }

    /// Get the logical name.
    pub fn name(&self) -> &SegmentName {
        &self.name
    }

    /// Size this handle asked for when opening.
    pub fn requested_size(&self) -> usize {
        self.requested
    }

    /// Whether this handle created the OS object (as opposed to attaching).
    pub fn is_creator(&self) -> bool {
        self.created
    }

    /// Set when the requested size differs from the creator's capacity.
    pub fn size_mismatch(&self) -> Option<SizeMismatch> {
        self.mismatch
    }

    pub fn state(&self) -> SegmentState {
        self.lifecycle.state()
    }

    pub fn is_open(&self) -> bool {
        self.mapping.is_some()
    }

    /// Time since the handle was opened, or since it was closed.
    pub fn time_in_state(&self) -> Duration {
        self.lifecycle.time_in_state()
    }

    fn mapping(&self) -> ShmResult<&PlatformMapping> {
        self.mapping
            .as_ref()
            .ok_or_else(|| ShmError::not_open("segment handle is closed"))
    }

    /// Header capacity, never beyond what this process has mapped.
    fn effective_capacity(mapping: &PlatformMapping) -> usize {
        mapping.header().capacity().min(mapping.data_len())
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("name", &self.name)
            .field("requested", &self.requested)
            .field("state", &self.lifecycle.state())
            .field("size_mismatch", &self.mismatch)
            .finish()
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if self.mapping.is_some() {
            if let Err(e) = self.close() {
                tracing::warn!(name = %self.name, error = %e, "Failed to close segment on drop");
            }
        }
    }
}

fn check_bounds(offset: usize, len: usize, capacity: usize) -> ShmResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(ShmError::SizeExceeded {
            offset,
            len,
            capacity,
        }),
    }
}
