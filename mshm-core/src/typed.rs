// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Typed view over a segment holding one plain-old-data record.
//!
//! Thin convenience on top of the byte-offset API: the record size becomes
//! the segment size, and fields are addressed with `core::mem::offset_of!`.

use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Pod;

use crate::config::SegmentOptions;
use crate::error::{ShmError, ShmResult};
use crate::shm::Segment;

/// A segment whose data area is laid out as a single `T`.
///
/// ```no_run
/// use bytemuck::{Pod, Zeroable};
/// use mshm_core::TypedSegment;
///
/// #[repr(C)]
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// struct Status {
///     toggle: u32,
///     cycle: u32,
/// }
///
/// let status = TypedSegment::<Status>::open("status")?;
/// status.store_field(core::mem::offset_of!(Status, cycle), &42u32)?;
/// assert_eq!(status.load()?.cycle, 42);
/// # Ok::<(), mshm_core::ShmError>(())
/// ```
pub struct TypedSegment<T: Pod> {
    segment: Segment,
    _record: PhantomData<T>,
}

impl<T: Pod> TypedSegment<T> {
    /// Open a segment sized for one `T`.
    pub fn open(name: &str) -> ShmResult<Self> {
        Self::open_with(name, &SegmentOptions::default())
    }

    pub fn open_with(name: &str, options: &SegmentOptions) -> ShmResult<Self> {
        let segment = Segment::open_with(name, size_of::<T>(), options)?;
        Ok(Self {
            segment,
            _record: PhantomData,
        })
    }

    /// Read the whole record.
    pub fn load(&self) -> ShmResult<T> {
        let mut value = T::zeroed();
        self.segment.read(bytemuck::bytes_of_mut(&mut value), 0)?;
        Ok(value)
    }

    /// Overwrite the whole record.
    pub fn store(&self, value: &T) -> ShmResult<()> {
        self.segment.write(bytemuck::bytes_of(value), 0)
    }

    /// Read one field of type `F` at byte `offset` within `T`.
    pub fn load_field<F: Pod>(&self, offset: usize) -> ShmResult<F> {
        check_field::<T, F>(offset)?;
        let mut value = F::zeroed();
        self.segment
            .read(bytemuck::bytes_of_mut(&mut value), offset)?;
        Ok(value)
    }

    /// Write one field of type `F` at byte `offset` within `T`.
    pub fn store_field<F: Pod>(&self, offset: usize, value: &F) -> ShmResult<()> {
        check_field::<T, F>(offset)?;
        self.segment.write(bytemuck::bytes_of(value), offset)
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn close(&mut self) -> ShmResult<()> {
        self.segment.close()
    }
}

/// Reject a field that would spill past the end of `T`, even when the
/// segment itself happens to be larger.
fn check_field<T, F>(offset: usize) -> ShmResult<()> {
    match offset.checked_add(size_of::<F>()) {
        Some(end) if end <= size_of::<T>() => Ok(()),
        _ => Err(ShmError::SizeExceeded {
            offset,
            len: size_of::<F>(),
            capacity: size_of::<T>(),
        }),
    }
}
