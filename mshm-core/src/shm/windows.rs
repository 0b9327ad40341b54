// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Windows backend: pagefile-backed file mapping plus a named mutex.
//!
//! The kernel reference-counts the mapping object and removes it when the
//! last handle closes, so there is nothing to unlink.

use std::io;
use std::ptr::NonNull;

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, MapViewOfFile, UnmapViewOfFile, FILE_MAP_ALL_ACCESS,
    MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE,
};

use crate::config::SegmentOptions;
use crate::error::{ShmError, ShmResult};
use crate::lock::{to_wide, NamedMutex};
use crate::name::SegmentName;
use crate::shm::header::{data_ptr, init_deadline, SegmentHeader, HEADER_SIZE};
use crate::shm::SegmentBackend;

/// A mapped view of a named file mapping.
pub(crate) struct WindowsMapping {
    mapping: HANDLE,
    base: NonNull<SegmentHeader>,
    mapped_len: usize,
    lock: NamedMutex,
}

// SAFETY: handles are process-wide; data access is serialized by the named mutex.
unsafe impl Send for WindowsMapping {}

// SAFETY: see above.
unsafe impl Sync for WindowsMapping {}

/// Closes the mapping handle unless released.
struct MappingHandle(HANDLE);

impl MappingHandle {
    fn release(self) -> HANDLE {
        let handle = self.0;
        std::mem::forget(self);
        handle
    }
}

impl Drop for MappingHandle {
    fn drop(&mut self) {
        // SAFETY: handle came from CreateFileMappingW.
        unsafe { CloseHandle(self.0) };
    }
}

/// Unmaps a view unless released.
struct MappedView(NonNull<SegmentHeader>);

impl MappedView {
    fn release(self) -> NonNull<SegmentHeader> {
        let base = self.0;
        std::mem::forget(self);
        base
    }
}

impl Drop for MappedView {
    fn drop(&mut self) {
        let view = MEMORY_MAPPED_VIEW_ADDRESS {
            Value: self.0.as_ptr().cast(),
        };
        // SAFETY: view came from MapViewOfFile.
        unsafe { UnmapViewOfFile(view) };
    }
}

impl SegmentBackend for WindowsMapping {
    type Lock = NamedMutex;

    fn create_or_attach(
        name: &SegmentName,
        requested: usize,
        options: &SegmentOptions,
    ) -> ShmResult<(Self, bool)> {
        let policy = options.name_policy();
        let object_name = policy.object_name(name);
        let lock_name = policy.lock_name(name).ok_or_else(|| {
            ShmError::invalid("naming policy must provide a lock name on this platform")
        })?;
        let total = HEADER_SIZE
            .checked_add(requested)
            .ok_or_else(|| ShmError::invalid(format!("Size {} is too large", requested)))?;

        let wide = to_wide(&object_name);
        let total64 = total as u64;
        // SAFETY: wide is NUL-terminated and outlives the call.
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                std::ptr::null(),
                PAGE_READWRITE,
                (total64 >> 32) as u32,
                total64 as u32,
                wide.as_ptr(),
            )
        };
        // Must be read before any other call touches the thread's last error.
        // SAFETY: plain FFI call.
        let created = unsafe { GetLastError() } != ERROR_ALREADY_EXISTS;

        if handle.is_null() {
            return Err(ShmError::OpenFailed {
                name: name.to_string(),
                reason: io::Error::last_os_error().to_string(),
            });
        }
        let mapping = MappingHandle(handle);

        // Zero length maps the whole object, whatever size its creator chose.
        // SAFETY: mapping.0 is a live file mapping handle.
        let view = unsafe { MapViewOfFile(mapping.0, FILE_MAP_ALL_ACCESS, 0, 0, 0) };
        let view = NonNull::new(view.Value.cast::<SegmentHeader>())
            .map(MappedView)
            .ok_or_else(|| ShmError::MapFailed {
                name: name.to_string(),
                reason: io::Error::last_os_error().to_string(),
            })?;

        let lock = NamedMutex::create_or_open(&lock_name)?;

        // SAFETY: the view spans at least the header.
        let header = unsafe { view.0.as_ref() };
        let mapped_len = if created {
            // SAFETY: new object, view spans HEADER_SIZE + requested bytes.
            unsafe { SegmentHeader::initialize(view.0, requested) };
            total
        } else {
            let capacity = header
                .await_capacity(init_deadline(options.init_timeout()))
                .ok_or_else(|| ShmError::OpenFailed {
                    name: name.to_string(),
                    reason: "segment header was never initialized by its creator".to_string(),
                })?;
            HEADER_SIZE + capacity
        };

        tracing::debug!(
            name = %name,
            object = %object_name,
            requested = requested,
            mapped_len = mapped_len,
            created = created,
            "Opened shared memory segment"
        );

        Ok((
            Self {
                base: view.release(),
                mapping: mapping.release(),
                mapped_len,
                lock,
            },
            created,
        ))
    }

    fn header(&self) -> &SegmentHeader {
        // SAFETY: the view stays mapped until close consumes self.
        unsafe { self.base.as_ref() }
    }

    fn data_ptr(&self) -> *mut u8 {
        data_ptr(self.base)
    }

    fn data_len(&self) -> usize {
        self.mapped_len - HEADER_SIZE
    }

    fn lock(&self) -> &Self::Lock {
        &self.lock
    }

    fn close(self) -> ShmResult<()> {
        let view = MEMORY_MAPPED_VIEW_ADDRESS {
            Value: self.base.as_ptr().cast(),
        };
        // SAFETY: view and mapping are released exactly once here.
        let unmapped = if unsafe { UnmapViewOfFile(view) } == 0 {
            Err(ShmError::not_open(io::Error::last_os_error().to_string()))
        } else {
            Ok(())
        };
        // SAFETY: see above.
        let closed = if unsafe { CloseHandle(self.mapping) } == 0 {
            Err(ShmError::not_open(io::Error::last_os_error().to_string()))
        } else {
            Ok(())
        };

        unmapped.and(closed).and(self.lock.close())
    }

    fn unlink(name: &SegmentName, _options: &SegmentOptions) -> ShmResult<()> {
        Err(ShmError::DeleteUnsupported {
            name: name.to_string(),
        })
    }
}
