// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! POSIX backend: `shm_open` + `ftruncate` + `mmap`, lock embedded in the header.
//!
//! The named object outlives every process and must be removed explicitly
//! with `shm_unlink`.

use std::ffi::c_void;
use std::fs::File;
use std::num::NonZeroUsize;
use std::os::fd::{IntoRawFd, OwnedFd};
use std::ptr::NonNull;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{self, MapFlags, ProtFlags};
use nix::sys::stat::Mode;

use crate::config::SegmentOptions;
use crate::error::{ShmError, ShmResult};
use crate::lock::EmbeddedMutex;
use crate::name::SegmentName;
use crate::shm::header::{
    data_ptr, deadline_passed, init_deadline, SegmentHeader, HEADER_SIZE, INIT_POLL_INTERVAL,
};
use crate::shm::SegmentBackend;

/// Create/attach attempts before giving up on a name that keeps vanishing.
const OPEN_ATTEMPTS: usize = 3;

/// A mapped POSIX shared memory object.
pub(crate) struct PosixMapping {
    fd: OwnedFd,
    base: NonNull<SegmentHeader>,
    mapped_len: usize,
    lock: EmbeddedMutex,
}

// SAFETY: the mapping is plain shared memory; all access to the data area is
// serialized by the embedded process-shared mutex.
unsafe impl Send for PosixMapping {}

// SAFETY: see above.
unsafe impl Sync for PosixMapping {}

/// Unlinks an object this process just created unless disarmed.
struct CreatedObject<'a> {
    object_name: &'a str,
    armed: bool,
}

impl Drop for CreatedObject<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = mman::shm_unlink(self.object_name) {
                tracing::warn!(object = %self.object_name, error = %e, "Failed to unlink partially created segment");
            }
        }
    }
}

/// Unmaps a region unless released.
struct MappedRegion {
    base: NonNull<c_void>,
    len: usize,
}

impl MappedRegion {
    fn map(file: &File, len: usize, name: &SegmentName) -> ShmResult<Self> {
        let length = NonZeroUsize::new(len).ok_or_else(|| ShmError::MapFailed {
            name: name.to_string(),
            reason: "mapping length is zero".to_string(),
        })?;

        // SAFETY: file is a valid shared memory descriptor sized to at least `len`.
        let base = unsafe {
            mman::mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                file,
                0,
            )
        }
        .map_err(|e| ShmError::MapFailed {
            name: name.to_string(),
            reason: e.desc().to_string(),
        })?;

        Ok(Self { base, len })
    }

    fn header(&self) -> NonNull<SegmentHeader> {
        self.base.cast()
    }

    fn release(self) -> (NonNull<c_void>, usize) {
        let parts = (self.base, self.len);
        std::mem::forget(self);
        parts
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: base/len come from a successful mmap.
        if let Err(e) = unsafe { mman::munmap(self.base, self.len) } {
            tracing::error!(error = %e, "Failed to unmap shared memory");
        }
    }
}

/// Create the object exclusively, or attach to it if it already exists.
///
/// Returns the descriptor and whether this call created the object.
fn open_object(object_name: &str, mode: Mode, name: &SegmentName) -> ShmResult<(OwnedFd, bool)> {
    let mut last = Errno::UnknownErrno;
    for _ in 0..OPEN_ATTEMPTS {
        match mman::shm_open(object_name, OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR, mode) {
            Ok(fd) => return Ok((fd, true)),
            Err(Errno::EEXIST) => {}
            Err(e) => {
                last = e;
                break;
            }
        }

        match mman::shm_open(object_name, OFlag::O_RDWR, mode) {
            Ok(fd) => return Ok((fd, false)),
            // Unlinked between the two calls; race for creation again.
            Err(Errno::ENOENT) => last = Errno::ENOENT,
            Err(e) => {
                last = e;
                break;
            }
        }
    }

    Err(ShmError::OpenFailed {
        name: name.to_string(),
        reason: last.desc().to_string(),
    })
}

/// Map an object some other process created, once its header is published.
///
/// Never resizes the object. Fails with `OpenFailed` if the creator does not
/// finish within the configured init timeout.
fn attach_region(
    file: &File,
    name: &SegmentName,
    options: &SegmentOptions,
) -> ShmResult<(MappedRegion, EmbeddedMutex)> {
    let deadline = init_deadline(options.init_timeout());
    let uninitialized = || ShmError::OpenFailed {
        name: name.to_string(),
        reason: "segment header was never initialized by its creator".to_string(),
    };

    // The creator sizes the object right after creating it.
    while object_len(file, name)? < HEADER_SIZE {
        if deadline_passed(deadline) {
            return Err(uninitialized());
        }
        std::thread::sleep(INIT_POLL_INTERVAL);
    }

    let capacity = {
        let header_region = MappedRegion::map(file, HEADER_SIZE, name)?;
        // SAFETY: the region spans the header and lives until the end of this block.
        let header = unsafe { header_region.header().as_ref() };
        header.await_capacity(deadline).ok_or_else(uninitialized)?
    };

    let needed = HEADER_SIZE
        .checked_add(capacity)
        .ok_or_else(|| ShmError::OpenFailed {
            name: name.to_string(),
            reason: format!("published capacity {} is out of range", capacity),
        })?;
    let len = object_len(file, name)?;
    if len < needed {
        return Err(ShmError::OpenFailed {
            name: name.to_string(),
            reason: format!(
                "object is {} bytes but its header declares {} bytes of data",
                len, capacity
            ),
        });
    }

    let region = MappedRegion::map(file, needed, name)?;
    // SAFETY: the creator published the capacity after initializing the lock.
    let lock_ptr = unsafe { region.header().as_ref() }.lock_ptr();
    let lock = unsafe { EmbeddedMutex::from_initialized(lock_ptr) };
    Ok((region, lock))
}

fn object_len(file: &File, name: &SegmentName) -> ShmResult<usize> {
    let metadata = file.metadata().map_err(|e| ShmError::OpenFailed {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(metadata.len() as usize)
}

impl SegmentBackend for PosixMapping {
    type Lock = EmbeddedMutex;

    fn create_or_attach(
        name: &SegmentName,
        requested: usize,
        options: &SegmentOptions,
    ) -> ShmResult<(Self, bool)> {
        let object_name = options.name_policy().object_name(name);
        let total = HEADER_SIZE
            .checked_add(requested)
            .ok_or_else(|| ShmError::invalid(format!("Size {} is too large", requested)))?;

        let mode = Mode::from_bits_truncate(options.permissions() as libc::mode_t);
        let (fd, created) = open_object(object_name.as_str(), mode, name)?;
        let mut created_guard = CreatedObject {
            object_name: object_name.as_str(),
            armed: created,
        };
        let file = File::from(fd);

        let (region, lock) = if created {
            // Only the creator sizes the object. An attacher resizing it could
            // shrink it under the creator's mapping.
            file.set_len(total as u64)
                .map_err(|e| ShmError::ResizeFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;

            let region = MappedRegion::map(&file, total, name)?;
            // SAFETY: freshly created object, nobody else can have initialized it.
            let lock_ptr = unsafe { region.header().as_ref() }.lock_ptr();
            let lock = unsafe { EmbeddedMutex::init_in_place(lock_ptr)? };
            // SAFETY: region spans HEADER_SIZE + requested bytes.
            unsafe { SegmentHeader::initialize(region.header(), requested) };
            (region, lock)
        } else {
            attach_region(&file, name, options)?
        };

        created_guard.armed = false;
        let (base, mapped_len) = region.release();

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
                fd: OwnedFd::from(file),
                base: base.cast(),
                mapped_len,
                lock,
            },
            created,
        ))
    }

    fn header(&self) -> &SegmentHeader {
        // SAFETY: base stays mapped until close consumes self.
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
        let raw_fd = self.fd.into_raw_fd();

        // SAFETY: base/mapped_len come from a successful mmap and are unmapped once.
        let unmapped = unsafe { mman::munmap(self.base.cast(), self.mapped_len) }
            .map_err(|e| ShmError::not_open(format!("munmap failed: {}", e.desc())));

        // SAFETY: raw_fd was owned by this mapping and is closed exactly once.
        let closed = if unsafe { libc::close(raw_fd) } < 0 {
            Err(ShmError::not_open(format!(
                "close failed: {}",
                std::io::Error::last_os_error()
            )))
        } else {
            Ok(())
        };

        unmapped.and(closed)
    }

    fn unlink(name: &SegmentName, options: &SegmentOptions) -> ShmResult<()> {
        let object_name = options.name_policy().object_name(name);
        mman::shm_unlink(object_name.as_str()).map_err(|e| ShmError::DeleteFailed {
            name: name.to_string(),
            reason: e.desc().to_string(),
        })?;

        tracing::debug!(name = %name, object = %object_name, "Unlinked shared memory segment");
        Ok(())
    }
}
