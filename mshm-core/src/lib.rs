// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! mshm Core Library
//!
//! Named shared memory segments that unrelated processes can create, attach
//! to, and read or write at byte offsets. Every access is bounds-checked
//! against the capacity recorded by the segment's creator and serialized by a
//! cross-process lock.
//!
//! ```no_run
//! use mshm_core::Segment;
//!
//! let mut segment = Segment::open("telemetry", 64)?;
//! segment.write(&7u32.to_le_bytes(), 4)?;
//!
//! let mut buf = [0u8; 4];
//! segment.read(&mut buf, 4)?;
//! assert_eq!(u32::from_le_bytes(buf), 7);
//!
//! segment.close()?;
//! Segment::delete("telemetry")?;
//! # Ok::<(), mshm_core::ShmError>(())
//! ```
//!
//! There is no version field in the header and no change notification.
//! Processes attaching to the same name must agree on the data layout.

pub mod config;
pub mod error;
pub mod lock;
pub mod name;
pub mod shm;
pub mod state;
pub mod typed;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, SegmentOptions, SegmentSpec};
pub use error::{ConfigError, ErrorKind, LockStage, MutexFailure, ShmError, ShmResult};
pub use lock::CrossProcessLock;
pub use name::{NamePolicy, PlatformNamespace, PosixShmNamespace, SegmentName, WindowsLocalNamespace};
pub use shm::{Segment, SizeMismatch};
pub use state::SegmentState;
pub use typed::TypedSegment;
