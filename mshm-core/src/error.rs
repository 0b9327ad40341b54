// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for mshm.
//!
//! Every public operation returns a `ShmResult`. Failures are explicit enum
//! variants carrying the diagnostic text reported by the operating system,
//! and each variant projects onto exactly one [`ErrorKind`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Closed enumeration of failure kinds.
///
/// Success has no kind of its own: it is the `Ok` arm of [`ShmResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller error: bad name, zero size, malformed argument.
    InvalidParameter,
    /// The OS could not create or attach the named object.
    OpenFailed,
    /// The backing object could not be sized.
    ResizeFailed,
    /// The sized object could not be mapped into memory.
    MapFailed,
    /// The cross-process lock could not be initialized, acquired or released.
    MutexError,
    /// The handle is closed or was never fully constructed.
    NotOpen,
    /// `offset + size` lies beyond the segment capacity.
    SizeExceeded,
    /// Reserved for backends that can detect faults during the copy.
    CopyFailed,
    /// The OS could not remove the name, or removal is not supported.
    DeleteFailed,
}

impl ErrorKind {
    /// Stable numeric code. `0` is reserved for success.
    pub const fn code(&self) -> u8 {
        match self {
            Self::InvalidParameter => 1,
            Self::OpenFailed => 2,
            Self::ResizeFailed => 3,
            Self::MapFailed => 4,
            Self::MutexError => 5,
            Self::NotOpen => 6,
            Self::SizeExceeded => 7,
            Self::CopyFailed => 8,
            Self::DeleteFailed => 9,
        }
    }

    /// Get the kind name for diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InvalidParameter => "InvalidParameter",
            Self::OpenFailed => "OpenFailed",
            Self::ResizeFailed => "ResizeFailed",
            Self::MapFailed => "MapFailed",
            Self::MutexError => "MutexError",
            Self::NotOpen => "NotOpen",
            Self::SizeExceeded => "SizeExceeded",
            Self::CopyFailed => "CopyFailed",
            Self::DeleteFailed => "DeleteFailed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Step of the lock protocol that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStage {
    Init,
    Acquire,
    Release,
}

impl fmt::Display for LockStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Init => "init",
            Self::Acquire => "acquire",
            Self::Release => "release",
        };
        write!(f, "{}", stage)
    }
}

/// Why a cross-process lock operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutexFailure {
    #[error("lock owner terminated while holding the lock; shared data may be inconsistent")]
    Abandoned,

    #[error("the calling thread does not own the lock")]
    NotOwner,

    #[error("acquiring the lock would deadlock")]
    Deadlock,

    #[error("lock is not properly initialized")]
    NotInitialized,

    #[error("lock is in an unrecoverable state")]
    NotRecoverable,

    #[error("{0}")]
    Os(String),
}

/// Shared memory errors. One variant per failure kind.
#[derive(Debug, Error)]
pub enum ShmError {
    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Failed to open shared memory segment '{name}': {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("Failed to size shared memory segment '{name}': {reason}")]
    ResizeFailed { name: String, reason: String },

    #[error("Failed to map shared memory segment '{name}': {reason}")]
    MapFailed { name: String, reason: String },

    #[error("Mutex {stage} failed: {failure}")]
    Mutex {
        stage: LockStage,
        failure: MutexFailure,
    },

    #[error("Segment is not open: {reason}")]
    NotOpen { reason: String },

    #[error("Size plus offset exceeds the segment size: {offset} + {len} > {capacity}")]
    SizeExceeded {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Copy into shared memory failed: {reason}")]
    CopyFailed { reason: String },

    #[error("Failed to delete shared memory segment '{name}': {reason}")]
    DeleteFailed { name: String, reason: String },

    #[error("Deleting '{name}' is not supported: the OS removes the segment once the last handle is closed")]
    DeleteUnsupported { name: String },
}

impl ShmError {
    /// Project this error onto its failure kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::OpenFailed { .. } => ErrorKind::OpenFailed,
            Self::ResizeFailed { .. } => ErrorKind::ResizeFailed,
            Self::MapFailed { .. } => ErrorKind::MapFailed,
            Self::Mutex { .. } => ErrorKind::MutexError,
            Self::NotOpen { .. } => ErrorKind::NotOpen,
            Self::SizeExceeded { .. } => ErrorKind::SizeExceeded,
            Self::CopyFailed { .. } => ErrorKind::CopyFailed,
            Self::DeleteFailed { .. } | Self::DeleteUnsupported { .. } => ErrorKind::DeleteFailed,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_open(reason: impl Into<String>) -> Self {
        Self::NotOpen {
            reason: reason.into(),
        }
    }

    pub(crate) fn mutex(stage: LockStage, failure: MutexFailure) -> Self {
        Self::Mutex { stage, failure }
    }
}

/// Configuration errors - invalid config is rejected before any segment is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Duplicate segment name: {name}")]
    DuplicateSegment { name: String },

    #[error("Invalid segment definition: {0}")]
    Segment(#[from] ShmError),
}

/// Result type alias using ShmError.
pub type ShmResult<T> = Result<T, ShmError>;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_kind_projection() {
        let err = ShmError::SizeExceeded {
            offset: 10,
            len: 8,
            capacity: 16,
        };
        assert_eq!(err.kind(), ErrorKind::SizeExceeded);
        assert!(err.to_string().contains("10 + 8 > 16"));

        let err = ShmError::DeleteUnsupported {
            name: "telemetry".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::DeleteFailed);
    }

    #[test]
    fn test_codes_are_distinct() {
        let kinds = [
            ErrorKind::InvalidParameter,
            ErrorKind::OpenFailed,
            ErrorKind::ResizeFailed,
            ErrorKind::MapFailed,
            ErrorKind::MutexError,
            ErrorKind::NotOpen,
            ErrorKind::SizeExceeded,
            ErrorKind::CopyFailed,
            ErrorKind::DeleteFailed,
        ];
        let codes: HashSet<u8> = kinds.iter().map(ErrorKind::code).collect();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_abandoned_diagnostic() {
        let err = ShmError::mutex(LockStage::Acquire, MutexFailure::Abandoned);
        assert_eq!(err.kind(), ErrorKind::MutexError);
        assert!(err.to_string().contains("terminated while holding"));
    }

    #[test]
    fn test_config_error_chain() {
        let err: ConfigError = ShmError::invalid("Size must be greater than 0").into();
        assert!(matches!(err, ConfigError::Segment(_)));
    }
}
