// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Segment naming and validation.
//!
//! A logical segment name is validated once, up front, and then translated
//! into an OS object name by a [`NamePolicy`]. The translation differs per
//! platform, so it is injectable rather than hard-coded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ShmError;

/// Maximum length of a logical segment name in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Validated logical segment name.
/// Must be non-empty, ASCII alphanumeric with hyphens/underscores, max 255 chars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SegmentName(String);

impl SegmentName {
    /// Create a new SegmentName with validation. Never touches the OS.
    pub fn new(name: impl Into<String>) -> Result<Self, ShmError> {
        let name = name.into();
        validate_fragment(&name, "Shared memory name")?;
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Shared by names and namespace prefixes: same charset, same length limit.
fn validate_fragment(value: &str, what: &str) -> Result<(), ShmError> {
    if value.is_empty() {
        return Err(ShmError::invalid(format!("{} cannot be empty", what)));
    }

    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(ShmError::invalid(format!(
            "{} contains invalid character: {:?}",
            what, c
        )));
    }

    if value.len() > MAX_NAME_LEN {
        return Err(ShmError::invalid(format!(
            "{} too long: {} chars (max {})",
            what,
            value.len(),
            MAX_NAME_LEN
        )));
    }

    Ok(())
}

/// Validate a namespace prefix. Unlike a name, an empty prefix is allowed.
pub fn validate_prefix(prefix: &str) -> Result<(), ShmError> {
    if prefix.is_empty() {
        return Ok(());
    }
    validate_fragment(prefix, "Namespace prefix")
}

/// Reject a name that only becomes too long once `policy` prefixes it.
pub(crate) fn validate_scoped(policy: &dyn NamePolicy, name: &SegmentName) -> Result<(), ShmError> {
    let scoped = policy.prefix().len() + name.as_str().len();
    if scoped > MAX_NAME_LEN {
        return Err(ShmError::invalid(format!(
            "Shared memory name too long with prefix {:?}: {} chars (max {})",
            policy.prefix(),
            scoped,
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SegmentName {
    type Error = ShmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SegmentName {
    type Error = ShmError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SegmentName> for String {
    fn from(name: SegmentName) -> Self {
        name.0
    }
}

/// Translates a logical name into the OS object names of one backend.
pub trait NamePolicy: fmt::Debug + Send + Sync {
    /// Name of the shared memory object itself.
    fn object_name(&self, name: &SegmentName) -> String;

    /// Name of the separately named lock object, if the backend uses one.
    fn lock_name(&self, name: &SegmentName) -> Option<String>;

    /// Namespace prefix prepended to every logical name.
    fn prefix(&self) -> &str {
        ""
    }
}

/// POSIX shared memory namespace: `/<prefix><name>`, usually visible as
/// `/dev/shm/<prefix><name>`. The lock lives inside the segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PosixShmNamespace {
    prefix: String,
}

impl PosixShmNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Result<Self, ShmError> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { prefix })
    }
}

impl NamePolicy for PosixShmNamespace {
    fn object_name(&self, name: &SegmentName) -> String {
        format!("/{}{}", self.prefix, name)
    }

    fn lock_name(&self, _name: &SegmentName) -> Option<String> {
        None
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Session-local Win32 namespace: `Local\<prefix><name>`, with an
/// independently named mutex `<prefix><name>_mutex`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowsLocalNamespace {
    prefix: String,
}

impl WindowsLocalNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Result<Self, ShmError> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { prefix })
    }
}

impl NamePolicy for WindowsLocalNamespace {
    fn object_name(&self, name: &SegmentName) -> String {
        format!("Local\\{}{}", self.prefix, name)
    }

    fn lock_name(&self, name: &SegmentName) -> Option<String> {
        Some(format!("{}{}_mutex", self.prefix, name))
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Naming policy of the current target.
#[cfg(unix)]
pub type PlatformNamespace = PosixShmNamespace;

/// Naming policy of the current target.
#[cfg(windows)]
pub type PlatformNamespace = WindowsLocalNamespace;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_segment_name_valid() {
        assert!(SegmentName::new("telemetry").is_ok());
        assert!(SegmentName::new("shm_123").is_ok());
        assert!(SegmentName::new("My-Segment").is_ok());
        assert!(SegmentName::new("a".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_segment_name_invalid() {
        for bad in ["", "a/b", "seg@name", "seg name", "tab\tname", "ünïcode"] {
            let err = SegmentName::new(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter, "{:?}", bad);
        }
        assert!(SegmentName::new("a".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_invalid_character_is_reported() {
        let err = SegmentName::new("foo@bar").unwrap_err();
        assert!(err.to_string().contains("'@'"));
    }

    #[test]
    fn test_serde_rejects_invalid_name() {
        let ok: Result<SegmentName, _> = serde_yaml::from_str("telemetry");
        assert!(ok.is_ok());
        let bad: Result<SegmentName, _> = serde_yaml::from_str("\"tele/metry\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_posix_namespace() {
        let name = SegmentName::new("foo").unwrap();
        assert_eq!(PosixShmNamespace::new().object_name(&name), "/foo");
        assert_eq!(PosixShmNamespace::new().lock_name(&name), None);

        let scoped = PosixShmNamespace::with_prefix("app-").unwrap();
        assert_eq!(scoped.object_name(&name), "/app-foo");
    }

    #[test]
    fn test_windows_namespace() {
        let name = SegmentName::new("foo").unwrap();
        let policy = WindowsLocalNamespace::new();
        assert_eq!(policy.object_name(&name), "Local\\foo");
        assert_eq!(policy.lock_name(&name).as_deref(), Some("foo_mutex"));
    }

    #[test]
    fn test_prefix_validation() {
        assert!(validate_prefix("").is_ok());
        assert!(validate_prefix("tenant_1-").is_ok());
        assert!(PosixShmNamespace::with_prefix("a/b").is_err());
        assert!(WindowsLocalNamespace::with_prefix("a\\b").is_err());
    }

    #[test]
    fn test_prefix_counts_toward_name_length() {
        let longest = SegmentName::new("a".repeat(MAX_NAME_LEN)).unwrap();
        let short = SegmentName::new("a".repeat(MAX_NAME_LEN - 4)).unwrap();
        let scoped = PosixShmNamespace::with_prefix("app-").unwrap();

        assert_eq!(scoped.prefix(), "app-");
        assert!(validate_scoped(&PosixShmNamespace::new(), &longest).is_ok());
        assert!(validate_scoped(&scoped, &short).is_ok());

        let err = validate_scoped(&scoped, &longest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        let windows = WindowsLocalNamespace::with_prefix("app-").unwrap();
        assert!(validate_scoped(&windows, &longest).is_err());
    }
}
