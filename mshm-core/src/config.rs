// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Segment options and the YAML segment manifest.
//!
//! A manifest declares default open options and the segments an application
//! expects. Any invalid field is rejected before a single segment is opened.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ShmError};
use crate::name::{validate_prefix, validate_scoped, NamePolicy, PlatformNamespace, SegmentName};

/// Default permission bits for newly created objects (before umask).
pub const DEFAULT_PERMISSIONS: u32 = 0o660;

/// Default time an attacher waits for the creator to publish the header.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Options applied when opening or deleting a segment.
#[derive(Clone)]
pub struct SegmentOptions {
    permissions: u32,
    init_timeout: Duration,
    policy: Arc<dyn NamePolicy>,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            permissions: DEFAULT_PERMISSIONS,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            policy: Arc::new(PlatformNamespace::default()),
        }
    }
}

impl SegmentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permission bits for objects this process creates. Ignored on Windows.
    pub fn with_permissions(mut self, permissions: u32) -> Result<Self, ShmError> {
        if permissions > 0o777 {
            return Err(ShmError::invalid(format!(
                "Permissions {:o} exceed 0777",
                permissions
            )));
        }
        self.permissions = permissions;
        Ok(self)
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Scope every name under `prefix` using the platform naming policy.
    pub fn with_namespace_prefix(self, prefix: &str) -> Result<Self, ShmError> {
        let policy = PlatformNamespace::with_prefix(prefix)?;
        Ok(self.with_name_policy(Arc::new(policy)))
    }

    /// Replace the logical-name to OS-name translation.
    pub fn with_name_policy(mut self, policy: Arc<dyn NamePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn permissions(&self) -> u32 {
        self.permissions
    }

    pub fn init_timeout(&self) -> Duration {
        self.init_timeout
    }

    pub fn name_policy(&self) -> &dyn NamePolicy {
        self.policy.as_ref()
    }
}

impl fmt::Debug for SegmentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentOptions")
            .field("permissions", &format_args!("{:o}", self.permissions))
            .field("init_timeout", &self.init_timeout)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Raw defaults as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefaults {
    #[serde(default = "default_permissions")]
    permissions: String,
    #[serde(default = "default_init_timeout_ms")]
    init_timeout_ms: u64,
    #[serde(default)]
    namespace_prefix: String,
}

fn default_permissions() -> String {
    format!("{:04o}", DEFAULT_PERMISSIONS)
}

fn default_init_timeout_ms() -> u64 {
    DEFAULT_INIT_TIMEOUT.as_millis() as u64
}

impl Default for RawDefaults {
    fn default() -> Self {
        Self {
            permissions: default_permissions(),
            init_timeout_ms: default_init_timeout_ms(),
            namespace_prefix: String::new(),
        }
    }
}

/// Raw segment declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSegment {
    name: String,
    size: usize,
}

/// Raw root manifest.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    defaults: RawDefaults,
    #[serde(default)]
    segments: Vec<RawSegment>,
}

/// Validated segment declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpec {
    pub name: SegmentName,
    pub size: usize,
}

/// Complete validated manifest.
#[derive(Debug, Clone)]
pub struct Config {
    pub options: SegmentOptions,
    pub segments: Vec<SegmentSpec>,
}

/// Manifest loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a manifest from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate a manifest from a YAML string.
    pub fn load_string(content: &str) -> Result<Config, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            message: format!("YAML parse error: {}", e),
        })?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Config, ConfigError> {
        let options = Self::validate_defaults(raw.defaults)?;

        let mut segments = Vec::with_capacity(raw.segments.len());
        let mut seen = HashSet::new();

        for raw_segment in raw.segments {
            let name = SegmentName::new(raw_segment.name)?;
            validate_scoped(options.name_policy(), &name)?;

            if raw_segment.size == 0 {
                return Err(ConfigError::InvalidFieldValue {
                    field: "size",
                    value: "0".to_string(),
                    reason: format!("Segment '{}' must have a size greater than 0", name),
                });
            }

            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateSegment {
                    name: name.to_string(),
                });
            }

            segments.push(SegmentSpec {
                name,
                size: raw_segment.size,
            });
        }

        Ok(Config { options, segments })
    }

    fn validate_defaults(raw: RawDefaults) -> Result<SegmentOptions, ConfigError> {
        let permissions = parse_permissions(&raw.permissions)?;

        validate_prefix(&raw.namespace_prefix).map_err(|e| ConfigError::InvalidFieldValue {
            field: "namespace_prefix",
            value: raw.namespace_prefix.clone(),
            reason: e.to_string(),
        })?;

        let options = SegmentOptions::new()
            .with_permissions(permissions)?
            .with_init_timeout(Duration::from_millis(raw.init_timeout_ms))
            .with_namespace_prefix(&raw.namespace_prefix)?;

        Ok(options)
    }
}

/// Parse an octal permission string such as `"0660"` or `"0o600"`.
fn parse_permissions(value: &str) -> Result<u32, ConfigError> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    let invalid = |reason: &str| ConfigError::InvalidFieldValue {
        field: "permissions",
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let bits = u32::from_str_radix(digits, 8).map_err(|_| invalid("expected an octal mode"))?;
    if bits > 0o777 {
        return Err(invalid("mode must not exceed 0777"));
    }
    Ok(bits)
}
