// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

use mshm_core::{ConfigError, SegmentOptions, ShmError};
use thiserror::Error;

pub mod apply;
pub mod create;
pub mod delete;
pub mod read;
pub mod validate;
pub mod write;

/// Errors surfaced to the shell. Every one exits with status 1.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("[{}] {}", .0.kind(), .0)]
    Shm(#[from] ShmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid hex payload: {0}")]
    Hex(#[from] hex::FromHexError),
}

pub type CliResult = Result<(), CliError>;

/// Options for commands addressing a single segment by name.
pub fn options(prefix: &str) -> Result<SegmentOptions, CliError> {
    Ok(SegmentOptions::new().with_namespace_prefix(prefix)?)
}
