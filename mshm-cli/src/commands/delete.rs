// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `mshm delete` command - Remove a segment name.

use mshm_core::{Segment, ShmError};

use super::{options, CliResult};

pub fn execute(prefix: &str, name: &str) -> CliResult {
    let options = options(prefix)?;

    match Segment::delete_with(name, &options) {
        Ok(()) => {
            println!("✓ Deleted segment '{}'", name);
            Ok(())
        }
        // Expected where the OS reclaims segments on last close.
        Err(e @ ShmError::DeleteUnsupported { .. }) => {
            println!("ℹ {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
