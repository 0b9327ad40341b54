// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `mshm create` command - Create or attach to a segment.

use mshm_core::Segment;

use super::{options, CliResult};

pub fn execute(prefix: &str, name: &str, size: usize) -> CliResult {
    let options = options(prefix)?;
    let mut segment = Segment::open_with(name, size, &options)?;
    let capacity = segment.capacity()?;

    if segment.is_creator() {
        println!("✓ Created segment '{}' ({} bytes)", name, capacity);
    } else {
        println!("✓ Attached to segment '{}' ({} bytes)", name, capacity);
    }
    if let Some(mismatch) = segment.size_mismatch() {
        println!(
            "  ! requested {} bytes but the segment was created with {}",
            mismatch.requested, mismatch.capacity
        );
    }

    segment.close()?;
    Ok(())
}
