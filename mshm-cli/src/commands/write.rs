// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `mshm write` command - Write a payload at an offset.

use mshm_core::Segment;

use super::{options, CliResult};

pub fn execute(
    prefix: &str,
    name: &str,
    size: usize,
    offset: usize,
    hex: Option<String>,
    text: Option<String>,
) -> CliResult {
    let payload = match (hex, text) {
        (Some(digits), _) => hex::decode(digits.trim())?,
        (None, Some(text)) => text.into_bytes(),
        (None, None) => Vec::new(),
    };

    let options = options(prefix)?;
    let mut segment = Segment::open_with(name, size, &options)?;
    segment.write(&payload, offset)?;
    segment.close()?;

    tracing::info!(name = %name, offset = offset, len = payload.len(), "Wrote payload");
    println!("✓ Wrote {} bytes at offset {}", payload.len(), offset);
    Ok(())
}
