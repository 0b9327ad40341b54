// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `mshm read` command - Dump bytes from an offset to stdout.
//!
//! Output is the bare hex (or text) on a single line so scripts can consume it.

use mshm_core::Segment;

use super::{options, CliResult};

pub fn execute(
    prefix: &str,
    name: &str,
    size: usize,
    offset: usize,
    len: Option<usize>,
    text: bool,
) -> CliResult {
    let options = options(prefix)?;
    let mut segment = Segment::open_with(name, size, &options)?;

    let len = match len {
        Some(len) => len,
        None => segment.capacity()?.saturating_sub(offset),
    };
    let mut buf = vec![0u8; len];
    segment.read(&mut buf, offset)?;
    segment.close()?;

    if text {
        println!("{}", String::from_utf8_lossy(&buf));
    } else {
        println!("{}", hex::encode(&buf));
    }
    Ok(())
}
