// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `mshm apply` command - Open every segment a manifest declares.
//!
//! On POSIX the segments persist after this command exits; on Windows they
//! vanish again as soon as the last handle (this one) is closed.

use mshm_core::{ConfigLoader, Segment};

use super::CliResult;

pub fn execute(file: &str) -> CliResult {
    let config = ConfigLoader::load_file(file)?;

    if config.segments.is_empty() {
        println!("No segments declared in manifest.");
        return Ok(());
    }

    println!("╔══════════════════════════════════╦════════════╦════════════╦════════════╗");
    println!("║ Segment                          ║ Requested  ║ Capacity   ║ Action     ║");
    println!("╠══════════════════════════════════╬════════════╬════════════╬════════════╣");

    for spec in &config.segments {
        let mut segment = Segment::open_with(spec.name.as_str(), spec.size, &config.options)?;
        let action = if segment.is_creator() {
            "created"
        } else if segment.size_mismatch().is_some() {
            "mismatch"
        } else {
            "attached"
        };

        println!(
            "║ {:<32} ║ {:<10} ║ {:<10} ║ {:<10} ║",
            spec.name.as_str(),
            spec.size,
            segment.capacity()?,
            action
        );
        segment.close()?;
    }

    println!("╚══════════════════════════════════╩════════════╩════════════╩════════════╝");
    println!();
    println!("Total: {} segment(s)", config.segments.len());
    Ok(())
}
