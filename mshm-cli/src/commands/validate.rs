// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `mshm validate` command - Validate a segment manifest.

use mshm_core::ConfigLoader;

use super::CliResult;

pub fn execute(file: &str) -> CliResult {
    tracing::info!(file = %file, "Validating manifest");

    let config = ConfigLoader::load_file(file)?;

    println!("✓ Manifest is valid");
    println!();
    println!("Defaults:");
    println!("  Permissions:      {:04o}", config.options.permissions());
    println!(
        "  Init Timeout:     {}ms",
        config.options.init_timeout().as_millis()
    );
    println!(
        "  Namespace Prefix: {:?}",
        config.options.name_policy().prefix()
    );
    println!();
    println!("Segments ({}):", config.segments.len());
    for spec in &config.segments {
        println!("  - {} ({} bytes)", spec.name, spec.size);
    }
    Ok(())
}
