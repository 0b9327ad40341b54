// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! mshm CLI
//!
//! Command-line interface for creating, inspecting and removing named shared
//! memory segments.

use clap::{Parser, Subcommand};

mod commands;

/// mshm - named cross-process shared memory segments
#[derive(Parser)]
#[command(name = "mshm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Namespace prefix prepended to every segment name
    #[arg(short, long, global = true, default_value = "")]
    pub prefix: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a segment, or attach to it if it already exists
    Create {
        /// Segment name
        name: String,

        /// Data size in bytes
        #[arg(short, long)]
        size: usize,
    },

    /// Write bytes into a segment
    Write {
        /// Segment name
        name: String,

        /// Data size in bytes used when the segment has to be created
        #[arg(short, long)]
        size: usize,

        /// Byte offset into the data area
        #[arg(short, long, default_value_t = 0)]
        offset: usize,

        /// Payload as hex digits
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        hex: Option<String>,

        /// Payload as UTF-8 text
        #[arg(long)]
        text: Option<String>,
    },

    /// Read bytes from a segment
    Read {
        /// Segment name
        name: String,

        /// Data size in bytes used when the segment has to be created
        #[arg(short, long)]
        size: usize,

        /// Byte offset into the data area
        #[arg(short, long, default_value_t = 0)]
        offset: usize,

        /// Number of bytes to read (defaults to the rest of the segment)
        #[arg(short, long)]
        len: Option<usize>,

        /// Print as UTF-8 text instead of hex
        #[arg(long)]
        text: bool,
    },

    /// Remove a segment name so it can no longer be attached
    Delete {
        /// Segment name
        name: String,
    },

    /// Open every segment declared in a manifest
    Apply {
        /// Path to the manifest
        file: String,
    },

    /// Validate a manifest without touching any segment
    Validate {
        /// Path to the manifest
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Create { name, size } => commands::create::execute(&cli.prefix, &name, size),
        Commands::Write {
            name,
            size,
            offset,
            hex,
            text,
        } => commands::write::execute(&cli.prefix, &name, size, offset, hex, text),
        Commands::Read {
            name,
            size,
            offset,
            len,
            text,
        } => commands::read::execute(&cli.prefix, &name, size, offset, len, text),
        Commands::Delete { name } => commands::delete::execute(&cli.prefix, &name),
        Commands::Apply { file } => commands::apply::execute(&file),
        Commands::Validate { file } => commands::validate::execute(&file),
    };

    if let Err(e) = result {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}
