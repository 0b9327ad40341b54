// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared helpers for the mshm benchmarks.

use mshm_core::{Segment, ShmResult};

/// Payload sizes to benchmark (in bytes).
pub const PAYLOAD_SIZES: &[usize] = &[8, 64, 256, 1024, 4096, 65536];

/// A segment that is deleted again when the benchmark drops it.
pub struct BenchSegment {
    name: String,
    pub segment: Segment,
}

impl BenchSegment {
    pub fn open(tag: &str, size: usize) -> ShmResult<Self> {
        let name = format!("mshm-bench-{}-{}", tag, std::process::id());
        let segment = Segment::open(&name, size)?;
        Ok(Self { name, segment })
    }
}

impl Drop for BenchSegment {
    fn drop(&mut self) {
        let _ = Segment::delete(&self.name);
    }
}
