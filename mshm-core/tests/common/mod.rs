// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use mshm_core::Segment;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A segment name no other test (or concurrent test run) will use.
pub fn unique_name(tag: &str) -> String {
    format!(
        "mshm-test-{}-{}-{}",
        tag,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Removes the segment name when the test ends, pass or fail.
pub struct Cleanup(pub String);

impl Drop for Cleanup {
    fn drop(&mut self) {
        let _ = Segment::delete(&self.0);
    }
}
