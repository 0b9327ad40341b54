// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Segment handle lifecycle.
//!
//! A handle is born `Created` (this process made the OS object) or `Attached`
//! (the object already existed), and ends `Closed`. Closed is terminal: a
//! closed handle is poisoned and never reopened.

use std::time::{Duration, Instant};

use crate::error::ShmError;

/// Lifecycle states of a segment handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// This handle created the OS object and initialized its header.
    Created,

    /// This handle attached to an object another handle created.
    Attached,

    /// Resources were released. Every further operation fails with NotOpen.
    Closed,
}

impl SegmentState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Attached => "Attached",
            Self::Closed => "Closed",
        }
    }

    /// Whether the handle still owns mapped resources.
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Created | Self::Attached)
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: SegmentState) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Closed) | (Self::Attached, Self::Closed)
        )
    }
}

impl std::fmt::Display for SegmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tracks the state of one handle and when it entered it.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    current: SegmentState,
    since: Instant,
}

impl Lifecycle {
    pub(crate) fn new(created: bool) -> Self {
        Self {
            current: if created {
                SegmentState::Created
            } else {
                SegmentState::Attached
            },
            since: Instant::now(),
        }
    }

    pub(crate) fn state(&self) -> SegmentState {
        self.current
    }

    pub(crate) fn time_in_state(&self) -> Duration {
        self.since.elapsed()
    }

    /// Attempt to move to `target`. A closed handle reports NotOpen.
    pub(crate) fn transition_to(&mut self, target: SegmentState) -> Result<(), ShmError> {
        if !self.current.can_transition_to(target) {
            return Err(ShmError::not_open(format!(
                "cannot move segment handle from {} to {}",
                self.current, target
            )));
        }

        tracing::trace!(from = self.current.name(), to = target.name(), "Segment state transition");

        self.current = target;
        self.since = Instant::now();
        Ok(())
    }
}
