// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Settle queue — holds each file event back for a fixed delay so the
// producer (usually a browser download) can finish writing the file.
//
// The queue never reads the clock itself; callers pass `now`, which keeps
// it testable without sleeping.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::filter::FileEvent;

/// Delay between a file appearing and its name being read.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct SettleQueue {
    delay: Duration,
    /// Ordered by arrival, which is also deadline order since the delay is fixed.
    pending: VecDeque<(Instant, FileEvent)>,
}

impl SettleQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: VecDeque::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn push(&mut self, event: FileEvent, now: Instant) {
        self.pending.push_back((now + self.delay, event));
    }

    /// The oldest event whose settle delay has elapsed at `now`.
    pub fn pop_ready(&mut self, now: Instant) -> Option<FileEvent> {
        match self.pending.front() {
            Some((ready_at, _)) if *ready_at <= now => self.pending.pop_front().map(|(_, event)| event),
            _ => None,
        }
    }

    /// When the oldest pending event becomes ready.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.front().map(|(ready_at, _)| *ready_at)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for SettleQueue {
    fn default() -> Self {
        Self::new(SETTLE_DELAY)
    }
}
