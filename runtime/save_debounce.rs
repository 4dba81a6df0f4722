/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Trailing-edge debounce for the downstream save notification.
//!
//! Driven by the frame clock: the session reports changes with
//! [`SaveDebouncer::mark_dirty`] and polls once per tick. Every change pushes
//! the deadline out by the full window, so a burst produces one flush after
//! it goes quiet.

use std::time::{Duration, Instant};

pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Default for SaveDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_DEBOUNCE)
    }
}

impl SaveDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn mark_dirty(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// `true` exactly once per burst, on the first poll at or past the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            },
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop a pending flush without firing it.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_collapses_into_one_flush() {
        let start = Instant::now();
        let mut debouncer = SaveDebouncer::default();
        let mut flushes = 0;
        for frame in 0..20 {
            let now = start + Duration::from_millis(frame * 20);
            debouncer.mark_dirty(now);
            if debouncer.poll(now) {
                flushes += 1;
            }
        }
        assert_eq!(flushes, 0);
        let last = start + Duration::from_millis(19 * 20);
        assert!(!debouncer.poll(last + Duration::from_millis(499)));
        assert!(debouncer.poll(last + DEFAULT_SAVE_DEBOUNCE));
        assert!(!debouncer.poll(last + Duration::from_secs(5)));
    }

    #[test]
    fn cancel_discards_pending_flush() {
        let now = Instant::now();
        let mut debouncer = SaveDebouncer::new(Duration::from_millis(100));
        debouncer.mark_dirty(now);
        assert!(debouncer.is_pending());
        debouncer.cancel();
        assert!(!debouncer.poll(now + Duration::from_secs(1)));
    }
}
