//! Capped reconnect backoff.

use std::time::Duration;

/// Reconnect delays: 1s, 2s, 4s, 8s, then 15s for every further attempt.
pub const DEFAULT_RECONNECT_DELAYS: [Duration; 5] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(8),
    Duration::from_secs(15),
];

/// Walks a fixed delay table, holding at its last entry.
#[derive(Debug, Clone)]
pub struct Backoff {
    delays: Vec<Duration>,
    attempt: u32,
}

impl Backoff {
    /// An empty table falls back to [`DEFAULT_RECONNECT_DELAYS`].
    pub fn new(delays: Vec<Duration>) -> Self {
        let delays = if delays.is_empty() {
            DEFAULT_RECONNECT_DELAYS.to_vec()
        } else {
            delays
        };
        Self { delays, attempt: 0 }
    }

    /// Delay for the current attempt; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let index = (self.attempt as usize).min(self.delays.len() - 1);
        self.attempt = self.attempt.saturating_add(1);
        self.delays[index]
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAYS.to_vec())
    }
}
