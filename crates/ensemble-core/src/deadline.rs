//! Request deadlines derived from the latency budget.
//!
//! The assembler checks the deadline between slot steps and at
//! candidate-batch boundaries; on expiry it returns the best-so-far
//! terminal with a `partial` marker, or fails with the deadline error.

use std::time::{Duration, Instant};

use crate::defaults::{GENERATE_DEADLINE_MS, REPLACE_DEADLINE_MS};

/// An absolute point in time a request must finish by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline a budget from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Default budget for generate requests.
    pub fn generate_default() -> Self {
        Self::after(Duration::from_millis(GENERATE_DEADLINE_MS))
    }

    /// Default budget for replace requests.
    pub fn replace_default() -> Self {
        Self::after(Duration::from_millis(REPLACE_DEADLINE_MS))
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}
