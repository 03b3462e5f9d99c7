//! Optional overall time budget for one invocation.

use std::time::{Duration, Instant};

use crate::error::{CuratorError, Result};

/// Gates whether a sub-operation is attempted at all.
///
/// A call that has already started is not cancelled; it runs to its own
/// per-call timeout.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    deadline: Option<Instant>,
    min_call: Duration,
}

impl TimeBudget {
    pub fn new(total: Option<Duration>, min_call: Duration) -> Self {
        Self {
            deadline: total.map(|t| Instant::now() + t),
            min_call,
        }
    }

    /// No overall budget; every check passes.
    pub fn unlimited() -> Self {
        Self {
            deadline: None,
            min_call: Duration::ZERO,
        }
    }

    /// Time left, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// `Err(BudgetExhausted)` when less than the minimum call budget remains.
    pub fn check(&self, operation: &str) -> Result<()> {
        match self.remaining() {
            Some(left) if left < self.min_call => {
                tracing::warn!(operation, remaining_ms = left.as_millis() as u64, "time budget exhausted, skipping call");
                Err(CuratorError::budget_exhausted(operation))
            }
            _ => Ok(()),
        }
    }
}

impl Default for TimeBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}
