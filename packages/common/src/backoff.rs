use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay policy between attempts of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    Fixed { delay_ms: u64 },
    /// `(2^attempts_made - 1) * delay_ms`: 1x, 3x, 7x, ... the base delay.
    Exponential { delay_ms: u64 },
}

impl Backoff {
    /// Delay before the next attempt once `attempts_made` attempts have failed.
    pub fn delay_for(&self, attempts_made: u32) -> Duration {
        if attempts_made == 0 {
            return Duration::ZERO;
        }

        let ms = match *self {
            Backoff::Fixed { delay_ms } => delay_ms,
            Backoff::Exponential { delay_ms } => {
                let factor = 2u64.saturating_pow(attempts_made).saturating_sub(1);
                delay_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms)
    }
}
