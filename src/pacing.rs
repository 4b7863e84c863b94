//! Cancellable pauses used by the admin and user actors
//!
//! A pause is the only point where an actor suspends. Cancelling the token
//! wakes the pause early with [`Interrupted`]; nothing else observes it.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::Interrupted;

/// Default base pause (1 second)
pub const DEFAULT_PACING_SCALE: Duration = Duration::from_millis(1000);

/// Inclusive range of stay lengths, in pacing-scale units
pub const STAY_UNITS: std::ops::RangeInclusive<u32> = 2..=5;

/// Pause scheduler bound to one actor's cancellation token
#[derive(Debug, Clone)]
pub struct Pacer {
    scale: Duration,
    cancel: CancellationToken,
}

impl Pacer {
    pub fn new(scale: Duration, cancel: CancellationToken) -> Self {
        Self { scale, cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Random spacing between two actions, uniform in `[scale, 2 * scale)`
    pub fn action_gap<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let nanos = u64::try_from(self.scale.as_nanos()).unwrap_or(u64::MAX / 2);
        if nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rng.gen_range(nanos..nanos.saturating_mul(2)))
    }

    /// Random stay length in scale units
    pub fn stay_units<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.gen_range(STAY_UNITS)
    }

    /// Sleep for a random action gap
    pub async fn between_actions<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(), Interrupted> {
        let gap = self.action_gap(rng);
        self.sleep(gap).await
    }

    /// Sleep for `units` multiples of the scale
    pub async fn stay(&self, units: u32) -> Result<(), Interrupted> {
        self.sleep(self.scale * units).await
    }

    /// Sleep unless cancelled first
    ///
    /// An already-cancelled token wins over a zero-length sleep.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
