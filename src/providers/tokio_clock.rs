//! Tokio-based clock implementation.

use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::traits::Clock;

/// Wall clock for attestation polling: real time, Tokio timers.
///
/// This is the default clock of a [`Wormhole`](crate::Wormhole) context.
/// Tests swap in [`FakeClock`](crate::testing::FakeClock) to skip the waits.
///
/// # Examples
///
/// ```rust
/// use vaa_rs::providers::TokioClock;
/// use vaa_rs::traits::Clock;
///
/// let clock = TokioClock::new();
/// let started = clock.now();
/// assert!(clock.now() >= started);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl TokioClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
