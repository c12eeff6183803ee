#![forbid(unsafe_code)]

//! Host-driven height sync.
//!
//! The page owns the clock and the layout observer. It tells the frame when
//! content changed and calls [`HeightSync::tick`] on its own schedule; the
//! frame answers with the next time it wants to be ticked.

use std::time::Duration;

use threadlet_protocol::Envelope;
use threadlet_runtime::{Messenger, ResizePolicy, ResizeReporter};

/// Convert a `performance.now()` reading to a [`Duration`].
///
/// Negative, NaN, and infinite readings clamp to zero; finite readings
/// beyond what a `Duration` holds saturate at [`Duration::MAX`].
#[must_use]
pub fn duration_from_ms(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

#[must_use]
pub fn ms_from_duration(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[derive(Debug)]
pub struct HeightSync {
    reporter: ResizeReporter,
    messenger: Messenger,
}

impl HeightSync {
    #[must_use]
    pub fn new(policy: ResizePolicy, messenger: Messenger) -> Self {
        Self {
            reporter: ResizeReporter::new(policy),
            messenger,
        }
    }

    pub fn content_resized(&mut self, height: u32, now: Duration) {
        self.reporter.observe(height, now);
    }

    /// Send a height update if one is due. Returns when to tick next.
    pub fn tick(&mut self, now: Duration) -> Option<Duration> {
        if let Some(height) = self.reporter.poll(now) {
            self.messenger.send_host(&Envelope::height(height));
        }
        self.reporter.next_deadline()
    }

    /// Send any pending height immediately.
    pub fn flush(&mut self) {
        if let Some(height) = self.reporter.flush() {
            self.messenger.send_host(&Envelope::height(height));
        }
    }

    #[must_use]
    pub fn last_reported(&self) -> Option<u32> {
        self.reporter.last_reported()
    }
}
