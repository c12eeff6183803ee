//! Height reporting with debounce coalescing.
//!
//! Content inside a frame grows and shrinks as comments load and expand. The
//! host must resize the iframe, but a message per layout pass would flood it.
//! [`ResizeReporter`] keeps the latest measured height and emits it once the
//! content has been quiet for the debounce window, or once the oldest pending
//! measurement is older than the max-latency bound, whichever comes first.
//!
//! Time is supplied by the caller as a monotonic [`Duration`] since an
//! arbitrary epoch. The reporter never reads a clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

const TARGET: &str = "threadlet::resize";

/// Timing knobs for [`ResizeReporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizePolicy {
    /// Quiet period after the latest observation.
    #[serde(with = "millis")]
    pub debounce: Duration,
    /// Upper bound on how long a pending height may wait.
    #[serde(with = "millis")]
    pub max_latency: Duration,
}

impl Default for ResizePolicy {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            max_latency: Duration::from_millis(500),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    height: u32,
    first_seen: Duration,
    last_seen: Duration,
}

#[derive(Debug, Clone)]
pub struct ResizeReporter {
    policy: ResizePolicy,
    pending: Option<Pending>,
    last_reported: Option<u32>,
}

impl ResizeReporter {
    #[must_use]
    pub const fn new(policy: ResizePolicy) -> Self {
        Self {
            policy,
            pending: None,
            last_reported: None,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> ResizePolicy {
        self.policy
    }

    #[must_use]
    pub const fn last_reported(&self) -> Option<u32> {
        self.last_reported
    }

    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a measured content height.
    pub fn observe(&mut self, height: u32, now: Duration) {
        match &mut self.pending {
            Some(pending) => {
                pending.height = height;
                pending.last_seen = now;
            }
            None => {
                self.pending = Some(Pending {
                    height,
                    first_seen: now,
                    last_seen: now,
                });
            }
        }
        trace!(target: TARGET, height, "height observed");
    }

    /// Return the height to report now, if any.
    pub fn poll(&mut self, now: Duration) -> Option<u32> {
        let pending = self.pending?;
        let quiet = now.saturating_sub(pending.last_seen) >= self.policy.debounce;
        let overdue = now.saturating_sub(pending.first_seen) >= self.policy.max_latency;
        if !quiet && !overdue {
            return None;
        }
        self.pending = None;
        self.settle(pending.height, if quiet { "debounced" } else { "max_latency" })
    }

    /// Report any pending height immediately.
    pub fn flush(&mut self) -> Option<u32> {
        let pending = self.pending.take()?;
        self.settle(pending.height, "flush")
    }

    /// Earliest time at which [`poll`](Self::poll) could report.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.map(|p| {
            p.last_seen
                .saturating_add(self.policy.debounce)
                .min(p.first_seen.saturating_add(self.policy.max_latency))
        })
    }

    fn settle(&mut self, height: u32, reason: &'static str) -> Option<u32> {
        if self.last_reported == Some(height) {
            trace!(target: TARGET, height, reason, "height unchanged; not reported");
            return None;
        }
        self.last_reported = Some(height);
        trace!(target: TARGET, height, reason, "height reported");
        Some(height)
    }
}

impl Default for ResizeReporter {
    fn default() -> Self {
        Self::new(ResizePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn nothing_before_debounce() {
        let mut r = ResizeReporter::default();
        r.observe(300, ms(0));
        assert_eq!(r.poll(ms(50)), None);
        assert_eq!(r.poll(ms(100)), Some(300));
        assert_eq!(r.poll(ms(200)), None);
    }

    #[test]
    fn rapid_observations_collapse_to_latest() {
        let mut r = ResizeReporter::default();
        for (i, h) in [100, 150, 220, 240].into_iter().enumerate() {
            r.observe(h, ms(i as u64 * 10));
            assert_eq!(r.poll(ms(i as u64 * 10 + 5)), None);
        }
        assert_eq!(r.poll(ms(130)), Some(240));
    }

    #[test]
    fn continuous_change_reports_at_max_latency() {
        let mut r = ResizeReporter::default();
        let mut reported = Vec::new();
        for t in (0..=600).step_by(50) {
            r.observe(t as u32, ms(t));
            if let Some(h) = r.poll(ms(t)) {
                reported.push((t, h));
            }
        }
        assert_eq!(reported, vec![(500, 500)]);
    }

    #[test]
    fn equal_height_is_not_resent() {
        let mut r = ResizeReporter::default();
        r.observe(300, ms(0));
        assert_eq!(r.poll(ms(100)), Some(300));
        r.observe(300, ms(200));
        assert_eq!(r.poll(ms(300)), None);
        assert!(!r.has_pending());
        r.observe(310, ms(400));
        assert_eq!(r.flush(), Some(310));
    }

    #[test]
    fn flush_without_pending() {
        let mut r = ResizeReporter::default();
        assert_eq!(r.flush(), None);
        assert_eq!(r.next_deadline(), None);
    }

    #[test]
    fn next_deadline_is_earliest_of_both_bounds() {
        let mut r = ResizeReporter::default();
        r.observe(1, ms(0));
        assert_eq!(r.next_deadline(), Some(ms(100)));
        r.observe(2, ms(450));
        assert_eq!(r.next_deadline(), Some(ms(500)));
    }

    #[test]
    fn policy_parses_milliseconds() {
        let policy: ResizePolicy = serde_json::from_str(r#"{"debounce": 40}"#).unwrap();
        assert_eq!(policy.debounce, ms(40));
        assert_eq!(policy.max_latency, ms(500));
    }
}
