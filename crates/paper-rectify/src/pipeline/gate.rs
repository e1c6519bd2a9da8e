//! Single-slot wait for a lazily loading backend.

use std::time::{Duration, Instant};

/// Holds at most one request until the backend reports ready.
///
/// A newer request replaces the queued one. Readiness is latched: once the
/// probe succeeds it is never consulted again.
#[derive(Debug)]
pub struct ReadinessGate<T> {
    ready: bool,
    pending: Option<T>,
    interval: Duration,
    last_poll: Option<Instant>,
}

impl<T> ReadinessGate<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            ready: false,
            pending: None,
            interval,
            last_poll: None,
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Ready check for an immediate request.
    pub fn check(&mut self, probe: impl FnOnce() -> bool) -> bool {
        if !self.ready && probe() {
            self.ready = true;
        }
        self.ready
    }

    /// Queue `request`, returning the one it replaced.
    pub fn enqueue(&mut self, request: T) -> Option<T> {
        self.pending.replace(request)
    }

    /// Retry the probe if a request is queued and `interval` has elapsed
    /// since the last attempt. Returns the request once the backend is ready.
    pub fn poll(&mut self, now: Instant, probe: impl FnOnce() -> bool) -> Option<T> {
        self.pending.as_ref()?;
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_poll = Some(now);
        if self.check(probe) {
            self.pending.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_request_survives_and_fires_once() {
        let mut gate = ReadinessGate::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(!gate.check(|| false));
        assert_eq!(gate.enqueue(1), None);
        assert_eq!(gate.enqueue(2), Some(1));

        assert_eq!(gate.poll(t0, || false), None);
        assert!(gate.has_pending());
        assert_eq!(gate.poll(t0 + Duration::from_millis(100), || true), Some(2));
        assert!(gate.is_ready());
        assert!(!gate.has_pending());
        assert_eq!(gate.poll(t0 + Duration::from_millis(500), || true), None);
    }

    #[test]
    fn polls_are_rate_limited() {
        let mut gate = ReadinessGate::new(Duration::from_millis(100));
        let t0 = Instant::now();
        gate.enqueue("req");
        let mut probes = 0;
        assert_eq!(
            gate.poll(t0, || {
                probes += 1;
                false
            }),
            None
        );
        assert_eq!(
            gate.poll(t0 + Duration::from_millis(50), || {
                probes += 1;
                true
            }),
            None
        );
        assert_eq!(probes, 1);
        assert_eq!(gate.poll(t0 + Duration::from_millis(150), || true), Some("req"));
    }

    #[test]
    fn readiness_is_latched() {
        let mut gate: ReadinessGate<()> = ReadinessGate::new(Duration::ZERO);
        assert!(gate.check(|| true));
        assert!(gate.check(|| panic!("probe must not run once ready")));
    }
}
