//! Level debouncing

use std::time::{Duration, Instant};

use crate::MotionKind;

/// Accepts a level change only after it has held for the whole window
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    stable: bool,
    /// Time the current candidate level was first seen
    candidate_since: Option<Instant>,
}

impl Debouncer {
    /// Create a debouncer whose baseline is `initial`
    pub fn new(window: Duration, initial: bool) -> Self {
        Self {
            window,
            stable: initial,
            candidate_since: None,
        }
    }

    /// Current accepted level
    pub fn level(&self) -> bool {
        self.stable
    }

    /// Feed one raw sample, returning a transition once it has stabilized
    pub fn update(&mut self, level: bool, now: Instant) -> Option<MotionKind> {
        if level == self.stable {
            self.candidate_since = None;
            return None;
        }

        let since = *self.candidate_since.get_or_insert(now);
        if now.saturating_duration_since(since) < self.window {
            return None;
        }

        self.stable = level;
        self.candidate_since = None;
        Some(if level { MotionKind::Start } else { MotionKind::End })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(50);

    #[test]
    fn test_glitch_is_rejected() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW, false);

        assert_eq!(debouncer.update(true, t0), None);
        assert_eq!(debouncer.update(true, t0 + Duration::from_millis(20)), None);
        // Drops back before the window elapses
        assert_eq!(debouncer.update(false, t0 + Duration::from_millis(30)), None);
        assert_eq!(debouncer.update(true, t0 + Duration::from_millis(60)), None);
        assert!(!debouncer.level());
    }

    #[test]
    fn test_stable_transitions_are_reported_once() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW, false);

        assert_eq!(debouncer.update(true, t0), None);
        assert_eq!(
            debouncer.update(true, t0 + Duration::from_millis(50)),
            Some(MotionKind::Start)
        );
        assert_eq!(debouncer.update(true, t0 + Duration::from_millis(80)), None);

        assert_eq!(debouncer.update(false, t0 + Duration::from_millis(100)), None);
        assert_eq!(
            debouncer.update(false, t0 + Duration::from_millis(160)),
            Some(MotionKind::End)
        );
    }

    #[test]
    fn test_zero_window_passes_through() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO, true);

        assert_eq!(debouncer.update(true, t0), None);
        assert_eq!(debouncer.update(false, t0), Some(MotionKind::End));
    }
}
