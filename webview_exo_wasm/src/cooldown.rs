use std::time::Duration;
use web_time::Instant;

/// Time window between a snapshot and an apply.
///
/// Both sides stamp their own time on entry, whether or not they go on to run.
/// A side is blocked while the other side's stamp is younger than the window.
#[derive(Debug, Clone)]
pub struct CooldownGuard {
    window: Duration,
    last_snapshot: Option<Instant>,
    last_apply: Option<Instant>,
}

impl CooldownGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_snapshot: None,
            last_apply: None,
        }
    }

    pub fn enter_snapshot(&mut self, now: Instant) -> bool {
        self.last_snapshot = Some(now);
        !self.inside(now, self.last_apply)
    }

    pub fn enter_apply(&mut self, now: Instant) -> bool {
        self.last_apply = Some(now);
        !self.inside(now, self.last_snapshot)
    }

    fn inside(&self, now: Instant, other: Option<Instant>) -> bool {
        other.is_some_and(|t| now.saturating_duration_since(t) < self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(10);

    #[test]
    fn first_calls_pass() {
        let t0 = Instant::now();
        let mut guard = CooldownGuard::new(WINDOW);
        assert!(guard.enter_snapshot(t0));
        assert!(guard.enter_snapshot(t0 + Duration::from_millis(1)));
    }

    #[test]
    fn apply_inside_window_after_snapshot_is_blocked() {
        let t0 = Instant::now();
        let mut guard = CooldownGuard::new(WINDOW);
        assert!(guard.enter_snapshot(t0));
        assert!(!guard.enter_apply(t0 + Duration::from_secs(9)));
        assert!(guard.enter_apply(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn blocked_call_still_stamps_its_time() {
        let t0 = Instant::now();
        let mut guard = CooldownGuard::new(WINDOW);
        assert!(guard.enter_apply(t0));
        // Blocked, but the snapshot stamp moves forward anyway.
        assert!(!guard.enter_snapshot(t0 + Duration::from_secs(5)));
        assert!(!guard.enter_apply(t0 + Duration::from_secs(12)));
        assert!(guard.enter_apply(t0 + Duration::from_secs(15)));
    }

    #[test]
    fn zero_window_never_blocks() {
        let t0 = Instant::now();
        let mut guard = CooldownGuard::new(Duration::ZERO);
        assert!(guard.enter_snapshot(t0));
        assert!(guard.enter_apply(t0));
        assert!(guard.enter_snapshot(t0));
    }
}
