use std::time::Duration;
use std::time::Instant;

/// Tracks how long a room has gone without a connected moderator. The
/// engine itself is clock-free; the owning `Room` actor polls this on a
/// tick and, once the grace window elapses, asks the engine to auto-promote
/// someone.
pub struct ModeratorTimer {
    grace: Duration,
    unattended_since: Option<Instant>,
}

impl ModeratorTimer {
    pub fn new(grace: Duration) -> Self {
        Self { grace, unattended_since: None }
    }

    /// Call on every tick with whether a connected moderator currently
    /// exists. Returns `true` the instant the grace window has elapsed
    /// without one; does not repeat until `reset` is called.
    pub fn tick(&mut self, has_connected_moderator: bool) -> bool {
        if has_connected_moderator {
            self.unattended_since = None;
            return false;
        }
        let since = *self.unattended_since.get_or_insert_with(Instant::now);
        since.elapsed() >= self.grace
    }

    pub fn reset(&mut self) {
        self.unattended_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_quiet_while_a_moderator_is_connected() {
        let mut timer = ModeratorTimer::new(Duration::from_secs(300));
        assert!(!timer.tick(true));
        assert!(!timer.tick(true));
    }

    #[test]
    fn fires_only_after_the_grace_window_elapses() {
        let mut timer = ModeratorTimer::new(Duration::from_millis(0));
        assert!(timer.tick(false));
    }

    #[test]
    fn resets_the_clock_once_a_moderator_reappears() {
        let mut timer = ModeratorTimer::new(Duration::from_secs(300));
        timer.tick(false);
        timer.reset();
        assert!(!timer.tick(true));
    }
}
