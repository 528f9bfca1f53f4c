use glam::Vec2;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
use std::time::Duration;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Delta decays to zero when no input arrives within this window, so a
/// parked cursor stops injecting force.
pub const IDLE_TIMEOUT: Duration = Duration::from_millis(100);

/// Pointer state for one frame: position and per-frame delta, both in
/// normalized device coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerSample {
    pub position: Vec2,
    pub delta: Vec2,
}

/// Tracks the pointer in normalized device coordinates and derives the
/// per-frame velocity delta that drives force injection.
pub struct PointerTracker {
    coords: Vec2,
    prev: Vec2,
    last_event: Option<Instant>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self {
            coords: Vec2::ZERO,
            prev: Vec2::ZERO,
            last_event: None,
        }
    }

    /// Feed a pointer or single-touch position in screen coordinates.
    /// Restarts the idle timer; a repeated identical position is not an
    /// event and does not keep the pointer alive.
    pub fn observe(&mut self, x: f32, y: f32, viewport: Vec2, now: Instant) {
        let nx = (x / viewport.x.max(1.0)) * 2.0 - 1.0;
        let ny = -(y / viewport.y.max(1.0)) * 2.0 + 1.0;
        let coords = Vec2::new(nx, ny);
        if coords == self.coords {
            return;
        }
        self.coords = coords;
        self.last_event = Some(now);
    }

    /// Per-frame update: returns the current sample and advances the
    /// previous position.
    pub fn tick(&mut self, now: Instant) -> PointerSample {
        let mut delta = self.coords - self.prev;
        self.prev = self.coords;

        // No input received yet: the default origin position must not
        // produce an impulse on the first frame.
        if self.prev == Vec2::ZERO {
            delta = Vec2::ZERO;
        }

        let idle = match self.last_event {
            Some(stamp) => now.duration_since(stamp) > IDLE_TIMEOUT,
            None => true,
        };
        if idle {
            delta = Vec2::ZERO;
        }

        PointerSample {
            position: self.coords,
            delta,
        }
    }
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

    #[test]
    fn screen_to_ndc() {
        let mut tracker = PointerTracker::new();
        let now = Instant::now();
        tracker.observe(800.0, 0.0, VIEWPORT, now);
        let sample = tracker.tick(now);
        assert_eq!(sample.position, Vec2::new(1.0, 1.0));

        tracker.observe(0.0, 600.0, VIEWPORT, now);
        let sample = tracker.tick(now);
        assert_eq!(sample.position, Vec2::new(-1.0, -1.0));

        tracker.observe(400.0, 300.0, VIEWPORT, now);
        let sample = tracker.tick(now);
        assert_eq!(sample.position, Vec2::ZERO);
    }

    #[test]
    fn delta_between_ticks() {
        let mut tracker = PointerTracker::new();
        let now = Instant::now();
        tracker.observe(400.0, 300.0, VIEWPORT, now);
        tracker.tick(now);

        tracker.observe(440.0, 300.0, VIEWPORT, now);
        let sample = tracker.tick(now);
        assert!((sample.delta.x - 0.1).abs() < 1e-6);
        assert_eq!(sample.delta.y, 0.0);

        // Prev caught up; no movement means no delta.
        let sample = tracker.tick(now);
        assert_eq!(sample.delta, Vec2::ZERO);
    }

    #[test]
    fn first_frame_from_origin_is_inert() {
        let mut tracker = PointerTracker::new();
        let sample = tracker.tick(Instant::now());
        assert_eq!(sample.delta, Vec2::ZERO);
        assert_eq!(sample.position, Vec2::ZERO);
    }

    #[test]
    fn idle_timeout_zeroes_delta() {
        let mut tracker = PointerTracker::new();
        let start = Instant::now();
        tracker.observe(400.0, 300.0, VIEWPORT, start);
        tracker.tick(start);
        tracker.observe(480.0, 300.0, VIEWPORT, start);

        // Well past the idle window: the pending delta must be dropped.
        let later = start + Duration::from_millis(150);
        let sample = tracker.tick(later);
        assert_eq!(sample.delta, Vec2::ZERO);
    }

    #[test]
    fn event_resets_idle_timer() {
        let mut tracker = PointerTracker::new();
        let start = Instant::now();
        tracker.observe(400.0, 300.0, VIEWPORT, start);
        tracker.tick(start);

        // A fresh event inside the window keeps the pointer live.
        let mid = start + Duration::from_millis(80);
        tracker.observe(440.0, 300.0, VIEWPORT, mid);
        let sample = tracker.tick(mid + Duration::from_millis(80));
        assert!(sample.delta.x > 0.0);
    }

    #[test]
    fn repeated_position_does_not_reset_timer() {
        let mut tracker = PointerTracker::new();
        let start = Instant::now();
        tracker.observe(400.0, 300.0, VIEWPORT, start);
        tracker.tick(start);

        // Same coordinates again, much later: not an event.
        tracker.observe(400.0, 300.0, VIEWPORT, start + Duration::from_millis(200));
        tracker.observe(440.0, 300.0, VIEWPORT, start + Duration::from_millis(200));
        let sample = tracker.tick(start + Duration::from_millis(350));
        assert_eq!(sample.delta, Vec2::ZERO);
    }
}
