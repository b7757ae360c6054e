use chrono::{DateTime, Duration, Timelike, Utc};
use std::sync::{Arc, Mutex};

/// Source of wall-clock time. Injected so tests can advance time by hand.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Simulation clock: virtual time advances at `speed` × real elapsed time.
///
/// State is purely `(real_anchor, virtual_anchor, speed)`; changing speed
/// re-anchors both sides at the current instant so virtual time never jumps.
pub struct VirtualClock {
    wall: Arc<dyn WallClock>,
    real_anchor: DateTime<Utc>,
    virtual_anchor: DateTime<Utc>,
    speed: f64,
}

impl VirtualClock {
    /// Start a clock whose virtual time equals wall time right now
    pub fn new(wall: Arc<dyn WallClock>, speed: f64) -> Self {
        let now = wall.now();
        Self {
            wall,
            real_anchor: now,
            virtual_anchor: now,
            speed,
        }
    }

    /// Current wall-clock time from the injected source
    pub fn wall_now(&self) -> DateTime<Utc> {
        self.wall.now()
    }

    /// Current virtual time
    pub fn now(&self) -> DateTime<Utc> {
        self.at(self.wall.now())
    }

    /// Virtual time corresponding to wall-clock instant `real`
    pub fn at(&self, real: DateTime<Utc>) -> DateTime<Utc> {
        let elapsed = real - self.real_anchor;
        let micros = elapsed
            .num_microseconds()
            .unwrap_or_else(|| elapsed.num_milliseconds().saturating_mul(1000));
        let scaled = (micros as f64 * self.speed).round() as i64;
        self.virtual_anchor + Duration::microseconds(scaled)
    }

    /// Fractional hour of day (0.0..24.0) of the current virtual time, UTC
    pub fn hour_of_day(&self) -> f64 {
        hour_of_day(self.now())
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Change the multiplier, continuing from the current virtual time
    pub fn set_speed(&mut self, speed: f64) {
        let real = self.wall.now();
        self.virtual_anchor = self.at(real);
        self.real_anchor = real;
        self.speed = speed;
    }

    /// Snap virtual time back to wall time, keeping the multiplier
    pub fn reset(&mut self) {
        let now = self.wall.now();
        self.real_anchor = now;
        self.virtual_anchor = now;
    }
}

pub fn hour_of_day(time: DateTime<Utc>) -> f64 {
    let seconds = time.num_seconds_from_midnight() as f64
        + time.nanosecond() as f64 / 1_000_000_000.0;
    seconds / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_virtual_time_tracks_wall_time_at_unit_speed() {
        let wall = Arc::new(ManualClock::new(start()));
        let clock = VirtualClock::new(wall.clone(), 1.0);

        wall.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start() + Duration::seconds(90));
    }

    #[test]
    fn test_speed_scales_elapsed_time() {
        let wall = Arc::new(ManualClock::new(start()));
        let clock = VirtualClock::new(wall.clone(), 24.0);

        wall.advance(Duration::hours(1));
        assert_eq!(clock.now(), start() + Duration::hours(24));
    }

    #[test]
    fn test_speed_change_preserves_continuity() {
        let wall = Arc::new(ManualClock::new(start()));
        let mut clock = VirtualClock::new(wall.clone(), 10.0);

        wall.advance(Duration::seconds(30));
        let before = clock.now();
        clock.set_speed(60.0);
        let after = clock.now();

        let gap = (after - before).num_milliseconds().abs();
        assert!(gap <= 1, "virtual time jumped by {}ms", gap);
        assert_eq!(before, start() + Duration::seconds(300));

        // Continues forward at the new rate from the captured instant
        wall.advance(Duration::seconds(1));
        assert_eq!(clock.now(), before + Duration::seconds(60));
    }

    #[test]
    fn test_hour_of_day_is_fractional() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).unwrap();
        assert!((hour_of_day(t) - 14.5).abs() < 1e-9);
    }

    #[test]
    fn test_reset_snaps_to_wall_time() {
        let wall = Arc::new(ManualClock::new(start()));
        let mut clock = VirtualClock::new(wall.clone(), 50.0);

        wall.advance(Duration::minutes(2));
        assert_ne!(clock.now(), wall.now());

        clock.reset();
        assert_eq!(clock.now(), wall.now());
        assert_eq!(clock.speed(), 50.0);
    }
}
