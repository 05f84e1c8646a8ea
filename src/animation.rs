//! Ring blink animation
//!
//! A single phase clock shared by every display. The event loop ticks it at
//! `FRAME_INTERVAL` only while some display is Active and blinking is on;
//! otherwise the driver is stopped and opacity is pinned to 1.0.

use std::time::Duration;
use tracing::debug;

/// ~60 Hz frame cadence
pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

pub const MIN_OPACITY: f64 = 0.3;
pub const MAX_OPACITY: f64 = 1.0;

/// Shortest accepted blink cycle, in seconds.
pub const MIN_BLINK_SPEED: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct AnimationDriver {
    /// Accumulated phase in cycles; grows monotonically while running.
    phase: f64,
    running: bool,
    /// Seconds per blink cycle.
    blink_speed: f64,
}

impl AnimationDriver {
    pub fn new(blink_speed: f64) -> Self {
        Self {
            phase: 0.0,
            running: false,
            blink_speed: blink_speed.max(MIN_BLINK_SPEED),
        }
    }

    /// Start or stop to match the current alert state. Returns whether the
    /// driver is running afterwards.
    pub fn sync(&mut self, any_active: bool, blinking_enabled: bool) -> bool {
        let should_run = any_active && blinking_enabled;
        if should_run != self.running {
            self.running = should_run;
            if !should_run {
                self.phase = 0.0;
            }
            debug!(running = should_run, "blink animation toggled");
        }
        self.running
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance by `dt`. No-op while stopped.
    pub fn tick(&mut self, dt: Duration) {
        if self.running {
            self.phase += dt.as_secs_f64() / self.blink_speed;
        }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Current blink opacity in `[MIN_OPACITY, MAX_OPACITY]`.
    ///
    /// Uses a cosine so a freshly started blink continues from full opacity.
    pub fn opacity(&self) -> f64 {
        if !self.running {
            return MAX_OPACITY;
        }
        let wave = (self.phase * std::f64::consts::TAU).cos();
        let center = (MIN_OPACITY + MAX_OPACITY) / 2.0;
        let amplitude = (MAX_OPACITY - MIN_OPACITY) / 2.0;
        center + amplitude * wave
    }
}
