//! User settings (`config.json`) and well-known paths.
//!
//! On macOS the config resolves to `~/Library/Application Support/halo/`.
//! The agent reads it once at start-up; the snapshot is immutable afterwards.

use crate::alerts::StackingPolicy;
use crate::animation::MIN_BLINK_SPEED;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment override for the trigger file location.
pub const TRIGGER_FILE_ENV: &str = "HALO_TRIGGER_FILE";

// ---------------------------------------------------------------------------
// Ring appearance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RingColor {
    #[default]
    Orange,
    Red,
    Blue,
    Green,
    Purple,
    White,
}

impl RingColor {
    /// Hex color for this ring
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Orange => "#F97316",
            Self::Red => "#EF4444",
            Self::Blue => "#3B82F6",
            Self::Green => "#22C55E",
            Self::Purple => "#A855F7",
            Self::White => "#F8FAFC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RingStyle {
    Solid,
    /// Soft gradient fading toward the screen center.
    #[default]
    Glow,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// User preferences (persisted to config.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ring_enabled: bool,
    /// Base ring opacity, 0.0 – 1.0.
    pub ring_opacity: f64,
    /// Thickness of a ring with a single alert, in points.
    pub base_ring_thickness: f64,
    /// Extra thickness per additional alert on the same display.
    pub stacking_increment: f64,
    pub blinking_enabled: bool,
    /// Seconds per blink cycle.
    pub blink_speed: f64,
    /// Dismiss each alert after this many seconds. `None` keeps alerts until
    /// dismissed.
    pub auto_dismiss_secs: Option<u64>,
    pub ring_color: RingColor,
    pub ring_style: RingStyle,
    pub trigger_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ring_enabled: true,
            ring_opacity: 0.9,
            base_ring_thickness: 8.0,
            stacking_increment: 4.0,
            blinking_enabled: true,
            blink_speed: 1.5,
            auto_dismiss_secs: None,
            ring_color: RingColor::default(),
            ring_style: RingStyle::default(),
            trigger_path: None,
        }
    }
}

impl Settings {
    /// Clamp values a hand-edited file might get wrong.
    pub fn sanitized(mut self) -> Self {
        self.ring_opacity = if self.ring_opacity.is_finite() {
            self.ring_opacity.clamp(0.0, 1.0)
        } else {
            Settings::default().ring_opacity
        };
        if !self.base_ring_thickness.is_finite() || self.base_ring_thickness < 0.0 {
            self.base_ring_thickness = Settings::default().base_ring_thickness;
        }
        if !self.stacking_increment.is_finite() || self.stacking_increment < 0.0 {
            self.stacking_increment = 0.0;
        }
        if !self.blink_speed.is_finite() || self.blink_speed < MIN_BLINK_SPEED {
            self.blink_speed = MIN_BLINK_SPEED;
        }
        if self.auto_dismiss_secs == Some(0) {
            self.auto_dismiss_secs = None;
        }
        self
    }

    pub fn auto_dismiss(&self) -> Option<Duration> {
        self.auto_dismiss_secs.map(Duration::from_secs)
    }

    pub fn stacking_policy(&self) -> StackingPolicy {
        StackingPolicy {
            base_thickness: self.base_ring_thickness,
            stacking_increment: self.stacking_increment,
            auto_dismiss: self.auto_dismiss(),
        }
    }

    /// Trigger file path: `$HALO_TRIGGER_FILE`, then the configured path,
    /// then `~/.halo/trigger`.
    pub fn trigger_file(&self) -> PathBuf {
        if let Some(path) = std::env::var_os(TRIGGER_FILE_ENV) {
            return PathBuf::from(path);
        }
        self.trigger_path.clone().unwrap_or_else(default_trigger_path)
    }
}

fn default_trigger_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".halo")
        .join("trigger")
}

// ---------------------------------------------------------------------------
// Directory helpers
// ---------------------------------------------------------------------------

/// Halo config directory (e.g. `~/Library/Application Support/halo/`).
fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("halo"))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load settings from disk, returning defaults if the file is missing or invalid.
pub fn load_config() -> Settings {
    let Some(path) = config_dir().map(|d| d.join("config.json")) else {
        return Settings::default();
    };
    load_config_from(&path)
}

// ---------------------------------------------------------------------------
// Path-parameterised helper (used by public API and tests)
// ---------------------------------------------------------------------------

fn load_config_from(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str::<Settings>(&contents)
            .unwrap_or_default()
            .sanitized(),
        Err(_) => Settings::default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
