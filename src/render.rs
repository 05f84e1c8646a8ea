//! Ring renderer interface
//!
//! The agent hands the renderer the complete set of rings for the current
//! frame. Displays missing from the set have no ring. Drawing pixels (the
//! gradient mosaic along the screen edges) is the renderer's business.

use crate::alerts::AlertManager;
use crate::animation::AnimationDriver;
use crate::config::{RingColor, RingStyle, Settings};
use crate::resolve::display::DisplayId;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// One display's ring for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RingFrame {
    pub display: DisplayId,
    pub thickness: f64,
    pub color: RingColor,
    pub style: RingStyle,
    /// Settings opacity multiplied by the blink opacity.
    pub opacity: f64,
    pub phase: f64,
}

pub trait RingRenderer {
    fn draw(&mut self, frames: &[RingFrame]);
}

/// Rings for every Active display. Empty when rings are disabled.
pub fn frames(settings: &Settings, alerts: &AlertManager, animation: &AnimationDriver) -> Vec<RingFrame> {
    if !settings.ring_enabled {
        return Vec::new();
    }
    let opacity = settings.ring_opacity * animation.opacity();
    alerts
        .screen_ids_with_ring()
        .into_iter()
        .map(|display| RingFrame {
            display,
            thickness: alerts.ring_thickness(display),
            color: settings.ring_color,
            style: settings.ring_style,
            opacity,
            phase: animation.phase(),
        })
        .collect()
}

/// Renderer that only logs. Display changes at debug, frames at trace.
#[derive(Debug, Default)]
pub struct TracingRenderer {
    visible: BTreeSet<DisplayId>,
}

impl RingRenderer for TracingRenderer {
    fn draw(&mut self, frames: &[RingFrame]) {
        let visible: BTreeSet<DisplayId> = frames.iter().map(|f| f.display).collect();
        if visible != self.visible {
            debug!(displays = ?visible, "ring displays changed");
            self.visible = visible;
        }
        for frame in frames {
            trace!(
                display = %frame.display,
                thickness = frame.thickness,
                color = frame.color.hex(),
                opacity = frame.opacity,
                phase = frame.phase,
                "ring frame"
            );
        }
    }
}
