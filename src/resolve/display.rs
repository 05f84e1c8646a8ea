//! Display geometry and window-to-display mapping.
//!
//! Coordinates are global, top-left origin, in points (the space both
//! CoreGraphics display bounds and Accessibility window frames use).

use super::window::WindowInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque physical display identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayId(pub u32);

impl DisplayId {
    /// Used when the platform reports no displays at all.
    pub const FALLBACK: DisplayId = DisplayId(0);
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Half-open containment: the right and bottom edges belong to the
    /// neighbouring display.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Display {
    pub id: DisplayId,
    pub bounds: Rect,
    pub is_primary: bool,
}

/// Source of the currently attached displays.
pub trait DisplaySource {
    fn displays(&self) -> Vec<Display>;
}

/// Snapshot of the attached displays, ordered left-to-right, top-to-bottom.
#[derive(Debug, Clone, Default)]
pub struct DisplayLayout {
    displays: Vec<Display>,
}

impl DisplayLayout {
    pub fn new(mut displays: Vec<Display>) -> Self {
        displays.sort_by(|a, b| {
            a.bounds
                .x
                .total_cmp(&b.bounds.x)
                .then(a.bounds.y.total_cmp(&b.bounds.y))
        });
        Self { displays }
    }

    /// The designated fallback display for anything that cannot be placed.
    pub fn primary(&self) -> DisplayId {
        self.displays
            .iter()
            .find(|d| d.is_primary)
            .or_else(|| self.displays.first())
            .map(|d| d.id)
            .unwrap_or(DisplayId::FALLBACK)
    }

    pub fn display_containing(&self, point: Point) -> DisplayId {
        self.displays
            .iter()
            .find(|d| d.bounds.contains(point))
            .map(|d| d.id)
            .unwrap_or_else(|| self.primary())
    }

    /// Display showing the center of `window`, or the primary display when
    /// there is no window to place.
    pub fn display_of(&self, window: Option<&WindowInfo>) -> DisplayId {
        match window {
            Some(w) => self.display_containing(w.frame.center()),
            None => self.primary(),
        }
    }
}
