//! OS-backed sources for the resolver and focus tracking
//!
//! Each concern is a trait seam; `system_*` constructors pick the
//! implementation for the current target:
//!
//! - macOS: Accessibility for windows and focus, CoreGraphics for displays
//! - elsewhere: window lookup reports `Unsupported`, no displays and no focus,
//!   so every alert lands on the fallback display

mod process;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(not(target_os = "macos"))]
mod fallback;

pub use process::SystemProcessTable;

use crate::resolve::display::DisplaySource;
use crate::resolve::process_tree::ProcessTable;
use crate::resolve::window::WindowSource;

/// Reports which application currently has keyboard focus.
pub trait FocusSource {
    fn frontmost_pid(&self) -> Option<u32>;
}

pub fn system_process_table() -> Box<dyn ProcessTable> {
    Box::new(SystemProcessTable::new())
}

#[cfg(target_os = "macos")]
pub fn system_window_source() -> Box<dyn WindowSource> {
    Box::new(macos::AxWindowSource)
}

#[cfg(not(target_os = "macos"))]
pub fn system_window_source() -> Box<dyn WindowSource> {
    Box::new(fallback::NoWindows)
}

#[cfg(target_os = "macos")]
pub fn system_display_source() -> Box<dyn DisplaySource> {
    Box::new(macos::CgDisplaySource)
}

#[cfg(not(target_os = "macos"))]
pub fn system_display_source() -> Box<dyn DisplaySource> {
    Box::new(fallback::NoDisplays)
}

#[cfg(target_os = "macos")]
pub fn system_focus_source() -> Box<dyn FocusSource> {
    Box::new(macos::AxFocusSource)
}

#[cfg(not(target_os = "macos"))]
pub fn system_focus_source() -> Box<dyn FocusSource> {
    Box::new(fallback::NoFocus)
}

/// Bundle identifier of the `.app` at `bundle_path`, when the OS knows it.
#[cfg(target_os = "macos")]
pub(crate) fn bundle_identifier(bundle_path: &std::path::Path) -> Option<String> {
    macos::bundle_identifier(bundle_path)
}

#[cfg(not(target_os = "macos"))]
pub(crate) fn bundle_identifier(_bundle_path: &std::path::Path) -> Option<String> {
    None
}
