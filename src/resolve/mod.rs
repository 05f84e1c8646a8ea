//! PID → display resolution pipeline
//!
//! - process_tree.rs: ancestry walk to the owning terminal application
//! - window.rs: the terminal's primary window
//! - display.rs: geometry and window-to-display mapping
//!
//! Every resolution yields a display. When any stage fails the alert lands on
//! the primary display instead of being dropped.

pub mod display;
pub mod process_tree;
pub mod window;

use crate::error::ResolveError;
use display::{DisplayId, DisplayLayout, DisplaySource, Rect};
use process_tree::ProcessTable;
use std::cell::Cell;
use tracing::{debug, warn};
use window::WindowSource;

/// Where an alert for a PID should be shown.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub display: DisplayId,
    /// PID of the owning terminal application, when one was found.
    pub terminal_pid: Option<u32>,
    pub window_frame: Option<Rect>,
}

impl ResolvedTarget {
    pub fn fallback(display: DisplayId) -> Self {
        Self {
            display,
            terminal_pid: None,
            window_frame: None,
        }
    }
}

pub struct Resolver {
    processes: Box<dyn ProcessTable>,
    windows: Box<dyn WindowSource>,
    displays: Box<dyn DisplaySource>,
    access_requested: Cell<bool>,
}

impl Resolver {
    pub fn new(
        processes: Box<dyn ProcessTable>,
        windows: Box<dyn WindowSource>,
        displays: Box<dyn DisplaySource>,
    ) -> Self {
        Self {
            processes,
            windows,
            displays,
            access_requested: Cell::new(false),
        }
    }

    /// Resolve `pid` to the display showing its terminal. Never fails.
    pub fn resolve(&self, pid: u32) -> ResolvedTarget {
        let layout = DisplayLayout::new(self.displays.displays());

        let Some(terminal) = process_tree::resolve_terminal(self.processes.as_ref(), pid) else {
            debug!(pid, "no terminal ancestor; using primary display");
            return ResolvedTarget::fallback(layout.primary());
        };

        let window = match window::primary_window(self.windows.as_ref(), &terminal) {
            Ok(Some(w)) => Some(w),
            Ok(None) => {
                debug!(pid, terminal = terminal.app.name, "terminal has no windows");
                None
            }
            Err(ResolveError::PermissionDenied) => {
                self.permission_denied();
                None
            }
            Err(e) => {
                debug!(pid, error = %e, "window lookup failed");
                None
            }
        };

        let display_id = layout.display_of(window.as_ref());
        debug!(
            pid,
            terminal = terminal.app.name,
            terminal_pid = terminal.pid,
            display = %display_id,
            "resolved trigger"
        );

        ResolvedTarget {
            display: display_id,
            terminal_pid: Some(terminal.pid),
            window_frame: window.map(|w| w.frame),
        }
    }

    /// Prompt for access once; afterwards keep running in degraded mode.
    fn permission_denied(&self) {
        if self.access_requested.replace(true) {
            debug!("accessibility permission still missing; using primary display");
            return;
        }
        warn!("accessibility permission missing; alerts go to the primary display until granted");
        self.windows.request_access();
    }
}
