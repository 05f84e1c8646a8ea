//! Primary-window lookup for a resolved terminal.

use super::display::Rect;
use super::process_tree::TerminalProcess;
use crate::error::ResolveError;

/// A window reported by the platform's introspection API.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub frame: Rect,
    pub title: Option<String>,
}

/// Window list of a process, in the platform's enumeration order.
pub trait WindowSource {
    fn windows(&self, pid: u32) -> Result<Vec<WindowInfo>, ResolveError>;

    /// Ask the OS to prompt the user for the permission `windows` needs.
    fn request_access(&self) {}
}

/// The terminal's first enumerated window, if it has any.
pub fn primary_window(
    source: &dyn WindowSource,
    terminal: &TerminalProcess,
) -> Result<Option<WindowInfo>, ResolveError> {
    Ok(source.windows(terminal.pid)?.into_iter().next())
}
