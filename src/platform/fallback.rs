//! Sources for targets without window introspection.

use super::FocusSource;
use crate::error::ResolveError;
use crate::resolve::display::{Display, DisplaySource};
use crate::resolve::window::{WindowInfo, WindowSource};

pub struct NoWindows;

impl WindowSource for NoWindows {
    fn windows(&self, _pid: u32) -> Result<Vec<WindowInfo>, ResolveError> {
        Err(ResolveError::Unsupported)
    }
}

pub struct NoDisplays;

impl DisplaySource for NoDisplays {
    fn displays(&self) -> Vec<Display> {
        Vec::new()
    }
}

pub struct NoFocus;

impl FocusSource for NoFocus {
    fn frontmost_pid(&self) -> Option<u32> {
        None
    }
}
