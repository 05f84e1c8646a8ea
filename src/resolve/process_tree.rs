//! Walks a process's ancestry to find the terminal application that owns it.
//!
//! A hook process is usually several levels below the terminal
//! (`terminal → login → shell → node → hook`), so the walk checks each
//! ancestor against a fixed allow-list of terminal emulators and IDEs.

use std::path::{Path, PathBuf};

/// Maximum number of processes examined per walk (the starting PID included).
pub const MAX_HOPS: usize = 10;

/// How a process identifies itself to the OS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppIdentity {
    /// macOS bundle identifier, e.g. `com.googlecode.iterm2`.
    pub bundle_id: Option<String>,
    /// Innermost `.app` bundle name without extension, e.g. `iTerm`.
    pub bundle_name: Option<String>,
    /// Executable name, e.g. `kitty`.
    pub executable: String,
}

impl AppIdentity {
    /// Build an identity from an executable path, deriving the bundle name
    /// from the innermost `*.app` component.
    pub fn from_exe_path(executable: &str, exe: Option<&Path>) -> Self {
        Self {
            bundle_id: None,
            bundle_name: exe.and_then(bundle_name_from_path),
            executable: executable.to_string(),
        }
    }
}

fn app_component(component: std::path::Component<'_>) -> Option<&str> {
    component
        .as_os_str()
        .to_str()
        .and_then(|c| c.strip_suffix(".app"))
        .filter(|name| !name.is_empty())
}

/// Name of the innermost `.app` bundle in `path`.
///
/// `/Applications/Visual Studio Code.app/Contents/Frameworks/Code Helper.app/...`
/// yields `Code Helper`: helpers own no windows, so they must not be taken for
/// the app that hosts them.
pub fn bundle_name_from_path(path: &Path) -> Option<String> {
    path.components().filter_map(app_component).last().map(String::from)
}

/// Path of the innermost `.app` bundle directory in `path`.
pub fn bundle_path_from_exe(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut bundle = None;
    for component in path.components() {
        out.push(component);
        if app_component(component).is_some() {
            bundle = Some(out.clone());
        }
    }
    bundle
}

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub parent: Option<u32>,
    pub identity: AppIdentity,
}

/// OS process table.
pub trait ProcessTable {
    /// `None` when the process does not exist (or has already exited).
    fn lookup(&self, pid: u32) -> Option<ProcessEntry>;
}

/// A terminal-class application known to host coding assistants.
#[derive(Debug, PartialEq, Eq)]
pub struct TerminalApp {
    pub name: &'static str,
    /// Bundle identifiers; a trailing `*` matches any suffix.
    pub bundle_ids: &'static [&'static str],
    pub bundle_names: &'static [&'static str],
    pub executables: &'static [&'static str],
}

pub static TERMINAL_APPS: &[TerminalApp] = &[
    TerminalApp {
        name: "Terminal",
        bundle_ids: &["com.apple.Terminal"],
        bundle_names: &["Terminal"],
        executables: &[],
    },
    TerminalApp {
        name: "iTerm2",
        bundle_ids: &["com.googlecode.iterm2"],
        bundle_names: &["iTerm", "iTerm2"],
        executables: &[],
    },
    TerminalApp {
        name: "Warp",
        bundle_ids: &["dev.warp.Warp-Stable", "dev.warp.Warp-Preview"],
        bundle_names: &["Warp"],
        executables: &["warp-terminal"],
    },
    TerminalApp {
        name: "Ghostty",
        bundle_ids: &["com.mitchellh.ghostty"],
        bundle_names: &["Ghostty"],
        executables: &["ghostty"],
    },
    TerminalApp {
        name: "kitty",
        bundle_ids: &["net.kovidgoyal.kitty"],
        bundle_names: &["kitty"],
        executables: &["kitty"],
    },
    TerminalApp {
        name: "Alacritty",
        bundle_ids: &["org.alacritty", "io.alacritty"],
        bundle_names: &["Alacritty"],
        executables: &["alacritty"],
    },
    TerminalApp {
        name: "WezTerm",
        bundle_ids: &["com.github.wez.wezterm"],
        bundle_names: &["WezTerm"],
        executables: &["wezterm-gui"],
    },
    TerminalApp {
        name: "Hyper",
        bundle_ids: &["co.zeit.hyper"],
        bundle_names: &["Hyper"],
        executables: &[],
    },
    TerminalApp {
        name: "Visual Studio Code",
        bundle_ids: &["com.microsoft.VSCode", "com.microsoft.VSCodeInsiders", "com.vscodium"],
        bundle_names: &["Visual Studio Code", "Visual Studio Code - Insiders", "VSCodium"],
        executables: &["code", "code-insiders", "codium"],
    },
    TerminalApp {
        name: "Cursor",
        bundle_ids: &["com.todesktop.230313mzl4w4u92"],
        bundle_names: &["Cursor"],
        executables: &["cursor"],
    },
    TerminalApp {
        name: "Windsurf",
        bundle_ids: &["com.exafunction.windsurf"],
        bundle_names: &["Windsurf"],
        executables: &["windsurf"],
    },
    TerminalApp {
        name: "Zed",
        bundle_ids: &["dev.zed.Zed", "dev.zed.Zed-Preview"],
        bundle_names: &["Zed", "Zed Preview"],
        executables: &["zed", "zed-editor"],
    },
    TerminalApp {
        name: "JetBrains IDE",
        bundle_ids: &["com.jetbrains.*", "com.google.android.studio"],
        bundle_names: &[],
        executables: &[],
    },
    TerminalApp {
        name: "GNOME Terminal",
        bundle_ids: &[],
        bundle_names: &[],
        executables: &["gnome-terminal-server", "gnome-terminal", "kgx", "ptyxis"],
    },
    TerminalApp {
        name: "Konsole",
        bundle_ids: &[],
        bundle_names: &[],
        executables: &["konsole"],
    },
    TerminalApp {
        name: "X terminal",
        bundle_ids: &[],
        bundle_names: &[],
        executables: &["xterm", "urxvt", "foot", "tilix", "terminator", "xfce4-terminal"],
    },
];

fn bundle_id_matches(pattern: &str, bundle_id: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => bundle_id
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
        None => pattern.eq_ignore_ascii_case(bundle_id),
    }
}

impl TerminalApp {
    pub fn matches(&self, identity: &AppIdentity) -> bool {
        if let Some(id) = &identity.bundle_id
            && self.bundle_ids.iter().any(|p| bundle_id_matches(p, id))
        {
            return true;
        }
        if let Some(name) = &identity.bundle_name
            && self.bundle_names.iter().any(|n| n.eq_ignore_ascii_case(name))
        {
            return true;
        }
        self.executables
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&identity.executable))
    }

    /// The allow-list entry `identity` belongs to, if any.
    pub fn classify(identity: &AppIdentity) -> Option<&'static TerminalApp> {
        TERMINAL_APPS.iter().find(|app| app.matches(identity))
    }
}

/// A process that belongs to a terminal-class application.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalProcess {
    pub pid: u32,
    pub app: &'static TerminalApp,
    pub identity: AppIdentity,
}

/// Walk up from `pid` to the first terminal-class ancestor.
///
/// Returns `None` when the chain reaches PID 1, hits a process that no longer
/// exists, or runs out of hops. None of these are errors: the caller places
/// the alert on the primary display instead.
pub fn resolve_terminal(table: &dyn ProcessTable, pid: u32) -> Option<TerminalProcess> {
    let mut current = pid;

    for _ in 0..MAX_HOPS {
        if current <= 1 {
            return None;
        }

        let entry = table.lookup(current)?;
        if let Some(app) = TerminalApp::classify(&entry.identity) {
            return Some(TerminalProcess {
                pid: current,
                app,
                identity: entry.identity,
            });
        }

        match entry.parent {
            Some(parent) if parent != current => current = parent,
            _ => return None,
        }
    }

    None
}
