//! Trigger file watcher.
//!
//! External hooks append one decimal PID per line to the trigger file. The
//! watcher holds a single `notify` subscription on the file (kqueue on macOS,
//! inotify on Linux) and forwards coarse events to the agent loop, which
//! calls [`TriggerWatcher::drain`] to consume the complete lines.
//!
//! A drain moves the file aside before reading it and leaves a fresh empty
//! file in its place, so a hook appending mid-drain is never truncated away.
//! If the file disappears or the subscription errors, the agent calls
//! [`TriggerWatcher::rearm`], which recreates the file and subscribes again.

use crate::error::Result;
use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// How often the agent checks that the trigger file still exists, in case a
/// removal was not reported.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    /// The file was written; drain it.
    Changed,
    /// The file was removed/renamed or the subscription failed; re-arm.
    Lost,
}

/// PIDs parsed from the complete lines of a trigger buffer.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedLines {
    pub pids: Vec<u32>,
    /// Bytes covered by complete lines (including their newline).
    pub consumed: usize,
    pub malformed: usize,
}

/// Parse every newline-terminated line of `buf`. A trailing line without a
/// newline is left for the next read. Duplicate PIDs keep their first
/// position.
pub fn parse_lines(buf: &str) -> ParsedLines {
    let Some(last_newline) = buf.rfind('\n') else {
        return ParsedLines::default();
    };

    let mut parsed = ParsedLines {
        consumed: last_newline + 1,
        ..Default::default()
    };

    for line in buf[..last_newline].lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<u32>() {
            Ok(0) | Err(_) => {
                warn!(line, "skipping malformed trigger line");
                parsed.malformed += 1;
            }
            Ok(pid) => {
                if !parsed.pids.contains(&pid) {
                    parsed.pids.push(pid);
                }
            }
        }
    }

    parsed
}

/// Consume the trigger file and return the PIDs of its complete lines.
///
/// An empty file is left alone, so draining never feeds back into another
/// event. An unterminated last line is dropped with a warning: its writer
/// finishes it in the claimed copy, which is gone by then.
pub fn drain_file(path: &Path) -> Result<Vec<u32>> {
    claim(path, |_| {})
}

/// Sibling the trigger file is moved to while it is read.
fn claim_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".draining");
    path.with_file_name(name)
}

/// Move the file to [`claim_path`], recreate it empty, then read the claimed
/// copy. Writers that open the path after the rename land in the new file.
/// Writers still holding the old file land in the claimed copy, which is read
/// again after `settle` runs.
fn claim(path: &Path, settle: impl FnOnce(&Path)) -> Result<Vec<u32>> {
    if fs::metadata(path)?.len() == 0 {
        return Ok(Vec::new());
    }

    let claimed = claim_path(path);
    fs::rename(path, &claimed)?;
    ensure_file(path)?;

    let mut file = File::open(&claimed)?;
    let mut raw = Vec::new();
    file.read_to_end(&mut raw)?;
    settle(&claimed);
    file.read_to_end(&mut raw)?;
    drop(file);
    fs::remove_file(&claimed)?;

    let contents = String::from_utf8_lossy(&raw);
    let parsed = parse_lines(&contents);
    let dropped = contents.len() - parsed.consumed;
    if dropped > 0 {
        warn!(path = %path.display(), bytes = dropped, "dropping unterminated trigger line");
    }

    trace!(
        path = %path.display(),
        pids = parsed.pids.len(),
        malformed = parsed.malformed,
        "trigger file drained"
    );
    Ok(parsed.pids)
}

/// Append a PID line, creating the file (and its directory) if needed.
pub fn append_pid(path: &Path, pid: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // One write per line keeps concurrent appenders from interleaving.
    file.write_all(format!("{pid}\n").as_bytes())?;
    Ok(())
}

fn ensure_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

fn classify(kind: &EventKind) -> Option<TriggerEvent> {
    match kind {
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => Some(TriggerEvent::Lost),
        EventKind::Access(_) => None,
        _ => Some(TriggerEvent::Changed),
    }
}

pub struct TriggerWatcher {
    path: PathBuf,
    watcher: RecommendedWatcher,
    subscribed: bool,
}

impl TriggerWatcher {
    /// Create the trigger file if needed and subscribe to it. Events go to `tx`.
    pub fn start(path: PathBuf, tx: mpsc::UnboundedSender<TriggerEvent>) -> Result<Self> {
        ensure_file(&path)?;

        let watcher =
            notify::recommended_watcher(move |res: std::result::Result<notify::Event, notify::Error>| {
                let event = match res {
                    Ok(e) => classify(&e.kind),
                    Err(err) => {
                        debug!(error = %err, "trigger watcher error");
                        Some(TriggerEvent::Lost)
                    }
                };
                if let Some(event) = event {
                    let _ = tx.send(event);
                }
            })?;

        let mut this = Self {
            path,
            watcher,
            subscribed: false,
        };
        this.subscribe()?;
        info!(path = %this.path.display(), "watching trigger file");
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn subscribe(&mut self) -> Result<()> {
        let _ = self.watcher.unwatch(&self.path);
        self.subscribed = false;
        self.watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        self.subscribed = true;
        Ok(())
    }

    /// Consume new PIDs. Read failures are logged and end the drain; the
    /// caller re-arms on the next `Lost` event or health check.
    ///
    /// Every claim swaps the file, so the subscription moves to the fresh file
    /// before the claimed copy is released. Lines written to the fresh file
    /// before it was watched are picked up by another claim round.
    pub fn drain(&mut self) -> Vec<u32> {
        let path = self.path.clone();
        let mut pids = Vec::new();
        loop {
            let mut claimed = false;
            let batch = claim(&path, |_| {
                claimed = true;
                if let Err(e) = self.subscribe() {
                    warn!(path = %path.display(), error = %e, "failed to watch fresh trigger file");
                }
            });
            match batch {
                Ok(batch) => {
                    for pid in batch {
                        if !pids.contains(&pid) {
                            pids.push(pid);
                        }
                    }
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "failed to drain trigger file");
                    break;
                }
            }
            if !claimed {
                break;
            }
        }
        pids
    }

    /// Whether the file exists and is subscribed.
    pub fn is_healthy(&self) -> bool {
        self.subscribed && self.path.is_file()
    }

    /// Recreate the file and resubscribe, then return anything already written.
    ///
    /// Each drain replaces the file, so a `Lost` event for the claimed copy is
    /// routine and only logged at debug level.
    pub fn rearm(&mut self) -> Result<Vec<u32>> {
        if self.is_healthy() {
            debug!(path = %self.path.display(), "refreshing trigger file subscription");
        } else {
            warn!(path = %self.path.display(), "trigger file subscription lost; re-arming");
        }
        ensure_file(&self.path)?;
        self.subscribe()?;
        Ok(self.drain())
    }
}
