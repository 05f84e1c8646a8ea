//! Alert manager - the authoritative per-display alert set
//!
//! One alert per `(display, source pid)`. Each display is derived into one of
//! three states:
//!
//! - **Idle**: no alerts
//! - **Active**: at least one unsuppressed alert; the ring is visible
//! - **Suppressed**: alerts exist but all belong to the focused terminal
//!
//! Suppression is sticky: focusing the terminal hides the ring but keeps the
//! alert, so it comes back when focus moves away. Only dismissal or the
//! auto-dismiss timeout remove alerts.

use crate::clock::Clock;
use crate::resolve::ResolvedTarget;
use crate::resolve::display::DisplayId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Ring geometry and expiry policy, taken from the settings snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackingPolicy {
    pub base_thickness: f64,
    pub stacking_increment: f64,
    pub auto_dismiss: Option<Duration>,
}

impl StackingPolicy {
    /// Ring thickness for `count` unsuppressed alerts.
    pub fn thickness(&self, count: usize) -> f64 {
        if count == 0 {
            0.0
        } else {
            self.base_thickness + self.stacking_increment * (count - 1) as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct AlertKey {
    display: DisplayId,
    source_pid: u32,
}

/// A live alert
#[derive(Debug, Clone)]
pub struct Alert {
    pub display: DisplayId,
    pub source_pid: u32,
    /// Terminal owning the source process; focus on it suppresses the alert.
    pub terminal_pid: Option<u32>,
    pub created_at: Instant,
    pub created_wall: DateTime<Utc>,
    pub suppressed: bool,
    pub auto_dismiss_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Idle,
    Active,
    Suppressed,
}

/// Alert as reported to listeners and the control socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertInfo {
    pub display: DisplayId,
    pub source_pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_pid: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub suppressed: bool,
    /// Seconds until auto-dismiss, if scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
}

/// Derived per-display state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayStatus {
    pub display: DisplayId,
    pub state: DisplayState,
    /// Unsuppressed alerts.
    pub alert_count: usize,
    pub suppressed_count: usize,
    pub ring_thickness: f64,
}

/// Settled view of the alert set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSnapshot {
    pub has_active_alerts: bool,
    pub displays: Vec<DisplayStatus>,
    pub alerts: Vec<AlertInfo>,
}

impl AlertSnapshot {
    pub fn total_alerts(&self) -> usize {
        self.alerts.len()
    }
}

pub type Listener = Box<dyn FnMut(&AlertSnapshot)>;

pub struct AlertManager {
    alerts: BTreeMap<AlertKey, Alert>,
    policy: StackingPolicy,
    clock: Arc<dyn Clock>,
    /// Last frontmost application reported by `reevaluate_focus`.
    focused_pid: Option<u32>,
    listeners: Vec<Listener>,
}

impl AlertManager {
    pub fn new(policy: StackingPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            alerts: BTreeMap::new(),
            policy,
            clock,
            focused_pid: None,
            listeners: Vec::new(),
        }
    }

    /// Register a change listener. Listeners run after every mutation, once
    /// the alert set is consistent again.
    pub fn subscribe(&mut self, listener: impl FnMut(&AlertSnapshot) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for listener in &mut self.listeners {
            listener(&snapshot);
        }
    }

    /// Add (or refresh) an alert with no known terminal.
    pub fn add_alert(&mut self, display: DisplayId, pid: u32) {
        self.insert(display, pid, None);
    }

    /// Add (or refresh) an alert from a resolved trigger.
    pub fn add_target(&mut self, pid: u32, target: &ResolvedTarget) {
        self.insert(target.display, pid, target.terminal_pid);
    }

    fn insert(&mut self, display_id: DisplayId, source_pid: u32, terminal_pid: Option<u32>) {
        let now = self.clock.now();
        let auto_dismiss_at = self.policy.auto_dismiss.map(|d| now + d);
        let suppressed = terminal_pid.is_some() && terminal_pid == self.focused_pid;
        let key = AlertKey {
            display: display_id,
            source_pid,
        };

        match self.alerts.get_mut(&key) {
            Some(alert) => {
                alert.created_at = now;
                alert.created_wall = Utc::now();
                alert.auto_dismiss_at = auto_dismiss_at;
                if terminal_pid.is_some() {
                    alert.terminal_pid = terminal_pid;
                }
                alert.suppressed = alert.terminal_pid.is_some() && alert.terminal_pid == self.focused_pid;
                debug!(pid = source_pid, display = %display_id, "alert refreshed");
            }
            None => {
                self.alerts.insert(
                    key,
                    Alert {
                        display: display_id,
                        source_pid,
                        terminal_pid,
                        created_at: now,
                        created_wall: Utc::now(),
                        suppressed,
                        auto_dismiss_at,
                    },
                );
                let count = self.alert_count(display_id);
                info!(
                    pid = source_pid,
                    display = %display_id,
                    count,
                    suppressed,
                    "alert raised"
                );
            }
        }

        self.notify();
    }

    /// Remove every alert. Pending expiries go with them.
    pub fn dismiss_all(&mut self) -> usize {
        let removed = self.alerts.len();
        if removed == 0 {
            return 0;
        }
        self.alerts.clear();
        info!(removed, "all alerts dismissed");
        self.notify();
        removed
    }

    /// Remove every alert on one display.
    pub fn dismiss_display(&mut self, display_id: DisplayId) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(|key, _| key.display != display_id);
        let removed = before - self.alerts.len();
        if removed > 0 {
            info!(display = %display_id, removed, "display alerts dismissed");
            self.notify();
        }
        removed
    }

    /// Remove a single alert. Returns whether it existed.
    pub fn dismiss(&mut self, display_id: DisplayId, pid: u32) -> bool {
        let key = AlertKey {
            display: display_id,
            source_pid: pid,
        };
        if self.alerts.remove(&key).is_none() {
            return false;
        }
        debug!(pid, display = %display_id, "alert dismissed");
        self.notify();
        true
    }

    /// Re-derive suppression from the frontmost application. Never removes
    /// alerts.
    pub fn reevaluate_focus(&mut self, frontmost: Option<u32>) {
        self.focused_pid = frontmost;

        let mut changed = false;
        for alert in self.alerts.values_mut() {
            let suppressed = alert.terminal_pid.is_some() && alert.terminal_pid == frontmost;
            if alert.suppressed != suppressed {
                alert.suppressed = suppressed;
                changed = true;
                trace!(pid = alert.source_pid, display = %alert.display, suppressed, "suppression changed");
            }
        }

        if changed {
            self.notify();
        }
    }

    /// Earliest pending auto-dismiss deadline.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.alerts.values().filter_map(|a| a.auto_dismiss_at).min()
    }

    /// Remove alerts whose deadline has passed. Each alert expires on its
    /// own; others on the same display stay.
    pub fn expire_due(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.alerts.len();
        self.alerts.retain(|_, alert| match alert.auto_dismiss_at {
            Some(at) => at > now,
            None => true,
        });
        let removed = before - self.alerts.len();
        if removed > 0 {
            info!(removed, "alerts auto-dismissed");
            self.notify();
        }
        removed
    }

    fn alerts_on(&self, display: DisplayId) -> impl Iterator<Item = &Alert> {
        self.alerts.values().filter(move |a| a.display == display)
    }

    /// Live, unsuppressed alerts on `display`.
    pub fn alert_count(&self, display: DisplayId) -> usize {
        self.alerts_on(display).filter(|a| !a.suppressed).count()
    }

    /// All alerts on `display`, suppressed ones included.
    pub fn alert_records(&self, display: DisplayId) -> usize {
        self.alerts_on(display).count()
    }

    pub fn display_state(&self, display: DisplayId) -> DisplayState {
        match (self.alert_records(display), self.alert_count(display)) {
            (0, _) => DisplayState::Idle,
            (_, 0) => DisplayState::Suppressed,
            _ => DisplayState::Active,
        }
    }

    pub fn ring_thickness(&self, display: DisplayId) -> f64 {
        self.policy.thickness(self.alert_count(display))
    }

    /// Displays that currently show a ring.
    pub fn screen_ids_with_ring(&self) -> BTreeSet<DisplayId> {
        self.alerts
            .values()
            .filter(|a| !a.suppressed)
            .map(|a| a.display)
            .collect()
    }

    pub fn has_active_alerts(&self) -> bool {
        self.alerts.values().any(|a| !a.suppressed)
    }

    pub fn get(&self, display: DisplayId, pid: u32) -> Option<&Alert> {
        self.alerts.get(&AlertKey {
            display,
            source_pid: pid,
        })
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        let now = self.clock.now();
        let displays: BTreeSet<DisplayId> = self.alerts.values().map(|a| a.display).collect();

        AlertSnapshot {
            has_active_alerts: self.has_active_alerts(),
            displays: displays
                .into_iter()
                .map(|display| {
                    let alert_count = self.alert_count(display);
                    DisplayStatus {
                        display,
                        state: self.display_state(display),
                        alert_count,
                        suppressed_count: self.alert_records(display) - alert_count,
                        ring_thickness: self.policy.thickness(alert_count),
                    }
                })
                .collect(),
            alerts: self
                .alerts
                .values()
                .map(|a| AlertInfo {
                    display: a.display,
                    source_pid: a.source_pid,
                    terminal_pid: a.terminal_pid,
                    created_at: a.created_wall,
                    suppressed: a.suppressed,
                    expires_in_secs: a
                        .auto_dismiss_at
                        .map(|at| at.saturating_duration_since(now).as_secs()),
                })
                .collect(),
        }
    }
}
