//! Trigger-to-ring scenarios through the public agent API.
//!
//! Two displays A (primary, left) and B (right). PIDs 4242 and 4243 run under
//! a terminal whose only window sits on B.
//!
//! The async tests go through a real trigger file and watcher.

use halo::agent::Agent;
use halo::alerts::DisplayState;
use halo::clock::ManualClock;
use halo::config::Settings;
use halo::error::ResolveError;
use halo::platform::FocusSource;
use halo::render::{RingFrame, RingRenderer};
use halo::resolve::Resolver;
use halo::resolve::display::{Display, DisplayId, DisplaySource, Rect};
use halo::resolve::process_tree::{AppIdentity, ProcessEntry, ProcessTable};
use halo::resolve::window::{WindowInfo, WindowSource};
use halo::trigger::{self, TriggerEvent, TriggerWatcher};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const A: DisplayId = DisplayId(69732928);
const B: DisplayId = DisplayId(724238150);
const TERMINAL: u32 = 812;
const SHELL: u32 = 813;

struct Processes;

impl ProcessTable for Processes {
    fn lookup(&self, pid: u32) -> Option<ProcessEntry> {
        let entry = |parent: u32, identity: AppIdentity| ProcessEntry {
            pid,
            parent: Some(parent),
            identity,
        };
        match pid {
            TERMINAL => Some(entry(
                1,
                AppIdentity::from_exe_path(
                    "iTerm2",
                    Some(std::path::Path::new("/Applications/iTerm.app/Contents/MacOS/iTerm2")),
                ),
            )),
            SHELL => Some(entry(
                TERMINAL,
                AppIdentity {
                    executable: "zsh".into(),
                    ..Default::default()
                },
            )),
            4242 | 4243 => Some(entry(
                SHELL,
                AppIdentity {
                    executable: "node".into(),
                    ..Default::default()
                },
            )),
            _ => None,
        }
    }
}

struct Windows {
    denied: bool,
}

impl WindowSource for Windows {
    fn windows(&self, pid: u32) -> Result<Vec<WindowInfo>, ResolveError> {
        if self.denied {
            return Err(ResolveError::PermissionDenied);
        }
        if pid != TERMINAL {
            return Ok(Vec::new());
        }
        Ok(vec![WindowInfo {
            frame: Rect::new(2200.0, 300.0, 1000.0, 700.0),
            title: Some("claude".into()),
        }])
    }
}

struct Displays;

impl DisplaySource for Displays {
    fn displays(&self) -> Vec<Display> {
        vec![
            Display {
                id: B,
                bounds: Rect::new(1728.0, 0.0, 2560.0, 1440.0),
                is_primary: false,
            },
            Display {
                id: A,
                bounds: Rect::new(0.0, 0.0, 1728.0, 1117.0),
                is_primary: true,
            },
        ]
    }
}

struct Focus(Rc<Cell<Option<u32>>>);

impl FocusSource for Focus {
    fn frontmost_pid(&self) -> Option<u32> {
        self.0.get()
    }
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<Vec<RingFrame>>>>);

impl Recorder {
    fn last(&self) -> Vec<RingFrame> {
        self.0.borrow().last().cloned().unwrap_or_default()
    }
}

impl RingRenderer for Recorder {
    fn draw(&mut self, frames: &[RingFrame]) {
        self.0.borrow_mut().push(frames.to_vec());
    }
}

struct Scenario {
    agent: Agent,
    clock: ManualClock,
    focus: Rc<Cell<Option<u32>>>,
    rings: Recorder,
}

fn scenario(settings: Settings, permission_denied: bool) -> Scenario {
    let clock = ManualClock::new();
    let focus = Rc::new(Cell::new(None));
    let rings = Recorder::default();
    let resolver = Resolver::new(
        Box::new(Processes),
        Box::new(Windows {
            denied: permission_denied,
        }),
        Box::new(Displays),
    );
    let agent = Agent::new(
        settings,
        resolver,
        Box::new(Focus(Rc::clone(&focus))),
        Box::new(rings.clone()),
        Arc::new(clock.clone()),
    );
    Scenario {
        agent,
        clock,
        focus,
        rings,
    }
}

#[test]
fn two_triggers_stack_on_terminal_display_then_dismiss() {
    let settings = Settings::default();
    let base = settings.base_ring_thickness;
    let step = settings.stacking_increment;
    let mut s = scenario(settings, false);

    s.agent.handle_trigger(4242);
    let alerts = s.agent.alerts();
    assert_eq!(alerts.display_state(B), DisplayState::Active);
    assert_eq!(alerts.display_state(A), DisplayState::Idle);
    assert_eq!(alerts.ring_thickness(B), base);
    assert_eq!(s.rings.last().len(), 1);
    assert_eq!(s.rings.last()[0].display, B);

    s.agent.handle_trigger(4243);
    let alerts = s.agent.alerts();
    assert_eq!(alerts.alert_count(B), 2);
    assert_eq!(alerts.ring_thickness(B), base + step);
    assert_eq!(s.rings.last()[0].thickness, base + step);

    assert_eq!(s.agent.dismiss_all(), 2);
    let alerts = s.agent.alerts();
    assert!(alerts.screen_ids_with_ring().is_empty());
    assert_eq!(alerts.display_state(B), DisplayState::Idle);
    assert!(s.rings.last().is_empty());
    assert!(!s.agent.animation().is_running());
}

#[test]
fn repeated_trigger_does_not_thicken_ring() {
    let mut s = scenario(Settings::default(), false);
    s.agent.handle_triggers([4242, 4242, 4242]);
    assert_eq!(s.agent.alerts().alert_count(B), 1);
    assert_eq!(s.agent.alerts().ring_thickness(B), 8.0);
}

#[test]
fn permission_denied_falls_back_to_primary() {
    let mut s = scenario(Settings::default(), true);
    s.agent.handle_trigger(4242);
    assert_eq!(s.agent.alerts().display_state(A), DisplayState::Active);
    assert_eq!(s.agent.alerts().display_state(B), DisplayState::Idle);
}

#[test]
fn focus_round_trip_restores_ring() {
    let mut s = scenario(Settings::default(), false);
    s.agent.handle_trigger(4242);
    let count = s.agent.alerts().len();

    s.focus.set(Some(TERMINAL));
    s.agent.poll_focus();
    assert_eq!(s.agent.alerts().display_state(B), DisplayState::Suppressed);
    assert!(s.rings.last().is_empty());
    assert_eq!(s.agent.alerts().len(), count);

    s.focus.set(Some(1));
    s.agent.poll_focus();
    assert_eq!(s.agent.alerts().display_state(B), DisplayState::Active);
    assert_eq!(s.rings.last()[0].display, B);
}

#[test]
fn auto_dismiss_after_timeout() {
    let mut s = scenario(
        Settings {
            auto_dismiss_secs: Some(60),
            ..Settings::default()
        },
        false,
    );
    s.agent.handle_trigger(4242);
    s.clock.advance(Duration::from_secs(20));
    s.agent.handle_trigger(4243);

    s.clock.advance(Duration::from_secs(40));
    assert_eq!(s.agent.handle_expiry(), 1);
    assert_eq!(s.agent.alerts().alert_count(B), 1);

    s.agent.dismiss_all();
    s.clock.advance(Duration::from_secs(120));
    assert_eq!(s.agent.handle_expiry(), 0);
}

#[tokio::test]
async fn watcher_delivers_appended_pids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trigger");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = TriggerWatcher::start(path.clone(), tx).unwrap();

    trigger::append_pid(&path, 4242).unwrap();
    trigger::append_pid(&path, 4243).unwrap();

    let mut pids = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while pids.len() < 2 {
        let event = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .expect("no trigger event within 5s")
            .unwrap();
        if event == TriggerEvent::Changed {
            pids.extend(watcher.drain());
        }
    }

    assert_eq!(pids, vec![4242, 4243]);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
}

/// Feed watcher events to the agent until `done` holds or five seconds pass.
async fn pump_until(
    s: &mut Scenario,
    watcher: &mut TriggerWatcher,
    rx: &mut mpsc::UnboundedReceiver<TriggerEvent>,
    done: impl Fn(&Agent) -> bool,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !done(&s.agent) {
        let event = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .expect("no trigger event within 5s")
            .unwrap();
        s.agent.handle_trigger_event(watcher, event);
    }
}

#[tokio::test]
async fn appended_pid_lights_ring_on_terminal_display() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trigger");
    let settings = Settings::default();
    let base = settings.base_ring_thickness;
    let step = settings.stacking_increment;
    let mut s = scenario(settings, false);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = s.agent.watch_triggers(path.clone(), tx).unwrap();

    trigger::append_pid(&path, 4242).unwrap();
    pump_until(&mut s, &mut watcher, &mut rx, |agent| {
        agent.alerts().display_state(B) == DisplayState::Active
    })
    .await;

    assert_eq!(s.agent.alerts().display_state(A), DisplayState::Idle);
    let rings = s.rings.last();
    assert_eq!(rings.len(), 1);
    assert_eq!(rings[0].display, B);
    assert_eq!(rings[0].thickness, base);

    // The drain swapped the file; later appends must still be seen.
    trigger::append_pid(&path, 4243).unwrap();
    pump_until(&mut s, &mut watcher, &mut rx, |agent| {
        agent.alerts().alert_count(B) == 2
    })
    .await;
    assert_eq!(s.rings.last()[0].thickness, base + step);
}

#[test]
fn triggers_written_while_stopped_are_resolved_at_start_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trigger");
    trigger::append_pid(&path, 4242).unwrap();

    let mut s = scenario(Settings::default(), false);
    let (tx, _rx) = mpsc::unbounded_channel();
    let _watcher = s.agent.watch_triggers(path.clone(), tx).unwrap();

    assert_eq!(s.agent.alerts().display_state(B), DisplayState::Active);
    assert_eq!(s.rings.last()[0].display, B);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
}
