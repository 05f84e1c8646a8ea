//! The agent: single owner of the alert set and the event loop driving it.
//!
//! Every stimulus (trigger file, focus poll, animation frame, auto-dismiss
//! deadline, control socket) is serialized onto one current-thread loop, so
//! `AlertManager` needs no locking. Background contexts (the notify callback
//! thread, socket connection tasks) only send messages.

use crate::alerts::{AlertManager, AlertSnapshot};
use crate::animation::{AnimationDriver, FRAME_INTERVAL};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::error::Result;
use crate::ipc::{ControlRequest, ControlResponse};
use crate::platform::{self, FocusSource};
use crate::render::{self, RingRenderer, TracingRenderer};
use crate::resolve::Resolver;
use crate::server;
use crate::trigger::{HEALTH_CHECK_INTERVAL, TriggerEvent, TriggerWatcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// How often the frontmost application is sampled.
pub const FOCUS_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pending control requests buffered before the loop picks them up.
const CONTROL_QUEUE: usize = 16;

pub struct Agent {
    settings: Settings,
    resolver: Resolver,
    focus: Box<dyn FocusSource>,
    renderer: Box<dyn RingRenderer>,
    alerts: AlertManager,
    animation: AnimationDriver,
    frontmost: Option<u32>,
}

impl Agent {
    pub fn new(
        settings: Settings,
        resolver: Resolver,
        focus: Box<dyn FocusSource>,
        renderer: Box<dyn RingRenderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut alerts = AlertManager::new(settings.stacking_policy(), clock);
        alerts.subscribe(log_snapshot);
        let animation = AnimationDriver::new(settings.blink_speed);

        let mut agent = Self {
            settings,
            resolver,
            focus,
            renderer,
            alerts,
            animation,
            frontmost: None,
        };
        agent.poll_focus();
        agent
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    /// Register an additional change listener (menu, dashboards).
    pub fn subscribe(&mut self, listener: impl FnMut(&AlertSnapshot) + 'static) {
        self.alerts.subscribe(listener);
    }

    pub fn animation(&self) -> &AnimationDriver {
        &self.animation
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        self.alerts.next_expiry()
    }

    /// Resolve `pid` to a display and raise (or refresh) its alert.
    pub fn handle_trigger(&mut self, pid: u32) {
        let target = self.resolver.resolve(pid);
        self.alerts.add_target(pid, &target);
        self.refresh();
    }

    pub fn handle_triggers(&mut self, pids: impl IntoIterator<Item = u32>) {
        for pid in pids {
            self.handle_trigger(pid);
        }
    }

    /// Start watching the trigger file and resolve whatever hooks appended
    /// while the agent was not running.
    pub fn watch_triggers(
        &mut self,
        path: PathBuf,
        tx: mpsc::UnboundedSender<TriggerEvent>,
    ) -> Result<TriggerWatcher> {
        let mut watcher = TriggerWatcher::start(path, tx)?;
        let pending = watcher.drain();
        if !pending.is_empty() {
            info!(count = pending.len(), "resolving triggers written before start-up");
        }
        self.handle_triggers(pending);
        Ok(watcher)
    }

    pub fn handle_trigger_event(&mut self, watcher: &mut TriggerWatcher, event: TriggerEvent) {
        match event {
            TriggerEvent::Changed => {
                let pids = watcher.drain();
                self.handle_triggers(pids);
            }
            TriggerEvent::Lost => match watcher.rearm() {
                Ok(pids) => self.handle_triggers(pids),
                Err(e) => warn!(
                    path = %watcher.path().display(),
                    error = %e,
                    "failed to re-arm trigger watcher"
                ),
            },
        }
    }

    /// Sample the focus source and react if the frontmost app changed.
    pub fn poll_focus(&mut self) {
        let frontmost = self.focus.frontmost_pid();
        self.handle_focus_change(frontmost);
    }

    pub fn handle_focus_change(&mut self, frontmost: Option<u32>) {
        if frontmost == self.frontmost {
            return;
        }
        debug!(?frontmost, "frontmost application changed");
        self.frontmost = frontmost;
        self.alerts.reevaluate_focus(frontmost);
        self.refresh();
    }

    /// Advance the blink by `dt` and redraw. No-op while stopped.
    pub fn handle_frame(&mut self, dt: Duration) {
        if !self.animation.is_running() {
            return;
        }
        self.animation.tick(dt);
        self.draw();
    }

    /// Retire alerts whose auto-dismiss deadline has passed.
    pub fn handle_expiry(&mut self) -> usize {
        let expired = self.alerts.expire_due();
        if expired > 0 {
            self.refresh();
        }
        expired
    }

    pub fn dismiss_all(&mut self) -> usize {
        let removed = self.alerts.dismiss_all();
        self.refresh();
        removed
    }

    pub fn handle_control(&mut self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::DismissAll => ControlResponse::Dismissed {
                count: self.dismiss_all(),
            },
            ControlRequest::DismissDisplay { display } => {
                let count = self.alerts.dismiss_display(display);
                self.refresh();
                ControlResponse::Dismissed { count }
            }
            ControlRequest::Status => ControlResponse::Status {
                snapshot: self.alerts.snapshot(),
            },
        }
    }

    fn refresh(&mut self) {
        // Nothing is drawn while rings are disabled, so the frame timer stays off.
        let visible = self.settings.ring_enabled && self.alerts.has_active_alerts();
        self.animation.sync(visible, self.settings.blinking_enabled);
        self.draw();
    }

    fn draw(&mut self) {
        let frames = render::frames(&self.settings, &self.alerts, &self.animation);
        self.renderer.draw(&frames);
    }
}

fn log_snapshot(snapshot: &AlertSnapshot) {
    let rings: Vec<String> = snapshot
        .displays
        .iter()
        .filter(|d| d.alert_count > 0)
        .map(|d| format!("{}x{}", d.display, d.alert_count))
        .collect();
    debug!(
        alerts = snapshot.total_alerts(),
        active = snapshot.has_active_alerts,
        rings = ?rings,
        "alert set changed"
    );
}

/// Run the agent until ctrl-c.
///
/// Fails only at start-up, when the trigger file cannot be created or
/// watched. Everything after that is logged and retried.
pub async fn run(settings: Settings) -> Result<()> {
    let resolver = Resolver::new(
        platform::system_process_table(),
        platform::system_window_source(),
        platform::system_display_source(),
    );
    let mut agent = Agent::new(
        settings.clone(),
        resolver,
        platform::system_focus_source(),
        Box::new(TracingRenderer::default()),
        Arc::new(SystemClock),
    );

    let (trigger_tx, mut trigger_rx) = mpsc::unbounded_channel();
    let mut watcher = agent.watch_triggers(settings.trigger_file(), trigger_tx)?;

    let (control_tx, mut control_rx) = mpsc::channel(CONTROL_QUEUE);
    tokio::spawn(server::start(control_tx));

    let mut focus_tick = tokio::time::interval(FOCUS_POLL_INTERVAL);
    focus_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frame_tick = tokio::time::interval(FRAME_INTERVAL);
    frame_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut health_tick = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    health_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(path = %watcher.path().display(), "halo agent running");

    let mut last_frame = Instant::now();
    loop {
        let animating = agent.animation().is_running();
        if !animating {
            last_frame = Instant::now();
        }
        let expiry = agent.next_expiry();
        // Placeholder deadline for the disabled branch; never polled.
        let deadline = tokio::time::Instant::from_std(
            expiry.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600)),
        );

        tokio::select! {
            Some(event) = trigger_rx.recv() => agent.handle_trigger_event(&mut watcher, event),
            _ = focus_tick.tick() => agent.poll_focus(),
            _ = frame_tick.tick(), if animating => {
                let now = Instant::now();
                agent.handle_frame(now - last_frame);
                last_frame = now;
            }
            _ = tokio::time::sleep_until(deadline), if expiry.is_some() => {
                agent.handle_expiry();
            }
            Some(cmd) = control_rx.recv() => {
                let response = agent.handle_control(cmd.request);
                let _ = cmd.reply.send(response);
            }
            _ = health_tick.tick() => {
                if !watcher.is_healthy() {
                    agent.handle_trigger_event(&mut watcher, TriggerEvent::Lost);
                }
            }
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::DisplayState;
    use crate::clock::ManualClock;
    use crate::error::ResolveError;
    use crate::render::RingFrame;
    use crate::resolve::display::{Display, DisplayId, DisplaySource, Rect};
    use crate::resolve::process_tree::{AppIdentity, ProcessEntry, ProcessTable};
    use crate::resolve::window::{WindowInfo, WindowSource};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    const TERMINAL: u32 = 900;
    const EDITOR: u32 = 1200;

    struct Table;

    impl ProcessTable for Table {
        fn lookup(&self, pid: u32) -> Option<ProcessEntry> {
            let (parent, identity) = match pid {
                TERMINAL => (
                    1,
                    AppIdentity {
                        bundle_id: Some("com.apple.Terminal".into()),
                        executable: "Terminal".into(),
                        ..Default::default()
                    },
                ),
                p if (4000..5000).contains(&p) => (
                    TERMINAL,
                    AppIdentity {
                        executable: "node".into(),
                        ..Default::default()
                    },
                ),
                _ => return None,
            };
            Some(ProcessEntry {
                pid,
                parent: Some(parent),
                identity,
            })
        }
    }

    struct Windows(HashMap<u32, Rect>);

    impl WindowSource for Windows {
        fn windows(&self, pid: u32) -> std::result::Result<Vec<WindowInfo>, ResolveError> {
            Ok(self
                .0
                .get(&pid)
                .map(|&frame| vec![WindowInfo { frame, title: None }])
                .unwrap_or_default())
        }
    }

    struct Displays;

    impl DisplaySource for Displays {
        fn displays(&self) -> Vec<Display> {
            vec![
                Display {
                    id: DisplayId(1),
                    bounds: Rect::new(0.0, 0.0, 1440.0, 900.0),
                    is_primary: true,
                },
                Display {
                    id: DisplayId(2),
                    bounds: Rect::new(1440.0, 0.0, 1920.0, 1080.0),
                    is_primary: false,
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

    struct Recorder(Rc<RefCell<Vec<Vec<RingFrame>>>>);

    impl RingRenderer for Recorder {
        fn draw(&mut self, frames: &[RingFrame]) {
            self.0.borrow_mut().push(frames.to_vec());
        }
    }

    struct Harness {
        agent: Agent,
        clock: ManualClock,
        focus: Rc<Cell<Option<u32>>>,
        drawn: Rc<RefCell<Vec<Vec<RingFrame>>>>,
    }

    impl Harness {
        fn last_frame(&self) -> Vec<RingFrame> {
            self.drawn.borrow().last().cloned().unwrap_or_default()
        }
    }

    fn harness(settings: Settings) -> Harness {
        let clock = ManualClock::new();
        let focus = Rc::new(Cell::new(Some(EDITOR)));
        let drawn = Rc::new(RefCell::new(Vec::new()));
        let windows = Windows(HashMap::from([(TERMINAL, Rect::new(1600.0, 100.0, 800.0, 600.0))]));
        let resolver = Resolver::new(Box::new(Table), Box::new(windows), Box::new(Displays));
        let agent = Agent::new(
            settings,
            resolver,
            Box::new(Focus(Rc::clone(&focus))),
            Box::new(Recorder(Rc::clone(&drawn))),
            Arc::new(clock.clone()),
        );
        Harness {
            agent,
            clock,
            focus,
            drawn,
        }
    }

    #[test]
    fn trigger_draws_ring_on_terminal_display() {
        let mut h = harness(Settings::default());
        h.agent.handle_trigger(4242);

        let frames = h.last_frame();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].display, DisplayId(2));
        assert_eq!(frames[0].thickness, 8.0);
        assert!(h.agent.animation().is_running());
    }

    #[test]
    fn unknown_pid_lands_on_primary() {
        let mut h = harness(Settings::default());
        h.agent.handle_trigger(77);
        assert_eq!(h.last_frame()[0].display, DisplayId(1));
    }

    #[test]
    fn focusing_terminal_hides_ring_until_focus_leaves() {
        let mut h = harness(Settings::default());
        h.agent.handle_trigger(4242);

        h.focus.set(Some(TERMINAL));
        h.agent.poll_focus();
        assert!(h.last_frame().is_empty());
        assert_eq!(h.agent.alerts().display_state(DisplayId(2)), DisplayState::Suppressed);
        assert!(!h.agent.animation().is_running());

        h.focus.set(Some(EDITOR));
        h.agent.poll_focus();
        assert_eq!(h.last_frame().len(), 1);
        assert!(h.agent.animation().is_running());
    }

    #[test]
    fn unchanged_focus_does_not_redraw() {
        let mut h = harness(Settings::default());
        h.agent.handle_trigger(4242);
        let draws = h.drawn.borrow().len();
        h.agent.poll_focus();
        assert_eq!(h.drawn.borrow().len(), draws);
    }

    #[test]
    fn frames_only_advance_while_animating() {
        let mut h = harness(Settings::default());
        let draws = h.drawn.borrow().len();
        h.agent.handle_frame(FRAME_INTERVAL);
        assert_eq!(h.drawn.borrow().len(), draws);

        h.agent.handle_trigger(4242);
        h.agent.handle_frame(Duration::from_millis(750));
        let frame = &h.last_frame()[0];
        assert!(frame.phase > 0.0);
        assert!(frame.opacity < Settings::default().ring_opacity);
    }

    #[test]
    fn blinking_disabled_keeps_full_opacity() {
        let mut h = harness(Settings {
            blinking_enabled: false,
            ring_opacity: 1.0,
            ..Settings::default()
        });
        h.agent.handle_trigger(4242);
        assert!(!h.agent.animation().is_running());
        assert_eq!(h.last_frame()[0].opacity, 1.0);
    }

    #[test]
    fn disabled_rings_keep_frame_timer_off() {
        let mut h = harness(Settings {
            ring_enabled: false,
            ..Settings::default()
        });
        h.agent.handle_trigger(4242);
        assert!(h.agent.alerts().has_active_alerts());
        assert!(!h.agent.animation().is_running());
        assert!(h.last_frame().is_empty());

        let draws = h.drawn.borrow().len();
        h.agent.handle_frame(FRAME_INTERVAL);
        assert_eq!(h.drawn.borrow().len(), draws);
    }

    #[test]
    fn triggers_from_before_start_up_are_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trigger");
        std::fs::write(&path, "4242\n77\n").unwrap();

        let mut h = harness(Settings::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let watcher = h.agent.watch_triggers(path.clone(), tx).unwrap();

        assert_eq!(h.agent.alerts().alert_count(DisplayId(2)), 1);
        assert_eq!(h.agent.alerts().alert_count(DisplayId(1)), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        assert!(watcher.is_healthy());
    }

    #[test]
    fn lost_event_recreates_file_and_keeps_watching() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trigger");
        let mut h = harness(Settings::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut watcher = h.agent.watch_triggers(path.clone(), tx).unwrap();

        std::fs::remove_file(&path).unwrap();
        h.agent.handle_trigger_event(&mut watcher, TriggerEvent::Lost);
        assert!(watcher.is_healthy());

        crate::trigger::append_pid(&path, 4242).unwrap();
        h.agent.handle_trigger_event(&mut watcher, TriggerEvent::Changed);
        assert_eq!(h.last_frame()[0].display, DisplayId(2));
    }

    #[test]
    fn expiry_clears_ring() {
        let mut h = harness(Settings {
            auto_dismiss_secs: Some(30),
            ..Settings::default()
        });
        h.agent.handle_trigger(4242);
        assert!(h.agent.next_expiry().is_some());

        h.clock.advance(Duration::from_secs(29));
        assert_eq!(h.agent.handle_expiry(), 0);
        h.clock.advance(Duration::from_secs(1));
        assert_eq!(h.agent.handle_expiry(), 1);
        assert!(h.last_frame().is_empty());
        assert!(h.agent.next_expiry().is_none());
    }

    #[test]
    fn control_requests() {
        let mut h = harness(Settings::default());
        h.agent.handle_triggers([4242, 4243, 77]);

        match h.agent.handle_control(ControlRequest::Status) {
            ControlResponse::Status { snapshot } => {
                assert_eq!(snapshot.total_alerts(), 3);
                assert_eq!(snapshot.displays.len(), 2);
            }
            other => panic!("expected Status, got {other:?}"),
        }

        assert_eq!(
            h.agent.handle_control(ControlRequest::DismissDisplay {
                display: DisplayId(2)
            }),
            ControlResponse::Dismissed { count: 2 }
        );
        assert_eq!(h.last_frame().len(), 1);

        assert_eq!(
            h.agent.handle_control(ControlRequest::DismissAll),
            ControlResponse::Dismissed { count: 1 }
        );
        assert!(h.last_frame().is_empty());
        assert!(!h.agent.animation().is_running());
    }

    #[test]
    fn extra_listeners_are_notified() {
        let mut h = harness(Settings::default());
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        h.agent.subscribe(move |_| sink.set(sink.get() + 1));
        h.agent.handle_trigger(4242);
        h.agent.dismiss_all();
        assert_eq!(seen.get(), 2);
    }
}
