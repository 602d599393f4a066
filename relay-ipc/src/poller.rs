//! # Poller
//!
//! Drives one tick of the supervisor loop: check worker liveness, read the
//! status frame, fold the observation into [`SupervisorState`].
//!
//! ## State Machine
//!
//! ```text
//!   launch()          liveness ok
//! Idle ──────▶ Launching ──────────▶ Active
//!   ▲              │                   │
//!   │   not running│     not running   │
//!   └──────────────┴───────────────────┘
//!          stop() from any state
//! ```
//!
//! | State | Channel read | Flags |
//! |-------|--------------|-------|
//! | `Idle` | never | forced false |
//! | `Launching` | no | unchanged |
//! | `Active` | every tick | from snapshot |
//!
//! The poller never sleeps. The caller owns the timer and calls
//! [`Poller::tick`] every [`TICK_INTERVAL`].

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ChannelError, ChannelResult};
use crate::frame::ascii_lossy;
use crate::process::{ProcessLifecycle, WorkerArgs, WorkerHandle};
use crate::source::{ChannelSource, CommandSink};
use crate::state::{apply_tick, Observation, StatusEvent, SupervisorState};
use crate::status::{ConnectionState, HostLabelStyle};

/// Fixed tick period
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Poller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerState {
    /// No worker handle
    #[default]
    Idle,
    /// Worker created, liveness not confirmed yet
    Launching,
    /// Worker confirmed alive; the channel is read every tick
    Active,
}

impl PollerState {
    pub fn has_worker(&self) -> bool {
        !matches!(self, PollerState::Idle)
    }
}

/// How to start the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLaunch {
    pub path: PathBuf,
    pub args: WorkerArgs,
    /// Keep the worker's console output visible
    pub visible: bool,
}

/// Result of a connect request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Label written into the command range
    Sent(String),
    /// Action disabled until the connection returns to `Disconnected`
    Disabled,
    /// No host displayed at that index
    UnknownHost(usize),
}

/// Tick driver over a channel and a process service
pub struct Poller<C, P> {
    channel: C,
    lifecycle: P,
    launch: Option<WorkerLaunch>,
    handle: WorkerHandle,
    state: PollerState,
    supervisor: SupervisorState,
    connect_enabled: bool,
    last_error: Option<String>,
}

impl<C, P> Poller<C, P>
where
    C: ChannelSource + CommandSink,
    P: ProcessLifecycle,
{
    pub fn new(channel: C, lifecycle: P, label_style: HostLabelStyle) -> Self {
        Self {
            channel,
            lifecycle,
            launch: None,
            handle: WorkerHandle::NONE,
            state: PollerState::Idle,
            supervisor: SupervisorState::new(label_style),
            connect_enabled: true,
            last_error: None,
        }
    }

    /// Remember how to start the worker; used by [`launch`](Self::launch).
    pub fn with_launch(mut self, launch: WorkerLaunch) -> Self {
        self.launch = Some(launch);
        self
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle
    }

    pub fn supervisor(&self) -> &SupervisorState {
        &self.supervisor
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Toggle console visibility for the next launch.
    pub fn set_visible(&mut self, visible: bool) {
        if let Some(launch) = &mut self.launch {
            launch.visible = visible;
        }
    }

    /// Start the worker, closing any existing one first.
    pub fn launch(&mut self) -> ChannelResult<WorkerHandle> {
        let Some(launch) = self.launch.clone() else {
            return Err(ChannelError::Process(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no worker configured",
            )));
        };

        self.close_worker();

        let handle =
            self.lifecycle
                .create_process(&launch.path, &launch.args.to_args(), launch.visible)?;
        self.handle = handle;
        self.state = PollerState::Launching;
        self.connect_enabled = true;
        log::info!("Launching {} as {}", launch.path.display(), handle);
        Ok(handle)
    }

    /// Close the worker. The next tick forces every flag to false.
    pub fn stop(&mut self) {
        self.close_worker();
    }

    fn close_worker(&mut self) {
        if !self.handle.is_none() {
            self.lifecycle.close(self.handle);
            self.handle = WorkerHandle::NONE;
        }
        self.state = PollerState::Idle;
    }

    /// Run one tick and return the events it produced.
    pub fn tick(&mut self) -> Vec<StatusEvent> {
        if !self.handle.is_none() {
            if self.lifecycle.is_running(self.handle) {
                if self.state == PollerState::Launching {
                    log::debug!("Worker {} is alive", self.handle);
                }
                self.state = PollerState::Active;
            } else {
                log::warn!("Worker {} is no longer running", self.handle);
                self.handle = WorkerHandle::NONE;
                self.state = PollerState::Idle;
            }
        }

        let observation = match self.state {
            PollerState::Idle => Observation::WorkerDown,
            PollerState::Launching => Observation::NoData,
            PollerState::Active => self.read_status(),
        };

        let supervisor = std::mem::take(&mut self.supervisor);
        let (supervisor, events) = apply_tick(supervisor, observation);
        self.supervisor = supervisor;

        if events.iter().any(|e| {
            matches!(
                e,
                StatusEvent::ConnectionChanged {
                    new: ConnectionState::Disconnected,
                    ..
                }
            )
        }) {
            self.connect_enabled = true;
        }

        events
    }

    fn read_status(&mut self) -> Observation {
        match self.channel.poll_once() {
            Ok(Some(snapshot)) => {
                self.last_error = None;
                Observation::Snapshot(snapshot)
            }
            Ok(None) => Observation::NoData,
            Err(e) => {
                // Repeated identical failures are logged once
                let message = e.to_string();
                if self.last_error.as_deref() != Some(message.as_str()) {
                    log::warn!("Status read failed: {}", message);
                    self.last_error = Some(message);
                }
                Observation::NoData
            }
        }
    }

    /// Write `text` into the command range, with non-ASCII characters
    /// replaced by `?`.
    pub fn send_command(&mut self, text: &str) -> ChannelResult<()> {
        let encoded = ascii_lossy(text);
        if encoded != text {
            log::debug!("Command {:?} sent as {:?}", text, encoded);
        }
        match self.channel.send_command(&encoded) {
            Ok(()) => {
                log::debug!("Sent command {:?}", text);
                Ok(())
            }
            Err(e) => {
                log::warn!("Command not sent: {}", e);
                Err(e)
            }
        }
    }

    /// Whether a connect request would be sent now
    pub fn can_connect(&self) -> bool {
        self.connect_enabled && self.supervisor.can_connect()
    }

    /// Send the label of the host at `index` as a connect command. Disables
    /// further connects until the worker reports `Disconnected` again.
    pub fn connect(&mut self, index: usize) -> ChannelResult<ConnectOutcome> {
        if !self.can_connect() {
            return Ok(ConnectOutcome::Disabled);
        }
        let Some(label) = self.supervisor.host_label(index).map(str::to_owned) else {
            return Ok(ConnectOutcome::UnknownHost(index));
        };

        self.send_command(&label)?;
        self.connect_enabled = false;
        Ok(ConnectOutcome::Sent(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ChannelLayout;
    use crate::source::InMemoryChannel;
    use crate::state::Flag;
    use std::collections::HashSet;
    use std::path::Path;

    #[derive(Default)]
    struct FakeLifecycle {
        next_pid: u32,
        running: HashSet<u32>,
        launches: Vec<Vec<String>>,
        closed: Vec<WorkerHandle>,
    }

    impl FakeLifecycle {
        fn kill_all(&mut self) {
            self.running.clear();
        }
    }

    impl ProcessLifecycle for FakeLifecycle {
        fn create_process(
            &mut self,
            _path: &Path,
            args: &[String],
            _visible: bool,
        ) -> ChannelResult<WorkerHandle> {
            self.next_pid += 1;
            self.running.insert(self.next_pid);
            self.launches.push(args.to_vec());
            Ok(WorkerHandle::from_pid(self.next_pid))
        }

        fn is_running(&mut self, handle: WorkerHandle) -> bool {
            handle.pid().is_some_and(|pid| self.running.contains(&pid))
        }

        fn close(&mut self, handle: WorkerHandle) {
            if let Some(pid) = handle.pid() {
                self.running.remove(&pid);
            }
            self.closed.push(handle);
        }
    }

    fn poller() -> (InMemoryChannel, Poller<InMemoryChannel, FakeLifecycle>) {
        let worker = InMemoryChannel::new(ChannelLayout::Duplex, Duration::from_millis(20));
        let poller = Poller::new(worker.clone(), FakeLifecycle::default(), HostLabelStyle::Plain)
            .with_launch(WorkerLaunch {
                path: PathBuf::from("remoteviewer"),
                args: WorkerArgs::new("tok"),
                visible: false,
            });
        (worker, poller)
    }

    fn flag_events(events: &[StatusEvent], flag: Flag) -> Vec<(bool, bool)> {
        events
            .iter()
            .filter_map(|e| match e {
                StatusEvent::FlagChanged { flag: f, old, new } if *f == flag => Some((*old, *new)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn idle_without_worker() {
        let (_, mut poller) = poller();
        let events = poller.tick();
        assert_eq!(poller.state(), PollerState::Idle);
        assert!(events.is_empty());
    }

    #[test]
    fn launch_then_active() {
        let (worker, mut poller) = poller();
        worker.write_status(r#"{"COORD":true}"#).unwrap();

        let handle = poller.launch().unwrap();
        assert_eq!(poller.state(), PollerState::Launching);
        assert_eq!(poller.lifecycle.launches[0], vec!["-MEM=tok"]);

        let events = poller.tick();
        assert_eq!(poller.state(), PollerState::Active);
        assert_eq!(poller.handle(), handle);
        assert_eq!(flag_events(&events, Flag::Worker), vec![(false, true)]);
        assert_eq!(flag_events(&events, Flag::Coordinator), vec![(false, true)]);
    }

    #[test]
    fn relaunch_closes_existing_worker() {
        let (_, mut poller) = poller();
        let first = poller.launch().unwrap();
        let second = poller.launch().unwrap();

        assert_ne!(first, second);
        assert_eq!(poller.lifecycle.closed, vec![first]);
        assert!(!poller.lifecycle.is_running(first));
    }

    #[test]
    fn liveness_loss_clears_flags_next_tick() {
        let (worker, mut poller) = poller();
        worker
            .write_status(r#"{"COORD":true,"RESOLVEDSDP":true,"CONNECTED":true}"#)
            .unwrap();
        poller.launch().unwrap();
        poller.tick();
        assert!(poller.supervisor().flags.connected);

        poller.lifecycle.kill_all();
        let events = poller.tick();

        assert_eq!(poller.state(), PollerState::Idle);
        assert!(poller.handle().is_none());
        for flag in Flag::ALL {
            assert_eq!(flag_events(&events, flag), vec![(true, false)]);
        }
    }

    #[test]
    fn stop_goes_idle() {
        let (_, mut poller) = poller();
        poller.launch().unwrap();
        poller.tick();
        poller.stop();

        assert_eq!(poller.state(), PollerState::Idle);
        let events = poller.tick();
        assert_eq!(flag_events(&events, Flag::Worker), vec![(true, false)]);
    }

    #[test]
    fn read_failures_keep_previous_snapshot() {
        let (worker, mut poller) = poller();
        worker.write_status(r#"{"COORD":true}"#).unwrap();
        poller.launch().unwrap();
        poller.tick();

        worker.write_status("{broken").unwrap();
        let events = poller.tick();
        assert!(events.is_empty());
        assert!(poller.supervisor().flags.coordinator);

        let _held = worker.hold().unwrap();
        let events = poller.tick();
        assert!(events.is_empty());
        assert_eq!(poller.state(), PollerState::Active);
    }

    #[test]
    fn connect_disabled_until_disconnected() {
        let (worker, mut poller) = poller();
        worker
            .write_status(r#"{"CONNSTATUS":0,"HOSTS":[{"GUID":"g1","NAME":"box"}]}"#)
            .unwrap();
        poller.launch().unwrap();
        poller.tick();

        assert_eq!(poller.connect(3).unwrap(), ConnectOutcome::UnknownHost(3));
        assert_eq!(
            poller.connect(0).unwrap(),
            ConnectOutcome::Sent("g1:box".into())
        );
        assert_eq!(worker.take_command().unwrap().as_deref(), Some("g1:box"));
        assert_eq!(poller.connect(0).unwrap(), ConnectOutcome::Disabled);

        worker.write_status(r#"{"CONNSTATUS":1}"#).unwrap();
        poller.tick();
        assert_eq!(poller.connect(0).unwrap(), ConnectOutcome::Disabled);

        worker.write_status(r#"{"CONNSTATUS":0}"#).unwrap();
        poller.tick();
        assert!(poller.can_connect());
    }

    #[test]
    fn connect_to_host_with_non_ascii_name() {
        let (worker, mut poller) = poller();
        worker
            .write_status(r#"{"CONNSTATUS":0,"HOSTS":[{"GUID":"3f2a","NAME":"caf\u00e9"}]}"#)
            .unwrap();
        poller.launch().unwrap();
        poller.tick();

        assert_eq!(
            poller.connect(0).unwrap(),
            ConnectOutcome::Sent("3f2a:caf\u{e9}".into())
        );
        assert_eq!(worker.take_command().unwrap().as_deref(), Some("3f2a:caf?"));
        assert!(!poller.can_connect());
    }

    #[test]
    fn connect_needs_live_worker() {
        let (_, mut poller) = poller();
        assert_eq!(poller.connect(0).unwrap(), ConnectOutcome::Disabled);
    }

    #[test]
    fn launch_without_worker_path_fails() {
        let channel = InMemoryChannel::new(ChannelLayout::Duplex, Duration::from_millis(20));
        let mut poller = Poller::new(channel, FakeLifecycle::default(), HostLabelStyle::Plain);
        assert!(matches!(poller.launch(), Err(ChannelError::Process(_))));
    }
}
