//! Monitor loop
//!
//! One current-thread runtime drives everything that touches the channel:
//! the 250 ms tick, the stdin actions drained at the start of each tick and
//! the Ctrl-C handler.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use crossbeam_channel::{Receiver, TryRecvError};
use tokio::time::MissedTickBehavior;

use relay_ipc::{
    ConnectOutcome, LocalProcessService, Poller, ProcessLifecycle, SharedMemoryChannel,
    SharedMonitorState, WorkerArgs, WorkerHandle, WorkerLaunch, TICK_INTERVAL,
};

use crate::actions::{self, Action, HELP};
use crate::config::MonitorConfig;
use crate::render;

/// Supervisor of one worker and the processes started next to it
pub struct Monitor {
    poller: Poller<SharedMemoryChannel, LocalProcessService>,
    state: Arc<SharedMonitorState>,
    companions: LocalProcessService,
    companion_handles: Vec<WorkerHandle>,
}

impl Monitor {
    /// Allocate the channel. Fails only when the region cannot be created.
    pub fn new(config: &MonitorConfig) -> anyhow::Result<Self> {
        let channel = SharedMemoryChannel::create(config.profile.layout(), config.lock_timeout)
            .context("Failed to create the worker channel")?;

        let mut args = WorkerArgs::new(channel.token());
        if let Some(app) = &config.app {
            args = args.with_app(app);
        }

        let poller = Poller::new(
            channel,
            LocalProcessService::new(),
            config.profile.label_style(),
        )
        .with_launch(WorkerLaunch {
            path: config.worker.clone(),
            args,
            visible: config.show_console,
        });

        Ok(Self {
            poller,
            state: SharedMonitorState::with_capacity(config.series_capacity),
            companions: LocalProcessService::new(),
            companion_handles: Vec::new(),
        })
    }

    pub fn token(&self) -> &str {
        self.poller.channel().token()
    }

    /// Start helper processes that run beside the worker.
    pub fn start_companions(&mut self, paths: &[PathBuf]) {
        for path in paths {
            match self.companions.create_process(path, &[], true) {
                Ok(handle) => self.companion_handles.push(handle),
                Err(e) => log::warn!("Failed to start companion {}: {}", path.display(), e),
            }
        }
    }

    /// (Re)start the worker. A new worker starts a fresh plot.
    pub fn launch(&mut self) {
        match self.poller.launch() {
            Ok(_) => self.state.clear_plots(),
            Err(e) => log::error!("Failed to launch worker: {}", e),
        }
    }

    /// One tick: liveness, status read, presentation update.
    pub fn tick(&mut self) {
        let events = self.poller.tick();
        self.state.apply_events(&events);
        for line in render::render(&self.state) {
            log::info!("{}", line);
        }
    }

    pub fn handle(&mut self, action: Action) -> ControlFlow<()> {
        match action {
            Action::Connect(index) => match self.poller.connect(index) {
                Ok(ConnectOutcome::Sent(label)) => log::info!("Connecting to {}", label),
                Ok(ConnectOutcome::Disabled) => {
                    log::warn!("Connect is disabled until the worker reports disconnected")
                }
                Ok(ConnectOutcome::UnknownHost(index)) => log::warn!("No host [{}]", index),
                Err(e) => log::debug!("Connect failed: {}", e),
            },
            Action::Send(text) => {
                if self.poller.send_command(&text).is_ok() {
                    log::info!("Sent {:?}", text);
                }
            }
            Action::Launch => self.launch(),
            Action::Stop => self.poller.stop(),
            Action::Console(visible) => {
                self.poller.set_visible(visible);
                self.launch();
            }
            Action::Hosts => {
                for line in render::host_lines(&self.state.hosts.read_all()) {
                    log::info!("{}", line);
                }
            }
            Action::Status => {
                log::info!("{}", render::indicator_line(&self.state.indicators.read()));
                log::info!("worker {} ({:?})", self.poller.handle(), self.poller.state());
            }
            Action::Help => {
                for line in HELP {
                    log::info!("{}", line);
                }
            }
            Action::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Apply every queued action. Breaks on `quit`.
    pub fn drain(&mut self, actions: &Receiver<Action>) -> ControlFlow<()> {
        loop {
            match actions.try_recv() {
                Ok(action) => self.handle(action)?,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    return ControlFlow::Continue(())
                }
            }
        }
    }

    /// Close the worker and every companion.
    pub fn shutdown(&mut self) {
        self.poller.stop();
        for handle in self.companion_handles.drain(..) {
            self.companions.close(handle);
        }
    }
}

/// Run until `quit` or Ctrl-C.
pub async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let mut monitor = Monitor::new(&config)?;
    log::info!(
        "Channel {} ready for profile {}",
        monitor.token(),
        config.profile
    );

    monitor.start_companions(&config.companions);
    if config.launch {
        monitor.launch();
    } else {
        log::info!("Worker not launched; type `launch` to start it");
    }

    let actions = actions::spawn_stdin_reader();
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if monitor.drain(&actions).is_break() {
                    break;
                }
                monitor.tick();
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    log::warn!("Signal handler failed: {}", e);
                }
                log::info!("Interrupted");
                break;
            }
        }
    }

    monitor.shutdown();
    log::info!("Monitor stopped");
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use relay_ipc::{ChannelLayout, ChannelSource, PollerState, DEFAULT_LOCK_TIMEOUT};
    use std::time::Duration;

    fn config(profile: Profile) -> MonitorConfig {
        MonitorConfig {
            profile,
            worker: PathBuf::from("/nonexistent/relay-worker"),
            app: None,
            show_console: false,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            series_capacity: 16,
            companions: Vec::new(),
            launch: false,
        }
    }

    #[test]
    fn quit_breaks_the_drain() {
        let mut monitor = Monitor::new(&config(Profile::RemoteController)).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(4);
        tx.send(Action::Status).unwrap();
        tx.send(Action::Quit).unwrap();
        tx.send(Action::Hosts).unwrap();

        assert!(monitor.drain(&rx).is_break());
        // actions after quit stay queued
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn failed_launch_stays_idle() {
        let mut monitor = Monitor::new(&config(Profile::Throughput)).unwrap();
        monitor.launch();
        monitor.tick();
        assert_eq!(monitor.poller.state(), PollerState::Idle);
        assert!(monitor.handle(Action::Connect(0)).is_continue());
    }

    #[test]
    fn relaunch_starts_a_fresh_plot() {
        let mut monitor = Monitor::new(&MonitorConfig {
            // any binary that spawns will do; it exits on the unknown argument
            worker: PathBuf::from("sleep"),
            ..config(Profile::Throughput)
        })
        .unwrap();
        monitor.state.apply_events(&[relay_ipc::StatusEvent::Sample(
            relay_ipc::Throughput {
                update_time: 3.0,
                outgoing_kbs: 90.0,
                ..relay_ipc::Throughput::default()
            },
        )]);
        assert_eq!(monitor.state.series(relay_ipc::Series::OutgoingKbs).len(), 1);

        assert!(monitor.handle(Action::Console(false)).is_continue());
        assert_eq!(monitor.poller.state(), PollerState::Launching);
        assert!(monitor.state.series(relay_ipc::Series::OutgoingKbs).is_empty());
        monitor.shutdown();
    }

    #[test]
    fn failed_launch_keeps_the_plot() {
        let mut monitor = Monitor::new(&config(Profile::Throughput)).unwrap();
        monitor.state.apply_events(&[relay_ipc::StatusEvent::Sample(
            relay_ipc::Throughput::default(),
        )]);
        monitor.launch();
        assert_eq!(monitor.state.series(relay_ipc::Series::IncomingKbs).len(), 1);
    }

    #[test]
    fn idle_monitor_leaves_status_unread() {
        let mut monitor = Monitor::new(&config(Profile::RemoteController)).unwrap();
        let mut worker = SharedMemoryChannel::attach(
            monitor.token(),
            ChannelLayout::Duplex,
            Duration::from_millis(100),
        )
        .unwrap();
        worker.write_status(r#"{"COORD":true}"#).unwrap();

        // no worker process, so the channel is not read
        monitor.tick();
        assert!(!monitor.state.indicators.read().flags.coordinator);
        assert!(worker.poll_once().unwrap().is_some());
    }
}
