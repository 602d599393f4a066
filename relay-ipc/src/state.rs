//! Supervisor state and the per-tick diff
//!
//! [`apply_tick`] is the only place state changes. It takes the previous
//! [`SupervisorState`] and what the poller observed this tick, and returns the
//! new state plus the [`StatusEvent`]s the presentation layer must apply.
//! Snapshots are diffed, never merged: each one is authoritative for the tick
//! it arrived in.

use crate::status::{ConnectionState, HostLabelStyle, NetData, StatusSnapshot, Throughput};

/// Boolean indicators shown by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Worker process is alive
    Worker,
    /// `COORD`
    Coordinator,
    /// `RESOLVEDSDP`
    Resolved,
    /// `CONNECTED`
    Connected,
}

impl Flag {
    pub const ALL: [Flag; 4] = [Flag::Worker, Flag::Coordinator, Flag::Resolved, Flag::Connected];

    pub fn label(&self) -> &'static str {
        match self {
            Flag::Worker => "worker",
            Flag::Coordinator => "coordinator",
            Flag::Resolved => "resolver",
            Flag::Connected => "client",
        }
    }
}

/// Current value of every flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub worker: bool,
    pub coordinator: bool,
    pub resolved: bool,
    pub connected: bool,
}

impl Flags {
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Worker => self.worker,
            Flag::Coordinator => self.coordinator,
            Flag::Resolved => self.resolved,
            Flag::Connected => self.connected,
        }
    }

    fn slot(&mut self, flag: Flag) -> &mut bool {
        match flag {
            Flag::Worker => &mut self.worker,
            Flag::Coordinator => &mut self.coordinator,
            Flag::Resolved => &mut self.resolved,
            Flag::Connected => &mut self.connected,
        }
    }
}

/// A host as mirrored into the presentation list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedHost {
    pub id: String,
    pub label: String,
}

/// What the poller saw during one tick
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// No live worker; the channel was not read
    WorkerDown,
    /// Worker alive but nothing new (zero-length frame, lock or decode failure)
    NoData,
    /// Worker alive and a fresh snapshot was decoded
    Snapshot(StatusSnapshot),
}

/// State change the presentation layer must apply
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    FlagChanged {
        flag: Flag,
        old: bool,
        new: bool,
    },
    ConnectionChanged {
        old: Option<ConnectionState>,
        new: ConnectionState,
    },
    /// New throughput data point (one per distinct `UPDATETIME`)
    Sample(Throughput),
    /// New application-host rate record (one per distinct `SECONDTIME`)
    NetSample(NetData),
    HostAdded {
        index: usize,
        host: DisplayedHost,
    },
    HostUpdated {
        index: usize,
        old_label: String,
        label: String,
    },
}

/// Everything the supervisor derived from the worker so far
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SupervisorState {
    pub flags: Flags,
    pub connection: Option<ConnectionState>,
    pub last_update_time: Option<f64>,
    pub last_net_time: Option<f64>,
    /// First-seen order; stale hosts are never removed
    pub hosts: Vec<DisplayedHost>,
    pub label_style: HostLabelStyle,
    /// Last snapshot applied
    pub snapshot: Option<StatusSnapshot>,
}

impl SupervisorState {
    pub fn new(label_style: HostLabelStyle) -> Self {
        Self {
            label_style,
            ..Self::default()
        }
    }

    /// Whether the user may ask the worker to connect to a host
    pub fn can_connect(&self) -> bool {
        self.flags.worker
            && !matches!(
                self.connection,
                Some(ConnectionState::Negotiating) | Some(ConnectionState::Connected)
            )
    }

    /// Label of the host at `index` in display order
    pub fn host_label(&self, index: usize) -> Option<&str> {
        self.hosts.get(index).map(|h| h.label.as_str())
    }

    fn set_flag(&mut self, flag: Flag, value: bool, events: &mut Vec<StatusEvent>) {
        let slot = self.flags.slot(flag);
        if *slot != value {
            let old = *slot;
            *slot = value;
            events.push(StatusEvent::FlagChanged {
                flag,
                old,
                new: value,
            });
        }
    }

    fn set_connection(&mut self, state: ConnectionState, events: &mut Vec<StatusEvent>) {
        if self.connection != Some(state) {
            events.push(StatusEvent::ConnectionChanged {
                old: self.connection,
                new: state,
            });
            self.connection = Some(state);
        }
    }

    fn apply_snapshot(&mut self, snapshot: StatusSnapshot, events: &mut Vec<StatusEvent>) {
        self.set_flag(Flag::Coordinator, snapshot.coordinator, events);
        self.set_flag(Flag::Resolved, snapshot.resolved, events);
        self.set_flag(Flag::Connected, snapshot.connected, events);

        if let Some(state) = snapshot.connection {
            self.set_connection(state, events);
        }

        if let Some(sample) = snapshot.throughput {
            if self.last_update_time != Some(sample.update_time) {
                self.last_update_time = Some(sample.update_time);
                events.push(StatusEvent::Sample(sample));
            }
        }

        if let Some(net) = &snapshot.net_data {
            if self.last_net_time != Some(net.second_time) {
                self.last_net_time = Some(net.second_time);
                events.push(StatusEvent::NetSample(net.clone()));
            }
        }

        if let Some(hosts) = &snapshot.hosts {
            for host in hosts {
                let label = host.label(self.label_style);
                match self.hosts.iter().position(|h| h.id == host.id) {
                    Some(index) => {
                        let shown = &mut self.hosts[index];
                        if shown.label != label {
                            let old_label = std::mem::replace(&mut shown.label, label.clone());
                            events.push(StatusEvent::HostUpdated {
                                index,
                                old_label,
                                label,
                            });
                        }
                    }
                    None => {
                        let shown = DisplayedHost {
                            id: host.id.clone(),
                            label,
                        };
                        self.hosts.push(shown.clone());
                        events.push(StatusEvent::HostAdded {
                            index: self.hosts.len() - 1,
                            host: shown,
                        });
                    }
                }
            }
        }

        self.snapshot = Some(snapshot);
    }

    fn apply(&mut self, observation: Observation) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        match observation {
            Observation::WorkerDown => {
                for flag in Flag::ALL {
                    self.set_flag(flag, false, &mut events);
                }
                if self.connection.is_some() {
                    self.set_connection(ConnectionState::Disconnected, &mut events);
                }
            }
            Observation::NoData => {
                self.set_flag(Flag::Worker, true, &mut events);
            }
            Observation::Snapshot(snapshot) => {
                self.set_flag(Flag::Worker, true, &mut events);
                self.apply_snapshot(snapshot, &mut events);
            }
        }
        events
    }
}

/// Fold one tick's observation into the state.
pub fn apply_tick(
    mut state: SupervisorState,
    observation: Observation,
) -> (SupervisorState, Vec<StatusEvent>) {
    let events = state.apply(observation);
    (state, events)
}
