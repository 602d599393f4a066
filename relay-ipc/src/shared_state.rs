//! Shared presentation state for the monitor shell
//!
//! The poller produces [`StatusEvent`]s; [`SharedMonitorState::apply_events`]
//! folds them into dirty-tracked collections. The renderer reads each part
//! with `read_if_dirty` and only redraws what changed.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::state::{DisplayedHost, Flag, Flags, StatusEvent};
use crate::status::{ConnectionState, NetData, Throughput};

/// Default number of points kept per time series
pub const DEFAULT_SERIES_CAPACITY: usize = 600;

/// Rolling list of plot points or hosts that remembers whether the
/// renderer has seen its latest contents.
///
/// Once `max_size` is reached the oldest entry is discarded.
pub struct DirtyVec<T> {
    data: RwLock<Vec<T>>,
    dirty: AtomicBool,
    max_size: usize,
}

impl<T: Clone> DirtyVec<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            data: RwLock::new(Vec::new()),
            dirty: AtomicBool::new(false),
            max_size,
        }
    }

    /// Append a point or host; the oldest entry falls off past `max_size`.
    pub fn push(&self, item: T) {
        let mut data = self.data.write();
        data.push(item);
        if data.len() > self.max_size {
            data.remove(0);
        }
        self.dirty.store(true, Ordering::Release);
    }

    /// Edit the entry at `index` in place. Returns false for an unknown index
    /// and leaves the list unchanged.
    pub fn modify(&self, index: usize, f: impl FnOnce(&mut T)) -> bool {
        let mut data = self.data.write();
        match data.get_mut(index) {
            Some(slot) => {
                f(slot);
                self.dirty.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Snapshot for the renderer, or `None` if nothing changed since the
    /// last snapshot.
    pub fn read_if_dirty(&self) -> Option<Vec<T>> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            Some(self.data.read().clone())
        } else {
            None
        }
    }

    pub fn read_all(&self) -> Vec<T> {
        self.data.read().clone()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn clear(&self) {
        self.data.write().clear();
        self.dirty.store(true, Ordering::Release);
    }

    /// Pending redraw, without taking the snapshot
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

/// One panel value (the indicator row) with the same redraw tracking as
/// [`DirtyVec`]
pub struct DirtyValue<T> {
    data: RwLock<T>,
    dirty: AtomicBool,
}

impl<T: Clone> DirtyValue<T> {
    pub fn new(initial: T) -> Self {
        Self {
            data: RwLock::new(initial),
            dirty: AtomicBool::new(false),
        }
    }

    /// Change part of the value, e.g. one indicator flag
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut *self.data.write());
        self.dirty.store(true, Ordering::Release);
    }

    /// Value for the renderer if it changed since the last call
    pub fn read_if_dirty(&self) -> Option<T> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            Some(self.data.read().clone())
        } else {
            None
        }
    }

    pub fn read(&self) -> T {
        self.data.read().clone()
    }
}

impl<T: Default> Default for DirtyValue<T> {
    fn default() -> Self {
        Self {
            data: RwLock::new(T::default()),
            dirty: AtomicBool::new(false),
        }
    }
}

/// Indicator panel: readiness flags and connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Indicators {
    pub flags: Flags,
    pub connection: Option<ConnectionState>,
}

/// The five throughput series, all keyed by `UPDATETIME`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Series {
    IncomingKbs,
    OutgoingKbs,
    OutgoingLimitKbs,
    OutgoingBufferKb,
    OutgoingMessageCount,
}

impl Series {
    pub const ALL: [Series; 5] = [
        Series::IncomingKbs,
        Series::OutgoingKbs,
        Series::OutgoingLimitKbs,
        Series::OutgoingBufferKb,
        Series::OutgoingMessageCount,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Series::IncomingKbs => "incoming KB/s",
            Series::OutgoingKbs => "outgoing KB/s",
            Series::OutgoingLimitKbs => "outgoing limit KB/s",
            Series::OutgoingBufferKb => "outgoing buffer KB",
            Series::OutgoingMessageCount => "outgoing messages",
        }
    }

    pub fn value(&self, sample: &Throughput) -> f64 {
        match self {
            Series::IncomingKbs => sample.incoming_kbs,
            Series::OutgoingKbs => sample.outgoing_kbs,
            Series::OutgoingLimitKbs => sample.outgoing_limit_kbs,
            Series::OutgoingBufferKb => sample.outgoing_buffer_kb,
            Series::OutgoingMessageCount => sample.outgoing_message_count,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// One plotted point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub time: f64,
    pub value: f64,
}

/// Unified state the renderer reads on its own schedule
pub struct SharedMonitorState {
    pub indicators: DirtyValue<Indicators>,

    /// Discovered hosts in first-seen order; never trimmed
    pub hosts: DirtyVec<DisplayedHost>,

    series: [DirtyVec<SeriesPoint>; 5],

    /// Application-host rate records
    pub net: DirtyVec<NetData>,
}

impl SharedMonitorState {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_SERIES_CAPACITY)
    }

    /// Create with a custom bound on points per series
    pub fn with_capacity(points: usize) -> Arc<Self> {
        Arc::new(Self {
            indicators: DirtyValue::default(),
            hosts: DirtyVec::new(usize::MAX),
            series: std::array::from_fn(|_| DirtyVec::new(points)),
            net: DirtyVec::new(points),
        })
    }

    pub fn series(&self, series: Series) -> &DirtyVec<SeriesPoint> {
        &self.series[series.index()]
    }

    /// Mirror one tick's events.
    pub fn apply_events(&self, events: &[StatusEvent]) {
        for event in events {
            match event {
                StatusEvent::FlagChanged { flag, new, .. } => {
                    let value = *new;
                    let flag = *flag;
                    self.indicators.update(|ind| match flag {
                        Flag::Worker => ind.flags.worker = value,
                        Flag::Coordinator => ind.flags.coordinator = value,
                        Flag::Resolved => ind.flags.resolved = value,
                        Flag::Connected => ind.flags.connected = value,
                    });
                }
                StatusEvent::ConnectionChanged { new, .. } => {
                    let state = *new;
                    self.indicators.update(|ind| ind.connection = Some(state));
                }
                StatusEvent::Sample(sample) => {
                    for series in Series::ALL {
                        self.series(series).push(SeriesPoint {
                            time: sample.update_time,
                            value: series.value(sample),
                        });
                    }
                }
                StatusEvent::NetSample(net) => self.net.push(net.clone()),
                StatusEvent::HostAdded { host, .. } => self.hosts.push(host.clone()),
                StatusEvent::HostUpdated { index, label, old_label } => {
                    if !self.hosts.modify(*index, |host| host.label = label.clone()) {
                        log::warn!("Host update for unknown index {} ({})", index, old_label);
                    }
                }
            }
        }
    }

    /// Drop every plotted point. A relaunched worker restarts its clock, so
    /// old points would sit on a different time axis.
    ///
    /// Hosts and indicators follow the poller's diff and are left alone.
    pub fn clear_plots(&self) {
        for series in &self.series {
            series.clear();
        }
        self.net.clear();
    }
}

impl Default for SharedMonitorState {
    fn default() -> Self {
        Self {
            indicators: DirtyValue::default(),
            hosts: DirtyVec::new(usize::MAX),
            series: std::array::from_fn(|_| DirtyVec::new(DEFAULT_SERIES_CAPACITY)),
            net: DirtyVec::new(DEFAULT_SERIES_CAPACITY),
        }
    }
}
