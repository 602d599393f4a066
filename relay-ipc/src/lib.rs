//! # Relay IPC
//!
//! Status/command channel between a supervisor and the worker process it
//! launches. The supervisor allocates a named shared memory region plus a
//! named lock, passes the region token to the worker as `-MEM=<token>`, and
//! then polls the status frame the worker keeps overwriting.
//!
//! ## Architecture
//!
//! ```text
//! Worker process                      Supervisor
//!   │ writes status frame               │
//!   ▼                                   │
//! SharedRegion [status | command] ◀─── Poller::tick (every 250 ms)
//!   ▲                                   │  ├── ProcessLifecycle::is_running
//!   │ reads command frame               │  ├── ChannelSource::poll_once
//!   │                                   │  └── apply_tick → StatusEvent
//!   └──── CommandSink::send_command ◀───┘
//!                                            ↓
//!                                   SharedMonitorState (dirty tracked)
//! ```
//!
//! ## Frame Layout
//!
//! Each sub-region holds `[u32 LE length][length bytes of ASCII text]`.
//! A zero length means "nothing new". The status range starts at offset 0;
//! the command range starts at [`COMMAND_OFFSET`] in the 2 MiB layout.

pub mod error;
pub mod frame;
pub mod layout;
pub mod poller;
pub mod process;
pub mod region;
pub mod shared_state;
pub mod source;
pub mod state;
pub mod status;

// Re-exports
pub use error::{ChannelError, ChannelResult};
pub use frame::{clear_frame, read_frame, write_frame};
pub use layout::{ChannelLayout, COMMAND_OFFSET, LENGTH_PREFIX, MIB};
pub use poller::{ConnectOutcome, Poller, PollerState, WorkerLaunch, TICK_INTERVAL};
pub use process::{LocalProcessService, ProcessLifecycle, WorkerArgs, WorkerHandle};
pub use region::{RegionGuard, SharedRegion, LOCK_SUFFIX};
pub use shared_state::{DirtyValue, DirtyVec, Indicators, Series, SeriesPoint, SharedMonitorState};
pub use source::{
    ChannelSource, CommandSink, InMemoryChannel, SharedMemoryChannel, DEFAULT_LOCK_TIMEOUT,
};
pub use state::{apply_tick, DisplayedHost, Flag, Flags, Observation, StatusEvent, SupervisorState};
pub use status::{ConnectionState, HostEntry, HostLabelStyle, NetData, StatusSnapshot, Throughput};

/// Command-line prefix that carries the region token to the worker
pub const MEM_ARG_PREFIX: &str = "-MEM=";

/// Command-line prefix that carries the hosted application path
pub const APP_ARG_PREFIX: &str = "-APP=";

/// Extract the region token from a worker's command line.
///
/// Workers use this to find the region the supervisor created for them.
pub fn token_from_args<I, S>(args: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .find_map(|arg| arg.as_ref().strip_prefix(MEM_ARG_PREFIX).map(str::to_owned))
        .filter(|token| !token.is_empty())
}

/// Extract the hosted application path from a worker's command line.
pub fn app_from_args<I, S>(args: I) -> Option<std::path::PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .find_map(|arg| arg.as_ref().strip_prefix(APP_ARG_PREFIX).map(Into::into))
        .filter(|path: &std::path::PathBuf| !path.as_os_str().is_empty())
}
