//! Supervisor profiles
//!
//! | Profile | Layout | Host label | Default worker | Console |
//! |---------|--------|------------|----------------|---------|
//! | `remote-controller` | 2 MiB duplex | with application | `remoteviewer` | hidden |
//! | `throughput` | 2 MiB duplex | plain | `appTransferTest` | shown |
//! | `application-host` | 1 MiB single | plain | `applicationhost` | hidden |

use clap::ValueEnum;
use serde::Deserialize;

use relay_ipc::{ChannelLayout, HostLabelStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Pick a discovered host and ask the viewer worker to connect to it
    #[default]
    RemoteController,
    /// Plot transfer throughput reported by the test worker
    Throughput,
    /// Host an application and report its outgoing rate
    ApplicationHost,
}

impl Profile {
    pub fn layout(&self) -> ChannelLayout {
        match self {
            Profile::RemoteController | Profile::Throughput => ChannelLayout::Duplex,
            Profile::ApplicationHost => ChannelLayout::Single,
        }
    }

    pub fn label_style(&self) -> HostLabelStyle {
        match self {
            Profile::RemoteController => HostLabelStyle::WithApplication,
            Profile::Throughput | Profile::ApplicationHost => HostLabelStyle::Plain,
        }
    }

    /// Worker binary used when none is configured
    pub fn default_worker(&self) -> &'static str {
        match self {
            Profile::RemoteController => "remoteviewer",
            Profile::Throughput => "appTransferTest",
            Profile::ApplicationHost => "applicationhost",
        }
    }

    /// Whether the worker console is shown without `--show-console`
    pub fn console_by_default(&self) -> bool {
        matches!(self, Profile::Throughput)
    }

    /// Whether the worker needs `-APP="<path>"`
    pub fn needs_app(&self) -> bool {
        matches!(self, Profile::ApplicationHost)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Profile::RemoteController => "remote-controller",
            Profile::Throughput => "throughput",
            Profile::ApplicationHost => "application-host",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Profile as ValueEnum>::from_str(s, true)
    }
}
