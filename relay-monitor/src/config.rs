//! Monitor configuration
//!
//! Layers, lowest priority first:
//!
//! 1. Built-in defaults (from the profile)
//! 2. TOML file: `--config <FILE>` or `<config dir>/relay-monitor/config.toml`
//! 3. `RELAY_*` environment variables
//! 4. Command-line flags
//!
//! ```toml
//! profile = "application-host"
//! worker = "/opt/relay/applicationhost"
//! app = "/opt/game/run"
//! show_console = false
//! lock_timeout_ms = 1000
//! series_capacity = 600
//! companions = ["/opt/relay/simpleconnectioncoordinator"]
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

use relay_ipc::shared_state::DEFAULT_SERIES_CAPACITY;
use relay_ipc::DEFAULT_LOCK_TIMEOUT;

use crate::cli::Args;
use crate::profile::Profile;

/// Contents of the TOML file; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub profile: Option<Profile>,
    pub worker: Option<PathBuf>,
    pub app: Option<PathBuf>,
    pub show_console: Option<bool>,
    pub lock_timeout_ms: Option<u64>,
    pub series_capacity: Option<usize>,
    /// Extra processes started alongside the worker, without arguments
    pub companions: Vec<PathBuf>,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// `<config dir>/relay-monitor/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("relay-monitor").join("config.toml"))
    }
}

/// Overrides read from `RELAY_*` environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub profile: Option<Profile>,
    pub worker: Option<PathBuf>,
    pub app: Option<PathBuf>,
    pub show_console: Option<bool>,
    pub lock_timeout_ms: Option<u64>,
}

impl EnvOverrides {
    /// Load overrides from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            profile: lookup("RELAY_PROFILE").and_then(|s| match s.parse() {
                Ok(profile) => Some(profile),
                Err(e) => {
                    log::warn!("Ignoring RELAY_PROFILE: {}", e);
                    None
                }
            }),
            worker: lookup("RELAY_WORKER").map(PathBuf::from),
            app: lookup("RELAY_APP").map(PathBuf::from),
            show_console: lookup("RELAY_SHOW_CONSOLE")
                .map(|s| s.to_lowercase() != "false" && s != "0"),
            lock_timeout_ms: lookup("RELAY_LOCK_TIMEOUT_MS").and_then(|s| s.parse().ok()),
        }
    }
}

/// Resolved settings the monitor runs with
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub profile: Profile,
    pub worker: PathBuf,
    pub app: Option<PathBuf>,
    pub show_console: bool,
    pub lock_timeout: Duration,
    pub series_capacity: usize,
    pub companions: Vec<PathBuf>,
    /// Launch the worker at startup
    pub launch: bool,
}

impl MonitorConfig {
    /// Resolve every layer for `args`.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => match FileConfig::default_path() {
                Some(path) if path.exists() => {
                    log::debug!("Using config file {}", path.display());
                    FileConfig::load(&path)?
                }
                _ => FileConfig::default(),
            },
        };
        Self::resolve(file, EnvOverrides::from_env(), args)
    }

    /// Merge the layers; later layers win.
    pub fn resolve(file: FileConfig, env: EnvOverrides, args: &Args) -> anyhow::Result<Self> {
        let profile = args
            .profile
            .or(env.profile)
            .or(file.profile)
            .unwrap_or_default();

        let worker = args
            .worker
            .clone()
            .or(env.worker)
            .or(file.worker)
            .unwrap_or_else(|| PathBuf::from(profile.default_worker()));

        let app = args.app.clone().or(env.app).or(file.app);
        if profile.needs_app() && app.is_none() {
            bail!("profile `{}` needs an application path (--app)", profile);
        }
        if !profile.needs_app() && app.is_some() {
            log::warn!("Profile `{}` does not pass an application to the worker", profile);
        }

        let show_console = args.show_console
            || env
                .show_console
                .or(file.show_console)
                .unwrap_or_else(|| profile.console_by_default());

        let lock_timeout = args
            .lock_timeout_ms
            .or(env.lock_timeout_ms)
            .or(file.lock_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_LOCK_TIMEOUT);

        Ok(Self {
            profile,
            worker,
            app: if profile.needs_app() { app } else { None },
            show_console,
            lock_timeout,
            series_capacity: file.series_capacity.unwrap_or(DEFAULT_SERIES_CAPACITY),
            companions: file.companions,
            launch: !args.no_launch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> EnvOverrides {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvOverrides::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_follow_profile() {
        let config =
            MonitorConfig::resolve(FileConfig::default(), EnvOverrides::default(), &Args::default())
                .unwrap();

        assert_eq!(config.profile, Profile::RemoteController);
        assert_eq!(config.worker, PathBuf::from("remoteviewer"));
        assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
        assert!(!config.show_console);
        assert!(config.launch);
    }

    #[test]
    fn file_is_parsed() {
        let file: FileConfig = toml::from_str(
            r#"
            profile = "throughput"
            lock_timeout_ms = 50
            series_capacity = 10
            companions = ["coordinator"]
            "#,
        )
        .unwrap();

        let config = MonitorConfig::resolve(file, EnvOverrides::default(), &Args::default())
            .unwrap();
        assert_eq!(config.profile, Profile::Throughput);
        assert_eq!(config.worker, PathBuf::from("appTransferTest"));
        assert_eq!(config.lock_timeout, Duration::from_millis(50));
        assert_eq!(config.series_capacity, 10);
        assert_eq!(config.companions, vec![PathBuf::from("coordinator")]);
        assert!(config.show_console);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("colour = true").is_err());
    }

    #[test]
    fn env_beats_file_and_cli_beats_env() {
        let file = FileConfig {
            worker: Some("from-file".into()),
            lock_timeout_ms: Some(10),
            ..FileConfig::default()
        };
        let env = env_of(&[("RELAY_WORKER", "from-env"), ("RELAY_LOCK_TIMEOUT_MS", "20")]);

        let config = MonitorConfig::resolve(file.clone(), env.clone(), &Args::default()).unwrap();
        assert_eq!(config.worker, PathBuf::from("from-env"));
        assert_eq!(config.lock_timeout, Duration::from_millis(20));

        let args = Args {
            worker: Some("from-cli".into()),
            lock_timeout_ms: Some(30),
            ..Args::default()
        };
        let config = MonitorConfig::resolve(file, env, &args).unwrap();
        assert_eq!(config.worker, PathBuf::from("from-cli"));
        assert_eq!(config.lock_timeout, Duration::from_millis(30));
    }

    #[test]
    fn application_host_requires_app() {
        let args = Args {
            profile: Some(Profile::ApplicationHost),
            ..Args::default()
        };
        assert!(MonitorConfig::resolve(FileConfig::default(), EnvOverrides::default(), &args)
            .is_err());

        let env = env_of(&[("RELAY_APP", "/opt/game/run")]);
        let config = MonitorConfig::resolve(FileConfig::default(), env, &args).unwrap();
        assert_eq!(config.app, Some(PathBuf::from("/opt/game/run")));
    }

    #[test]
    fn env_flags_parse() {
        let env = env_of(&[
            ("RELAY_PROFILE", "application-host"),
            ("RELAY_SHOW_CONSOLE", "0"),
            ("RELAY_LOCK_TIMEOUT_MS", "soon"),
        ]);
        assert_eq!(env.profile, Some(Profile::ApplicationHost));
        assert_eq!(env.show_console, Some(false));
        assert_eq!(env.lock_timeout_ms, None);

        assert_eq!(env_of(&[("RELAY_PROFILE", "nope")]).profile, None);
    }

    #[test]
    fn no_launch_flag() {
        let args = Args {
            no_launch: true,
            ..Args::default()
        };
        let config =
            MonitorConfig::resolve(FileConfig::default(), EnvOverrides::default(), &args).unwrap();
        assert!(!config.launch);
    }
}
