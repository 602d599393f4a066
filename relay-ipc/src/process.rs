//! Worker process lifecycle
//!
//! The supervisor only needs three operations from the platform: start a
//! worker, ask whether it is still alive, and close it. Liveness is queried
//! every tick and never cached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::error::{ChannelError, ChannelResult};

/// Opaque process id; zero means "no process"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WorkerHandle(u32);

impl WorkerHandle {
    pub const NONE: WorkerHandle = WorkerHandle(0);

    pub fn from_pid(pid: u32) -> Self {
        WorkerHandle(pid)
    }

    pub fn pid(&self) -> Option<u32> {
        (self.0 != 0).then_some(self.0)
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Platform service that owns worker processes
pub trait ProcessLifecycle {
    /// Start `path` with `args`. `visible` keeps the worker's console output.
    fn create_process(
        &mut self,
        path: &Path,
        args: &[String],
        visible: bool,
    ) -> ChannelResult<WorkerHandle>;

    /// Whether the process behind `handle` is still running
    fn is_running(&mut self, handle: WorkerHandle) -> bool;

    /// Terminate the process behind `handle`
    fn close(&mut self, handle: WorkerHandle);
}

/// Arguments a worker expects on its command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerArgs {
    pub token: String,
    pub app: Option<PathBuf>,
}

impl WorkerArgs {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            app: None,
        }
    }

    pub fn with_app(mut self, app: impl Into<PathBuf>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// `-MEM=<token>` first, then `-APP=<path>` when hosting an application.
    ///
    /// Each entry is one argv element, so the path is passed unquoted.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![format!("{}{}", crate::MEM_ARG_PREFIX, self.token)];
        if let Some(app) = &self.app {
            args.push(format!("{}{}", crate::APP_ARG_PREFIX, app.display()));
        }
        args
    }
}

/// [`ProcessLifecycle`] over `std::process`, with `sysinfo` answering for
/// pids this service did not spawn itself.
pub struct LocalProcessService {
    children: HashMap<u32, Child>,
    system: System,
}

impl LocalProcessService {
    pub fn new() -> Self {
        Self {
            children: HashMap::new(),
            system: System::new(),
        }
    }

    /// Close every child this service started
    pub fn close_all(&mut self) {
        let pids: Vec<u32> = self.children.keys().copied().collect();
        for pid in pids {
            self.close(WorkerHandle::from_pid(pid));
        }
    }
}

impl Default for LocalProcessService {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLifecycle for LocalProcessService {
    fn create_process(
        &mut self,
        path: &Path,
        args: &[String],
        visible: bool,
    ) -> ChannelResult<WorkerHandle> {
        let mut command = Command::new(path);
        command.args(args).stdin(Stdio::null());
        if !visible {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let child = command.spawn().map_err(ChannelError::Process)?;
        let pid = child.id();
        log::info!("Started {} ({})", path.display(), WorkerHandle::from_pid(pid));
        self.children.insert(pid, child);
        Ok(WorkerHandle::from_pid(pid))
    }

    fn is_running(&mut self, handle: WorkerHandle) -> bool {
        let Some(pid) = handle.pid() else {
            return false;
        };

        if let Some(child) = self.children.get_mut(&pid) {
            return match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    log::info!("Worker {} exited: {}", handle, status);
                    self.children.remove(&pid);
                    false
                }
                Err(e) => {
                    log::warn!("Failed to query worker {}: {}", handle, e);
                    false
                }
            };
        }

        let pid = Pid::from_u32(pid);
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        self.system.process(pid).is_some()
    }

    fn close(&mut self, handle: WorkerHandle) {
        let Some(pid) = handle.pid() else {
            return;
        };

        if let Some(mut child) = self.children.remove(&pid) {
            if let Err(e) = child.kill() {
                log::debug!("Kill {} failed: {}", handle, e);
            }
            if let Err(e) = child.wait() {
                log::warn!("Failed to reap worker {}: {}", handle, e);
            }
            log::info!("Closed worker {}", handle);
            return;
        }

        let pid = Pid::from_u32(pid);
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        if let Some(process) = self.system.process(pid) {
            if process.kill() {
                log::info!("Closed worker {}", handle);
            } else {
                log::warn!("Failed to signal worker {}", handle);
            }
        }
    }
}

impl Drop for LocalProcessService {
    fn drop(&mut self) {
        self.close_all();
    }
}
