//! # Channel Transports
//!
//! The poller only sees two small traits:
//!
//! | Trait | Direction | Call |
//! |-------|-----------|------|
//! | [`ChannelSource`] | worker → supervisor | `poll_once()` once per tick |
//! | [`CommandSink`] | supervisor → worker | `send_command()` on user action |
//!
//! [`SharedMemoryChannel`] is the real transport over a [`SharedRegion`].
//! [`InMemoryChannel`] keeps the same layout and lock discipline inside one
//! process, so the mapper and poller can run without OS shared memory.
//!
//! Both transports hold the lock only for the raw byte copy; decoding the
//! status text happens after the guard is dropped.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{ChannelError, ChannelResult};
use crate::frame::{clear_frame, read_frame, write_frame};
use crate::layout::ChannelLayout;
use crate::region::SharedRegion;
use crate::status::StatusSnapshot;

/// Default bound on how long a tick waits for the channel lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Where status snapshots come from
pub trait ChannelSource {
    /// Read and decode the current status frame. `Ok(None)` means nothing new.
    fn poll_once(&mut self) -> ChannelResult<Option<StatusSnapshot>>;
}

/// Where commands for the worker go
pub trait CommandSink {
    /// Write `text` into the command range. There is no acknowledgement.
    fn send_command(&mut self, text: &str) -> ChannelResult<()>;
}

fn decode(text: Option<String>) -> ChannelResult<Option<StatusSnapshot>> {
    text.map(|t| StatusSnapshot::decode(&t)).transpose()
}

/// Channel over named shared memory
#[derive(Debug)]
pub struct SharedMemoryChannel {
    region: SharedRegion,
    layout: ChannelLayout,
    lock_timeout: Duration,
}

impl SharedMemoryChannel {
    /// Allocate a fresh region sized for `layout`.
    pub fn create(layout: ChannelLayout, lock_timeout: Duration) -> ChannelResult<Self> {
        let region = SharedRegion::create(layout.capacity())?;
        Ok(Self {
            region,
            layout,
            lock_timeout,
        })
    }

    /// Attach to a region created by another process (the worker side).
    pub fn attach(
        token: impl Into<String>,
        layout: ChannelLayout,
        lock_timeout: Duration,
    ) -> ChannelResult<Self> {
        let region = SharedRegion::attach(token, layout.capacity())?;
        Ok(Self {
            region,
            layout,
            lock_timeout,
        })
    }

    /// Token to pass to the worker as `-MEM=<token>`
    pub fn token(&self) -> &str {
        self.region.token()
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Worker side: publish a status frame.
    pub fn write_status(&mut self, text: &str) -> ChannelResult<()> {
        let range = self.layout.status_range();
        let mut guard = self.region.lock(self.lock_timeout)?;
        write_frame(&mut guard.bytes_mut()[range], text)
    }

    /// Worker side: read the pending command and clear it.
    pub fn take_command(&mut self) -> ChannelResult<Option<String>> {
        let range = self.layout.command_range().ok_or(ChannelError::NoCommandRange)?;
        let mut guard = self.region.lock(self.lock_timeout)?;
        let bytes = &mut guard.bytes_mut()[range];
        let command = read_frame(bytes)?;
        clear_frame(bytes);
        Ok(command)
    }
}

impl ChannelSource for SharedMemoryChannel {
    fn poll_once(&mut self) -> ChannelResult<Option<StatusSnapshot>> {
        let range = self.layout.status_range();
        let text = {
            let guard = self.region.lock(self.lock_timeout)?;
            read_frame(&guard.bytes()[range])?
        };
        decode(text)
    }
}

impl CommandSink for SharedMemoryChannel {
    fn send_command(&mut self, text: &str) -> ChannelResult<()> {
        let range = self.layout.command_range().ok_or(ChannelError::NoCommandRange)?;
        let mut guard = self.region.lock(self.lock_timeout)?;
        write_frame(&mut guard.bytes_mut()[range], text)
    }
}

/// Channel over a process-local buffer. Clones share the same buffer, so one
/// clone can play the worker while another is polled.
#[derive(Clone)]
pub struct InMemoryChannel {
    bytes: Arc<Mutex<Vec<u8>>>,
    layout: ChannelLayout,
    lock_timeout: Duration,
}

impl InMemoryChannel {
    pub fn new(layout: ChannelLayout, lock_timeout: Duration) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(vec![0; layout.capacity()])),
            layout,
            lock_timeout,
        }
    }

    fn lock(&self) -> ChannelResult<parking_lot::MutexGuard<'_, Vec<u8>>> {
        self.bytes
            .try_lock_for(self.lock_timeout)
            .ok_or(ChannelError::LockTimeout {
                timeout: self.lock_timeout,
            })
    }

    /// Hold the lock until the returned guard drops (for contention tests).
    pub fn hold(&self) -> ChannelResult<parking_lot::MutexGuard<'_, Vec<u8>>> {
        self.lock()
    }

    /// Worker side: publish a status frame.
    pub fn write_status(&self, text: &str) -> ChannelResult<()> {
        let range = self.layout.status_range();
        let mut bytes = self.lock()?;
        write_frame(&mut bytes[range], text)
    }

    /// Worker side: overwrite the raw status range (for corrupt-frame tests).
    pub fn write_raw_status(&self, raw: &[u8]) -> ChannelResult<()> {
        let start = self.layout.status_range().start;
        let mut bytes = self.lock()?;
        bytes[start..start + raw.len()].copy_from_slice(raw);
        Ok(())
    }

    /// Worker side: read the pending command and clear it.
    pub fn take_command(&self) -> ChannelResult<Option<String>> {
        let range = self.layout.command_range().ok_or(ChannelError::NoCommandRange)?;
        let mut bytes = self.lock()?;
        let command = read_frame(&bytes[range.clone()])?;
        clear_frame(&mut bytes[range]);
        Ok(command)
    }
}

impl ChannelSource for InMemoryChannel {
    fn poll_once(&mut self) -> ChannelResult<Option<StatusSnapshot>> {
        let range = self.layout.status_range();
        let text = {
            let bytes = self.lock()?;
            read_frame(&bytes[range])?
        };
        decode(text)
    }
}

impl CommandSink for InMemoryChannel {
    fn send_command(&mut self, text: &str) -> ChannelResult<()> {
        let range = self.layout.command_range().ok_or(ChannelError::NoCommandRange)?;
        let mut bytes = self.lock()?;
        write_frame(&mut bytes[range], text)
    }
}
