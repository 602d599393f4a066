//! Named shared memory region plus its paired named lock
//!
//! The supervisor creates the region under a fresh token and hands the token to
//! the worker as `-MEM=<token>`. The worker opens the segments `<token>` (data)
//! and `<token>_M` (lock) by name; there is no other handshake.
//!
//! The lock is a process-shared mutex living in its own small segment. Access
//! to the bytes only happens through [`RegionGuard`], which releases the mutex
//! when dropped, so every exit path unlocks it.

use std::io;
use std::time::{Duration, Instant};

use raw_sync::locks::{LockGuard, LockImpl, LockInit, Mutex};
use raw_sync::Timeout;
use shared_memory::{Shmem, ShmemConf};

use crate::error::{ChannelError, ChannelResult};

/// Suffix appended to the token to name the lock
pub const LOCK_SUFFIX: &str = "_M";

/// A mapped, token-named region shared with a worker process
pub struct SharedRegion {
    token: String,
    capacity: usize,
    // Dropped before the segment it lives in.
    lock: Box<dyn LockImpl>,
    _lock_mem: Shmem,
    data: Shmem,
}

fn alloc_err(name: &str, e: impl std::fmt::Display) -> ChannelError {
    ChannelError::Allocation {
        name: name.to_string(),
        source: io::Error::new(io::ErrorKind::Other, e.to_string()),
    }
}

impl SharedRegion {
    /// Allocate a zero-initialised region of exactly `capacity` bytes under a
    /// freshly generated token, plus its lock.
    pub fn create(capacity: usize) -> ChannelResult<Self> {
        let token = uuid::Uuid::new_v4().to_string();
        Self::create_named(token, capacity)
    }

    /// Allocate under a caller-chosen token. Fails if the name is taken.
    pub fn create_named(token: impl Into<String>, capacity: usize) -> ChannelResult<Self> {
        let token = token.into();
        let lock_id = lock_name(&token);

        let data = ShmemConf::new()
            .size(capacity)
            .os_id(&token)
            .create()
            .map_err(|e| alloc_err(&token, e))?;
        let lock_mem = ShmemConf::new()
            .size(Mutex::size_of(None))
            .os_id(&lock_id)
            .create()
            .map_err(|e| alloc_err(&lock_id, e))?;

        // SAFETY: `lock_mem` is a fresh segment of `Mutex::size_of` bytes and
        // outlives the mutex (field order in `SharedRegion`).
        let (lock, _) = unsafe { Mutex::new(lock_mem.as_ptr(), data.as_ptr()) }
            .map_err(|e| alloc_err(&lock_id, e))?;

        log::info!("Created channel {} ({} bytes)", token, capacity);
        Ok(Self {
            token,
            capacity,
            lock,
            _lock_mem: lock_mem,
            data,
        })
    }

    /// Attach to a region another process created under `token`.
    pub fn attach(token: impl Into<String>, capacity: usize) -> ChannelResult<Self> {
        let token = token.into();
        let lock_id = lock_name(&token);

        let data = ShmemConf::new()
            .os_id(&token)
            .open()
            .map_err(|e| alloc_err(&token, e))?;
        if data.len() < capacity {
            return Err(alloc_err(
                &token,
                format!("region is {} bytes, expected {}", data.len(), capacity),
            ));
        }

        let lock_mem = ShmemConf::new()
            .os_id(&lock_id)
            .open()
            .map_err(|e| alloc_err(&lock_id, e))?;

        // SAFETY: the creator initialised a mutex at the start of this segment.
        let (lock, _) = unsafe { Mutex::from_existing(lock_mem.as_ptr(), data.as_ptr()) }
            .map_err(|e| alloc_err(&lock_id, e))?;

        log::debug!("Attached to channel {}", token);
        Ok(Self {
            token,
            capacity,
            lock,
            _lock_mem: lock_mem,
            data,
        })
    }

    /// Token shared with the worker on its command line
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Name of the paired lock
    pub fn lock_name(&self) -> String {
        lock_name(&self.token)
    }

    /// Size of the region in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether this handle created (and will remove) the region
    pub fn is_owner(&self) -> bool {
        self.data.is_owner()
    }

    /// Take the named lock, waiting at most `timeout`.
    pub fn lock(&mut self, timeout: Duration) -> ChannelResult<RegionGuard<'_>> {
        let started = Instant::now();
        let Self {
            token,
            capacity,
            lock,
            data,
            ..
        } = self;

        let held = lock.try_lock(Timeout::Val(timeout)).map_err(|e| {
            if started.elapsed() >= timeout {
                ChannelError::LockTimeout { timeout }
            } else {
                ChannelError::Lock(io::Error::new(io::ErrorKind::Other, e.to_string()))
            }
        })?;

        // SAFETY: the mutex is held for as long as the slice is borrowed.
        let bytes = unsafe { &mut data.as_slice_mut()[..*capacity] };
        Ok(RegionGuard {
            token: token.as_str(),
            bytes,
            _held: held,
        })
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if self.is_owner() {
            log::debug!("Removing channel {}", self.token);
        }
    }
}

// SAFETY: the segments are only touched through a guard, which needs
// `&mut SharedRegion`, so the mutex is locked and released on one thread.
unsafe impl Send for SharedRegion {}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("token", &self.token)
            .field("capacity", &self.capacity)
            .field("owner", &self.is_owner())
            .finish()
    }
}

/// Scoped hold on the channel lock. Dropping it releases the lock.
pub struct RegionGuard<'a> {
    token: &'a str,
    bytes: &'a mut [u8],
    _held: LockGuard<'a>,
}

impl RegionGuard<'_> {
    /// The whole region
    pub fn bytes(&self) -> &[u8] {
        self.bytes
    }

    /// The whole region, writable
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

impl std::fmt::Debug for RegionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionGuard")
            .field("token", &self.token)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Lock name for a channel token
pub fn lock_name(token: &str) -> String {
    format!("{}{}", token, LOCK_SUFFIX)
}
