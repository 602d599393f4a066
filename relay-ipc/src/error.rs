//! Error types for the supervisor channel
//!
//! Only [`ChannelError::Allocation`] is fatal. Every other variant degrades to
//! "keep the previous state and try again next tick".

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the region, codec, transports and process service
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The OS could not create or map the shared region or its lock
    #[error("failed to allocate channel `{name}`: {source}")]
    Allocation {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Frame would not fit inside its sub-region
    #[error("frame of {needed} bytes exceeds sub-region capacity of {capacity} bytes")]
    CapacityExceeded { needed: usize, capacity: usize },

    /// Length prefix points past the end of the sub-region
    #[error("corrupt frame: length {length} exceeds the {available} bytes available")]
    CorruptFrame { length: usize, available: usize },

    /// Frames carry single-byte text only
    #[error("payload contains non-ASCII text")]
    NonAsciiPayload,

    /// Status text is not a JSON object of the expected shape
    #[error("malformed status payload: {0}")]
    MalformedStatus(#[from] serde_json::Error),

    /// The layout of this channel has no command range
    #[error("channel layout has no command range")]
    NoCommandRange,

    /// The named lock could not be taken within the configured timeout
    #[error("could not acquire channel lock within {timeout:?}")]
    LockTimeout { timeout: Duration },

    /// The named lock failed for a reason other than a timeout
    #[error("channel lock error: {0}")]
    Lock(#[source] std::io::Error),

    /// Creating or closing a worker process failed
    #[error("process error: {0}")]
    Process(#[source] std::io::Error),
}

impl ChannelError {
    /// True when the supervisor cannot continue without its channel
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChannelError::Allocation { .. })
    }

    /// True for lock failures that only cost the current tick
    pub fn is_lock_failure(&self) -> bool {
        matches!(self, ChannelError::LockTimeout { .. } | ChannelError::Lock(_))
    }
}

/// Result alias used throughout the crate
pub type ChannelResult<T> = Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_allocation_is_fatal() {
        let alloc = ChannelError::Allocation {
            name: "x".into(),
            source: std::io::Error::from(std::io::ErrorKind::OutOfMemory),
        };
        assert!(alloc.is_fatal());

        let timeout = ChannelError::LockTimeout {
            timeout: Duration::from_millis(5),
        };
        assert!(!timeout.is_fatal());
        assert!(timeout.is_lock_failure());

        let capacity = ChannelError::CapacityExceeded {
            needed: 10,
            capacity: 4,
        };
        assert!(!capacity.is_fatal());
        assert!(!capacity.is_lock_failure());
    }
}
