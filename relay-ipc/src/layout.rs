//! Byte layout of a channel region
//!
//! ```text
//! Single (1 MiB)              Duplex (2 MiB)
//! ┌──────────────────┐ 0      ┌──────────────────┐ 0
//! │ status range     │        │ status range     │
//! │                  │        ├──────────────────┤ 1 MiB
//! │                  │        │ command range    │
//! └──────────────────┘ 1 MiB  └──────────────────┘ 2 MiB
//! ```
//!
//! Each range holds one frame: `u32` little-endian length, then the text.

use std::ops::Range;

/// One mebibyte
pub const MIB: usize = 1024 * 1024;

/// Offset of the command range in the duplex layout
pub const COMMAND_OFFSET: usize = MIB;

/// Size of a frame's length prefix
pub const LENGTH_PREFIX: usize = 4;

/// Region layouts used by the supervisor profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelLayout {
    /// 1 MiB status-only region (application host)
    Single,
    /// 2 MiB region with a command range at 1 MiB
    #[default]
    Duplex,
}

impl ChannelLayout {
    /// Total bytes the region must be allocated with
    pub fn capacity(&self) -> usize {
        match self {
            ChannelLayout::Single => MIB,
            ChannelLayout::Duplex => 2 * MIB,
        }
    }

    /// Byte range the worker writes status into
    pub fn status_range(&self) -> Range<usize> {
        match self {
            ChannelLayout::Single => 0..MIB,
            ChannelLayout::Duplex => 0..COMMAND_OFFSET,
        }
    }

    /// Byte range the supervisor writes commands into, if any
    pub fn command_range(&self) -> Option<Range<usize>> {
        match self {
            ChannelLayout::Single => None,
            ChannelLayout::Duplex => Some(COMMAND_OFFSET..2 * MIB),
        }
    }

    /// Longest text a status frame can carry
    pub fn max_status_text(&self) -> usize {
        self.status_range().len() - LENGTH_PREFIX
    }
}
