//! Length-prefixed text frames
//!
//! A frame is `[u32 little-endian length][length bytes of ASCII text]` at the
//! start of a sub-range. A zero length means "nothing new" and decodes to
//! `None`, which is distinct from `Some(String::new())`.
//!
//! Both functions operate on the sub-range slice, so the caller picks the
//! offset by slicing the region (`&region[layout.status_range()]`). The
//! caller must hold the channel lock while either runs.

use std::borrow::Cow;

use crate::error::{ChannelError, ChannelResult};
use crate::layout::LENGTH_PREFIX;

/// Replace every non-ASCII character with `?` so `text` can be framed.
///
/// Workers match connect commands on the GUID prefix, so a host name with
/// accents still selects the right host.
pub fn ascii_lossy(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if c.is_ascii() { c } else { '?' })
            .collect(),
    )
}

/// Encode `text` at the start of `range`.
pub fn write_frame(range: &mut [u8], text: &str) -> ChannelResult<()> {
    if !text.is_ascii() {
        return Err(ChannelError::NonAsciiPayload);
    }

    let needed = LENGTH_PREFIX + text.len();
    if needed > range.len() {
        return Err(ChannelError::CapacityExceeded {
            needed,
            capacity: range.len(),
        });
    }

    let length = u32::try_from(text.len()).map_err(|_| ChannelError::CapacityExceeded {
        needed,
        capacity: u32::MAX as usize,
    })?;

    range[..LENGTH_PREFIX].copy_from_slice(&length.to_le_bytes());
    range[LENGTH_PREFIX..needed].copy_from_slice(text.as_bytes());
    Ok(())
}

/// Decode the frame at the start of `range`.
///
/// Returns `Ok(None)` for a zero length and `CorruptFrame` when the length
/// runs past the end of the range.
pub fn read_frame(range: &[u8]) -> ChannelResult<Option<String>> {
    if range.len() < LENGTH_PREFIX {
        return Err(ChannelError::CorruptFrame {
            length: LENGTH_PREFIX,
            available: range.len(),
        });
    }

    let mut prefix = [0u8; LENGTH_PREFIX];
    prefix.copy_from_slice(&range[..LENGTH_PREFIX]);
    let length = u32::from_le_bytes(prefix) as usize;

    if length == 0 {
        return Ok(None);
    }

    let available = range.len() - LENGTH_PREFIX;
    if length > available {
        return Err(ChannelError::CorruptFrame { length, available });
    }

    let body = &range[LENGTH_PREFIX..LENGTH_PREFIX + length];
    Ok(Some(String::from_utf8_lossy(body).into_owned()))
}

/// Reset the frame at the start of `range` to "no data".
pub fn clear_frame(range: &mut [u8]) {
    let end = range.len().min(LENGTH_PREFIX);
    range[..end].fill(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_returns_identical_text() {
        let mut range = vec![0u8; 256];
        let text = r#"{"COORD":true,"HOSTS":[]}"#;

        write_frame(&mut range, text).unwrap();
        assert_eq!(read_frame(&range).unwrap().as_deref(), Some(text));
        assert_eq!(&range[..4], &(text.len() as u32).to_le_bytes());
    }

    #[test]
    fn zeroed_range_reads_as_no_data() {
        let range = vec![0u8; 64];
        assert_eq!(read_frame(&range).unwrap(), None);
    }

    #[test]
    fn empty_text_writes_zero_length() {
        // a zero length is indistinguishable from "nothing new"
        let mut range = vec![0xAAu8; 16];
        write_frame(&mut range, "").unwrap();
        assert_eq!(read_frame(&range).unwrap(), None);
    }

    #[test]
    fn capacity_boundary() {
        let capacity = 32;
        let mut range = vec![0u8; capacity];

        let fits = "x".repeat(capacity - 4);
        write_frame(&mut range, &fits).unwrap();
        assert_eq!(read_frame(&range).unwrap(), Some(fits));

        let too_long = "x".repeat(capacity - 3);
        match write_frame(&mut range, &too_long) {
            Err(ChannelError::CapacityExceeded { needed, capacity: cap }) => {
                assert_eq!(needed, capacity + 1);
                assert_eq!(cap, capacity);
            }
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
    }

    #[test]
    fn failed_write_leaves_previous_frame_intact() {
        let mut range = vec![0u8; 16];
        write_frame(&mut range, "keep").unwrap();
        assert!(write_frame(&mut range, &"y".repeat(13)).is_err());
        assert_eq!(read_frame(&range).unwrap().as_deref(), Some("keep"));
    }

    #[test]
    fn oversized_length_is_corrupt() {
        let mut range = vec![0u8; 16];
        range[..4].copy_from_slice(&100u32.to_le_bytes());

        match read_frame(&range) {
            Err(ChannelError::CorruptFrame { length, available }) => {
                assert_eq!(length, 100);
                assert_eq!(available, 12);
            }
            other => panic!("expected CorruptFrame, got {other:?}"),
        }
    }

    #[test]
    fn truncated_range_is_corrupt() {
        assert!(matches!(
            read_frame(&[1, 0]),
            Err(ChannelError::CorruptFrame { .. })
        ));
    }

    #[test]
    fn non_ascii_is_rejected() {
        let mut range = vec![0u8; 32];
        assert!(matches!(
            write_frame(&mut range, "héllo"),
            Err(ChannelError::NonAsciiPayload)
        ));
    }

    #[test]
    fn ascii_lossy_substitutes_per_character() {
        assert!(matches!(ascii_lossy("g1:box"), Cow::Borrowed("g1:box")));
        assert_eq!(ascii_lossy("3f2a:caf\u{e9}"), "3f2a:caf?");
        assert_eq!(ascii_lossy("\u{1f600} hi \u{4e16}\u{754c}"), "? hi ??");

        let mut range = vec![0u8; 32];
        write_frame(&mut range, &ascii_lossy("h\u{e9}llo")).unwrap();
        assert_eq!(read_frame(&range).unwrap().as_deref(), Some("h?llo"));
    }

    #[test]
    fn trailing_bytes_after_length_are_ignored() {
        // workers write a NUL terminator that the length does not count
        let mut range = vec![0u8; 32];
        range[..4].copy_from_slice(&2u32.to_le_bytes());
        range[4..7].copy_from_slice(b"ok\0");
        assert_eq!(read_frame(&range).unwrap().as_deref(), Some("ok"));
    }

    #[test]
    fn clear_resets_to_no_data() {
        let mut range = vec![0u8; 32];
        write_frame(&mut range, "abc").unwrap();
        clear_frame(&mut range);
        assert_eq!(read_frame(&range).unwrap(), None);
    }
}
