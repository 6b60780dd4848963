//! Per-message provenance ledger.
//!
//! Each in-flight message carries up to [`MESSAGE_HISTORY_LENGTH`]
//! `(source_id, source_index)` pairs naming the pipeline stages it passed
//! through, plus up to twice that many nanosecond timings. The ledger is
//! array-backed with fixed capacity: overflowing it means the deployment's
//! chained-hop count was mis-sized, which is a configuration error, so both
//! `add_source` and `add_timing` panic rather than grow.
//!
//! Instances are caller-owned scratch: a worker resets the same ledger at
//! the start of each inbound message and must never share it across threads
//! or retain it past the message's processing scope.

use alloc::string::String;

use crate::error::{WireError, WireResult};
use crate::value::{ValueIn, ValueOut};

/// Maximum number of `(source_id, source_index)` pairs per message.
pub const MESSAGE_HISTORY_LENGTH: usize = 128;

const TIMINGS_LENGTH: usize = MESSAGE_HISTORY_LENGTH * 2;

// -----------------------------------------------------------------------------
// MessageHistory

/// A bounded, append-only ledger of message provenance.
///
/// # Example
///
/// ```
/// use ww_wire::history::MessageHistory;
///
/// let mut history = MessageHistory::new();
/// history.reset_with(7, 42);
/// assert_eq!(history.source_count(), 1);
/// assert_eq!(history.timing_count(), 1); // the capture timestamp
/// assert!(history.is_dirty());
/// ```
pub struct MessageHistory {
    source_ids: [i32; MESSAGE_HISTORY_LENGTH],
    source_indexes: [i64; MESSAGE_HISTORY_LENGTH],
    sources: usize,
    timings: [i64; TIMINGS_LENGTH],
    timing_count: usize,
    dirty: bool,
}

impl Default for MessageHistory {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHistory {
    /// Creates an empty ledger.
    pub const fn new() -> Self {
        Self {
            source_ids: [0; MESSAGE_HISTORY_LENGTH],
            source_indexes: [0; MESSAGE_HISTORY_LENGTH],
            sources: 0,
            timings: [0; TIMINGS_LENGTH],
            timing_count: 0,
            dirty: false,
        }
    }

    /// Clears the ledger entirely (the end-of-processing reset).
    pub fn reset(&mut self) {
        self.sources = 0;
        self.timing_count = 0;
        self.dirty = false;
    }

    /// Starts a new message: a single source pair plus the capture
    /// timestamp.
    pub fn reset_with(&mut self, source_id: i32, source_index: i64) {
        self.sources = 1;
        self.source_ids[0] = source_id;
        self.source_indexes[0] = source_index;
        self.timing_count = 1;
        self.timings[0] = now_nanos();
        self.dirty = true;
    }

    /// Appends a source pair.
    ///
    /// # Panics
    ///
    /// Panics when the ledger already holds [`MESSAGE_HISTORY_LENGTH`]
    /// pairs.
    pub fn add_source(&mut self, source_id: i32, source_index: i64) {
        assert!(
            self.sources < MESSAGE_HISTORY_LENGTH,
            "message history exceeded {MESSAGE_HISTORY_LENGTH} sources"
        );
        self.source_ids[self.sources] = source_id;
        self.source_indexes[self.sources] = source_index;
        self.sources += 1;
        self.dirty = true;
    }

    /// Appends a timing entry (nanoseconds).
    ///
    /// # Panics
    ///
    /// Panics when the ledger already holds `2 *`
    /// [`MESSAGE_HISTORY_LENGTH`] timings.
    pub fn add_timing(&mut self, nanos: i64) {
        assert!(
            self.timing_count < TIMINGS_LENGTH,
            "message history exceeded {TIMINGS_LENGTH} timings"
        );
        self.timings[self.timing_count] = nanos;
        self.timing_count += 1;
        self.dirty = true;
    }

    /// The number of recorded source pairs.
    #[inline]
    pub const fn source_count(&self) -> usize {
        self.sources
    }

    /// The number of recorded timings.
    #[inline]
    pub const fn timing_count(&self) -> usize {
        self.timing_count
    }

    /// The `i`-th source pair.
    pub fn source(&self, i: usize) -> Option<(i32, i64)> {
        (i < self.sources).then(|| (self.source_ids[i], self.source_indexes[i]))
    }

    /// The most recently appended source pair.
    pub fn last_source(&self) -> Option<(i32, i64)> {
        self.sources.checked_sub(1).and_then(|i| self.source(i))
    }

    /// The `i`-th timing.
    pub fn timing(&self, i: usize) -> Option<i64> {
        (i < self.timing_count).then(|| self.timings[i])
    }

    /// Whether the trailing source ids match `suffix` — the "has this chain
    /// of stages already processed me" probe. A probe longer than the ledger
    /// is `false`.
    pub fn source_ids_ends_with(&self, suffix: &[i32]) -> bool {
        if suffix.len() > self.sources {
            return false;
        }
        self.source_ids[self.sources - suffix.len()..self.sources] == *suffix
    }

    /// Whether appends have happened since the last [`write_to`](Self::write_to).
    #[inline]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    // -------------------------------------------------------------------------
    // Serialization

    /// Serializes the ledger as two parallel sequences, appending one extra
    /// timing for the flush instant first.
    ///
    /// The append makes this deliberately non-idempotent: writing twice
    /// without a reset records (and serializes) one more timing each call,
    /// capturing end-to-end latency up to each write.
    pub fn write_to(&mut self, out: &mut dyn ValueOut) -> WireResult<()> {
        self.add_timing(now_nanos());
        out.write_key("sources")?;
        out.leaf(true);
        let (ids, indexes, sources) = (&self.source_ids, &self.source_indexes, self.sources);
        out.sequence(&mut |o| {
            for i in 0..sources {
                o.int32(ids[i])?;
                o.int64(indexes[i])?;
            }
            Ok(())
        })?;
        out.write_key("timings")?;
        out.leaf(true);
        let (timings, count) = (&self.timings, self.timing_count);
        out.sequence(&mut |o| {
            for i in 0..count {
                o.int64(timings[i])?;
            }
            Ok(())
        })?;
        self.dirty = false;
        Ok(())
    }

    /// Replaces this ledger with the one serialized in `reader`.
    pub fn read_from(&mut self, reader: &mut dyn ValueIn) -> WireResult<()> {
        self.reset();
        if !reader.read_key("sources")? {
            return Err(WireError::FieldMismatch {
                expected: "sources",
                found: String::from("end of mapping"),
            });
        }
        reader.sequence(&mut |s| {
            while s.has_next_item()? {
                let id = s.int32()?;
                let index = s.int64()?;
                self.add_source(id, index);
            }
            Ok(())
        })?;
        if !reader.read_key("timings")? {
            return Err(WireError::FieldMismatch {
                expected: "timings",
                found: String::from("end of mapping"),
            });
        }
        reader.sequence(&mut |s| {
            while s.has_next_item()? {
                let nanos = s.int64()?;
                self.add_timing(nanos);
            }
            Ok(())
        })?;
        self.dirty = false;
        Ok(())
    }
}

fn now_nanos() -> i64 {
    // Saturates far in the future rather than failing; see
    // `timestamp_nanos_opt` for the representable range.
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{MESSAGE_HISTORY_LENGTH, MessageHistory};
    use crate::value::{ValueIn, YamlIn, YamlOut};

    #[test]
    fn reset_then_write_yields_one_pair_and_two_timings() {
        let mut history = MessageHistory::new();
        history.reset_with(7, 42);

        let mut out = YamlOut::new();
        history.write_to(&mut out).unwrap();
        let doc = out.into_string();

        let mut back = MessageHistory::new();
        let mut reader = YamlIn::new(doc.as_bytes());
        reader.marshallable(&mut |i| back.read_from(i)).unwrap();

        assert_eq!(back.source_count(), 1);
        assert_eq!(back.source(0), Some((7, 42)));
        assert_eq!(back.timing_count(), 2);
    }

    #[test]
    fn write_is_not_idempotent() {
        let mut history = MessageHistory::new();
        history.reset_with(1, 1);

        let mut out = YamlOut::new();
        history.write_to(&mut out).unwrap();
        assert_eq!(history.timing_count(), 2);

        let mut out = YamlOut::new();
        history.write_to(&mut out).unwrap();
        assert_eq!(history.timing_count(), 3);
    }

    #[test]
    fn dirty_tracks_unflushed_appends() {
        let mut history = MessageHistory::new();
        assert!(!history.is_dirty());
        history.reset_with(1, 10);
        assert!(history.is_dirty());

        let mut out = YamlOut::new();
        history.write_to(&mut out).unwrap();
        assert!(!history.is_dirty());

        history.add_source(2, 20);
        assert!(history.is_dirty());
        history.reset();
        assert!(!history.is_dirty());
    }

    #[test]
    fn source_ids_suffix_probe() {
        let mut history = MessageHistory::new();
        history.reset_with(1, 10);
        history.add_source(2, 20);
        history.add_source(3, 30);

        assert!(history.source_ids_ends_with(&[3]));
        assert!(history.source_ids_ends_with(&[2, 3]));
        assert!(history.source_ids_ends_with(&[1, 2, 3]));
        assert!(!history.source_ids_ends_with(&[1, 2]));
        assert!(!history.source_ids_ends_with(&[0, 1, 2, 3]));
        assert!(history.source_ids_ends_with(&[]));
    }

    #[test]
    fn filling_to_capacity_succeeds() {
        let mut history = MessageHistory::new();
        history.reset_with(0, 0);
        for i in 1..MESSAGE_HISTORY_LENGTH {
            history.add_source(i as i32, i as i64);
        }
        assert_eq!(history.source_count(), MESSAGE_HISTORY_LENGTH);
        for _ in 1..(2 * MESSAGE_HISTORY_LENGTH) {
            history.add_timing(5);
        }
        assert_eq!(history.timing_count(), 2 * MESSAGE_HISTORY_LENGTH);
    }

    #[test]
    #[should_panic(expected = "exceeded 128 sources")]
    fn source_overflow_is_fatal() {
        let mut history = MessageHistory::new();
        for i in 0..=MESSAGE_HISTORY_LENGTH {
            history.add_source(i as i32, 0);
        }
    }

    #[test]
    #[should_panic(expected = "exceeded 256 timings")]
    fn timing_overflow_is_fatal() {
        let mut history = MessageHistory::new();
        for _ in 0..=(2 * MESSAGE_HISTORY_LENGTH) {
            history.add_timing(1);
        }
    }

    #[test]
    fn last_source_reports_the_tail() {
        let mut history = MessageHistory::new();
        assert_eq!(history.last_source(), None);
        history.reset_with(4, 40);
        history.add_source(5, 50);
        assert_eq!(history.last_source(), Some((5, 50)));
    }
}
