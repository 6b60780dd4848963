//! The dual-direction, type-directed value codec contract.
//!
//! [`ValueOut`] and [`ValueIn`] are the only surface through which values
//! reach or leave a wire. Nested writers and readers never receive raw
//! access to the underlying buffer: structured operations hand the caller
//! the same trait object back, so mismatched brackets are unrepresentable.
//!
//! Both traits are object-safe on purpose. The field marshaller stores
//! accessor function pointers in per-type schemas shared by every wire
//! implementation, which rules out monomorphic generics at this seam.
//!
//! [`YamlOut`] and [`YamlIn`] realize the contract for the textual syntax;
//! [`HashWire`](crate::hash_wire::HashWire) realizes the write side as a
//! fold into a fingerprint.

mod fmt;
mod yaml_in;
mod yaml_out;

pub use fmt::{append_f32, append_f64};
pub use yaml_in::YamlIn;
pub use yaml_out::YamlOut;

use alloc::string::String;
use alloc::vec::Vec;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::error::WireResult;

/// Callback type for structured writes.
pub type OutFn<'f> = &'f mut dyn FnMut(&mut dyn ValueOut) -> WireResult<()>;

/// Callback type for structured reads.
pub type InFn<'f> = &'f mut dyn FnMut(&mut dyn ValueIn) -> WireResult<()>;

// -----------------------------------------------------------------------------
// ValueOut

/// The write side of the value codec: one operation per scalar kind plus
/// structured writes.
///
/// Implementations are responsible for separators and framing; callers only
/// ever state *what* is written, never *where* the bytes go.
pub trait ValueOut {
    /// Writes a field key. Inside a mapping this places `name: `; at the
    /// document root it starts a new line.
    fn write_key(&mut self, name: &str) -> WireResult<()>;

    fn bool(&mut self, v: bool) -> WireResult<()>;

    fn int8(&mut self, v: i8) -> WireResult<()>;
    fn int16(&mut self, v: i16) -> WireResult<()>;
    fn int32(&mut self, v: i32) -> WireResult<()>;
    fn int64(&mut self, v: i64) -> WireResult<()>;

    fn uint8(&mut self, v: u8) -> WireResult<()>;
    fn uint16(&mut self, v: u16) -> WireResult<()>;
    fn uint32(&mut self, v: u32) -> WireResult<()>;
    fn uint64(&mut self, v: u64) -> WireResult<()>;

    fn float32(&mut self, v: f32) -> WireResult<()>;
    fn float64(&mut self, v: f64) -> WireResult<()>;

    fn text(&mut self, v: &str) -> WireResult<()>;

    /// Writes a binary blob; the textual form is `!binary "<base64>"`.
    fn bytes(&mut self, v: &[u8]) -> WireResult<()>;

    fn uuid(&mut self, v: Uuid) -> WireResult<()>;

    fn date(&mut self, v: NaiveDate) -> WireResult<()>;
    fn time(&mut self, v: NaiveTime) -> WireResult<()>;
    fn date_time(&mut self, v: NaiveDateTime) -> WireResult<()>;
    fn zoned_date_time(&mut self, v: DateTime<FixedOffset>) -> WireResult<()>;

    /// Writes the null sentinel, `!null ""`.
    fn null(&mut self) -> WireResult<()>;

    /// Writes a `!TypeName ` tag; the tagged value follows.
    fn type_prefix(&mut self, name: &str) -> WireResult<()>;

    /// The annotation-carrying comment path: `\t\t# text` to end of line.
    fn comment(&mut self, text: &str) -> WireResult<()>;

    /// Hints that the next structured write holds no further nesting and may
    /// render single-line. The hint applies to the next opened block and
    /// everything inside it.
    fn leaf(&mut self, leaf: bool);

    /// Opens a sequence, runs `f` against this writer, closes it.
    fn sequence(&mut self, f: OutFn<'_>) -> WireResult<()>;

    /// Opens a nested mapping, runs `f` against this writer, closes it.
    fn marshallable(&mut self, f: OutFn<'_>) -> WireResult<()>;
}

// -----------------------------------------------------------------------------
// ValueIn

/// The read side of the value codec, mirroring [`ValueOut`].
///
/// Scalar reads consume exactly one value production. A production may be
/// preceded by an anchor definition or an alias reference; implementations
/// resolve both transparently.
pub trait ValueIn {
    /// Consumes the key of the next mapping entry, which must equal `name`.
    ///
    /// Returns `false` without consuming anything when the enclosing mapping
    /// has no entries left. A differently-named key is a
    /// [`FieldMismatch`](crate::error::WireError::FieldMismatch) error — the
    /// ordered read path does not reorder fields.
    fn read_key(&mut self, name: &'static str) -> WireResult<bool>;

    /// Consumes and returns the next mapping key, or `None` at mapping end.
    /// Used for generic map reads where key names are data.
    fn next_key(&mut self) -> WireResult<Option<String>>;

    fn bool(&mut self) -> WireResult<bool>;

    fn int8(&mut self) -> WireResult<i8>;
    fn int16(&mut self) -> WireResult<i16>;
    fn int32(&mut self) -> WireResult<i32>;
    fn int64(&mut self) -> WireResult<i64>;

    fn uint8(&mut self) -> WireResult<u8>;
    fn uint16(&mut self) -> WireResult<u16>;
    fn uint32(&mut self) -> WireResult<u32>;
    fn uint64(&mut self) -> WireResult<u64>;

    fn float32(&mut self) -> WireResult<f32>;
    fn float64(&mut self) -> WireResult<f64>;

    /// Reads a text value; `None` for the null sentinel.
    fn text(&mut self) -> WireResult<Option<String>>;

    /// Reads text into a caller-owned buffer (cleared first); returns
    /// `false` for the null sentinel.
    fn text_to(&mut self, buf: &mut String) -> WireResult<bool>;

    fn bytes(&mut self) -> WireResult<Vec<u8>>;

    fn uuid(&mut self) -> WireResult<Uuid>;

    fn date(&mut self) -> WireResult<NaiveDate>;
    fn time(&mut self) -> WireResult<NaiveTime>;
    fn date_time(&mut self) -> WireResult<NaiveDateTime>;
    fn zoned_date_time(&mut self) -> WireResult<DateTime<FixedOffset>>;

    /// Peeks for the null sentinel and, on a hit, consumes the whole
    /// production (tag plus empty text) as a side effect.
    fn is_null(&mut self) -> WireResult<bool>;

    /// Peeks for a `!TypeName` tag, consuming and returning it if present.
    /// The reserved `!null` and `!binary` tags are never returned here.
    fn type_prefix(&mut self) -> WireResult<Option<String>>;

    /// Whether the open sequence has another item.
    fn has_next_item(&mut self) -> WireResult<bool>;

    /// Expects a sequence, runs `f` against this reader, then requires the
    /// sequence to close.
    fn sequence(&mut self, f: InFn<'_>) -> WireResult<()>;

    /// Expects a nested mapping, runs `f`, skips any entries `f` left
    /// unread, then requires the mapping to close.
    fn marshallable(&mut self, f: InFn<'_>) -> WireResult<()>;
}
