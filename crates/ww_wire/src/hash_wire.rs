//! A write-only wire that folds values into a fingerprint.
//!
//! [`HashWire`] implements [`ValueOut`] over a single 64-bit accumulator:
//! each write folds its argument in as `hash = hash * M + f(value) * M2`,
//! with a pair of odd multiplier constants per operation category.
//! Structural operations carry no bracket bytes — they fold a seed and run
//! the writer callback against the same accumulator.
//!
//! There is no read direction and no byte addressing: the write-only
//! [`ValueOut`] surface is the whole API, so misuse is unrepresentable
//! rather than checked. Equal object graphs produce equal hashes on every
//! run, which makes the result usable for deriving stable identifiers.

use core::hash::BuildHasher;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use uuid::Uuid;
use ww_utils::hash::FixedHashState;

use crate::error::WireResult;
use crate::marshal::{Marshallable, write_fields};
use crate::value::{OutFn, ValueOut};

// -----------------------------------------------------------------------------
// Fold constants

/// Accumulator seed; avoids the all-zeros fixed point of the finalizer.
const SEED: u64 = 0x27D4_EB2F_1656_67C5;

/// Odd multiplier pairs, one per operation category.
const M_KEY: (u64, u64) = (0x9E37_79B1, 0x85EB_CA77);
const M_BOOL: (u64, u64) = (0xC2B2_AE35, 0x2545_F491);
const M_INT: (u64, u64) = (0x27D4_EB2F, 0x1656_67B1);
const M_FLOAT: (u64, u64) = (0x6C62_272E, 0x5BD1_E995);
const M_TEXT: (u64, u64) = (0xCC9E_2D51, 0x1B87_3593);
const M_BYTES: (u64, u64) = (0x9E37_79B9, 0x7FEB_352D);
const M_TIME: (u64, u64) = (0x85EB_CA6B, 0xC2B2_AE3D);
const M_STRUCT: (u64, u64) = (0xFF51_AFD7, 0xE995_7D4B);

const SEQ_MARK: u64 = 0x5E;
const MAP_MARK: u64 = 0x7B;
const NULL_MARK: u64 = 0x00_F1;

// -----------------------------------------------------------------------------
// HashWire

/// The fingerprinting [`ValueOut`] implementation.
///
/// # Example
///
/// ```
/// use ww_wire::hash_wire::hash64_of;
/// use ww_wire::marshallable;
///
/// marshallable! {
///     #[derive(Debug, Default)]
///     pub struct Pair { a: i64, b: i64 }
/// }
///
/// let x = hash64_of(&Pair { a: 1, b: 2 }).unwrap();
/// let y = hash64_of(&Pair { a: 1, b: 2 }).unwrap();
/// let z = hash64_of(&Pair { a: 2, b: 1 }).unwrap();
/// assert_eq!(x, y);
/// assert_ne!(x, z);
/// ```
pub struct HashWire {
    hash: u64,
}

impl Default for HashWire {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl HashWire {
    /// Creates a fresh hashing session.
    #[inline]
    pub const fn new() -> Self {
        Self { hash: SEED }
    }

    #[inline]
    fn fold(&mut self, m: (u64, u64), value: u64) {
        self.hash = self
            .hash
            .wrapping_mul(m.0)
            .wrapping_add(value.wrapping_mul(m.1));
    }

    /// The finalized 64-bit fingerprint.
    ///
    /// Applies an avalanche step rather than returning the raw accumulator,
    /// so low bits depend on every written value.
    pub fn hash64(&self) -> u64 {
        let mut z = self.hash;
        z ^= z >> 30;
        z = z.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z ^= z >> 27;
        z = z.wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        z
    }

    /// The finalized fingerprint folded to 32 bits.
    pub fn hash32(&self) -> u32 {
        let h = self.hash64();
        (h ^ (h >> 32)) as u32
    }
}

fn text_hash(text: &str) -> u64 {
    FixedHashState.hash_one(text)
}

// -----------------------------------------------------------------------------
// ValueOut impl

impl ValueOut for HashWire {
    fn write_key(&mut self, name: &str) -> WireResult<()> {
        self.fold(M_KEY, text_hash(name));
        Ok(())
    }

    fn bool(&mut self, v: bool) -> WireResult<()> {
        self.fold(M_BOOL, 1 + v as u64);
        Ok(())
    }

    fn int8(&mut self, v: i8) -> WireResult<()> {
        self.int64(v.into())
    }

    fn int16(&mut self, v: i16) -> WireResult<()> {
        self.int64(v.into())
    }

    fn int32(&mut self, v: i32) -> WireResult<()> {
        self.int64(v.into())
    }

    fn int64(&mut self, v: i64) -> WireResult<()> {
        self.fold(M_INT, v as u64);
        Ok(())
    }

    fn uint8(&mut self, v: u8) -> WireResult<()> {
        self.uint64(v.into())
    }

    fn uint16(&mut self, v: u16) -> WireResult<()> {
        self.uint64(v.into())
    }

    fn uint32(&mut self, v: u32) -> WireResult<()> {
        self.uint64(v.into())
    }

    fn uint64(&mut self, v: u64) -> WireResult<()> {
        self.fold(M_INT, v);
        Ok(())
    }

    fn float32(&mut self, v: f32) -> WireResult<()> {
        self.fold(M_FLOAT, v.to_bits().into());
        Ok(())
    }

    fn float64(&mut self, v: f64) -> WireResult<()> {
        self.fold(M_FLOAT, v.to_bits());
        Ok(())
    }

    fn text(&mut self, v: &str) -> WireResult<()> {
        self.fold(M_TEXT, text_hash(v));
        Ok(())
    }

    fn bytes(&mut self, v: &[u8]) -> WireResult<()> {
        self.fold(M_BYTES, FixedHashState.hash_one(v));
        Ok(())
    }

    fn uuid(&mut self, v: Uuid) -> WireResult<()> {
        let (hi, lo) = v.as_u64_pair();
        self.fold(M_INT, hi);
        self.fold(M_INT, lo);
        Ok(())
    }

    fn date(&mut self, v: NaiveDate) -> WireResult<()> {
        self.fold(M_TIME, v.num_days_from_ce() as u64);
        Ok(())
    }

    fn time(&mut self, v: NaiveTime) -> WireResult<()> {
        let nanos = u64::from(v.num_seconds_from_midnight()) * 1_000_000_000
            + u64::from(v.nanosecond());
        self.fold(M_TIME, nanos);
        Ok(())
    }

    fn date_time(&mut self, v: NaiveDateTime) -> WireResult<()> {
        self.date(v.date())?;
        self.time(v.time())
    }

    fn zoned_date_time(&mut self, v: DateTime<FixedOffset>) -> WireResult<()> {
        self.date_time(v.naive_utc())?;
        self.fold(M_TIME, v.offset().local_minus_utc() as u64);
        Ok(())
    }

    fn null(&mut self) -> WireResult<()> {
        self.fold(M_STRUCT, NULL_MARK);
        Ok(())
    }

    fn type_prefix(&mut self, name: &str) -> WireResult<()> {
        self.fold(M_TEXT, text_hash(name));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> WireResult<()> {
        self.fold(M_TEXT, text_hash(text));
        Ok(())
    }

    fn leaf(&mut self, _leaf: bool) {
        // Rendering hints carry no identity.
    }

    fn sequence(&mut self, f: OutFn<'_>) -> WireResult<()> {
        self.fold(M_STRUCT, SEQ_MARK);
        f(self)
    }

    fn marshallable(&mut self, f: OutFn<'_>) -> WireResult<()> {
        self.fold(M_STRUCT, MAP_MARK);
        f(self)
    }
}

// -----------------------------------------------------------------------------
// Fingerprinting entry point

/// The deterministic 64-bit fingerprint of a marshallable object graph.
///
/// Structurally equal instances hash equal; the hash depends only on the
/// written values, never on the textual rendering.
pub fn hash64_of<T: Marshallable>(value: &T) -> WireResult<u64> {
    let mut wire = HashWire::new();
    write_fields(T::type_scheme(), value, &mut wire)?;
    Ok(wire.hash64())
}
