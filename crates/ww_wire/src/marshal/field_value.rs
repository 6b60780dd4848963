//! [`FieldValue`]: the bridge between a concrete field type and the value
//! codec, implemented here for scalars and standard containers and by the
//! [`marshallable!`](crate::marshallable) macro for nested types.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::error::WireResult;
use crate::marshal::{FieldKind, component_is_leaf, component_of};
use crate::value::{ValueIn, ValueOut};

// -----------------------------------------------------------------------------
// FieldValue

/// A value that can cross the wire as a single field.
///
/// `KIND` fixes the semantic kind at compile time — the selection the field
/// marshaller would otherwise make per write happens exactly once, when the
/// schema is built. `read_value` mutates in place so containers can be
/// cleared and refilled without reallocating; `read_new` constructs, for
/// contexts (sequence elements, map values) with nothing to reuse.
pub trait FieldValue: Any {
    const KIND: FieldKind;

    fn write_value(&self, out: &mut dyn ValueOut) -> WireResult<()>;

    fn read_new(reader: &mut dyn ValueIn) -> WireResult<Self>
    where
        Self: Sized;

    fn read_value(&mut self, reader: &mut dyn ValueIn) -> WireResult<()>
    where
        Self: Sized,
    {
        *self = Self::read_new(reader)?;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Scalars

macro_rules! impl_scalar_field {
    ($ty:ty, $kind:ident, $write:ident, $read:ident) => {
        impl FieldValue for $ty {
            const KIND: FieldKind = FieldKind::$kind;

            #[inline]
            fn write_value(&self, out: &mut dyn ValueOut) -> WireResult<()> {
                out.$write(*self)
            }

            #[inline]
            fn read_new(reader: &mut dyn ValueIn) -> WireResult<Self> {
                reader.$read()
            }
        }
    };
}

impl_scalar_field!(bool, Bool, bool, bool);
impl_scalar_field!(i8, Int8, int8, int8);
impl_scalar_field!(i16, Int16, int16, int16);
impl_scalar_field!(i32, Int32, int32, int32);
impl_scalar_field!(i64, Int64, int64, int64);
impl_scalar_field!(u8, Uint8, uint8, uint8);
impl_scalar_field!(u16, Uint16, uint16, uint16);
impl_scalar_field!(u32, Uint32, uint32, uint32);
impl_scalar_field!(u64, Uint64, uint64, uint64);
impl_scalar_field!(f32, Float32, float32, float32);
impl_scalar_field!(f64, Float64, float64, float64);
impl_scalar_field!(Uuid, Uuid, uuid, uuid);
impl_scalar_field!(NaiveDate, Date, date, date);
impl_scalar_field!(NaiveTime, Time, time, time);
impl_scalar_field!(NaiveDateTime, DateTime, date_time, date_time);
impl_scalar_field!(DateTime<FixedOffset>, ZonedDateTime, zoned_date_time, zoned_date_time);

impl FieldValue for String {
    const KIND: FieldKind = FieldKind::Text;

    fn write_value(&self, out: &mut dyn ValueOut) -> WireResult<()> {
        out.text(self)
    }

    fn read_new(reader: &mut dyn ValueIn) -> WireResult<Self> {
        Ok(reader.text()?.unwrap_or_default())
    }
}

/// Raw blobs travel as `!binary "<base64>"`; numeric sequences stay `Vec<u8>`.
impl FieldValue for Box<[u8]> {
    const KIND: FieldKind = FieldKind::Bytes;

    fn write_value(&self, out: &mut dyn ValueOut) -> WireResult<()> {
        out.bytes(self)
    }

    fn read_new(reader: &mut dyn ValueIn) -> WireResult<Self> {
        Ok(reader.bytes()?.into_boxed_slice())
    }
}

// -----------------------------------------------------------------------------
// Option / Box

/// Absent values encode as the `!null ""` sentinel.
impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: FieldKind = T::KIND;

    fn write_value(&self, out: &mut dyn ValueOut) -> WireResult<()> {
        match self {
            Some(value) => value.write_value(out),
            None => out.null(),
        }
    }

    fn read_new(reader: &mut dyn ValueIn) -> WireResult<Self> {
        if reader.is_null()? {
            Ok(None)
        } else {
            T::read_new(reader).map(Some)
        }
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    const KIND: FieldKind = T::KIND;

    fn write_value(&self, out: &mut dyn ValueOut) -> WireResult<()> {
        (**self).write_value(out)
    }

    fn read_new(reader: &mut dyn ValueIn) -> WireResult<Self> {
        T::read_new(reader).map(Box::new)
    }

    fn read_value(&mut self, reader: &mut dyn ValueIn) -> WireResult<()> {
        (**self).read_value(reader)
    }
}

// -----------------------------------------------------------------------------
// Collections

impl<E: FieldValue> FieldValue for Vec<E> {
    const KIND: FieldKind = FieldKind::Seq {
        component: component_of(E::KIND),
    };

    fn write_value(&self, out: &mut dyn ValueOut) -> WireResult<()> {
        out.leaf(component_is_leaf(&E::KIND));
        out.sequence(&mut |o| {
            for item in self {
                item.write_value(o)?;
            }
            Ok(())
        })
    }

    fn read_new(reader: &mut dyn ValueIn) -> WireResult<Self> {
        let mut items = Vec::new();
        items.read_value(reader)?;
        Ok(items)
    }

    fn read_value(&mut self, reader: &mut dyn ValueIn) -> WireResult<()> {
        self.clear();
        reader.sequence(&mut |s| {
            while s.has_next_item()? {
                self.push(E::read_new(s)?);
            }
            Ok(())
        })
    }
}

impl<E: FieldValue + Ord> FieldValue for BTreeSet<E> {
    const KIND: FieldKind = FieldKind::Seq {
        component: component_of(E::KIND),
    };

    fn write_value(&self, out: &mut dyn ValueOut) -> WireResult<()> {
        out.leaf(component_is_leaf(&E::KIND));
        out.sequence(&mut |o| {
            for item in self {
                item.write_value(o)?;
            }
            Ok(())
        })
    }

    fn read_new(reader: &mut dyn ValueIn) -> WireResult<Self> {
        let mut items = BTreeSet::new();
        items.read_value(reader)?;
        Ok(items)
    }

    fn read_value(&mut self, reader: &mut dyn ValueIn) -> WireResult<()> {
        self.clear();
        reader.sequence(&mut |s| {
            while s.has_next_item()? {
                self.insert(E::read_new(s)?);
            }
            Ok(())
        })
    }
}

/// Fixed-size arrays cannot be cleared in place; reads replace the whole
/// array, filling unsupplied trailing slots with defaults and ignoring
/// surplus document items.
impl<E: FieldValue + Default, const N: usize> FieldValue for [E; N] {
    const KIND: FieldKind = FieldKind::Array {
        component: component_of(E::KIND),
    };

    fn write_value(&self, out: &mut dyn ValueOut) -> WireResult<()> {
        out.leaf(component_is_leaf(&E::KIND));
        out.sequence(&mut |o| {
            for item in self {
                item.write_value(o)?;
            }
            Ok(())
        })
    }

    fn read_new(reader: &mut dyn ValueIn) -> WireResult<Self> {
        let mut array: [E; N] = core::array::from_fn(|_| E::default());
        reader.sequence(&mut |s| {
            let mut index = 0;
            while s.has_next_item()? {
                if index < N {
                    array[index] = E::read_new(s)?;
                    index += 1;
                } else {
                    // Surplus items are consumed by the sequence drain.
                    return Ok(());
                }
            }
            Ok(())
        })?;
        Ok(array)
    }
}

impl<V: FieldValue> FieldValue for BTreeMap<String, V> {
    const KIND: FieldKind = FieldKind::Map {
        value: component_of(V::KIND),
    };

    fn write_value(&self, out: &mut dyn ValueOut) -> WireResult<()> {
        out.leaf(component_is_leaf(&V::KIND));
        out.marshallable(&mut |o| {
            for (key, value) in self {
                o.write_key(key)?;
                value.write_value(o)?;
            }
            Ok(())
        })
    }

    fn read_new(reader: &mut dyn ValueIn) -> WireResult<Self> {
        let mut map = BTreeMap::new();
        map.read_value(reader)?;
        Ok(map)
    }

    fn read_value(&mut self, reader: &mut dyn ValueIn) -> WireResult<()> {
        self.clear();
        reader.marshallable(&mut |m| {
            while let Some(key) = m.next_key()? {
                self.insert(key, V::read_new(m)?);
            }
            Ok(())
        })
    }
}
