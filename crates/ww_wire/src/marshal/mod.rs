//! Schema-driven field marshalling.
//!
//! Every marshallable type carries a [`TypeScheme`]: an ordered, immutable
//! list of [`FieldScheme`] descriptors built once on first access and shared
//! across threads. The descriptors pair a [`FieldKind`] (a closed enum,
//! matched exhaustively) with accessor function pointers generated by the
//! [`marshallable!`](crate::marshallable) macro, so the marshalling drivers
//! in this module stay purely data-driven: no reflection at run time, no
//! per-wire generated code.
//!
//! Field order is declaration order and is part of the wire contract; the
//! ordered read path does not match fields out of order (see
//! [`YamlIn::read_field`](crate::value::YamlIn::read_field) for the generic
//! path that does).

mod field_value;
mod macros;

pub use field_value::FieldValue;

use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use std::sync::OnceLock;

use crate::error::WireResult;
use crate::value::{ValueIn, ValueOut, YamlIn, YamlOut};

// -----------------------------------------------------------------------------
// FieldKind

/// A function producing the scheme of a marshallable type.
///
/// Schemes are reached through function pointers rather than references so a
/// descriptor can name a type whose scheme has not been built yet (including
/// its own, for self-referential types).
pub type SchemeFn = fn() -> &'static TypeScheme;

/// The semantic kind of a field, fixed at schema-build time.
#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Text,
    Bytes,
    Uuid,
    Date,
    Time,
    DateTime,
    ZonedDateTime,
    /// A fixed-size array; `component` is set when elements are nested
    /// marshallables.
    Array { component: Option<SchemeFn> },
    /// A growable or sorted collection.
    Seq { component: Option<SchemeFn> },
    /// A string-keyed map; `value` is set when values are nested
    /// marshallables.
    Map { value: Option<SchemeFn> },
    /// A nested marshallable type.
    Nested { scheme: SchemeFn },
}

impl FieldKind {
    /// Whether this kind holds further structure (which disqualifies the
    /// owning type from leaf rendering).
    #[inline]
    pub const fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Array { .. } | Self::Seq { .. } | Self::Map { .. } | Self::Nested { .. }
        )
    }
}

/// The component scheme of a kind, when its elements are nested.
pub(crate) const fn component_of(kind: FieldKind) -> Option<SchemeFn> {
    match kind {
        FieldKind::Nested { scheme } => Some(scheme),
        _ => None,
    }
}

/// Whether a collection of `kind` components may render single-line.
pub(crate) fn component_is_leaf(kind: &FieldKind) -> bool {
    match kind {
        FieldKind::Nested { scheme } => scheme().is_leaf(),
        kind => !kind.is_container(),
    }
}

// -----------------------------------------------------------------------------
// FieldScheme

/// One field descriptor: name, semantic kind, and type-erased accessors.
///
/// The accessors are monomorphized per field by the
/// [`marshallable!`](crate::marshallable) macro; applying them to a value of
/// any other type is a schema bug and panics.
pub struct FieldScheme {
    name: &'static str,
    kind: FieldKind,
    write: fn(&dyn Any, &mut dyn ValueOut) -> WireResult<()>,
    read: fn(&mut dyn Any, &mut dyn ValueIn) -> WireResult<()>,
}

impl FieldScheme {
    pub const fn new(
        name: &'static str,
        kind: FieldKind,
        write: fn(&dyn Any, &mut dyn ValueOut) -> WireResult<()>,
        read: fn(&mut dyn Any, &mut dyn ValueIn) -> WireResult<()>,
    ) -> Self {
        Self {
            name,
            kind,
            write,
            read,
        }
    }

    /// The field name as written on the wire.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The field's semantic kind.
    #[inline]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }
}

// -----------------------------------------------------------------------------
// TypeScheme

/// The derived, cached schema of one marshallable type.
///
/// Built once per type inside a [`SchemeCell`] and shared read-only across
/// all instances and threads; construction is deterministic, so a racing
/// first build on two threads settles on equal results either way.
pub struct TypeScheme {
    name: &'static str,
    path: &'static str,
    fields: Vec<FieldScheme>,
    leaf: OnceLock<bool>,
}

impl TypeScheme {
    pub fn new(name: &'static str, path: &'static str, fields: Vec<FieldScheme>) -> Self {
        Self {
            name,
            path,
            fields,
            leaf: OnceLock::new(),
        }
    }

    /// The short type name, used for `!TypeName` tags.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The full module path of the type.
    #[inline]
    pub const fn path(&self) -> &'static str {
        self.path
    }

    /// The field descriptors in declaration order.
    #[inline]
    pub fn fields(&self) -> &[FieldScheme] {
        &self.fields
    }

    /// Whether this type renders as a leaf: every field is a scalar or a
    /// nested type that is itself a leaf.
    ///
    /// Computed by depth-first traversal with memoization; a scheme that is
    /// still being visited (a reference cycle) counts as non-leaf, which is
    /// conservative but terminates.
    pub fn is_leaf(&'static self) -> bool {
        let mut in_progress = Vec::new();
        leaf_dfs(self, &mut in_progress)
    }
}

fn leaf_dfs(scheme: &'static TypeScheme, in_progress: &mut Vec<*const TypeScheme>) -> bool {
    if let Some(leaf) = scheme.leaf.get() {
        return *leaf;
    }
    if in_progress.iter().any(|p| core::ptr::eq(*p, scheme)) {
        return false;
    }
    in_progress.push(scheme);
    let mut leaf = true;
    for field in &scheme.fields {
        leaf = match field.kind {
            FieldKind::Array { .. } | FieldKind::Seq { .. } | FieldKind::Map { .. } => false,
            FieldKind::Nested { scheme: nested } => leaf_dfs(nested(), in_progress),
            _ => true,
        };
        if !leaf {
            break;
        }
    }
    in_progress.pop();
    let _ = scheme.leaf.set(leaf);
    leaf
}

// -----------------------------------------------------------------------------
// SchemeCell

/// Static storage for a type's [`TypeScheme`], initialized on first access.
///
/// ```ignore
/// impl Marshallable for Foo {
///     fn type_scheme() -> &'static TypeScheme {
///         static CELL: SchemeCell = SchemeCell::new();
///         CELL.get_or_init(|| TypeScheme::new("Foo", "my::Foo", vec![/* ... */]))
///     }
/// }
/// ```
pub struct SchemeCell(OnceLock<TypeScheme>);

impl SchemeCell {
    #[inline]
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    #[inline]
    pub fn get_or_init(&self, build: impl FnOnce() -> TypeScheme) -> &TypeScheme {
        self.0.get_or_init(build)
    }
}

impl Default for SchemeCell {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// Marshallable

/// A type with a derived field schema.
///
/// Implemented by the [`marshallable!`](crate::marshallable) macro; the
/// schema enumerates name, kind and accessors per field, in declaration
/// order.
pub trait Marshallable: Any {
    fn type_scheme() -> &'static TypeScheme
    where
        Self: Sized;
}

// -----------------------------------------------------------------------------
// Marshalling drivers

/// Writes every field of `scheme`, in order, against the open context.
pub fn write_fields(
    scheme: &'static TypeScheme,
    value: &dyn Any,
    out: &mut dyn ValueOut,
) -> WireResult<()> {
    for field in scheme.fields() {
        out.write_key(field.name)?;
        (field.write)(value, out)?;
    }
    Ok(())
}

/// Reads fields in declaration order, mutating `value` in place.
///
/// Trailing fields absent from the document keep their current values;
/// a present-but-renamed field is a
/// [`FieldMismatch`](crate::error::WireError::FieldMismatch).
pub fn read_fields(
    scheme: &'static TypeScheme,
    value: &mut dyn Any,
    reader: &mut dyn ValueIn,
) -> WireResult<()> {
    for field in scheme.fields() {
        if !reader.read_key(field.name)? {
            break;
        }
        (field.read)(value, reader)?;
    }
    Ok(())
}

/// Writes `value` as a nested `{...}` block.
pub fn write_nested(
    scheme: &'static TypeScheme,
    value: &dyn Any,
    out: &mut dyn ValueOut,
) -> WireResult<()> {
    out.marshallable(&mut |o| write_fields(scheme, value, o))
}

/// Reads a nested `{...}` block into `value`.
pub fn read_nested(
    scheme: &'static TypeScheme,
    value: &mut dyn Any,
    reader: &mut dyn ValueIn,
) -> WireResult<()> {
    reader.marshallable(&mut |i| read_fields(scheme, &mut *value, i))
}

// -----------------------------------------------------------------------------
// Document entry points

/// Serializes `value` as a root-level textual document.
pub fn to_yaml_string<T: Marshallable>(value: &T) -> WireResult<String> {
    let mut out = YamlOut::new();
    write_fields(T::type_scheme(), value, &mut out)?;
    Ok(out.into_string())
}

/// Deserializes a root-level textual document into a fresh `T`.
pub fn from_yaml_str<T: Marshallable + Default>(input: &str) -> WireResult<T> {
    let mut value = T::default();
    read_yaml_into(&mut value, input)?;
    Ok(value)
}

/// Deserializes a root-level textual document into an existing instance.
pub fn read_yaml_into<T: Marshallable>(value: &mut T, input: &str) -> WireResult<()> {
    let mut reader = YamlIn::new(input.as_bytes());
    let scheme = T::type_scheme();
    let value: &mut dyn Any = value;
    reader.marshallable(&mut |i| read_fields(scheme, &mut *value, i))
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::collections::BTreeMap;
    use alloc::string::String;
    use alloc::vec::Vec;

    use super::{FieldKind, Marshallable, from_yaml_str, to_yaml_string};
    use crate::marshallable;

    marshallable! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct Point {
            x: i64,
            y: i64,
        }
    }

    marshallable! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct Order {
            id: u64,
            qty: i32,
            price: f64,
            note: String,
            at: Point,
            tags: Vec<String>,
            points: Vec<Point>,
            meta: BTreeMap<String, String>,
            data: Box<[u8]>,
            maybe: Option<String>,
        }
    }

    marshallable! {
        #[derive(Debug, Default)]
        pub struct Chain {
            id: i64,
            next: Option<Box<Chain>>,
        }
    }

    fn sample() -> Order {
        let mut meta = BTreeMap::new();
        meta.insert(String::from("side"), String::from("buy"));
        Order {
            id: 17,
            qty: -3,
            price: 1_000_000.0,
            note: String::from("fill or kill"),
            at: Point { x: 1, y: 2 },
            tags: Vec::from([String::from("spot"), String::from("eu")]),
            points: Vec::from([Point { x: 1, y: 2 }, Point { x: 3, y: 4 }]),
            meta,
            data: Vec::from([1_u8, 2, 3]).into_boxed_slice(),
            maybe: None,
        }
    }

    #[test]
    fn schema_preserves_declaration_order() {
        let names: Vec<&str> = Order::type_scheme()
            .fields()
            .iter()
            .map(|f| f.name())
            .collect();
        assert_eq!(
            names,
            [
                "id", "qty", "price", "note", "at", "tags", "points", "meta", "data", "maybe"
            ]
        );
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let order = sample();
        let doc = to_yaml_string(&order).unwrap();
        let back: Order = from_yaml_str(&doc).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    fn two_instances_encode_fields_in_the_same_order() {
        let a = to_yaml_string(&sample()).unwrap();
        let mut other = sample();
        other.id = 18;
        let b = to_yaml_string(&other).unwrap();
        let keys = |doc: &str| -> Vec<String> {
            doc.lines()
                .filter_map(|l| l.split_once(':').map(|(k, _)| String::from(k.trim())))
                .collect()
        };
        assert_eq!(keys(&a), keys(&b));
    }

    #[test]
    fn warm_and_fresh_cache_encode_identically() {
        let order = sample();
        let first = to_yaml_string(&order).unwrap();
        let second = to_yaml_string(&order).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn leaf_types_render_inline() {
        assert!(Point::type_scheme().is_leaf());
        assert!(!Order::type_scheme().is_leaf());
        let doc = to_yaml_string(&sample()).unwrap();
        assert!(doc.contains("at: { x: 1, y: 2 }"), "doc was:\n{doc}");
        assert!(
            doc.contains("points: [ { x: 1, y: 2 }, { x: 3, y: 4 } ]"),
            "doc was:\n{doc}"
        );
    }

    #[test]
    fn self_referential_type_is_not_leaf() {
        assert!(!Chain::type_scheme().is_leaf());
    }

    #[test]
    fn null_round_trips_for_optional_text() {
        let mut order = sample();
        order.maybe = None;
        let doc = to_yaml_string(&order).unwrap();
        assert!(doc.contains("maybe: !null \"\""), "doc was:\n{doc}");
        let back: Order = from_yaml_str(&doc).unwrap();
        assert_eq!(back.maybe, None);

        order.maybe = Some(String::from("here"));
        let doc = to_yaml_string(&order).unwrap();
        let back: Order = from_yaml_str(&doc).unwrap();
        assert_eq!(back.maybe.as_deref(), Some("here"));
    }

    #[test]
    fn collections_are_refilled_not_appended() {
        let doc = to_yaml_string(&sample()).unwrap();
        let mut target = sample();
        target.tags = Vec::from([String::from("stale1"), String::from("stale2")]);
        super::read_yaml_into(&mut target, &doc).unwrap();
        assert_eq!(target.tags, [String::from("spot"), String::from("eu")]);
    }

    #[test]
    fn field_kinds_are_declared_once() {
        let scheme = Order::type_scheme();
        assert!(matches!(scheme.fields()[0].kind(), FieldKind::Uint64));
        assert!(matches!(scheme.fields()[4].kind(), FieldKind::Nested { .. }));
        assert!(matches!(scheme.fields()[5].kind(), FieldKind::Seq { .. }));
        assert!(matches!(scheme.fields()[7].kind(), FieldKind::Map { .. }));
        assert!(matches!(scheme.fields()[8].kind(), FieldKind::Bytes));
    }

    #[test]
    fn chain_round_trip() {
        let chain = Chain {
            id: 1,
            next: Some(Box::new(Chain { id: 2, next: None })),
        };
        let doc = to_yaml_string(&chain).unwrap();
        let back: Chain = from_yaml_str(&doc).unwrap();
        assert_eq!(back.id, 1);
        assert_eq!(back.next.as_ref().map(|c| c.id), Some(2));
    }
}
