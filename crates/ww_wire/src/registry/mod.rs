//! A registry of marshallable types, used to resolve `!TypeName` tags.
//!
//! [Registering] a type stores a [`SchemeEntry`] — its scheme, a default
//! factory, and type-erased read/write hooks — indexed by [`TypeId`], full
//! path, and short name. Short names can collide across modules; a colliding
//! name is dropped from the short-name index and resolution falls back to
//! the full path.
//!
//! The registry is an injected capability: wires receive a
//! [`TypeResolver`] (or the registry itself) from the caller instead of
//! consulting any global state.
//!
//! [Registering]: WireRegistry::register

use alloc::boxed::Box;
use core::any::{Any, TypeId};

use ww_utils::TypeIdMap;
use ww_utils::hash::{FixedHashState, HashMap, HashSet};

use crate::error::{WireError, WireResult};
use crate::marshal::{FieldValue, Marshallable, TypeScheme};
use crate::value::{ValueIn, ValueOut};

// -----------------------------------------------------------------------------
// TypeResolver

/// The name ⇄ type lookup capability consumed by tag handling.
pub trait TypeResolver {
    /// Resolves a tag name (short name or full path) to a type.
    fn for_name(&self, name: &str) -> Option<TypeId>;

    /// The tag name written for a type.
    fn name_for(&self, type_id: TypeId) -> Option<&'static str>;
}

// -----------------------------------------------------------------------------
// SchemeEntry

/// One registered type: scheme plus the type-erased hooks dynamic decoding
/// needs.
pub struct SchemeEntry {
    type_id: TypeId,
    scheme: &'static TypeScheme,
    make_default: fn() -> Box<dyn Any>,
    write: fn(&dyn Any, &mut dyn ValueOut) -> WireResult<()>,
    read: fn(&mut dyn Any, &mut dyn ValueIn) -> WireResult<()>,
}

impl SchemeEntry {
    pub fn of<T: Marshallable + FieldValue + Default>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            scheme: T::type_scheme(),
            make_default: || Box::new(T::default()),
            write: |value, out| {
                let value = value
                    .downcast_ref::<T>()
                    .expect("registry write hook applied to foreign type");
                value.write_value(out)
            },
            read: |value, reader| {
                let value = value
                    .downcast_mut::<T>()
                    .expect("registry read hook applied to foreign type");
                value.read_value(reader)
            },
        }
    }

    #[inline]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub const fn scheme(&self) -> &'static TypeScheme {
        self.scheme
    }

    /// A fresh default instance of the registered type.
    #[inline]
    pub fn default_value(&self) -> Box<dyn Any> {
        (self.make_default)()
    }
}

// -----------------------------------------------------------------------------
// WireRegistry

/// The central store of registered marshallable types.
///
/// # Example
///
/// ```
/// use ww_wire::marshallable;
/// use ww_wire::registry::{TypeResolver, WireRegistry};
///
/// marshallable! {
///     #[derive(Debug, Default)]
///     pub struct Probe { value: i64 }
/// }
///
/// let mut registry = WireRegistry::new();
/// registry.register::<Probe>();
///
/// let id = registry.for_name("Probe").unwrap();
/// assert_eq!(registry.name_for(id), Some("Probe"));
/// ```
pub struct WireRegistry {
    entries: TypeIdMap<SchemeEntry>,
    path_to_id: HashMap<&'static str, TypeId>,
    name_to_id: HashMap<&'static str, TypeId>,
    ambiguous_names: HashSet<&'static str>,
}

impl Default for WireRegistry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl WireRegistry {
    /// Creates an empty registry.
    #[inline]
    pub const fn new() -> Self {
        Self {
            entries: TypeIdMap::new(),
            path_to_id: HashMap::with_hasher(FixedHashState),
            name_to_id: HashMap::with_hasher(FixedHashState),
            ambiguous_names: HashSet::with_hasher(FixedHashState),
        }
    }

    // # Validity
    // The type must **not** already exist.
    fn add_indices(
        entry: &SchemeEntry,
        path_to_id: &mut HashMap<&'static str, TypeId>,
        name_to_id: &mut HashMap<&'static str, TypeId>,
        ambiguous_names: &mut HashSet<&'static str>,
    ) {
        let name = entry.scheme.name();
        if !ambiguous_names.contains(name) {
            if name_to_id.contains_key(name) {
                name_to_id.remove(name);
                ambiguous_names.insert(name);
                log::warn!(
                    "type name `{name}` is ambiguous; tag resolution now requires its full path"
                );
            } else {
                name_to_id.insert(name, entry.type_id);
            }
        }
        // Full paths are assumed unique for distinct types.
        path_to_id.insert(entry.scheme.path(), entry.type_id);
    }

    /// Registers `T` if it has not been registered already; returns whether
    /// a new entry was added.
    pub fn register<T: Marshallable + FieldValue + Default>(&mut self) -> bool {
        let type_id = TypeId::of::<T>();
        if self.entries.contains(&type_id) {
            return false;
        }
        let entry = SchemeEntry::of::<T>();
        Self::add_indices(
            &entry,
            &mut self.path_to_id,
            &mut self.name_to_id,
            &mut self.ambiguous_names,
        );
        self.entries.insert(type_id, entry);
        true
    }

    /// Registers every type declared with
    /// [`marshallable!`](crate::marshallable) across the linked program and
    /// returns how many were new. Repeated calls are cheap.
    ///
    /// Without the `auto_register` feature this is a no-op returning zero.
    #[cfg(feature = "auto_register")]
    pub fn auto_register(&mut self) -> usize {
        let mut added = 0;
        for registration in inventory::iter::<Registration> {
            if (registration.register)(self) {
                added += 1;
            }
        }
        added
    }

    /// See the `auto_register`-enabled documentation.
    #[cfg(not(feature = "auto_register"))]
    #[inline(always)]
    pub fn auto_register(&mut self) -> usize {
        0
    }

    /// Whether the type with the given [`TypeId`] is registered.
    #[inline]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.entries.contains(&type_id)
    }

    /// The entry for the given [`TypeId`], if registered.
    #[inline]
    pub fn get(&self, type_id: TypeId) -> Option<&SchemeEntry> {
        self.entries.get(&type_id)
    }

    /// The entry for the given full type path.
    pub fn get_with_path(&self, path: &str) -> Option<&SchemeEntry> {
        match self.path_to_id.get(path) {
            Some(id) => self.get(*id),
            None => None,
        }
    }

    /// The entry for the given short type name; `None` when the name is
    /// ambiguous or unknown.
    pub fn get_with_name(&self, name: &str) -> Option<&SchemeEntry> {
        match self.name_to_id.get(name) {
            Some(id) => self.get(*id),
            None => None,
        }
    }

    /// Whether the given short name matches more than one registered type.
    #[inline]
    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous_names.contains(name)
    }

    /// Resolves a tag: short name first, full path as the fallback.
    pub fn resolve(&self, tag: &str) -> Option<&SchemeEntry> {
        self.get_with_name(tag).or_else(|| self.get_with_path(tag))
    }

    /// An iterator over the registered entries.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &SchemeEntry> {
        self.entries.values()
    }

    // -------------------------------------------------------------------------
    // Tag-directed IO

    /// Writes `value` as a `!TypeName`-tagged production.
    pub fn write_tagged(&self, value: &dyn Any, out: &mut dyn ValueOut) -> WireResult<()> {
        let entry = self.get(value.type_id()).ok_or_else(|| WireError::Unsupported {
            op: "write_tagged on an unregistered type",
            wire: "WireRegistry",
        })?;
        out.type_prefix(entry.scheme.name())?;
        (entry.write)(value, out)
    }

    /// Reads a `!TypeName`-tagged production into a fresh default instance
    /// of the named type. Returns `Ok(None)` when no tag is present.
    pub fn read_tagged(&self, reader: &mut dyn ValueIn) -> WireResult<Option<Box<dyn Any>>> {
        let Some(name) = reader.type_prefix()? else {
            return Ok(None);
        };
        let entry = self
            .resolve(&name)
            .ok_or(WireError::UnknownType { name })?;
        let mut value = entry.default_value();
        (entry.read)(value.as_mut(), reader)?;
        Ok(Some(value))
    }
}

impl TypeResolver for WireRegistry {
    fn for_name(&self, name: &str) -> Option<TypeId> {
        self.resolve(name).map(SchemeEntry::type_id)
    }

    fn name_for(&self, type_id: TypeId) -> Option<&'static str> {
        self.get(type_id).map(|entry| entry.scheme.name())
    }
}

// -----------------------------------------------------------------------------
// Auto registration

/// One auto-registration record, submitted by the
/// [`marshallable!`](crate::marshallable) macro.
#[cfg(feature = "auto_register")]
pub struct Registration {
    register: fn(&mut WireRegistry) -> bool,
}

#[cfg(feature = "auto_register")]
impl Registration {
    pub const fn of<T: Marshallable + FieldValue + Default>() -> Self {
        Self {
            register: |registry| registry.register::<T>(),
        }
    }
}

#[cfg(feature = "auto_register")]
inventory::collect!(Registration);

#[cfg(feature = "auto_register")]
#[doc(hidden)]
pub use inventory as __inventory;

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::{TypeResolver, WireRegistry};
    use crate::marshallable;
    use crate::value::{ValueIn, ValueOut, YamlIn, YamlOut};

    marshallable! {
        #[derive(Debug, Default, PartialEq)]
        pub struct Badge {
            id: u32,
            label: String,
        }
    }

    mod first {
        crate::marshallable! {
            #[derive(Debug, Default)]
            pub struct Twin { a: i64 }
        }
    }

    mod second {
        crate::marshallable! {
            #[derive(Debug, Default)]
            pub struct Twin { b: i64 }
        }
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = WireRegistry::new();
        assert!(registry.register::<Badge>());
        assert!(!registry.register::<Badge>());

        let id = registry.for_name("Badge").unwrap();
        assert_eq!(registry.name_for(id), Some("Badge"));
        assert!(
            registry
                .get_with_path(concat!(module_path!(), "::Badge"))
                .is_some()
        );
    }

    #[test]
    fn duplicate_short_names_fall_back_to_paths() {
        let mut registry = WireRegistry::new();
        registry.register::<first::Twin>();
        registry.register::<second::Twin>();

        assert!(registry.is_ambiguous("Twin"));
        assert!(registry.get_with_name("Twin").is_none());
        assert!(registry.resolve("Twin").is_none());
        assert!(
            registry
                .get_with_path(concat!(module_path!(), "::first::Twin"))
                .is_some()
        );
    }

    #[test]
    fn tagged_round_trip() {
        let mut registry = WireRegistry::new();
        registry.register::<Badge>();

        let badge = Badge {
            id: 9,
            label: String::from("ops"),
        };
        let mut out = YamlOut::new();
        out.write_key("who").unwrap();
        registry.write_tagged(&badge, &mut out).unwrap();
        let doc = out.into_string();
        assert_eq!(doc, "who: !Badge { id: 9, label: ops }\n");

        let mut reader = YamlIn::new(doc.as_bytes());
        reader
            .marshallable(&mut |i| {
                assert!(i.read_key("who")?);
                let value = registry.read_tagged(i)?.expect("tag present");
                let back = value.downcast_ref::<Badge>().expect("a Badge");
                assert_eq!(*back, badge);
                Ok(())
            })
            .unwrap();
    }

    #[cfg(feature = "auto_register")]
    #[test]
    fn auto_register_sees_declared_types() {
        let mut registry = WireRegistry::new();
        registry.auto_register();
        assert!(registry.contains(core::any::TypeId::of::<Badge>()));
        // Repeated calls add nothing new.
        assert_eq!(registry.auto_register(), 0);
    }
}
