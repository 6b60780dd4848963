//! The schema-generation step lives outside the marshalling core: this
//! declarative macro defines a struct, derives its [`TypeScheme`] with one
//! [`FieldScheme`] per field in declaration order, and wires the type into
//! [`FieldValue`] so it can nest inside other marshallables.
//!
//! [`TypeScheme`]: crate::marshal::TypeScheme
//! [`FieldScheme`]: crate::marshal::FieldScheme
//! [`FieldValue`]: crate::marshal::FieldValue

/// Defines a struct and implements [`Marshallable`](crate::marshal::Marshallable)
/// and [`FieldValue`](crate::marshal::FieldValue) for it.
///
/// The type must also implement (or derive) `Default`, which is used when a
/// fresh instance has to be constructed during a read.
///
/// ```
/// use ww_wire::marshallable;
/// use ww_wire::marshal::{to_yaml_string, from_yaml_str};
///
/// marshallable! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct Point {
///         x: i64,
///         y: i64,
///     }
/// }
///
/// let p = Point { x: 1, y: 2 };
/// let doc = to_yaml_string(&p).unwrap();
/// assert_eq!(doc, "x: 1\ny: 2\n");
/// assert_eq!(from_yaml_str::<Point>(&doc).unwrap(), p);
/// ```
#[macro_export]
macro_rules! marshallable {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $field_ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$field_meta])* $field_vis $field : $field_ty, )*
        }

        impl $crate::marshal::Marshallable for $name {
            fn type_scheme() -> &'static $crate::marshal::TypeScheme {
                static CELL: $crate::marshal::SchemeCell = $crate::marshal::SchemeCell::new();
                CELL.get_or_init(|| {
                    $crate::marshal::TypeScheme::new(
                        stringify!($name),
                        concat!(module_path!(), "::", stringify!($name)),
                        vec![
                            $(
                                $crate::marshal::FieldScheme::new(
                                    stringify!($field),
                                    <$field_ty as $crate::marshal::FieldValue>::KIND,
                                    |value, out| {
                                        let value = value
                                            .downcast_ref::<$name>()
                                            .expect("field accessor applied to foreign type");
                                        $crate::marshal::FieldValue::write_value(&value.$field, out)
                                    },
                                    |value, reader| {
                                        let value = value
                                            .downcast_mut::<$name>()
                                            .expect("field accessor applied to foreign type");
                                        $crate::marshal::FieldValue::read_value(&mut value.$field, reader)
                                    },
                                ),
                            )*
                        ],
                    )
                })
            }
        }

        impl $crate::marshal::FieldValue for $name {
            const KIND: $crate::marshal::FieldKind = $crate::marshal::FieldKind::Nested {
                scheme: <$name as $crate::marshal::Marshallable>::type_scheme,
            };

            fn write_value(
                &self,
                out: &mut dyn $crate::value::ValueOut,
            ) -> $crate::error::WireResult<()> {
                let scheme = <$name as $crate::marshal::Marshallable>::type_scheme();
                out.leaf(scheme.is_leaf());
                $crate::marshal::write_nested(scheme, self, out)
            }

            fn read_new(
                reader: &mut dyn $crate::value::ValueIn,
            ) -> $crate::error::WireResult<Self> {
                let mut value = <$name as ::core::default::Default>::default();
                $crate::marshal::FieldValue::read_value(&mut value, reader)?;
                Ok(value)
            }

            fn read_value(
                &mut self,
                reader: &mut dyn $crate::value::ValueIn,
            ) -> $crate::error::WireResult<()> {
                $crate::marshal::read_nested(
                    <$name as $crate::marshal::Marshallable>::type_scheme(),
                    self,
                    reader,
                )
            }
        }

        $crate::__submit_registration!($name);
    };
}

/// Feeds the type into the `inventory`-backed auto-registration stream when
/// the `auto_register` feature is on.
#[cfg(feature = "auto_register")]
#[doc(hidden)]
#[macro_export]
macro_rules! __submit_registration {
    ($name:ident) => {
        $crate::registry::__inventory::submit! {
            $crate::registry::Registration::of::<$name>()
        }
    };
}

#[cfg(not(feature = "auto_register"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __submit_registration {
    ($name:ident) => {};
}
