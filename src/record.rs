//! Record types: structs whose fields map to worksheet columns.
//!
//! Implement [`Record`] by hand or with [`impl_record!`](crate::impl_record):
//!
//! ```
//! use sheetforge::impl_record;
//!
//! #[derive(Default)]
//! struct Employee {
//!     name: String,
//!     age: i32,
//!     email: Option<String>,
//! }
//!
//! impl_record!(Employee {
//!     name: String => column(display = "Full Name", order = 0),
//!     age: i32 => column(order = 1),
//!     email: Option<String>,
//! });
//! ```

use crate::error::CoercionError;
use crate::value::{FieldType, FieldValue};

/// Per-field export annotation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnAttr {
    /// Header text; empty means "use the field name"
    pub display_name: String,
    /// Explicit position; `None` sorts after every ordered field
    pub ordinal: Option<i32>,
}

/// Static description of one record field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
    pub column: Option<ColumnAttr>,
    pub readable: bool,
    pub writable: bool,
}

impl FieldDef {
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            column: None,
            readable: true,
            writable: true,
        }
    }

    /// Set the annotation's display name
    #[must_use]
    pub fn display(mut self, display_name: &str) -> Self {
        self.column.get_or_insert_with(ColumnAttr::default).display_name =
            display_name.to_string();
        self
    }

    /// Set the annotation's ordinal
    #[must_use]
    pub fn order(mut self, ordinal: i32) -> Self {
        self.column.get_or_insert_with(ColumnAttr::default).ordinal = Some(ordinal);
        self
    }

    /// Exported but never filled on import
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Filled on import but never exported
    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }
}

/// A type whose fields can be laid out as worksheet columns.
pub trait Record: Send + Sync + 'static {
    /// Fields in declaration order
    fn fields() -> Vec<FieldDef>;

    /// Read a field; `None` when no such field exists
    fn get(&self, field: &str) -> Option<FieldValue>;

    /// Assign a field from a value already coerced to its kind
    fn set(&mut self, field: &str, value: FieldValue) -> Result<(), CoercionError>;
}

/// Implement [`Record`] for a struct from a field list.
///
/// Each entry is `field: Type`, optionally followed by
/// `=> column(display = "...", order = N)` with either key omitted.
/// Every field type must implement [`FieldCodec`](crate::coerce::FieldCodec).
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $( $field:ident : $fty:ty $( => column( $( $key:ident = $val:expr ),* $(,)? ) )? ),* $(,)? }) => {
        impl $crate::record::Record for $ty {
            fn fields() -> ::std::vec::Vec<$crate::record::FieldDef> {
                ::std::vec![
                    $(
                        $crate::record::FieldDef::new(
                            stringify!($field),
                            <$fty as $crate::coerce::FieldCodec>::field_type(),
                        ) $( $( .$key($val) )* )?
                    ),*
                ]
            }

            fn get(&self, field: &str) -> ::std::option::Option<$crate::value::FieldValue> {
                match field {
                    $(
                        stringify!($field) => ::std::option::Option::Some(
                            $crate::coerce::FieldCodec::to_field_value(&self.$field),
                        ),
                    )*
                    _ => ::std::option::Option::None,
                }
            }

            fn set(
                &mut self,
                field: &str,
                value: $crate::value::FieldValue,
            ) -> ::std::result::Result<(), $crate::error::CoercionError> {
                match field {
                    $(
                        stringify!($field) => {
                            self.$field =
                                <$fty as $crate::coerce::FieldCodec>::from_field_value(value)?;
                            ::std::result::Result::Ok(())
                        }
                    )*
                    _ => ::std::result::Result::Err(
                        $crate::error::CoercionError::UnknownField(field.to_string()),
                    ),
                }
            }
        }
    };
}

/// Implement [`FieldCodec`](crate::coerce::FieldCodec) for a fieldless enum.
///
/// Members are matched by name (case-insensitive) or by ordinal, in the
/// order listed. The first member is the default for empty cells.
#[macro_export]
macro_rules! impl_field_enum {
    ($ty:ident { $( $variant:ident ),+ $(,)? }) => {
        impl $crate::coerce::FieldCodec for $ty {
            fn field_type() -> $crate::value::FieldType {
                $crate::value::FieldType::required($crate::value::FieldKind::Enum(&[
                    $( stringify!($variant) ),+
                ]))
            }

            fn to_field_value(&self) -> $crate::value::FieldValue {
                const NAMES: &[&str] = &[ $( stringify!($variant) ),+ ];
                let name = match self {
                    $( $ty::$variant => stringify!($variant), )+
                };
                let ordinal = NAMES.iter().position(|n| *n == name).unwrap_or_default();
                $crate::value::FieldValue::Enum { ordinal, name }
            }

            fn from_field_value(
                value: $crate::value::FieldValue,
            ) -> ::std::result::Result<Self, $crate::error::CoercionError> {
                let members = [ $( $ty::$variant ),+ ];
                let len = members.len();
                let ordinal = match value {
                    $crate::value::FieldValue::Null => 0,
                    $crate::value::FieldValue::Enum { ordinal, .. } => ordinal,
                    other => {
                        return ::std::result::Result::Err(
                            $crate::error::CoercionError::Incompatible {
                                from: other.type_name(),
                                to: "Enum",
                            },
                        )
                    }
                };
                members
                    .into_iter()
                    .nth(ordinal)
                    .ok_or($crate::error::CoercionError::EnumOrdinal {
                        ordinal: ordinal as f64,
                        len,
                    })
            }
        }
    };
}
