use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

//==============================================================================
// Cell Values
//==============================================================================

/// Value kinds a spreadsheet cell may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    Text,
    Integer,
    Float,
    Boolean,
    DateTime,
}

impl CellKind {
    pub fn name(&self) -> &'static str {
        match self {
            CellKind::Text => "Text",
            CellKind::Integer => "Integer",
            CellKind::Float => "Float",
            CellKind::Boolean => "Boolean",
            CellKind::DateTime => "DateTime",
        }
    }
}

/// The closed set of values exchanged between tabular data and a worksheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum CellValue {
    #[default]
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Null, empty text and whitespace-only text all count as null.
    pub fn is_null(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Collapse blank text to [`CellValue::Null`].
    pub fn normalized(self) -> CellValue {
        if self.is_null() {
            CellValue::Null
        } else {
            self
        }
    }

    /// Kind of the value, `None` for null
    pub fn kind(&self) -> Option<CellKind> {
        match self {
            CellValue::Null => None,
            CellValue::String(_) => Some(CellKind::Text),
            CellValue::Integer(_) => Some(CellKind::Integer),
            CellValue::Float(_) => Some(CellKind::Float),
            CellValue::Boolean(_) => Some(CellKind::Boolean),
            CellValue::DateTime(_) => Some(CellKind::DateTime),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().map_or("Null", |kind| kind.name())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(f) => Some(*f),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Textual form used for headers and text fallbacks; null renders as "".
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::String(s) => f.write_str(s),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::DateTime(dt) => {
                if dt.time() == NaiveTime::MIN {
                    write!(f, "{}", dt.date().format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

//==============================================================================
// Record Field Values
//==============================================================================

/// Declared kind of a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    /// Enum with its member names in ordinal order
    Enum(&'static [&'static str]),
    /// Any other type, exchanged through its textual form
    Custom,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "Text",
            FieldKind::Integer => "Integer",
            FieldKind::Float => "Float",
            FieldKind::Boolean => "Boolean",
            FieldKind::Date => "Date",
            FieldKind::DateTime => "DateTime",
            FieldKind::Enum(_) => "Enum",
            FieldKind::Custom => "Custom",
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldKind::Date | FieldKind::DateTime)
    }
}

impl From<CellKind> for FieldKind {
    fn from(kind: CellKind) -> Self {
        match kind {
            CellKind::Text => FieldKind::Text,
            CellKind::Integer => FieldKind::Integer,
            CellKind::Float => FieldKind::Float,
            CellKind::Boolean => FieldKind::Boolean,
            CellKind::DateTime => FieldKind::DateTime,
        }
    }
}

/// Field kind plus nullability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldType {
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldType {
    pub const fn required(kind: FieldKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    pub const fn nullable(kind: FieldKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }
}

/// Native value of a record field, before or after coercion
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Enum { ordinal: usize, name: &'static str },
    Custom(String),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "Null",
            FieldValue::Text(_) => "Text",
            FieldValue::Integer(_) => "Integer",
            FieldValue::Float(_) => "Float",
            FieldValue::Boolean(_) => "Boolean",
            FieldValue::Date(_) => "Date",
            FieldValue::DateTime(_) => "DateTime",
            FieldValue::Enum { .. } => "Enum",
            FieldValue::Custom(_) => "Custom",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) | FieldValue::Custom(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            FieldValue::Enum { name, .. } => f.write_str(name),
        }
    }
}
