//! Cell value coercion
//!
//! Converts worksheet cells into record field values (`to_field`) and back
//! (`to_cell`). Rules, in order:
//!
//! 1. Null, empty and whitespace-only cells become [`FieldValue::Null`].
//! 2. Numbers headed for a date/time field are spreadsheet serial dates.
//! 3. Direct kind-to-kind conversions (integer to float, date-time to date, ...).
//! 4. Anything else goes through the cell's textual form and is parsed
//!    as the target kind.
//!
//! Failures are returned per field so callers decide whether to skip the
//! field or abort.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::CoercionError;
use crate::value::{CellKind, CellValue, FieldKind, FieldType, FieldValue};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Largest serial Excel accepts (9999-12-31)
const MAX_SERIAL_DATE: f64 = 2_958_466.0;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];

//==============================================================================
// Serial Dates (1900 date system)
//==============================================================================

fn serial_origin(serial_days: f64) -> NaiveDate {
    // Serials below 61 predate the phantom 1900-02-29, which shifts the origin by a day.
    let (year, month, day) = if serial_days < 61.0 {
        (1899, 12, 31)
    } else {
        (1899, 12, 30)
    };
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// Convert a spreadsheet serial date to a date-time.
pub fn serial_to_datetime(serial: f64) -> Result<NaiveDateTime, CoercionError> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_SERIAL_DATE {
        return Err(CoercionError::InvalidSerialDate(serial));
    }
    let days = serial.trunc();
    let seconds = ((serial - days) * SECONDS_PER_DAY).round() as i64;
    let midnight = serial_origin(days).and_time(NaiveTime::MIN);
    Ok(midnight + Duration::days(days as i64) + Duration::seconds(seconds))
}

/// Convert a date-time to a spreadsheet serial date.
pub fn datetime_to_serial(value: NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN);
    let mut days = (value.date() - epoch.date()).num_days() as f64;
    if days < 61.0 {
        days -= 1.0;
    }
    days + f64::from(value.num_seconds_from_midnight()) / SECONDS_PER_DAY
}

//==============================================================================
// Cell -> Field
//==============================================================================

/// Coerce a cell into a value of `target`'s kind.
pub fn to_field(cell: &CellValue, target: &FieldType) -> Result<FieldValue, CoercionError> {
    if cell.is_null() {
        return Ok(FieldValue::Null);
    }

    // Numbers bound for temporal fields are serial dates; resolve before anything else.
    if target.kind.is_temporal() {
        if let Some(serial) = cell.as_f64() {
            let datetime = serial_to_datetime(serial)?;
            return Ok(match target.kind {
                FieldKind::Date => FieldValue::Date(datetime.date()),
                _ => FieldValue::DateTime(datetime),
            });
        }
    }

    match (cell, target.kind) {
        (_, FieldKind::Text) => Ok(FieldValue::Text(cell.to_text())),
        (_, FieldKind::Custom) => Ok(FieldValue::Custom(cell.to_text())),

        (CellValue::Integer(i), FieldKind::Integer) => Ok(FieldValue::Integer(*i)),
        (CellValue::Float(f), FieldKind::Integer) => float_to_integer(*f),
        (CellValue::Boolean(b), FieldKind::Integer) => Ok(FieldValue::Integer(i64::from(*b))),

        (CellValue::Integer(i), FieldKind::Float) => Ok(FieldValue::Float(*i as f64)),
        (CellValue::Float(f), FieldKind::Float) => Ok(FieldValue::Float(*f)),

        (CellValue::Boolean(b), FieldKind::Boolean) => Ok(FieldValue::Boolean(*b)),
        (CellValue::Integer(i), FieldKind::Boolean) => Ok(FieldValue::Boolean(*i != 0)),
        (CellValue::Float(f), FieldKind::Boolean) => Ok(FieldValue::Boolean(*f != 0.0)),

        (CellValue::DateTime(dt), FieldKind::DateTime) => Ok(FieldValue::DateTime(*dt)),
        (CellValue::DateTime(dt), FieldKind::Date) => Ok(FieldValue::Date(dt.date())),

        (CellValue::Integer(_) | CellValue::Float(_), FieldKind::Enum(names)) => {
            enum_from_ordinal(cell.as_f64().unwrap_or(f64::NAN), names)
        }

        (CellValue::DateTime(_) | CellValue::Boolean(_), _) => Err(CoercionError::Incompatible {
            from: cell.type_name(),
            to: target.kind.name(),
        }),

        _ => parse_text(cell.to_text().trim(), target.kind),
    }
}

fn float_to_integer(value: f64) -> Result<FieldValue, CoercionError> {
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(CoercionError::InvalidText {
            text: value.to_string(),
            to: FieldKind::Integer.name(),
        });
    }
    if value < i64::MIN as f64 || value >= i64::MAX as f64 {
        return Err(CoercionError::Overflow {
            value: value.to_string(),
            to: FieldKind::Integer.name(),
        });
    }
    Ok(FieldValue::Integer(value as i64))
}

/// Integral and inside the range `float_to_integer` accepts
fn fits_i64(value: f64) -> bool {
    value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64
}

fn enum_from_ordinal(
    value: f64,
    names: &'static [&'static str],
) -> Result<FieldValue, CoercionError> {
    if value.fract() != 0.0 || value < 0.0 || value >= names.len() as f64 {
        return Err(CoercionError::EnumOrdinal {
            ordinal: value,
            len: names.len(),
        });
    }
    let ordinal = value as usize;
    Ok(FieldValue::Enum {
        ordinal,
        name: names[ordinal],
    })
}

fn enum_from_name(text: &str, names: &'static [&'static str]) -> Result<FieldValue, CoercionError> {
    names
        .iter()
        .position(|name| name.eq_ignore_ascii_case(text))
        .map(|ordinal| FieldValue::Enum {
            ordinal,
            name: names[ordinal],
        })
        .or_else(|| {
            // Numeric text names a member by ordinal.
            text.parse::<f64>()
                .ok()
                .and_then(|n| enum_from_ordinal(n, names).ok())
        })
        .ok_or_else(|| CoercionError::EnumMember {
            text: text.to_string(),
        })
}

/// Parse trimmed text as a boolean: true/false, yes/no, 1/0
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Parse text as a date or date-time, dates land at midnight
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Fallback: parse the textual form into `kind`.
fn parse_text(text: &str, kind: FieldKind) -> Result<FieldValue, CoercionError> {
    let invalid = || CoercionError::InvalidText {
        text: text.to_string(),
        to: kind.name(),
    };
    match kind {
        FieldKind::Text => Ok(FieldValue::Text(text.to_string())),
        FieldKind::Custom => Ok(FieldValue::Custom(text.to_string())),
        FieldKind::Integer => match text.parse::<i64>() {
            Ok(i) => Ok(FieldValue::Integer(i)),
            Err(_) => text
                .parse::<f64>()
                .map_err(|_| invalid())
                .and_then(float_to_integer),
        },
        FieldKind::Float => match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(FieldValue::Float(f)),
            _ => Err(invalid()),
        },
        FieldKind::Boolean => parse_bool(text)
            .map(FieldValue::Boolean)
            .ok_or_else(invalid),
        FieldKind::Date => parse_datetime(text)
            .map(|dt| FieldValue::Date(dt.date()))
            .ok_or_else(invalid),
        FieldKind::DateTime => parse_datetime(text)
            .map(FieldValue::DateTime)
            .ok_or_else(invalid),
        FieldKind::Enum(names) => enum_from_name(text, names),
    }
}

//==============================================================================
// Field -> Cell
//==============================================================================

/// Render a field value as the nearest cell kind. Never fails.
pub fn to_cell(value: &FieldValue) -> CellValue {
    match value {
        FieldValue::Null => CellValue::Null,
        FieldValue::Text(s) | FieldValue::Custom(s) if s.is_empty() => CellValue::Null,
        FieldValue::Text(s) | FieldValue::Custom(s) => CellValue::String(s.clone()),
        FieldValue::Integer(i) => CellValue::Integer(*i),
        FieldValue::Float(f) if f.is_finite() => CellValue::Float(*f),
        FieldValue::Float(f) => CellValue::String(f.to_string()),
        FieldValue::Boolean(b) => CellValue::Boolean(*b),
        FieldValue::Date(d) => CellValue::DateTime(d.and_time(NaiveTime::MIN)),
        FieldValue::DateTime(dt) => CellValue::DateTime(*dt),
        FieldValue::Enum { name, .. } => CellValue::String((*name).to_string()),
    }
}

/// Coerce a cell to another cell kind (tabular columns).
pub fn coerce_cell(cell: &CellValue, kind: CellKind) -> Result<CellValue, CoercionError> {
    if cell.kind() == Some(kind) {
        return Ok(cell.clone());
    }
    let field = to_field(cell, &FieldType::nullable(kind.into()))?;
    Ok(to_cell(&field))
}

/// Narrowest kind every non-null cell converts to without loss.
///
/// Integral floats within `i64` range count as integers; `true`/`false` text
/// counts as boolean. `nan` and `inf` text stays text.
/// All-null input infers `Text`.
pub fn infer_kind<'a>(cells: impl IntoIterator<Item = &'a CellValue>) -> CellKind {
    let mut integer = true;
    let mut float = true;
    let mut boolean = true;
    let mut datetime = true;
    let mut any = false;

    for cell in cells {
        if cell.is_null() {
            continue;
        }
        any = true;
        let text = cell.to_text();
        let text = text.trim();
        match cell {
            CellValue::Integer(_) => {
                boolean = false;
                datetime = false;
            }
            CellValue::Float(f) => {
                integer &= fits_i64(*f);
                boolean = false;
                datetime = false;
            }
            CellValue::Boolean(_) => {
                integer = false;
                float = false;
                datetime = false;
            }
            CellValue::DateTime(_) => {
                integer = false;
                float = false;
                boolean = false;
            }
            CellValue::String(_) => {
                integer &= text.parse::<i64>().is_ok();
                float &= text.parse::<f64>().is_ok_and(f64::is_finite);
                boolean &= text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false");
                datetime &= parse_datetime(text).is_some();
            }
            CellValue::Null => {}
        }
        if !(integer || float || boolean || datetime) {
            return CellKind::Text;
        }
    }

    match (any, integer, float, boolean, datetime) {
        (false, ..) => CellKind::Text,
        (_, true, ..) => CellKind::Integer,
        (_, _, true, ..) => CellKind::Float,
        (_, _, _, true, _) => CellKind::Boolean,
        (_, _, _, _, true) => CellKind::DateTime,
        _ => CellKind::Text,
    }
}

//==============================================================================
// Native Field Types
//==============================================================================

/// A Rust type usable as a record field.
///
/// `from_field_value` receives a value already coerced to
/// `field_type().kind`, or `Null`, which maps to the type's default.
pub trait FieldCodec: Sized {
    fn field_type() -> FieldType;
    fn to_field_value(&self) -> FieldValue;
    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError>;
}

fn mismatch(value: &FieldValue, to: FieldKind) -> CoercionError {
    CoercionError::Incompatible {
        from: value.type_name(),
        to: to.name(),
    }
}

impl FieldCodec for String {
    fn field_type() -> FieldType {
        FieldType::required(FieldKind::Text)
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Null => Ok(String::new()),
            FieldValue::Text(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }
}

impl FieldCodec for bool {
    fn field_type() -> FieldType {
        FieldType::required(FieldKind::Boolean)
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Boolean(*self)
    }

    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Null => Ok(false),
            FieldValue::Boolean(b) => Ok(b),
            other => Err(mismatch(&other, FieldKind::Boolean)),
        }
    }
}

macro_rules! integer_codec {
    ($($ty:ty),*) => {
        $(
            impl FieldCodec for $ty {
                fn field_type() -> FieldType {
                    FieldType::required(FieldKind::Integer)
                }

                fn to_field_value(&self) -> FieldValue {
                    match i64::try_from(*self) {
                        Ok(i) => FieldValue::Integer(i),
                        Err(_) => FieldValue::Text(self.to_string()),
                    }
                }

                fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
                    match value {
                        FieldValue::Null => Ok(0),
                        FieldValue::Integer(i) => <$ty>::try_from(i).map_err(|_| {
                            CoercionError::Overflow {
                                value: i.to_string(),
                                to: stringify!($ty),
                            }
                        }),
                        other => Err(mismatch(&other, FieldKind::Integer)),
                    }
                }
            }
        )*
    };
}

integer_codec!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FieldCodec for f64 {
    fn field_type() -> FieldType {
        FieldType::required(FieldKind::Float)
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Float(*self)
    }

    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Null => Ok(0.0),
            FieldValue::Float(f) => Ok(f),
            FieldValue::Integer(i) => Ok(i as f64),
            other => Err(mismatch(&other, FieldKind::Float)),
        }
    }
}

impl FieldCodec for f32 {
    fn field_type() -> FieldType {
        FieldType::required(FieldKind::Float)
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Float(f64::from(*self))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        f64::from_field_value(value).map(|f| f as f32)
    }
}

impl FieldCodec for NaiveDate {
    fn field_type() -> FieldType {
        FieldType::required(FieldKind::Date)
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Date(*self)
    }

    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Null => Ok(NaiveDate::default()),
            FieldValue::Date(d) => Ok(d),
            FieldValue::DateTime(dt) => Ok(dt.date()),
            other => Err(mismatch(&other, FieldKind::Date)),
        }
    }
}

impl FieldCodec for NaiveDateTime {
    fn field_type() -> FieldType {
        FieldType::required(FieldKind::DateTime)
    }

    fn to_field_value(&self) -> FieldValue {
        FieldValue::DateTime(*self)
    }

    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Null => Ok(NaiveDateTime::default()),
            FieldValue::DateTime(dt) => Ok(dt),
            FieldValue::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            other => Err(mismatch(&other, FieldKind::DateTime)),
        }
    }
}

impl<T: FieldCodec> FieldCodec for Option<T> {
    fn field_type() -> FieldType {
        FieldType::nullable(T::field_type().kind)
    }

    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(value) => value.to_field_value(),
            None => FieldValue::Null,
        }
    }

    fn from_field_value(value: FieldValue) -> Result<Self, CoercionError> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field_value(other).map(Some),
        }
    }
}
