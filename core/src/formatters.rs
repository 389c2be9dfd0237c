//! Conversion of cell values into T-SQL literals.
//!
//! Resolution happens once per column: ignored native types are dropped,
//! a handful of native type names get a dedicated formatter, and everything
//! else is rendered by the kind of value the driver materialized.

use std::fmt::{Display, LowerExp};

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};

use crate::domain::{ColumnBinding, ColumnDescriptor};
use crate::value::CellValue;

/// Native types whose values are managed by the engine and never dumped
const IGNORED_TYPES: &[&str] = &["timestamp"];

/// Types that have to be read through their text conversion
const SPECIAL_TYPES: &[&str] = &["geometry", "geography", "hierarchyid"];

/// Types the driver cannot decode; read through a text conversion
const VARIANT_TYPES: &[&str] = &["sql_variant"];

/// Sub-second digits for `datetime2`, `datetimeoffset` and `time`
pub const DEFAULT_FRACTION_DIGITS: u32 = 7;

/// Sub-second digits for legacy `datetime`
pub const LEGACY_FRACTION_DIGITS: u32 = 3;

/// Formatters selected by exact native type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFormat {
    /// `date` as `'yyyy-MM-dd'`
    Date,
    /// `datetime` with millisecond precision
    LegacyDateTime,
    /// `decimal` verbatim
    Decimal,
    /// `xml` as an escaped string literal
    Xml,
}

impl NativeFormat {
    fn from_type_name(type_name: &str) -> Option<Self> {
        match type_name {
            "date" => Some(NativeFormat::Date),
            "datetime" => Some(NativeFormat::LegacyDateTime),
            "decimal" => Some(NativeFormat::Decimal),
            "xml" => Some(NativeFormat::Xml),
            _ => None,
        }
    }
}

/// Formatter resolved for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    Native(NativeFormat),
    ByValue,
}

impl Formatter {
    /// Render a cell as a literal ready to be placed in a VALUES tuple
    pub fn format(&self, value: &CellValue) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        match self {
            Formatter::Native(native) => format_native(*native, value),
            Formatter::ByValue => format_value(value),
        }
    }
}

/// Whether values of this native type are excluded from the dump
pub fn is_ignored_type(type_name: &str) -> bool {
    IGNORED_TYPES.contains(&type_name)
}

/// Whether this native type must be selected through `.ToString()`
pub fn is_special_type(type_name: &str) -> bool {
    SPECIAL_TYPES.contains(&type_name)
}

/// Whether this native type must be selected through `CONVERT(nvarchar(max), ...)`
pub fn is_variant_type(type_name: &str) -> bool {
    VARIANT_TYPES.contains(&type_name)
}

/// Resolve the formatter for a column, `None` when the column is not exported
pub fn resolve_formatter(type_name: &str) -> Option<Formatter> {
    if is_ignored_type(type_name) {
        return None;
    }
    Some(
        NativeFormat::from_type_name(type_name)
            .map(Formatter::Native)
            .unwrap_or(Formatter::ByValue),
    )
}

/// Bind a formatter to every exported column.
///
/// Ordinals refer to the position in the select list, which follows `columns`.
pub fn bind_formatters(columns: &[ColumnDescriptor]) -> Vec<ColumnBinding> {
    columns
        .iter()
        .enumerate()
        .filter_map(|(ordinal, column)| {
            resolve_formatter(&column.native_type_name).map(|formatter| ColumnBinding {
                output_name: column.name.clone(),
                ordinal,
                formatter,
            })
        })
        .collect()
}

fn format_native(native: NativeFormat, value: &CellValue) -> String {
    match (native, value) {
        (NativeFormat::Date, CellValue::Date(date)) => format!("'{}'", date.format("%Y-%m-%d")),
        (NativeFormat::Date, CellValue::DateTime(dt)) => format!("'{}'", dt.format("%Y-%m-%d")),
        (NativeFormat::LegacyDateTime, CellValue::DateTime(dt)) => {
            format_date_time(&round_to_millis(dt), LEGACY_FRACTION_DIGITS, true)
        }
        (NativeFormat::Decimal, CellValue::Numeric { value, scale }) => {
            format_numeric(*value, *scale)
        }
        (NativeFormat::Xml, CellValue::Xml(text) | CellValue::Text(text)) => quote_string(text),
        // unexpected kind for this native type
        (_, other) => format_value(other),
    }
}

/// Render a non-null value by its materialized kind
pub fn format_value(value: &CellValue) -> String {
    match value {
        CellValue::Null => "NULL".to_string(),
        CellValue::Text(text) | CellValue::Xml(text) => quote_string(text),
        CellValue::DateTime(dt) => format_date_time(dt, DEFAULT_FRACTION_DIGITS, true),
        CellValue::DateTimeOffset(dto) => format!(
            "'{}{}'",
            format_date_time(&dto.naive_local(), DEFAULT_FRACTION_DIGITS, false),
            dto.format("%:z")
        ),
        CellValue::Time(time) => format!("'{}'", format_time(time, DEFAULT_FRACTION_DIGITS)),
        CellValue::Date(date) => format!("'{}'", date.format("%Y-%m-%d")),
        CellValue::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        CellValue::Bytes(bytes) => format_binary(bytes),
        CellValue::Guid(guid) => format!("'{}'", guid.hyphenated()),
        CellValue::Numeric { value, scale } => format_numeric(*value, *scale),
        CellValue::U8(v) => v.to_string(),
        CellValue::I16(v) => v.to_string(),
        CellValue::I32(v) => v.to_string(),
        CellValue::I64(v) => v.to_string(),
        CellValue::F32(v) => format_float(*v, f64::from(*v)),
        CellValue::F64(v) => format_float(*v, *v),
    }
}

/// Shortest round-trip text of a float.
///
/// Magnitudes outside `[1e-5, 1e15)` use exponent notation, which keeps the
/// literal within the 38 digits a numeric constant may have.
fn format_float<T: Display + LowerExp>(value: T, magnitude: f64) -> String {
    let magnitude = magnitude.abs();
    if magnitude != 0.0 && !(1e-5..1e15).contains(&magnitude) {
        format!("{:e}", value)
    } else {
        value.to_string()
    }
}

/// `datetime` ticks are 1/300 s; round them to the nearest millisecond
fn round_to_millis(value: &NaiveDateTime) -> NaiveDateTime {
    let rounded = value
        .checked_add_signed(Duration::microseconds(500))
        .unwrap_or(*value);
    rounded
        .with_nanosecond(rounded.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(rounded)
}

/// Quote a string, doubling embedded quotes.
///
/// Strings holding anything outside ASCII get the `N` prefix.
pub fn quote_string(value: &str) -> String {
    let prefix = if value.chars().any(|c| c as u32 > 127) {
        "N"
    } else {
        ""
    };
    format!("{}'{}'", prefix, value.replace('\'', "''"))
}

/// Render a date-time as `yyyy-MM-ddTHH:mm:ss[.f...]`.
///
/// The fraction keeps `digits` digits and is left out when all of them are zero.
pub fn format_date_time(value: &NaiveDateTime, digits: u32, quote: bool) -> String {
    let mut result = value.format("%Y-%m-%dT%H:%M:%S").to_string();
    push_fraction(&mut result, value.nanosecond(), digits);
    if quote {
        format!("'{}'", result)
    } else {
        result
    }
}

/// Render a time of day as `HH:mm:ss[.f...]`
pub fn format_time(value: &NaiveTime, digits: u32) -> String {
    let mut result = value.format("%H:%M:%S").to_string();
    push_fraction(&mut result, value.nanosecond(), digits);
    result
}

fn push_fraction(out: &mut String, nanos: u32, digits: u32) {
    let digits = digits.clamp(1, 9);
    // leap seconds are reported as nanos >= 1e9
    let nanos = nanos % 1_000_000_000;
    let fraction = nanos / 10u32.pow(9 - digits);
    if fraction != 0 {
        out.push_str(&format!(".{:0width$}", fraction, width = digits as usize));
    }
}

/// `0x` followed by uppercase hex digits
pub fn format_binary(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02X}", b));
    }
    out
}

/// Exact decimal text of `value / 10^scale`, keeping trailing zeros of the scale
pub fn format_numeric(value: i128, scale: u8) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let digits = value.unsigned_abs().to_string();
    let scale = scale as usize;
    if scale == 0 {
        return format!("{}{}", sign, digits);
    }
    let padded = format!("{:0>width$}", digits, width = scale + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    format!("{}{}.{}", sign, int_part, frac_part)
}
