//! Materialized cell values read from the source database.
//!
//! Each variant corresponds to one general value kind the formatter registry
//! knows how to render. Driver adapters convert their native cells into this
//! enum one row at a time.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

/// A single cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// SQL NULL.
    Null,

    /// `bit`.
    Bool(bool),

    /// `tinyint`.
    U8(u8),

    /// `smallint`.
    I16(i16),

    /// `int`.
    I32(i32),

    /// `bigint`.
    I64(i64),

    /// `real`.
    F32(f32),

    /// `float`, `money`, `smallmoney`.
    F64(f64),

    /// Exact numeric (`decimal`/`numeric`) kept as unscaled integer plus scale
    /// so no precision is lost on the way to text.
    Numeric { value: i128, scale: u8 },

    /// Character data, including special types read through their text form.
    Text(String),

    /// `xml` payload.
    Xml(String),

    /// `binary`, `varbinary`, `image`.
    Bytes(Vec<u8>),

    /// `uniqueidentifier`.
    Guid(Uuid),

    /// `date`.
    Date(NaiveDate),

    /// `time`.
    Time(NaiveTime),

    /// `datetime`, `datetime2`, `smalldatetime`.
    DateTime(NaiveDateTime),

    /// `datetimeoffset`.
    DateTimeOffset(DateTime<FixedOffset>),
}

impl CellValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl<T> From<Option<T>> for CellValue
where
    T: Into<CellValue>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(CellValue::Null, Into::into)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}

impl From<u8> for CellValue {
    fn from(v: u8) -> Self {
        CellValue::U8(v)
    }
}

impl From<i16> for CellValue {
    fn from(v: i16) -> Self {
        CellValue::I16(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        CellValue::I32(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::I64(v)
    }
}

impl From<f32> for CellValue {
    fn from(v: f32) -> Self {
        CellValue::F32(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::F64(v)
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for CellValue {
    fn from(v: Vec<u8>) -> Self {
        CellValue::Bytes(v)
    }
}

impl From<Uuid> for CellValue {
    fn from(v: Uuid) -> Self {
        CellValue::Guid(v)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(v: NaiveDate) -> Self {
        CellValue::Date(v)
    }
}

impl From<NaiveTime> for CellValue {
    fn from(v: NaiveTime) -> Self {
        CellValue::Time(v)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(v: NaiveDateTime) -> Self {
        CellValue::DateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for CellValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        CellValue::DateTimeOffset(v)
    }
}
