use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;

/// A decoded cell, or a parameter value headed for the encoder.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum DataValue {
    Null,
    /// Produced by the `Nothing` type, which occupies no bytes on the wire.
    Void,
    Bool(bool),
    Int64(i64),
    UInt64(u64),
    /// Host `f32` parameters. Decoded `Float32` columns widen to `Float64`.
    Float32(f32),
    Float64(f64),
    String(String),
    /// Raw bytes. Decoded from text cells that are not valid UTF-8; passed
    /// through verbatim (unquoted) by the encoder.
    Bytes(Vec<u8>),
    Time(DateTime<Tz>),
    Sequence(Vec<DataValue>),
    /// Tuple fields in declared order, named `Field0..FieldN`.
    Record(Vec<(String, DataValue)>),
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&DataValue> {
        match self {
            DataValue::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn is_zero_time(&self) -> bool {
        matches!(self, DataValue::Time(t) if *t == zero_timestamp())
    }
}

macro_rules! from_widening {
    ($variant:ident, $target:ty: $($src:ty),+) => {
        $(
            impl From<$src> for DataValue {
                fn from(v: $src) -> Self {
                    DataValue::$variant(<$target>::from(v))
                }
            }
        )+
    };
}

from_widening!(Int64, i64: i8, i16, i32, i64);
from_widening!(UInt64, u64: u8, u16, u32, u64);
from_widening!(Float32, f32: f32);
from_widening!(Float64, f64: f64);

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Bool(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::String(v.to_string())
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::String(v)
    }
}

impl From<DateTime<Tz>> for DataValue {
    fn from(v: DateTime<Tz>) -> Self {
        DataValue::Time(v)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(DataValue::Null, Into::into)
    }
}

impl<T: Into<DataValue>> From<Vec<T>> for DataValue {
    fn from(v: Vec<T>) -> Self {
        DataValue::Sequence(v.into_iter().map(Into::into).collect())
    }
}

/// The value the server's all-zero date and datetime strings decode to:
/// `0001-01-01 00:00:00 UTC`.
pub fn zero_timestamp() -> DateTime<Tz> {
    let date = NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN);
    Tz::UTC.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// Semantic type of a column or element, derived from its wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
    String,
    Decimal,
    Time,
    Array(Box<ScanType>),
    Tuple(Vec<ScanType>),
    Nullable(Box<ScanType>),
    Void,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataRow {
    pub values: Vec<DataValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timestamp_ignores_zone() {
        let zero = zero_timestamp();
        let shifted = zero.with_timezone(&chrono_tz::America::Los_Angeles);
        assert!(DataValue::Time(shifted).is_zero_time());
        assert_eq!(zero.naive_utc().to_string(), "0001-01-01 00:00:00");
    }

    #[test]
    fn record_field_lookup() {
        let rec = DataValue::Record(vec![
            ("Field0".into(), DataValue::Int64(1)),
            ("Field1".into(), DataValue::String("x".into())),
        ]);
        assert_eq!(rec.field("Field1").and_then(DataValue::as_str), Some("x"));
        assert_eq!(rec.field("Field2"), None);
    }
}
