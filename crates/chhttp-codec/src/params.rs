//! Constructors for parameter values whose literal form the encoder cannot
//! infer from the Rust type alone.

use chhttp_core::DataValue;
use chrono::NaiveDate;
use std::fmt::Display;
use std::net::IpAddr;

pub fn array<T: Into<DataValue>>(items: impl IntoIterator<Item = T>) -> DataValue {
    DataValue::Sequence(items.into_iter().map(Into::into).collect())
}

/// A `Date` literal; plain timestamps encode with a time component.
pub fn date(day: NaiveDate) -> DataValue {
    DataValue::Bytes(format!("'{}'", day.format("%Y-%m-%d")).into_bytes())
}

pub fn decimal32(value: impl Display, scale: u32) -> DataValue {
    decimal("toDecimal32", value, scale)
}

pub fn decimal64(value: impl Display, scale: u32) -> DataValue {
    decimal("toDecimal64", value, scale)
}

pub fn decimal128(value: impl Display, scale: u32) -> DataValue {
    decimal("toDecimal128", value, scale)
}

fn decimal(func: &str, value: impl Display, scale: u32) -> DataValue {
    DataValue::Bytes(format!("{func}({value}, {scale})").into_bytes())
}

pub fn ip(addr: IpAddr) -> DataValue {
    DataValue::String(addr.to_string())
}
