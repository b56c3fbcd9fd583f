use bytes::{BufMut, Bytes, BytesMut};
use chhttp_core::{CodecError, CodecResult, DataValue};
use std::fmt::Display;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders host values as SQL literal text for parameter substitution.
///
/// `DataValue::String` is quoted and escaped; `DataValue::Bytes` is written
/// verbatim, which lets callers pass pre-rendered SQL fragments such as
/// `toDecimal32(1000, 4)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextEncoder;

impl TextEncoder {
    pub fn encode(&self, value: &DataValue) -> CodecResult<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf, value)?;
        Ok(buf.freeze())
    }

    pub fn encode_into(&self, buf: &mut BytesMut, value: &DataValue) -> CodecResult<()> {
        match value {
            DataValue::Null => buf.extend_from_slice(b"NULL"),
            DataValue::Void => {
                return Err(CodecError::UnsupportedType(
                    "Nothing cannot be encoded as a parameter".to_string(),
                ))
            }
            DataValue::Bool(v) => buf.put_u8(if *v { b'1' } else { b'0' }),
            DataValue::Int64(v) => buf.extend_from_slice(v.to_string().as_bytes()),
            DataValue::UInt64(v) => buf.extend_from_slice(v.to_string().as_bytes()),
            DataValue::Float32(v) => put_float(buf, *v),
            DataValue::Float64(v) => put_float(buf, *v),
            DataValue::String(s) => put_quoted(buf, s),
            DataValue::Bytes(raw) => buf.extend_from_slice(raw),
            DataValue::Time(t) => put_quoted(buf, &t.format(TIME_FORMAT).to_string()),
            DataValue::Sequence(items) => {
                buf.put_u8(b'[');
                self.put_joined(buf, items.iter())?;
                buf.put_u8(b']');
            }
            DataValue::Record(fields) => {
                buf.put_u8(b'(');
                self.put_joined(buf, fields.iter().map(|(_, v)| v))?;
                buf.put_u8(b')');
            }
        }
        Ok(())
    }

    fn put_joined<'a>(
        &self,
        buf: &mut BytesMut,
        items: impl Iterator<Item = &'a DataValue>,
    ) -> CodecResult<()> {
        for (idx, item) in items.enumerate() {
            if idx > 0 {
                buf.put_u8(b',');
            }
            self.encode_into(buf, item)?;
        }
        Ok(())
    }
}

pub fn encode(value: &DataValue) -> CodecResult<Bytes> {
    TextEncoder.encode(value)
}

/// Escapes `\` and `'` so the result can sit inside a single-quoted literal.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn put_quoted(buf: &mut BytesMut, s: &str) {
    buf.put_u8(b'\'');
    buf.extend_from_slice(escape(s).as_bytes());
    buf.put_u8(b'\'');
}

/// Shortest text that reads back to the same value at the host width.
fn put_float<F: Display>(buf: &mut BytesMut, v: F) {
    let text = v.to_string();
    if text == "NaN" {
        buf.extend_from_slice(b"nan");
    } else {
        buf.extend_from_slice(text.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn text(value: DataValue) -> String {
        let bytes = encode(&value).expect("encode");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[test]
    fn scalars() {
        assert_eq!(text(true.into()), "1");
        assert_eq!(text(false.into()), "0");
        assert_eq!(text(1i8.into()), "1");
        assert_eq!(text((-1i64).into()), "-1");
        assert_eq!(text((1u64 << 63).into()), "9223372036854775808");
        assert_eq!(text(1f32.into()), "1");
        assert_eq!(text(1.1f32.into()), "1.1");
        assert_eq!(text(f32::NAN.into()), "nan");
        assert_eq!(text(1.1f64.into()), "1.1");
        assert_eq!(text(1f64.into()), "1");
        assert_eq!(text(32.1f64.into()), "32.1");
        assert_eq!(text(f64::NEG_INFINITY.into()), "-inf");
        assert_eq!(text(f64::NAN.into()), "nan");
        assert_eq!(text(DataValue::Null), "NULL");
        assert_eq!(text(None::<i16>.into()), "NULL");
    }

    #[test]
    fn strings_and_raw_bytes() {
        assert_eq!(text("hello".into()), "'hello'");
        assert_eq!(text(r"\\'hello".into()), r"'\\\\\'hello'");
        assert_eq!(text(DataValue::Bytes(b"hello".to_vec())), "hello");
        assert_eq!(text(DataValue::Bytes(br"\\'hello".to_vec())), r"\\'hello");
    }

    #[test]
    fn timestamps_use_their_own_zone() {
        let utc = Tz::UTC.with_ymd_and_hms(2011, 3, 6, 6, 20, 0).single().expect("time");
        assert_eq!(text(utc.into()), "'2011-03-06 06:20:00'");
        let la = chrono_tz::America::Los_Angeles
            .with_ymd_and_hms(2012, 5, 31, 0, 0, 0)
            .single()
            .expect("time");
        assert_eq!(text(la.into()), "'2012-05-31 00:00:00'");
    }

    #[test]
    fn sequences() {
        assert_eq!(text(vec![1i32, 2].into()), "[1,2]");
        assert_eq!(text(Vec::<i32>::new().into()), "[]");
        assert_eq!(text(vec![vec![1i16]].into()), "[[1]]");
        assert_eq!(text(vec!["a", "b'c"].into()), r"['a','b\'c']");
        assert_eq!(
            text(DataValue::Record(vec![
                ("Field0".into(), "x".into()),
                ("Field1".into(), 2u8.into())
            ])),
            "('x',2)"
        );
    }

    #[test]
    fn void_is_rejected() {
        assert!(matches!(encode(&DataValue::Void), Err(CodecError::UnsupportedType(_))));
    }
}
