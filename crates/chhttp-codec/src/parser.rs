use crate::tokenizer::unescape_byte;
use crate::typedesc::{parse_type_desc, TypeDesc};
use chhttp_core::{CodecError, CodecResult, DataValue, ScanType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use std::str::FromStr;

const ZERO_DATE: &str = "0000-00-00";
const ZERO_DATE_TIME: &str = "0000-00-00 00:00:00";
const NULL_MARKER: &[u8] = b"\\N";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecodeOptions {
    /// Zone applied to `Date` and `DateTime` columns, overriding a zone the
    /// column declares unless `prefer_declared_timezone` is set.
    pub default_timezone: Option<Tz>,
    pub prefer_declared_timezone: bool,
}

impl DecodeOptions {
    pub fn with_default_timezone(mut self, name: &str) -> CodecResult<Self> {
        self.default_timezone = Some(resolve_timezone(name)?);
        Ok(self)
    }

    fn datetime_zone(&self, declared: Option<Tz>) -> Tz {
        if self.prefer_declared_timezone {
            if let Some(tz) = declared {
                return tz;
            }
        }
        self.default_timezone.or(declared).unwrap_or(Tz::UTC)
    }
}

pub fn resolve_timezone(name: &str) -> CodecResult<Tz> {
    Tz::from_str(name).map_err(|_| CodecError::Location(name.to_string()))
}

/// Parses `type_name` and builds the parser for a top-level cell of that type.
pub fn parse_type(type_name: &str, options: &DecodeOptions) -> CodecResult<Parser> {
    let desc = parse_type_desc(type_name)?;
    Parser::new(&desc, options)
}

/// Read position within a single cell.
#[derive(Debug)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos.min(self.bytes.len())..]
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn eat(&mut self, prefix: &[u8]) -> bool {
        if self.remaining().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn take_until(&mut self, stop: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stop(b) {
                break;
            }
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    fn expect(&mut self, want: u8, context: &str) -> CodecResult<()> {
        match self.bump() {
            Some(b) if b == want => Ok(()),
            other => Err(CodecError::decode(format!(
                "unexpected {}, expected '{}' {context}",
                describe(other),
                char::from(want)
            ))),
        }
    }
}

fn describe(b: Option<u8>) -> String {
    match b {
        Some(b) => format!("character '{}'", b.escape_ascii()),
        None => "end of input".to_string(),
    }
}

/// Decoder for one wire type, composed from the type tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Parser {
    Scalar(ScalarParser),
    Array(Box<Parser>),
    Tuple(Vec<Parser>),
    Nullable(Box<Parser>),
    LowCardinality(Box<Parser>),
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarParser {
    kind: ScalarKind,
    /// Element context: textual values are wrapped in single quotes.
    quoted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarKind {
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
    Text,
    FixedText(usize),
    Decimal,
    Date(Tz),
    DateTime(Tz),
}

impl Parser {
    pub fn new(desc: &TypeDesc, options: &DecodeOptions) -> CodecResult<Self> {
        Self::build(desc, options, false)
    }

    fn build(desc: &TypeDesc, options: &DecodeOptions, quoted: bool) -> CodecResult<Self> {
        let scalar = |kind: ScalarKind| -> CodecResult<Parser> {
            Ok(Parser::Scalar(ScalarParser { kind, quoted }))
        };
        match desc.name.as_str() {
            "Nothing" => Ok(Parser::Nothing),
            "Nullable" => Ok(Parser::Nullable(Box::new(Self::build(
                single_arg(desc)?,
                options,
                quoted,
            )?))),
            "LowCardinality" => Ok(Parser::LowCardinality(Box::new(Self::build(
                single_arg(desc)?,
                options,
                quoted,
            )?))),
            "Array" => Ok(Parser::Array(Box::new(Self::build(
                single_arg(desc)?,
                options,
                true,
            )?))),
            "Tuple" => {
                if desc.args.is_empty() {
                    return Err(CodecError::syntax("element types not specified for Tuple"));
                }
                let items = desc
                    .args
                    .iter()
                    .map(|arg| Self::build(arg, options, true))
                    .collect::<CodecResult<Vec<_>>>()?;
                Ok(Parser::Tuple(items))
            }
            "Int8" => scalar(ScalarKind::Int8),
            "Int16" => scalar(ScalarKind::Int16),
            "Int32" => scalar(ScalarKind::Int32),
            "Int64" => scalar(ScalarKind::Int64),
            "UInt8" => scalar(ScalarKind::UInt8),
            "UInt16" => scalar(ScalarKind::UInt16),
            "UInt32" => scalar(ScalarKind::UInt32),
            "UInt64" => scalar(ScalarKind::UInt64),
            "Float32" => scalar(ScalarKind::Float32),
            "Float64" => scalar(ScalarKind::Float64),
            "Bool" => scalar(ScalarKind::Bool),
            "String" | "Enum8" | "Enum16" | "UUID" | "IPv4" | "IPv6" => scalar(ScalarKind::Text),
            "FixedString" => {
                let arg = single_arg(desc)?;
                let length = arg.name.parse::<usize>().map_err(|_| {
                    CodecError::syntax(format!("malformed FixedString length {:?}", arg.name))
                })?;
                scalar(ScalarKind::FixedText(length))
            }
            "Decimal" | "Decimal32" | "Decimal64" | "Decimal128" | "Decimal256" => {
                scalar(ScalarKind::Decimal)
            }
            "Date" => scalar(ScalarKind::Date(options.default_timezone.unwrap_or(Tz::UTC))),
            "DateTime" => {
                let declared = match desc.args.as_slice() {
                    [] => None,
                    [zone] => Some(resolve_timezone(&zone.name)?),
                    _ => return Err(CodecError::syntax("DateTime takes at most one time zone")),
                };
                scalar(ScalarKind::DateTime(options.datetime_zone(declared)))
            }
            other => Err(CodecError::UnsupportedType(other.to_string())),
        }
    }

    /// Decodes a complete top-level cell. Bytes left over after the value
    /// are an error.
    pub fn decode(&self, cell: &[u8]) -> CodecResult<DataValue> {
        match self {
            Parser::Nothing => return Ok(DataValue::Void),
            Parser::LowCardinality(inner) => return inner.decode(cell),
            Parser::Nullable(inner) if cell != NULL_MARKER => return inner.decode(cell),
            _ => {}
        }
        let mut cursor = Cursor::new(cell);
        let value = self.decode_from(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(CodecError::decode(format!(
                "trailing bytes {:?} after value",
                String::from_utf8_lossy(cursor.remaining())
            )));
        }
        Ok(value)
    }

    /// Decodes one value starting at the cursor, leaving the cursor on the
    /// first byte after it.
    pub fn decode_from(&self, cursor: &mut Cursor<'_>) -> CodecResult<DataValue> {
        match self {
            Parser::Scalar(scalar) => scalar.decode(cursor),
            Parser::Array(element) => decode_array(element, cursor),
            Parser::Tuple(items) => decode_tuple(items, cursor),
            Parser::Nullable(inner) => {
                if cursor.eat(NULL_MARKER) {
                    Ok(DataValue::Null)
                } else {
                    inner.decode_from(cursor)
                }
            }
            Parser::LowCardinality(inner) => inner.decode_from(cursor),
            Parser::Nothing => Ok(DataValue::Void),
        }
    }

    pub fn scan_type(&self) -> ScanType {
        match self {
            Parser::Scalar(scalar) => scalar.kind.scan_type(),
            Parser::Array(element) => ScanType::Array(Box::new(element.scan_type())),
            Parser::Tuple(items) => ScanType::Tuple(items.iter().map(Parser::scan_type).collect()),
            Parser::Nullable(inner) => ScanType::Nullable(Box::new(inner.scan_type())),
            Parser::LowCardinality(inner) => inner.scan_type(),
            Parser::Nothing => ScanType::Void,
        }
    }
}

fn single_arg(desc: &TypeDesc) -> CodecResult<&TypeDesc> {
    match desc.args.as_slice() {
        [arg] => Ok(arg),
        args => Err(CodecError::syntax(format!(
            "{} expects exactly one argument, got {}",
            desc.name,
            args.len()
        ))),
    }
}

fn decode_array(element: &Parser, cursor: &mut Cursor<'_>) -> CodecResult<DataValue> {
    cursor.expect(b'[', "at the beginning of array")?;
    let mut items = Vec::new();
    if cursor.eat(b"]") {
        return Ok(DataValue::Sequence(items));
    }
    loop {
        let value = element.decode_from(cursor)?;
        // Null elements are dropped rather than kept as placeholders.
        if !value.is_null() {
            items.push(value);
        }
        match cursor.bump() {
            Some(b',') => continue,
            Some(b']') => break,
            other => {
                return Err(CodecError::decode(format!(
                    "unexpected {}, expected ',' or ']' in array",
                    describe(other)
                )))
            }
        }
    }
    Ok(DataValue::Sequence(items))
}

fn decode_tuple(items: &[Parser], cursor: &mut Cursor<'_>) -> CodecResult<DataValue> {
    cursor.expect(b'(', "at the beginning of tuple")?;
    let mut fields = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            cursor.expect(b',', "between tuple elements")?;
        }
        fields.push((format!("Field{idx}"), item.decode_from(cursor)?));
    }
    cursor.expect(b')', "at the end of tuple")?;
    Ok(DataValue::Record(fields))
}

impl ScalarKind {
    fn scan_type(&self) -> ScanType {
        match self {
            ScalarKind::Int8 => ScanType::Int8,
            ScalarKind::Int16 => ScanType::Int16,
            ScalarKind::Int32 => ScanType::Int32,
            ScalarKind::Int64 => ScanType::Int64,
            ScalarKind::UInt8 => ScanType::UInt8,
            ScalarKind::UInt16 => ScanType::UInt16,
            ScalarKind::UInt32 => ScanType::UInt32,
            ScalarKind::UInt64 => ScanType::UInt64,
            ScalarKind::Float32 => ScanType::Float32,
            ScalarKind::Float64 => ScanType::Float64,
            ScalarKind::Bool => ScanType::Bool,
            ScalarKind::Text | ScalarKind::FixedText(_) => ScanType::String,
            ScalarKind::Decimal => ScanType::Decimal,
            ScalarKind::Date(_) | ScalarKind::DateTime(_) => ScanType::Time,
        }
    }
}

impl ScalarParser {
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    fn decode(&self, cursor: &mut Cursor<'_>) -> CodecResult<DataValue> {
        match self.kind {
            ScalarKind::Int8 => parse_number::<i8>(cursor, "Int8").map(|v| DataValue::Int64(v.into())),
            ScalarKind::Int16 => {
                parse_number::<i16>(cursor, "Int16").map(|v| DataValue::Int64(v.into()))
            }
            ScalarKind::Int32 => {
                parse_number::<i32>(cursor, "Int32").map(|v| DataValue::Int64(v.into()))
            }
            ScalarKind::Int64 => parse_number::<i64>(cursor, "Int64").map(DataValue::Int64),
            ScalarKind::UInt8 => {
                parse_number::<u8>(cursor, "UInt8").map(|v| DataValue::UInt64(v.into()))
            }
            ScalarKind::UInt16 => {
                parse_number::<u16>(cursor, "UInt16").map(|v| DataValue::UInt64(v.into()))
            }
            ScalarKind::UInt32 => {
                parse_number::<u32>(cursor, "UInt32").map(|v| DataValue::UInt64(v.into()))
            }
            ScalarKind::UInt64 => parse_number::<u64>(cursor, "UInt64").map(DataValue::UInt64),
            ScalarKind::Float32 => {
                parse_number::<f32>(cursor, "Float32").map(|v| DataValue::Float64(v.into()))
            }
            ScalarKind::Float64 => parse_number::<f64>(cursor, "Float64").map(DataValue::Float64),
            ScalarKind::Bool => match number_text(cursor)? {
                "true" | "1" => Ok(DataValue::Bool(true)),
                "false" | "0" => Ok(DataValue::Bool(false)),
                other => Err(CodecError::decode(format!("invalid Bool value {other:?}"))),
            },
            ScalarKind::Decimal => number_text(cursor).map(|text| DataValue::String(text.to_string())),
            ScalarKind::Text => read_text(cursor, self.quoted).map(text_value),
            ScalarKind::FixedText(length) => {
                let bytes = read_text(cursor, self.quoted)?;
                if bytes.len() != length {
                    return Err(CodecError::decode(format!(
                        "unexpected string length {}, expected {length}",
                        bytes.len()
                    )));
                }
                Ok(text_value(bytes))
            }
            ScalarKind::Date(tz) => self.decode_time(cursor, tz, false),
            ScalarKind::DateTime(tz) => self.decode_time(cursor, tz, true),
        }
    }

    fn decode_time(&self, cursor: &mut Cursor<'_>, tz: Tz, with_time: bool) -> CodecResult<DataValue> {
        let raw = read_text(cursor, self.quoted)?;
        let text = String::from_utf8_lossy(&raw);
        if text == ZERO_DATE || text == ZERO_DATE_TIME {
            return Ok(DataValue::Time(chhttp_core::zero_timestamp()));
        }
        let naive = parse_fixed_datetime(&raw, with_time)
            .ok_or_else(|| CodecError::decode(format!("malformed date or datetime {text:?}")))?;
        localize(naive, tz).map(DataValue::Time)
    }
}

fn number_text<'a>(cursor: &mut Cursor<'a>) -> CodecResult<&'a str> {
    let span = cursor.take_until(|b| matches!(b, b',' | b']' | b')'));
    std::str::from_utf8(span).map_err(|_| CodecError::decode("number is not valid UTF-8"))
}

fn parse_number<T: FromStr>(cursor: &mut Cursor<'_>, type_name: &str) -> CodecResult<T> {
    let text = number_text(cursor)?;
    text.parse::<T>()
        .map_err(|_| CodecError::decode(format!("invalid {type_name} value {text:?}")))
}

/// Reads an escaped string. In element context the value must be wrapped in
/// quotes and ends at the first unescaped quote; a top-level cell is taken
/// literally up to its end.
fn read_text(cursor: &mut Cursor<'_>, quoted: bool) -> CodecResult<Vec<u8>> {
    if quoted {
        cursor.expect(b'\'', "at the beginning of string")?;
    }
    let mut out = Vec::new();
    while let Some(b) = cursor.peek() {
        match b {
            b'\'' if quoted => break,
            b'\\' => {
                cursor.bump();
                let escaped = cursor
                    .bump()
                    .ok_or_else(|| CodecError::decode("unterminated escape sequence in string"))?;
                let unescaped = unescape_byte(escaped).ok_or_else(|| {
                    CodecError::decode(format!("invalid escape sequence \\{}", escaped.escape_ascii()))
                })?;
                out.push(unescaped);
            }
            other => {
                cursor.bump();
                out.push(other);
            }
        }
    }
    if quoted {
        cursor.expect(b'\'', "at the end of string")?;
    }
    Ok(out)
}

fn text_value(bytes: Vec<u8>) -> DataValue {
    match String::from_utf8(bytes) {
        Ok(s) => DataValue::String(s),
        Err(err) => DataValue::Bytes(err.into_bytes()),
    }
}

/// Accepts exactly `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.
fn parse_fixed_datetime(raw: &[u8], with_time: bool) -> Option<NaiveDateTime> {
    let pattern: &[u8] = if with_time {
        b"dddd-dd-dd dd:dd:dd"
    } else {
        b"dddd-dd-dd"
    };
    if raw.len() != pattern.len() {
        return None;
    }
    let shape_ok = raw.iter().zip(pattern).all(|(b, p)| match p {
        b'd' => b.is_ascii_digit(),
        lit => b == lit,
    });
    if !shape_ok {
        return None;
    }
    let num = |from: usize, to: usize| {
        raw[from..to]
            .iter()
            .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'))
    };
    let date = NaiveDate::from_ymd_opt(i32::try_from(num(0, 4)).ok()?, num(5, 7), num(8, 10))?;
    let time = if with_time {
        NaiveTime::from_hms_opt(num(11, 13), num(14, 16), num(17, 19))?
    } else {
        NaiveTime::default()
    };
    Some(date.and_time(time))
}

fn localize(naive: NaiveDateTime, tz: Tz) -> CodecResult<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| CodecError::decode(format!("{naive} does not exist in time zone {tz}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(type_name: &str) -> Parser {
        parse_type(type_name, &DecodeOptions::default()).expect("parser")
    }

    #[test]
    fn low_cardinality_is_transparent() {
        let low = parser("LowCardinality(String)");
        let plain = parser("String");
        assert_eq!(low.scan_type(), plain.scan_type());
        assert_eq!(
            low.decode(br"it\'s").expect("decode"),
            plain.decode(br"it\'s").expect("decode")
        );
    }

    #[test]
    fn nullable_marker_short_circuits() {
        let p = parser("Nullable(UInt8)");
        assert_eq!(p.decode(b"\\N").expect("decode"), DataValue::Null);
        assert_eq!(p.decode(b"7").expect("decode"), DataValue::UInt64(7));
        assert!(matches!(p.decode(b"300"), Err(CodecError::Decode(_))));
        assert!(matches!(p.decode(b"NULL"), Err(CodecError::Decode(_))));
    }

    #[test]
    fn exact_integer_widths() {
        assert_eq!(parser("Int8").decode(b"-128").expect("decode"), DataValue::Int64(-128));
        assert!(parser("Int8").decode(b"128").is_err());
        assert!(parser("UInt16").decode(b"-1").is_err());
        assert_eq!(
            parser("UInt64").decode(b"18446744073709551615").expect("decode"),
            DataValue::UInt64(u64::MAX)
        );
        assert!(parser("Int32").decode(b"12a").is_err());
        assert!(parser("Int32").decode(b"").is_err());
    }

    #[test]
    fn decimal_is_opaque_text() {
        let p = parser("Decimal(9, 4)");
        assert_eq!(p.scan_type(), ScanType::Decimal);
        assert_eq!(
            p.decode(b"12345.6789").expect("decode"),
            DataValue::String("12345.6789".into())
        );
        assert_eq!(
            parser("Array(Decimal64(2))").decode(b"[1.50,-0.25]").expect("decode"),
            DataValue::Sequence(vec![
                DataValue::String("1.50".into()),
                DataValue::String("-0.25".into())
            ])
        );
    }

    #[test]
    fn bool_values() {
        assert_eq!(parser("Bool").decode(b"true").expect("decode"), DataValue::Bool(true));
        assert_eq!(parser("Bool").decode(b"0").expect("decode"), DataValue::Bool(false));
        assert!(parser("Bool").decode(b"yes").is_err());
    }

    #[test]
    fn invalid_utf8_text_becomes_bytes() {
        assert_eq!(
            parser("String").decode(&[0xff, 0xfe]).expect("decode"),
            DataValue::Bytes(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn construction_errors() {
        let opts = DecodeOptions::default();
        assert!(matches!(
            parse_type("Map(String, UInt8)", &opts),
            Err(CodecError::UnsupportedType(name)) if name == "Map"
        ));
        assert!(matches!(parse_type("FixedString", &opts), Err(CodecError::Syntax(_))));
        assert!(matches!(parse_type("FixedString(x)", &opts), Err(CodecError::Syntax(_))));
        assert!(matches!(parse_type("Array", &opts), Err(CodecError::Syntax(_))));
        assert!(matches!(parse_type("Tuple()", &opts), Err(CodecError::Syntax(_))));
        assert!(matches!(
            parse_type("DateTime('Nowhere')", &opts),
            Err(CodecError::Location(zone)) if zone == "Nowhere"
        ));
    }

    #[test]
    fn timezone_precedence() {
        let berlin = resolve_timezone("Europe/Berlin").expect("zone");
        let tokyo = resolve_timezone("Asia/Tokyo").expect("zone");
        let zone_of = |type_name: &str, opts: DecodeOptions| match parse_type(type_name, &opts)
            .expect("parser")
        {
            Parser::Scalar(ScalarParser {
                kind: ScalarKind::DateTime(tz),
                ..
            }) => tz,
            other => panic!("unexpected parser {other:?}"),
        };
        let declared = "DateTime('Asia/Tokyo')";
        assert_eq!(zone_of("DateTime", DecodeOptions::default()), Tz::UTC);
        assert_eq!(zone_of(declared, DecodeOptions::default()), tokyo);
        let with_default = DecodeOptions {
            default_timezone: Some(berlin),
            prefer_declared_timezone: false,
        };
        assert_eq!(zone_of(declared, with_default), berlin);
        assert_eq!(zone_of("DateTime", with_default), berlin);
        let prefer_declared = DecodeOptions {
            prefer_declared_timezone: true,
            ..with_default
        };
        assert_eq!(zone_of(declared, prefer_declared), tokyo);
        assert_eq!(zone_of("DateTime", prefer_declared), berlin);
    }

    #[test]
    fn nonexistent_local_time_fails() {
        let p = parser("DateTime('America/New_York')");
        assert!(matches!(p.decode(b"2018-03-11 02:30:00"), Err(CodecError::Decode(_))));
    }
}
