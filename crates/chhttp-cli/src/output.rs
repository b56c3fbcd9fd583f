use chhttp_codec::TextEncoder;
use chhttp_core::{Column, DataRow, DataValue};
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::io::Write;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Tab-separated, one header line of column names.
    #[default]
    Tsv,
    /// One JSON object per row, keyed by column name.
    Json,
}

pub struct RowWriter<W> {
    out: W,
    format: Format,
    encoder: TextEncoder,
}

impl<W: Write> RowWriter<W> {
    pub fn new(out: W, format: Format) -> Self {
        Self {
            out,
            format,
            encoder: TextEncoder,
        }
    }

    pub fn write_header(&mut self, columns: &[Column]) -> anyhow::Result<()> {
        if self.format == Format::Tsv {
            let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            writeln!(self.out, "{}", names.join("\t"))?;
        }
        Ok(())
    }

    pub fn write_row(&mut self, columns: &[Column], row: &DataRow) -> anyhow::Result<()> {
        match self.format {
            Format::Tsv => {
                let mut cells = Vec::with_capacity(row.values.len());
                for value in &row.values {
                    cells.push(self.tsv_cell(value)?);
                }
                writeln!(self.out, "{}", cells.join("\t"))?;
            }
            Format::Json => {
                let object: Map<String, Value> = columns
                    .iter()
                    .zip(&row.values)
                    .map(|(column, value)| (column.name.clone(), json_value(value)))
                    .collect();
                serde_json::to_writer(&mut self.out, &object)?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> anyhow::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn tsv_cell(&self, value: &DataValue) -> anyhow::Result<String> {
        let text = match value {
            DataValue::Null => "\\N".to_string(),
            DataValue::Void => String::new(),
            DataValue::String(s) => escape_tsv(s),
            DataValue::Bytes(raw) => escape_tsv(&String::from_utf8_lossy(raw)),
            DataValue::Time(t) => t.format(TIME_FORMAT).to_string(),
            // Composite values keep their literal form, quotes included.
            other => escape_tsv(&String::from_utf8_lossy(&self.encoder.encode(other)?)),
        };
        Ok(text)
    }
}

fn escape_tsv(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn json_value(value: &DataValue) -> Value {
    match value {
        DataValue::Null | DataValue::Void => Value::Null,
        DataValue::Bool(v) => Value::Bool(*v),
        DataValue::Int64(v) => Value::from(*v),
        DataValue::UInt64(v) => Value::from(*v),
        // Widen via the shortest f32 text so 1.1 stays 1.1.
        DataValue::Float32(v) => v
            .to_string()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        DataValue::Float64(v) => Number::from_f64(*v).map_or(Value::Null, Value::Number),
        DataValue::String(s) => Value::String(s.clone()),
        DataValue::Bytes(raw) => Value::String(String::from_utf8_lossy(raw).into_owned()),
        DataValue::Time(t) => Value::String(t.to_rfc3339()),
        DataValue::Sequence(items) => Value::Array(items.iter().map(json_value).collect()),
        DataValue::Record(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), json_value(v)))
                .collect(),
        ),
    }
}
