pub mod decoder;
pub mod encoder;
pub mod params;
pub mod parser;
pub mod rows;
pub mod tokenizer;
pub mod typedesc;

pub use decoder::TextDecoder;
pub use encoder::{encode, TextEncoder};
pub use parser::{parse_type, resolve_timezone, Cursor, DecodeOptions, Parser};
pub use rows::{ReaderOptions, RowReader};
pub use typedesc::{parse_type_desc, TypeDesc};
