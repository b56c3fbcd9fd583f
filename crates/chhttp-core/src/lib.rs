pub mod error;
pub mod types;

pub use error::{CodecError, CodecResult};
pub use types::{zero_timestamp, Column, DataRow, DataValue, ScanType};
