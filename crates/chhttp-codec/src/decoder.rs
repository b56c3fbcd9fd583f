use crate::parser::{parse_type, DecodeOptions, Parser};
use chhttp_core::{CodecResult, DataValue};

/// Type-name driven cell decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder {
    options: DecodeOptions,
}

impl TextDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn parser(&self, type_name: &str) -> CodecResult<Parser> {
        parse_type(type_name, &self.options)
    }

    pub fn decode(&self, type_name: &str, cell: &[u8]) -> CodecResult<DataValue> {
        self.parser(type_name)?.decode(cell)
    }
}
