use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("failed to fit column to buffer of {capacity} bytes")]
    BufferCapacity { capacity: usize },
    #[error("unknown time zone: {0}")]
    Location(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

impl CodecError {
    pub fn syntax(msg: impl Into<String>) -> Self {
        CodecError::Syntax(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        CodecError::Decode(msg.into())
    }
}
