use crate::output::Format;
use chhttp_codec::rows::DEFAULT_BUFFER_SIZE;
use chhttp_codec::{resolve_timezone, DecodeOptions, ReaderOptions};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub reader: ReaderConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    pub buffer_size: usize,
    pub default_timezone: Option<String>,
    pub prefer_declared_timezone: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            default_timezone: None,
            prefer_declared_timezone: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: Format,
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reader.buffer_size == 0 {
            return Err(anyhow::anyhow!("reader.buffer_size must be greater than zero"));
        }
        if let Some(name) = &self.reader.default_timezone {
            resolve_timezone(name)
                .map_err(|err| anyhow::anyhow!("reader.default_timezone: {err}"))?;
        }
        Ok(())
    }

    pub fn reader_options(&self) -> anyhow::Result<ReaderOptions> {
        let mut decode = DecodeOptions {
            prefer_declared_timezone: self.reader.prefer_declared_timezone,
            ..DecodeOptions::default()
        };
        if let Some(name) = &self.reader.default_timezone {
            decode = decode.with_default_timezone(name)?;
        }
        Ok(ReaderOptions {
            buffer_size: self.reader.buffer_size,
            decode,
        })
    }
}
