use serde::{Deserialize, Serialize};

use crate::common::errors::{VoiceError, VoiceResult};

/// Client configuration, loaded from `config.toml` next to the process.
///
/// Every field has a sensible default; a missing file yields `Config::default()`
/// so the client is usable with zero configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub binaries: BinariesConfig,
    pub logging: Option<LoggingConfig>,
}

/// Overrides for the external audio binaries. When unset, the well-known
/// names are searched on `PATH`.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BinariesConfig {
    /// Path to the encoder front-end producing the length-prefixed frame stream.
    pub encoder: Option<String>,
    /// Path to the media transcoder the encoder shells out to.
    pub transcoder: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl Config {
    pub fn load() -> VoiceResult<Self> {
        let config_str = std::fs::read_to_string("config.toml").unwrap_or_default();
        if config_str.is_empty() {
            return Ok(Self::default());
        }
        Self::parse(&config_str)
    }

    pub fn parse(s: &str) -> VoiceResult<Self> {
        toml::from_str(s).map_err(|e| VoiceError::InvalidConfig(e.to_string()))
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").expect("empty config should parse");
        assert!(config.binaries.encoder.is_none());
        assert!(config.binaries.transcoder.is_none());
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_full_config_parses() {
        let config = Config::parse(
            r#"
            [binaries]
            encoder = "/usr/local/bin/dca"
            transcoder = "/usr/bin/ffmpeg"

            [logging]
            level = "debug"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.binaries.encoder.as_deref(), Some("/usr/local/bin/dca"));
        assert_eq!(config.binaries.transcoder.as_deref(), Some("/usr/bin/ffmpeg"));
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let err = Config::parse("binaries = 42").unwrap_err();
        assert!(matches!(err, VoiceError::InvalidConfig(_)));
    }
}
