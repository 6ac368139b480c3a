use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "atfile.config.json";

/// Global fallbacks used when no ancestor directive decides a setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecConfig {
    /// Language used when neither a directive nor a file extension names one
    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default = "default_encoding")]
    pub default_encoding: String,

    /// Negative values mean "indent with spaces"
    #[serde(default = "default_tab_width")]
    pub tab_width: i32,

    #[serde(default = "default_page_width")]
    pub page_width: u32,

    /// One of `nl`, `lf`, `cr`, `crlf`, `platform`
    #[serde(default = "default_line_ending")]
    pub line_ending: String,

    /// Write undefined section references through instead of dropping them
    #[serde(default)]
    pub allow_undefined_refs: bool,

    #[serde(default)]
    pub force_newlines_in_nosent_bodies: bool,
}

fn default_language() -> String {
    "python".to_string()
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_tab_width() -> i32 {
    -4
}

fn default_page_width() -> u32 {
    132
}

fn default_line_ending() -> String {
    "nl".to_string()
}

impl CodecConfig {
    /// Load config from a directory, falling back to defaults when there is no config file
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|source| {
                ConfigError::Io {
                    path: config_path.clone(),
                    source,
                }
            })?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            default_encoding: default_encoding(),
            tab_width: default_tab_width(),
            page_width: default_page_width(),
            line_ending: default_line_ending(),
            allow_undefined_refs: false,
            force_newlines_in_nosent_bodies: false,
        }
    }
}
