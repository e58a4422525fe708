//! Pinyin engine configuration that extends the decoder `Config` from core.
//!
//! This configuration includes:
//! - All decoder options from `pinyinime_core::Config` (flattened via serde)
//! - Input buffer and term length limits of the keyboard engine
//! - Term database cache size
//! - Auto-suggestion and traditional Chinese switches
//!
//! # Example
//!
//! ```rust
//! use libpinyin::PinyinConfig;
//!
//! let config = PinyinConfig::from_toml_str("buffer_limit = 20\n").unwrap();
//! assert_eq!(config.buffer_limit, 20);
//! assert!(config.base().szm_enable_shm);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PinyinConfig {
    /// Decoder options (abbreviations, user dictionary, predictions)
    #[serde(flatten)]
    pub base: pinyinime_core::Config,

    /// Pending input length that forces the first candidate out.
    pub buffer_limit: usize,

    /// Longest term, in syllables, used when building sentences.
    pub term_max_length: usize,

    /// Cap on terms returned for incomplete or abbreviated syllables.
    pub max_incomplete_terms: usize,

    /// Entries kept in the term lookup cache.
    pub cache_size: usize,

    /// Suggest continuations after a selection.
    pub auto_suggest: bool,

    /// Start in traditional Chinese mode.
    pub traditional: bool,
}

impl Default for PinyinConfig {
    fn default() -> Self {
        Self {
            base: pinyinime_core::Config::default(),
            buffer_limit: 30,
            term_max_length: 8,
            max_incomplete_terms: 10,
            cache_size: 1000,
            auto_suggest: true,
            traditional: false,
        }
    }
}

impl PinyinConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Convert into the decoder config for `MatrixSearch`.
    pub fn into_base(self) -> pinyinime_core::Config {
        self.base
    }

    pub fn base(&self) -> &pinyinime_core::Config {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut pinyinime_core::Config {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattened_fields_round_trip() {
        let mut config = PinyinConfig::default();
        config.buffer_limit = 12;
        config.base_mut().set_max_predictions(4);
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("max_predictions = 4"));
        let back = PinyinConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.buffer_limit, 12);
        assert_eq!(back.base().get_max_predictions(), 4);
    }

    #[test]
    fn empty_toml_is_default() {
        let config = PinyinConfig::from_toml_str("").unwrap();
        assert_eq!(config.buffer_limit, 30);
        assert!(config.auto_suggest);
    }
}
