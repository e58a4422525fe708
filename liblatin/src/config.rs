use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for building prediction dictionaries and ranking predictions.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Words returned by one `predict` call.
    pub max_suggestions: usize,
    /// Characters of the input looked up in the trie.
    pub prefix_limit: usize,
    /// Bloom filter size in 64 KiB units; a power of two.
    pub bloom_filter_units: usize,
    /// Words kept in each trie node's suffix list.
    pub max_suffixes_per_node: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 3,
            prefix_limit: 6,
            bloom_filter_units: 1,
            max_suffixes_per_node: 32,
        }
    }
}

impl PredictionConfig {
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

    pub fn set_max_suggestions(&mut self, max: usize) {
        self.max_suggestions = max.max(1);
    }

    pub fn get_max_suggestions(&self) -> usize {
        self.max_suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prediction.toml");
        let mut config = PredictionConfig::default();
        config.set_max_suggestions(5);
        config.prefix_limit = 4;
        config.save_toml(&path).expect("save");
        assert_eq!(PredictionConfig::load_toml(&path).expect("load"), config);
    }

    #[test]
    fn missing_keys_use_defaults() {
        let config = PredictionConfig::from_toml_str("bloom_filter_units = 2\n").expect("parse");
        assert_eq!(config.bloom_filter_units, 2);
        assert_eq!(config.get_max_suggestions(), 3);
        assert_eq!(config.prefix_limit, 6);
    }
}
