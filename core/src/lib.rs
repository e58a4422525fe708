//! pinyinime-core
//!
//! Pinyin decoding engine: spelling tables and tries, the compiled system
//! dictionary, the user dictionary and the incremental matrix decoder.
//!
//! Data flow: raw dictionary text → `DictBuilder` → `DictData` (saved with
//! bincode) → `DictTrie` at runtime → `MatrixSearch` per input session.
//!
//! Public API:
//! - `DictBuilder` / `DictTrie` - compile and load the system dictionary
//! - `UserDict` - learned lemmas, optionally persisted in redb
//! - `MatrixSearch` - `search` / `choose` / `del_search` / `get_predicts`
//! - `Candidate` - scored decoder output
//! - `Config` - decoder options
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod dict_def;
pub use dict_def::{LemmaId, LmaPsbItem, NPredictItem, SplId};

pub mod spelling_table;
pub use spelling_table::SpellingTable;

pub mod spelling_trie;
pub use spelling_trie::SpellingTrie;

pub mod spelling_parser;
pub use spelling_parser::{ParsedSpellings, SpellingParser};

pub mod ngram;
pub use ngram::NGram;

pub mod dict_list;
pub use dict_list::DictList;

pub mod atom_dict;
pub use atom_dict::{AtomDict, Extension};

pub mod dict_trie;
pub use dict_trie::{DictData, DictTrie};

pub mod dict_builder;
pub use dict_builder::DictBuilder;

pub mod userdict;
pub use userdict::UserDict;

pub mod composing;
pub use composing::{ComposingDict, ComposingPhrase};

pub mod candidate;
pub use candidate::{Candidate, CandidateKind};

pub mod matrix_search;
pub use matrix_search::MatrixSearch;

/// Decoder options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Accept consonant initials ("b", "zh") as abbreviated spellings.
    pub szm_enable_shm: bool,
    /// Accept vowel initials ("a", "e", "o") as abbreviated spellings.
    pub szm_enable_ym: bool,
    /// redb file backing the user dictionary; in memory when unset.
    pub user_dict_path: Option<PathBuf>,
    /// Add fully chosen multi-lemma sentences to the user dictionary.
    pub learn_user_phrases: bool,
    /// Upper bound on `MatrixSearch::get_predicts` results.
    pub max_predictions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            szm_enable_shm: true,
            szm_enable_ym: true,
            user_dict_path: None,
            learn_user_phrases: true,
            max_predictions: 10,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    // ========== Abbreviations ==========

    /// Enable or disable both kinds of abbreviated spellings.
    pub fn set_szm(&mut self, shengmu: bool, yunmu: bool) {
        self.szm_enable_shm = shengmu;
        self.szm_enable_ym = yunmu;
    }

    // ========== User Dictionary ==========

    pub fn user_dict_path(&self) -> Option<&Path> {
        self.user_dict_path.as_deref()
    }

    pub fn set_user_dict_path<P: Into<PathBuf>>(&mut self, path: Option<P>) {
        self.user_dict_path = path.map(Into::into);
    }

    pub fn set_learn_user_phrases(&mut self, enabled: bool) {
        self.learn_user_phrases = enabled;
    }

    // ========== Prediction ==========

    /// Set the prediction limit; zero is raised to one.
    pub fn set_max_predictions(&mut self, max: usize) {
        self.max_predictions = max.max(1);
    }

    pub fn get_max_predictions(&self) -> usize {
        self.max_predictions
    }
}

/// Utility helpers.
pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_toml_round_trip() {
        let mut config = Config::default();
        config.set_szm(true, false);
        config.set_user_dict_path(Some("/tmp/user.redb"));
        let text = config.to_toml_string().expect("serialize");
        let back = Config::from_toml_str(&text).expect("parse");
        assert!(!back.szm_enable_ym);
        assert_eq!(back.user_dict_path(), Some(Path::new("/tmp/user.redb")));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = Config::from_toml_str("max_predictions = 3\n").expect("parse");
        assert_eq!(config.get_max_predictions(), 3);
        assert!(config.learn_user_phrases);
        assert!(config.user_dict_path().is_none());
    }

    #[test]
    fn normalize_trims() {
        assert_eq!(utils::normalize("  北京 "), "北京");
    }
}
