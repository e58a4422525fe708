//! liblatin
//!
//! Predictive text for Latin-script keyboards. Words are stored in a compact
//! blob holding a bloom filter over word prefixes and a prefix trie; a
//! `Predictor` screens the typed prefix and its likely typos against the
//! filter, confirms them in the trie and ranks what it finds.
//!
//! Public API:
//! - `DictionaryBuilder` - word list to blob
//! - `Dictionary` - read-only view of a blob
//! - `KeyboardLayout` / `NearbyKeys` - key geometry for typo variants
//! - `Predictor` - `set_dictionary` / `drop_dictionary` / `set_layout` / `predict`
//! - `levenshtein_distance` - Damerau-Levenshtein distance
//! - `PredictionConfig` - options

pub mod codec;

pub mod dictionary;
pub use dictionary::{Dictionary, WordFreq};

pub mod builder;
pub use builder::DictionaryBuilder;

pub mod layout;
pub use layout::{Key, KeyboardLayout, NearbyKeys};

pub mod distance;
pub use distance::{code_distance, levenshtein_distance};

pub mod predictor;
pub use predictor::{Prediction, Predictor, Variant};

pub mod config;
pub use config::PredictionConfig;

pub mod error;
pub use error::PredictError;
