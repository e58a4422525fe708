//! libpinyin crate root
//!
//! Keyboard-side pinyin input built on `pinyinime-core`: a segmenter for the
//! pending ASCII buffer, term storage backends, the term database and an
//! engine that talks to the host keyboard through `Glue`.
//!
//! Public API exported here:
//! - `PinyinParser`, `Syllable`, `SyllableKind` from `parser`
//! - `TermStore` and the memory, JSON and redb stores from `store`
//! - `TermDatabase` from `database`
//! - `Glue` from `glue`
//! - `Engine` and its `Candidate` from `engine`
//! - `PinyinConfig` from `config`

pub mod config;
pub mod database;
pub mod engine;
pub mod glue;
pub mod parser;
pub mod store;

pub use config::PinyinConfig;
pub use database::TermDatabase;
pub use engine::{keys, Candidate, Engine};
pub use glue::{Glue, GlueEvent, RecordingGlue};
pub use parser::{PinyinParser, Segment, Syllable, SyllableKind};
pub use store::{Homonyms, JsonStore, MemoryStore, RedbStore, StoreStatus, Term, TermStore};
