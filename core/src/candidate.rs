//! Candidate entries produced by the decoder.
use serde::{Deserialize, Serialize};

use crate::dict_def::LemmaId;

/// Where a candidate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateKind {
    /// Best whole-input sentence.
    Sentence,
    /// A single lemma covering the first `spl_len` unfixed spellings.
    Lemma { id: LemmaId, spl_len: u16 },
    /// The typed text itself, offered when nothing else matched.
    Raw,
}

/// A single text candidate with its score (lower is better).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub score: f32,
    pub kind: CandidateKind,
}

impl Candidate {
    pub fn new<T: Into<String>>(text: T, score: f32, kind: CandidateKind) -> Self {
        Candidate {
            text: text.into(),
            score,
            kind,
        }
    }

    pub fn is_raw(&self) -> bool {
        self.kind == CandidateKind::Raw
    }
}
