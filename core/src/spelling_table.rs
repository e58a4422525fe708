//! Raw spelling accumulation and scoring.
//!
//! `SpellingTable` collects every spelling string seen while reading the raw
//! dictionary, together with the accumulated lemma frequency. `arrange()`
//! turns the frequencies into one-byte scores and freezes the table; the
//! sorted output feeds `SpellingTrie::construct`.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dict_def::MAX_PINYIN_SIZE;

/// Spellings that never enter the table.
const DENYLIST: [&str; 3] = ["HM", "HNG", "NG"];

#[derive(Debug, Clone)]
struct RawSpelling {
    text: String,
    freq: f64,
}

/// A spelling with its arranged score (0 = most frequent, 255 = rarest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrangedSpelling {
    pub spelling: String,
    pub score: u8,
}

/// Frequency table of raw spellings.
#[derive(Debug, Clone)]
pub struct SpellingTable {
    raw: Vec<RawSpelling>,
    index: HashMap<String, usize>,
    total_freq: f64,
    max_spelling_len: usize,
    frozen: bool,
    score_amplifier: f64,
    average_score: u8,
}

impl Default for SpellingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SpellingTable {
    pub fn new() -> Self {
        Self {
            raw: Vec::new(),
            index: HashMap::new(),
            total_freq: 0.0,
            max_spelling_len: MAX_PINYIN_SIZE,
            frozen: false,
            score_amplifier: 0.0,
            average_score: 0,
        }
    }

    /// Reset the table, accepting spellings up to `max_spelling_len` bytes.
    pub fn init_table(&mut self, max_spelling_len: usize) {
        *self = Self::new();
        self.max_spelling_len = max_spelling_len;
    }

    /// Add `freq` to the spelling's accumulated frequency.
    ///
    /// Returns false if the table is frozen or the spelling is rejected
    /// (empty, too long, or denylisted).
    pub fn put_spelling(&mut self, spelling: &str, freq: f64) -> bool {
        if self.frozen || spelling.is_empty() || spelling.len() > self.max_spelling_len {
            return false;
        }
        if DENYLIST.iter().any(|d| d.eq_ignore_ascii_case(spelling)) {
            return false;
        }

        self.total_freq += freq;
        match self.index.get(spelling) {
            Some(&pos) => self.raw[pos].freq += freq,
            None => {
                self.index.insert(spelling.to_string(), self.raw.len());
                self.raw.push(RawSpelling {
                    text: spelling.to_string(),
                    freq,
                });
            }
        }
        true
    }

    pub fn contain(&self, spelling: &str) -> bool {
        self.index.contains_key(spelling)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Normalize, score, sort and freeze.
    ///
    /// Scores follow `floor(ln(p) * amplifier)` where the amplifier maps the
    /// rarest spelling to 255.
    pub fn arrange(&mut self) -> Vec<ArrangedSpelling> {
        self.frozen = true;
        if self.raw.is_empty() || self.total_freq <= 0.0 {
            return Vec::new();
        }

        let mut min_freq = 1.0f64;
        for item in &mut self.raw {
            item.freq /= self.total_freq;
            if item.freq < min_freq {
                min_freq = item.freq;
            }
        }

        self.score_amplifier = if min_freq < 1.0 {
            255.0 / min_freq.ln()
        } else {
            0.0
        };

        let mut total_score = 0u64;
        let mut out: Vec<ArrangedSpelling> = self
            .raw
            .iter()
            .map(|item| {
                let score = (item.freq.ln() * self.score_amplifier + 1e-6).floor().clamp(0.0, 255.0) as u8;
                total_score += score as u64;
                ArrangedSpelling {
                    spelling: item.text.clone(),
                    score,
                }
            })
            .collect();
        self.average_score = (total_score / out.len() as u64) as u8;

        // Lexicographic, with empty strings last.
        out.sort_by(|a, b| match (a.spelling.is_empty(), b.spelling.is_empty()) {
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            _ => a.spelling.cmp(&b.spelling),
        });
        out
    }

    pub fn get_score_amplifier(&self) -> f64 {
        self.score_amplifier
    }

    pub fn get_average_score(&self) -> u8 {
        self.average_score
    }
}
