//! Word prediction over a dictionary blob.
//!
//! A prediction runs in three steps:
//! 1. The input prefix, lower-cased and reduced to base letters, plus its
//!    typo variants (nearby-key substitution, one inserted letter, one
//!    dropped letter, two swapped letters) are screened with the bloom
//!    filter.
//! 2. Prefixes that pass are confirmed in the trie, which yields every word
//!    starting with them in any case or accent.
//! 3. Candidates are ranked by frequency, edit distance to the input and
//!    how they were found. The best few are kept.
use std::error::Error;
use std::path::Path;

use ahash::AHashSet;
use tracing::{debug, trace};

use crate::config::PredictionConfig;
use crate::dictionary::{Dictionary, WordFreq};
use crate::distance::code_distance;
use crate::error::PredictError;
use crate::layout::{KeyboardLayout, NearbyKeys};

/// How a candidate prefix was derived from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// The input itself.
    Prefix,
    /// One letter replaced by a nearby key (`qas` -> `was`).
    EditDistance,
    /// Two neighbouring letters swapped (`tihs` -> `this`).
    Transposition,
    /// One letter missing from the input (`tis` -> `this`).
    Omission,
    /// One extra letter in the input.
    Deletion,
}

impl Variant {
    pub fn multiplier(self) -> f64 {
        match self {
            Variant::Prefix => 3.0,
            Variant::EditDistance => 1.8,
            Variant::Transposition => 1.6,
            Variant::Omission => 1.4,
            Variant::Deletion => 1.2,
        }
    }
}

/// A ranked prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub word: String,
    pub freq: u8,
    pub variant: Variant,
    pub distance: usize,
    pub rank: f64,
}

fn rank(freq: u8, word_len: usize, distance: usize, variant: Variant) -> f64 {
    let mut rank = freq as f64 * (1.0 + (10 - distance.min(9)) as f64 / 10.0);
    if variant == Variant::Prefix {
        rank *= variant.multiplier() * (1.0 + word_len.min(9) as f64 / 10.0);
    } else {
        rank *= variant.multiplier();
    }
    rank
}

/// Insert into a rank-ordered list capped at `max`. A word already listed
/// keeps its first entry.
fn keep_top(top: &mut Vec<Prediction>, candidate: Prediction, max: usize) {
    let mut index = top.len();
    for i in (0..top.len()).rev() {
        if top[i].word == candidate.word {
            return;
        }
        if candidate.rank > top[i].rank {
            index = i;
        }
    }
    if index >= max {
        return;
    }
    top.insert(index, candidate);
    top.truncate(max);
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Per-call search state.
struct Search<'a> {
    dict: &'a Dictionary,
    nearby: &'a NearbyKeys,
    prefixes: AHashSet<Vec<u32>>,
    candidates: Vec<(WordFreq, Variant)>,
}

impl<'a> Search<'a> {
    fn check(&mut self, input: &[u32], variant: Variant) {
        if !self.dict.bloom_contains(input) {
            return;
        }
        if !self.prefixes.insert(input.to_vec()) {
            return;
        }
        let found = self.dict.lookup_prefix(input);
        trace!("{:?} prefix {:?}: {} words", variant, input, found.len());
        self.candidates.extend(found.into_iter().map(|w| (w, variant)));
    }

    fn edit_distance1(&mut self, input: &mut [u32]) {
        let nearby: &'a NearbyKeys = self.nearby;
        for n in 0..input.len() {
            let original = input[n];
            let Some(keys) = nearby.get(original) else {
                continue;
            };
            for &key in keys {
                input[n] = key;
                self.check(input, Variant::EditDistance);
            }
            input[n] = original;
        }
    }

    fn omission1(&mut self, input: &[u32]) {
        let nearby: &'a NearbyKeys = self.nearby;
        let length = input.len().min(self.dict.prefix_limit().saturating_sub(1));
        let mut widened = vec![0u32; length + 1];
        for n in 0..=length {
            widened[..n].copy_from_slice(&input[..n]);
            widened[n + 1..].copy_from_slice(&input[n..length]);
            for letter in nearby.letters() {
                widened[n] = letter;
                self.check(&widened, Variant::Omission);
            }
        }
    }

    fn deletion1(&mut self, input: &[u32]) {
        let mut shortened = Vec::with_capacity(input.len());
        for n in 1..input.len() {
            shortened.clear();
            shortened.extend_from_slice(&input[..n]);
            shortened.extend_from_slice(&input[n + 1..]);
            self.check(&shortened, Variant::Deletion);
        }
    }

    fn transpositions(&mut self, input: &mut [u32]) {
        for n in 1..input.len() {
            input.swap(n - 1, n);
            self.check(input, Variant::Transposition);
            input.swap(n - 1, n);
        }
    }
}

/// Prediction engine. Needs a dictionary and a keyboard layout before
/// `predict` can be called.
#[derive(Debug, Clone)]
pub struct Predictor {
    dict: Option<Dictionary>,
    nearby: Option<NearbyKeys>,
    max_suggestions: usize,
}

impl Default for Predictor {
    fn default() -> Self {
        Self::with_config(&PredictionConfig::default())
    }
}

impl Predictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &PredictionConfig) -> Self {
        Self {
            dict: None,
            nearby: None,
            max_suggestions: config.max_suggestions.max(1),
        }
    }

    /// Use a dictionary blob. The previous dictionary is kept when the blob
    /// does not parse.
    pub fn set_dictionary(&mut self, blob: Vec<u8>) -> Result<(), PredictError> {
        let dict = Dictionary::from_bytes(blob)?;
        self.dict = Some(dict);
        Ok(())
    }

    pub fn load_dictionary<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Box<dyn Error>> {
        let blob = std::fs::read(path)?;
        self.set_dictionary(blob)?;
        Ok(())
    }

    /// Release the dictionary. `predict` fails until a new one is set.
    pub fn drop_dictionary(&mut self) {
        if self.dict.take().is_some() {
            debug!("prediction dictionary dropped");
        }
    }

    pub fn set_layout(&mut self, layout: &KeyboardLayout) {
        self.nearby = Some(NearbyKeys::from_layout(layout));
    }

    pub fn dictionary(&self) -> Option<&Dictionary> {
        self.dict.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.dict.is_some() && self.nearby.is_some()
    }

    /// Best completions or corrections for a partly typed word. Input that
    /// starts with a capital letter capitalises the results.
    pub fn predict(&self, word: &str) -> Result<Vec<String>, PredictError> {
        let capital = word.chars().next().is_some_and(|c| c.is_uppercase());
        let ranked = self.predict_ranked(word)?;
        Ok(ranked
            .into_iter()
            .map(|p| if capital { capitalize(&p.word) } else { p.word })
            .collect())
    }

    /// Like `predict`, with ranking details and words as stored.
    pub fn predict_ranked(&self, word: &str) -> Result<Vec<Prediction>, PredictError> {
        let (Some(dict), Some(nearby)) = (self.dict.as_ref(), self.nearby.as_ref()) else {
            return Err(PredictError::NotInitialized);
        };
        if word.is_empty() {
            return Ok(Vec::new());
        }

        let lower: Vec<u32> = word.to_lowercase().chars().map(|c| dict.to_base(c as u32)).collect();
        let mut input: Vec<u32> = lower.iter().take(dict.prefix_limit()).copied().collect();
        let word_len = word.chars().count();

        let mut search = Search {
            dict,
            nearby,
            prefixes: AHashSet::new(),
            candidates: Vec::new(),
        };
        search.check(&input, Variant::Prefix);
        if word_len > 1 {
            search.edit_distance1(&mut input);
            search.omission1(&input);
            search.deletion1(&input);
            search.transpositions(&mut input);
        }
        debug!(
            "predict {:?}: {} candidates from {} prefixes",
            word,
            search.candidates.len(),
            search.prefixes.len()
        );

        let mut top = Vec::with_capacity(self.max_suggestions + 1);
        for (found, variant) in search.candidates {
            let len = found.word.chars().count();
            if found.word == word || len < word_len {
                continue;
            }
            let codes: Vec<u32> = found.word.chars().map(|c| dict.to_base(c as u32)).collect();
            let distance = code_distance(&lower, &codes);
            let rank = rank(found.freq, len, distance, variant);
            keep_top(
                &mut top,
                Prediction {
                    word: found.word,
                    freq: found.freq,
                    variant,
                    distance,
                    rank,
                },
                self.max_suggestions,
            );
        }
        Ok(top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DictionaryBuilder;

    fn predictor(words: &[(&str, u32)]) -> Predictor {
        let mut b = DictionaryBuilder::new();
        for (w, f) in words {
            b.add_word(w, *f);
        }
        let mut p = Predictor::new();
        p.set_dictionary(b.build().unwrap()).unwrap();
        p.set_layout(&KeyboardLayout::qwerty());
        p
    }

    #[test]
    fn rank_formula() {
        // distance 1, prefix match of a 5 letter word
        let r = rank(10, 5, 1, Variant::Prefix);
        assert!((r - 10.0 * 1.9 * 3.0 * 1.5).abs() < 1e-9);
        let r = rank(10, 3, 12, Variant::Deletion);
        assert!((r - 10.0 * 1.1 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn keep_top_orders_and_caps() {
        let p = |w: &str, rank: f64| Prediction {
            word: w.to_string(),
            freq: 1,
            variant: Variant::Prefix,
            distance: 0,
            rank,
        };
        let mut top = Vec::new();
        keep_top(&mut top, p("a", 1.0), 2);
        keep_top(&mut top, p("b", 3.0), 2);
        keep_top(&mut top, p("c", 2.0), 2);
        keep_top(&mut top, p("b", 9.0), 2);
        keep_top(&mut top, p("d", 0.5), 2);
        let words: Vec<&str> = top.iter().map(|c| c.word.as_str()).collect();
        assert_eq!(words, vec!["b", "c"]);
    }

    #[test]
    fn completes_prefix() {
        let p = predictor(&[("hello", 100), ("help", 80), ("helmet", 20), ("world", 200)]);
        assert_eq!(p.predict("hel").unwrap(), vec!["hello", "help", "helmet"]);
    }

    #[test]
    fn corrects_swapped_letters() {
        let p = predictor(&[("this", 150), ("tihsx", 1)]);
        let out = p.predict("tihs").unwrap();
        assert_eq!(out[0], "this");
    }

    #[test]
    fn capitalised_input() {
        let p = predictor(&[("hello", 100)]);
        assert_eq!(p.predict("Hel").unwrap(), vec!["Hello"]);
    }

    #[test]
    fn input_word_and_shorter_words_skipped() {
        let p = predictor(&[("he", 200), ("hello", 100)]);
        assert_eq!(p.predict("hel").unwrap(), vec!["hello"]);
        assert!(p.predict("hello").unwrap().iter().all(|w| w != "hello"));
    }

    #[test]
    fn drop_dictionary_uninitializes() {
        let mut p = predictor(&[("hello", 100)]);
        assert!(p.is_ready());
        p.drop_dictionary();
        assert_eq!(p.predict("he"), Err(PredictError::NotInitialized));
    }

    #[test]
    fn bad_blob_keeps_previous_dictionary() {
        let mut p = predictor(&[("hello", 100)]);
        assert!(matches!(p.set_dictionary(vec![1]), Err(PredictError::BadDictionary(_))));
        assert_eq!(p.predict("hel").unwrap(), vec!["hello"]);
    }
}
