// libpinyin/src/database.rs
//
// Term lookups on top of the storage backends.
// - picks the first ready, non-empty store
// - exact lookups fall back to incomplete/abbreviated ones
// - sentence building over term frequencies
// - suggestions that continue the last selection
// - results kept in an LRU cache

use std::cell::RefCell;
use std::error::Error;
use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;
use tracing::{debug, trace};

use crate::config::PinyinConfig;
use crate::store::{join_syllables, Homonyms, JsonStore, RedbStore, StoreStatus, Term, TermStore};

/// Total frequency mass of the word list; term frequencies are relative to it.
pub const DICT_TOTAL_FREQ: f64 = 1.0e8;

/// Most terms returned for an incomplete or abbreviated key.
pub const MAX_TERMS_FOR_INCOMPLETE_SYLLABLES: usize = 10;

/// Longest term, in syllables, tried when building a sentence.
pub const TERM_MAX_LENGTH: usize = 8;

const DEFAULT_CACHE_SIZE: usize = 1000;

/// Sort by descending frequency and drop repeated phrases.
fn process_result(mut terms: Vec<Term>, limit: Option<usize>) -> Vec<Term> {
    terms.sort_by(|a, b| b.freq.partial_cmp(&a.freq).unwrap_or(std::cmp::Ordering::Equal));
    let mut seen = std::collections::HashSet::new();
    terms.retain(|t| seen.insert(t.phrase.clone()));
    if let Some(limit) = limit {
        terms.truncate(limit);
    }
    terms
}

fn flatten(groups: Vec<Homonyms>) -> Vec<Term> {
    groups.into_iter().flat_map(|h| h.terms).collect()
}

/// Term database over one or more stores, tried in order.
pub struct TermDatabase {
    stores: Vec<Box<dyn TermStore>>,
    cache: RefCell<LruCache<String, Vec<Term>>>,
    term_max_length: usize,
    max_incomplete_terms: usize,
}

impl TermDatabase {
    pub fn new(store: Box<dyn TermStore>) -> Self {
        Self::with_stores(vec![store], DEFAULT_CACHE_SIZE)
    }

    /// Stores are listed by preference, for example a persistent store
    /// followed by the JSON word list it is filled from.
    pub fn with_stores(stores: Vec<Box<dyn TermStore>>, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            stores,
            cache: RefCell::new(LruCache::new(capacity)),
            term_max_length: TERM_MAX_LENGTH,
            max_incomplete_terms: MAX_TERMS_FOR_INCOMPLETE_SYLLABLES,
        }
    }

    /// Open the JSON word list, optionally backed by a persistent store that
    /// is filled from the word list the first time it is found empty.
    /// Lookups go to the persistent store once it holds data.
    pub fn open(json_path: &Path, persistent: Option<&Path>, config: &PinyinConfig) -> Result<Self, Box<dyn Error>> {
        let mut stores: Vec<Box<dyn TermStore>> = Vec::new();
        if let Some(path) = persistent {
            stores.push(Box::new(RedbStore::open(path)?));
        }
        let mut json = JsonStore::new(json_path);
        if json.init() != StoreStatus::Ready && stores.iter().all(|s| s.is_empty()) {
            return Err(format!("no usable term list at {:?}", json_path).into());
        }
        stores.push(Box::new(json));

        let mut db = Self::with_stores(stores, config.cache_size);
        db.set_term_max_length(config.term_max_length);
        db.set_max_incomplete_terms(config.max_incomplete_terms);
        if persistent.is_some() {
            db.populate()?;
        }
        Ok(db)
    }

    pub fn set_term_max_length(&mut self, len: usize) {
        self.term_max_length = len.max(1);
    }

    pub fn set_max_incomplete_terms(&mut self, max: usize) {
        self.max_incomplete_terms = max;
    }

    fn usable_store(&self) -> Option<&dyn TermStore> {
        self.stores
            .iter()
            .find(|s| s.is_ready() && !s.is_empty())
            .map(|s| s.as_ref())
    }

    pub fn is_ready(&self) -> bool {
        self.usable_store().is_some()
    }

    /// Copy every term from the last ready store into the first empty one.
    /// Returns the number of homonym groups copied.
    pub fn populate(&mut self) -> Result<usize, Box<dyn Error>> {
        let Some(source) = self.stores.iter().rposition(|s| s.is_ready() && !s.is_empty()) else {
            return Ok(0);
        };
        let Some(target) = self.stores.iter().position(|s| s.is_ready() && s.is_empty()) else {
            return Ok(0);
        };
        if target >= source {
            return Ok(0);
        }
        let items = self.stores[source].get_all_terms();
        let count = items.len();
        self.stores[target].set_all_terms(items)?;
        debug!("populated store {} with {} homonym groups", target, count);
        self.clear_cache();
        Ok(count)
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Terms for the syllables, most frequent first.
    ///
    /// An exact key is tried first. When it has no terms the key is treated
    /// as incomplete or abbreviated and at most `max_incomplete_terms` are
    /// returned.
    pub fn get_terms<S: AsRef<str>>(&self, syllables: &[S]) -> Vec<Term> {
        let Some(store) = self.usable_store() else {
            debug!("database not ready");
            return Vec::new();
        };
        let key = join_syllables(syllables);
        if let Some(hit) = self.cache.borrow_mut().get(&key) {
            trace!("cache hit for {}", key);
            return hit.clone();
        }

        let exact = flatten(store.get_terms_by_syllables(&key));
        let result = if !exact.is_empty() {
            process_result(exact, None)
        } else {
            let partial = flatten(store.get_terms_by_incomplete_syllables(&key));
            process_result(partial, Some(self.max_incomplete_terms))
        };
        self.cache.borrow_mut().put(key, result.clone());
        result
    }

    pub fn get_term_with_highest_score<S: AsRef<str>>(&self, syllables: &[S]) -> Option<Term> {
        self.get_terms(syllables).into_iter().next()
    }

    /// Most probable sentence covering all syllables.
    ///
    /// Each step keeps only the best sentence for the first `n` syllables.
    /// A span with no term contributes its syllables as literal text with
    /// frequency zero.
    pub fn get_sentence<S: AsRef<str>>(&self, syllables: &[S]) -> String {
        let n = syllables.len();
        if n == 0 {
            return String::new();
        }
        let mut probabilities = vec![-1.0f64; n + 1];
        let mut sentences = vec![String::new(); n + 1];
        probabilities[0] = 1.0;

        for len in 1..=n {
            for last in 1..=len.min(self.term_max_length) {
                let span = &syllables[len - last..len];
                let term = self.get_term_with_highest_score(span).unwrap_or_else(|| {
                    let literal: String = span.iter().map(|s| s.as_ref()).collect();
                    Term::new(literal, 0.0)
                });
                let prob = probabilities[len - last] * term.freq / DICT_TOTAL_FREQ;
                if prob > probabilities[len] {
                    probabilities[len] = prob;
                    sentences[len] = format!("{}{}", sentences[len - last], term.phrase);
                }
            }
        }
        sentences.pop().unwrap_or_default()
    }

    /// Longer terms starting with the selected text, for the syllables that
    /// produced it. The selected text itself is excluded.
    pub fn get_suggestions<S: AsRef<str>>(&self, syllables: &[S], text: &str) -> Vec<Term> {
        let Some(store) = self.usable_store() else {
            debug!("database not ready");
            return Vec::new();
        };
        let cache_key = format!("SUGGESTION:{}", text);
        if let Some(hit) = self.cache.borrow_mut().get(&cache_key) {
            return hit.clone();
        }

        let prefix = join_syllables(syllables);
        let matched: Vec<Term> = flatten(store.get_terms_by_syllables_prefix(&prefix))
            .into_iter()
            .filter(|t| t.phrase.starts_with(text) && t.phrase != text)
            .collect();
        let result = process_result(matched, None);
        self.cache.borrow_mut().put(cache_key, result.clone());
        result
    }

    /// Add a term to the preferred store.
    pub fn add_term(&mut self, syllables: &str, term: Term) -> Result<(), Box<dyn Error>> {
        let Some(store) = self.stores.iter_mut().find(|s| s.is_ready()) else {
            return Err("no ready term store".into());
        };
        store.add_term(syllables, term)?;
        self.clear_cache();
        Ok(())
    }

    pub fn remove_term(&mut self, syllables: &str, term: &Term) -> Result<(), Box<dyn Error>> {
        for store in self.stores.iter_mut().filter(|s| s.is_ready()) {
            store.remove_term(syllables, term)?;
        }
        self.clear_cache();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn db() -> TermDatabase {
        TermDatabase::new(Box::new(MemoryStore::from_homonyms(vec![
            Homonyms::new("bei'jing", vec![Term::new("背景", 5.0e5), Term::new("北京", 1.0e6)]),
            Homonyms::new("bei'jing'shi", vec![Term::new("北京市", 2.0e5)]),
            Homonyms::new("bei", vec![Term::new("北", 2.0e6), Term::new("被", 3.0e6)]),
            Homonyms::new("jing", vec![Term::new("京", 1.0e6)]),
            Homonyms::new("shi", vec![Term::new("是", 5.0e6)]),
            Homonyms::new("ren", vec![Term::new("人", 4.0e6)]),
        ])))
    }

    #[test]
    fn terms_sorted_by_frequency() {
        let phrases: Vec<String> = db()
            .get_terms(&["bei", "jing"])
            .into_iter()
            .map(|t| t.phrase)
            .collect();
        assert_eq!(phrases, vec!["北京", "背景"]);
    }

    #[test]
    fn abbreviated_lookup_falls_back() {
        let terms = db().get_terms(&["b", "j"]);
        assert_eq!(terms[0].phrase, "北京");
        assert!(db().get_terms(&["x"]).is_empty());
    }

    #[test]
    fn sentence_prefers_whole_term() {
        let d = db();
        assert_eq!(d.get_sentence(&["bei", "jing", "shi"]), "北京市");
        assert_eq!(d.get_sentence(&["bei", "jing", "ren"]), "北京人");
        assert_eq!(d.get_sentence(&["zzz"]), "zzz");
        assert_eq!(d.get_sentence::<&str>(&[]), "");
    }

    #[test]
    fn suggestions_extend_selection() {
        let d = db();
        let s = d.get_suggestions(&["bei", "jing"], "北京");
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].phrase, "北京市");
    }

    #[test]
    fn populate_copies_into_empty_store() {
        let mut d = TermDatabase::with_stores(
            vec![
                Box::new(MemoryStore::new()),
                Box::new(MemoryStore::from_homonyms(vec![Homonyms::new(
                    "ren",
                    vec![Term::new("人", 1.0)],
                )])),
            ],
            16,
        );
        assert_eq!(d.populate().unwrap(), 1);
        assert_eq!(d.populate().unwrap(), 0);
        assert_eq!(d.get_terms(&["ren"])[0].phrase, "人");
    }
}
