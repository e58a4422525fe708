// libpinyin/src/store.rs
//
// Term storage backends.
// - `TermStore`: the lookups the term database needs
// - `MemoryStore`: sorted in-memory index, also the base of the JSON store
// - `JsonStore`: a JSON word list file loaded into memory
// - `RedbStore`: persistent store with an abbreviation index
//
// Read operations never fail: a store that is not ready or hits a backend
// error returns nothing, which callers treat the same as "no match".

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::path::{Path, PathBuf};

use redb::{ReadableMultimapTable, ReadableTable};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A phrase with its frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub phrase: String,
    pub freq: f64,
}

impl Term {
    pub fn new<T: Into<String>>(phrase: T, freq: f64) -> Self {
        Self {
            phrase: phrase.into(),
            freq,
        }
    }
}

/// Terms sharing one pronunciation, keyed by syllables joined with `'`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Homonyms {
    /// Full syllables, such as "bei'jing".
    pub syllables_string: String,
    /// First letter of each syllable, such as "b'j".
    #[serde(default)]
    pub abbreviated_syllables_string: String,
    pub terms: Vec<Term>,
}

impl Homonyms {
    pub fn new<T: Into<String>>(syllables: T, terms: Vec<Term>) -> Self {
        let syllables_string = syllables.into();
        Self {
            abbreviated_syllables_string: abbreviate(&syllables_string),
            syllables_string,
            terms,
        }
    }
}

/// "bei'jing" → "b'j".
pub fn abbreviate(syllables: &str) -> String {
    syllables
        .split('\'')
        .map(|s| s.chars().next().map(String::from).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("'")
}

/// Join syllables into a store key.
pub fn join_syllables<S: AsRef<str>>(syllables: &[S]) -> String {
    syllables
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<&str>>()
        .join("'")
}

/// Matcher for full keys compatible with a partially typed key:
/// "b'jin" accepts "bei'jing" but not "bei'jiang".
fn incomplete_matcher(incomplete: &str) -> Option<Regex> {
    let pattern = incomplete
        .split('\'')
        .map(|s| format!("{}[^']*", regex::escape(s)))
        .collect::<Vec<_>>()
        .join("'");
    Regex::new(&format!("^{}", pattern)).ok()
}

/// Smallest string greater than every string starting with `prefix`.
fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    let last = chars.pop()?;
    let next = char::from_u32(last as u32 + 1)?;
    chars.push(next);
    Some(chars.into_iter().collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Uninitialized,
    Ready,
    Error,
}

/// Lookups the term database runs against a backend.
pub trait TermStore {
    fn status(&self) -> StoreStatus;

    fn is_ready(&self) -> bool {
        self.status() == StoreStatus::Ready
    }

    fn is_empty(&self) -> bool;

    fn get_all_terms(&self) -> Vec<Homonyms>;

    /// Replace the whole content.
    fn set_all_terms(&mut self, items: Vec<Homonyms>) -> Result<(), Box<dyn Error>>;

    /// Exact key, such as "bei'jing".
    fn get_terms_by_syllables(&self, key: &str) -> Vec<Homonyms>;

    /// Every key starting with `prefix`.
    fn get_terms_by_syllables_prefix(&self, prefix: &str) -> Vec<Homonyms>;

    /// Keys matching a partially incomplete or abbreviated key such as
    /// "b'ji", found through the abbreviation index.
    fn get_terms_by_incomplete_syllables(&self, incomplete: &str) -> Vec<Homonyms>;

    fn add_term(&mut self, syllables: &str, term: Term) -> Result<(), Box<dyn Error>>;

    fn remove_term(&mut self, syllables: &str, term: &Term) -> Result<(), Box<dyn Error>>;
}

/// In-memory store over a sorted map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Homonyms>,
    abbreviated: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_homonyms(items: Vec<Homonyms>) -> Self {
        let mut store = Self::new();
        store.load(items);
        store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn load(&mut self, items: Vec<Homonyms>) {
        self.entries.clear();
        self.abbreviated.clear();
        for item in items {
            self.insert_homonyms(item);
        }
    }

    fn insert_homonyms(&mut self, mut item: Homonyms) {
        item.abbreviated_syllables_string = abbreviate(&item.syllables_string);
        let key = item.syllables_string.clone();
        match self.entries.get_mut(&key) {
            Some(existing) => existing.terms.extend(item.terms),
            None => {
                self.abbreviated
                    .entry(item.abbreviated_syllables_string.clone())
                    .or_default()
                    .push(key.clone());
                self.entries.insert(key, item);
            }
        }
    }
}

impl TermStore for MemoryStore {
    fn status(&self) -> StoreStatus {
        StoreStatus::Ready
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_all_terms(&self) -> Vec<Homonyms> {
        self.entries.values().cloned().collect()
    }

    fn set_all_terms(&mut self, items: Vec<Homonyms>) -> Result<(), Box<dyn Error>> {
        self.load(items);
        Ok(())
    }

    fn get_terms_by_syllables(&self, key: &str) -> Vec<Homonyms> {
        self.entries.get(key).cloned().into_iter().collect()
    }

    fn get_terms_by_syllables_prefix(&self, prefix: &str) -> Vec<Homonyms> {
        match prefix_upper_bound(prefix) {
            Some(upper) => self
                .entries
                .range(prefix.to_string()..upper)
                .map(|(_, h)| h.clone())
                .collect(),
            None => self.get_all_terms(),
        }
    }

    fn get_terms_by_incomplete_syllables(&self, incomplete: &str) -> Vec<Homonyms> {
        let Some(matcher) = incomplete_matcher(incomplete) else {
            return Vec::new();
        };
        let Some(keys) = self.abbreviated.get(&abbreviate(incomplete)) else {
            return Vec::new();
        };
        keys.iter()
            .filter(|k| matcher.is_match(k))
            .filter_map(|k| self.entries.get(k).cloned())
            .collect()
    }

    fn add_term(&mut self, syllables: &str, term: Term) -> Result<(), Box<dyn Error>> {
        if let Some(existing) = self.entries.get_mut(syllables) {
            if let Some(t) = existing.terms.iter_mut().find(|t| t.phrase == term.phrase) {
                t.freq = t.freq.max(term.freq);
                return Ok(());
            }
        }
        self.insert_homonyms(Homonyms::new(syllables, vec![term]));
        Ok(())
    }

    fn remove_term(&mut self, syllables: &str, term: &Term) -> Result<(), Box<dyn Error>> {
        let now_empty = match self.entries.get_mut(syllables) {
            Some(existing) => {
                existing.terms.retain(|t| t.phrase != term.phrase);
                existing.terms.is_empty()
            }
            None => false,
        };
        if now_empty {
            if let Some(h) = self.entries.remove(syllables) {
                if let Some(keys) = self.abbreviated.get_mut(&h.abbreviated_syllables_string) {
                    keys.retain(|k| k != syllables);
                }
            }
        }
        Ok(())
    }
}

/// Word list stored as a JSON array of homonym groups.
///
/// `init` reads the file; until it succeeds every lookup is empty.
/// Changes stay in memory until `save`.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
    status: StoreStatus,
    inner: MemoryStore,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            status: StoreStatus::Uninitialized,
            inner: MemoryStore::new(),
        }
    }

    /// Create and initialize in one step, failing when the file is unusable.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let mut store = Self::new(path);
        let items = store.read_file()?;
        store.inner.load(items);
        store.status = StoreStatus::Ready;
        Ok(store)
    }

    /// Load the file. Failures are logged and leave the store in `Error`.
    pub fn init(&mut self) -> StoreStatus {
        if self.status != StoreStatus::Uninitialized {
            return self.status;
        }
        match self.read_file() {
            Ok(items) => {
                debug!("loaded {} homonym groups from {:?}", items.len(), self.path);
                self.inner.load(items);
                self.status = StoreStatus::Ready;
            }
            Err(e) => {
                warn!("failed to load term list {:?}: {}", self.path, e);
                self.status = StoreStatus::Error;
            }
        }
        self.status
    }

    /// Drop the loaded data.
    pub fn uninit(&mut self) {
        self.inner = MemoryStore::new();
        self.status = StoreStatus::Uninitialized;
    }

    pub fn save(&self) -> Result<(), Box<dyn Error>> {
        let items = self.inner.get_all_terms();
        let json = serde_json::to_string_pretty(&items)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn read_file(&self) -> Result<Vec<Homonyms>, Box<dyn Error>> {
        let content = std::fs::read_to_string(&self.path)?;
        let items: Vec<Homonyms> = serde_json::from_str(&content)?;
        Ok(items)
    }
}

impl TermStore for JsonStore {
    fn status(&self) -> StoreStatus {
        self.status
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn get_all_terms(&self) -> Vec<Homonyms> {
        if !self.is_ready() {
            return Vec::new();
        }
        self.inner.get_all_terms()
    }

    fn set_all_terms(&mut self, items: Vec<Homonyms>) -> Result<(), Box<dyn Error>> {
        self.inner.set_all_terms(items)?;
        self.status = StoreStatus::Ready;
        Ok(())
    }

    fn get_terms_by_syllables(&self, key: &str) -> Vec<Homonyms> {
        if !self.is_ready() {
            return Vec::new();
        }
        self.inner.get_terms_by_syllables(key)
    }

    fn get_terms_by_syllables_prefix(&self, prefix: &str) -> Vec<Homonyms> {
        if !self.is_ready() {
            return Vec::new();
        }
        self.inner.get_terms_by_syllables_prefix(prefix)
    }

    fn get_terms_by_incomplete_syllables(&self, incomplete: &str) -> Vec<Homonyms> {
        if !self.is_ready() {
            return Vec::new();
        }
        self.inner.get_terms_by_incomplete_syllables(incomplete)
    }

    fn add_term(&mut self, syllables: &str, term: Term) -> Result<(), Box<dyn Error>> {
        self.inner.add_term(syllables, term)
    }

    fn remove_term(&mut self, syllables: &str, term: &Term) -> Result<(), Box<dyn Error>> {
        self.inner.remove_term(syllables, term)
    }
}

/// Persistent store: homonym groups serialized with bincode in a redb table,
/// plus a multimap from abbreviated key to full key.
pub struct RedbStore {
    db: redb::Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").field("path", &self.path).finish()
    }
}

impl RedbStore {
    const HOMONYMS: redb::TableDefinition<'static, &'static str, &'static [u8]> =
        redb::TableDefinition::new("homonyms");
    const ABBREVIATED: redb::MultimapTableDefinition<'static, &'static str, &'static str> =
        redb::MultimapTableDefinition::new("abbreviated");

    /// Create or open a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = redb::Database::create(path.as_ref())?;
        let write_txn = db.begin_write()?;
        write_txn.open_table(Self::HOMONYMS)?;
        write_txn.open_multimap_table(Self::ABBREVIATED)?;
        write_txn.commit()?;
        Ok(Self {
            db,
            path: path.as_ref().to_path_buf(),
        })
    }

    fn read_one(&self, key: &str) -> Result<Option<Homonyms>, Box<dyn Error>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::HOMONYMS)?;
        let found = match table.get(key)? {
            Some(bytes) => Some(bincode::deserialize(bytes.value())?),
            None => None,
        };
        Ok(found)
    }

    fn read_range(&self, prefix: &str) -> Result<Vec<Homonyms>, Box<dyn Error>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::HOMONYMS)?;
        let mut out = Vec::new();
        for item in table.range(prefix..)? {
            let (k, v) = item?;
            if !k.value().starts_with(prefix) {
                break;
            }
            out.push(bincode::deserialize(v.value())?);
        }
        Ok(out)
    }

    fn read_abbreviated(&self, abbreviated: &str) -> Result<Vec<String>, Box<dyn Error>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_multimap_table(Self::ABBREVIATED)?;
        let mut keys = Vec::new();
        for key in table.get(abbreviated)? {
            keys.push(key?.value().to_string());
        }
        Ok(keys)
    }

    fn write(&self, items: &[Homonyms], clear: bool) -> Result<(), Box<dyn Error>> {
        let write_txn = self.db.begin_write()?;
        {
            if clear {
                write_txn.delete_table(Self::HOMONYMS)?;
                write_txn.delete_multimap_table(Self::ABBREVIATED)?;
            }
            let mut table = write_txn.open_table(Self::HOMONYMS)?;
            let mut index = write_txn.open_multimap_table(Self::ABBREVIATED)?;
            for item in items {
                let bytes = bincode::serialize(item)?;
                table.insert(item.syllables_string.as_str(), bytes.as_slice())?;
                index.insert(
                    item.abbreviated_syllables_string.as_str(),
                    item.syllables_string.as_str(),
                )?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, item: &Homonyms) -> Result<(), Box<dyn Error>> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(Self::HOMONYMS)?;
            let mut index = write_txn.open_multimap_table(Self::ABBREVIATED)?;
            table.remove(item.syllables_string.as_str())?;
            index.remove(
                item.abbreviated_syllables_string.as_str(),
                item.syllables_string.as_str(),
            )?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn has_entries(&self) -> Result<bool, Box<dyn Error>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::HOMONYMS)?;
        let mut iter = table.iter()?;
        let found = iter.next().is_some();
        Ok(found)
    }
}

/// Log a backend failure and degrade to an empty result.
fn or_empty<T: Default>(result: Result<T, Box<dyn Error>>, what: &str) -> T {
    result.unwrap_or_else(|e| {
        warn!("term store {} failed: {}", what, e);
        T::default()
    })
}

impl TermStore for RedbStore {
    fn status(&self) -> StoreStatus {
        StoreStatus::Ready
    }

    fn is_empty(&self) -> bool {
        !or_empty(self.has_entries(), "scan")
    }

    fn get_all_terms(&self) -> Vec<Homonyms> {
        or_empty(self.read_range(""), "scan")
    }

    fn set_all_terms(&mut self, items: Vec<Homonyms>) -> Result<(), Box<dyn Error>> {
        let items: Vec<Homonyms> = items
            .into_iter()
            .map(|mut h| {
                h.abbreviated_syllables_string = abbreviate(&h.syllables_string);
                h
            })
            .collect();
        self.write(&items, true)
    }

    fn get_terms_by_syllables(&self, key: &str) -> Vec<Homonyms> {
        or_empty(self.read_one(key).map(|h| h.into_iter().collect()), "lookup")
    }

    fn get_terms_by_syllables_prefix(&self, prefix: &str) -> Vec<Homonyms> {
        or_empty(self.read_range(prefix), "prefix lookup")
    }

    fn get_terms_by_incomplete_syllables(&self, incomplete: &str) -> Vec<Homonyms> {
        let Some(matcher) = incomplete_matcher(incomplete) else {
            return Vec::new();
        };
        let keys = or_empty(self.read_abbreviated(&abbreviate(incomplete)), "abbreviation lookup");
        keys.iter()
            .filter(|k| matcher.is_match(k))
            .flat_map(|k| self.get_terms_by_syllables(k))
            .collect()
    }

    fn add_term(&mut self, syllables: &str, term: Term) -> Result<(), Box<dyn Error>> {
        let mut item = self
            .read_one(syllables)?
            .unwrap_or_else(|| Homonyms::new(syllables, Vec::new()));
        match item.terms.iter_mut().find(|t| t.phrase == term.phrase) {
            Some(t) => t.freq = t.freq.max(term.freq),
            None => item.terms.push(term),
        }
        self.write(&[item], false)
    }

    fn remove_term(&mut self, syllables: &str, term: &Term) -> Result<(), Box<dyn Error>> {
        let Some(mut item) = self.read_one(syllables)? else {
            return Ok(());
        };
        item.terms.retain(|t| t.phrase != term.phrase);
        if item.terms.is_empty() {
            self.delete(&item)
        } else {
            self.write(&[item], false)
        }
    }
}
