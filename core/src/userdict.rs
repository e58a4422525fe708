//! User dictionary: lemmas learned from the user's own selections.
//!
//! Lemmas live in memory, indexed by `(hanzi, spelling ids)`, and get ids
//! from `USER_DICT_ID_START` upwards. Two storage backends:
//! - `InMemory`: nothing is persisted (tests, throwaway sessions)
//! - `Redb`: every change is written through to a `redb` table keyed by
//!   `"hanzi\tpin yin"`, so entries survive reopening
//!
//! Scores are `ln(count / (total + others)) * -800`, where `others` is the
//! frequency mass of the system dictionary.
use ahash::AHashMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use redb::ReadableTable;

use crate::atom_dict::{AtomDict, Extension};
use crate::dict_def::{
    DictExtPara, LemmaId, LmaPsbItem, MileStoneHandle, NPredictItem, SplId, MAX_LEMMA_SIZE,
    SYS_DICT_TOTAL_FREQ, USER_DICT_ID_END, USER_DICT_ID_START,
};
use crate::dict_trie::MAX_MILESTONE;
use crate::ngram::convert_psb_to_score;
use crate::spelling_trie::{format_spelling_str, SpellingTrie};

#[derive(Debug, Clone, PartialEq, Eq)]
struct UserLemma {
    hanzi: String,
    splids: Vec<SplId>,
    count: u32,
    removed: bool,
}

#[derive(Debug, Clone)]
struct UserMileStone {
    step: u16,
    /// Lemma slots still matching, all longer than the matched prefix.
    slots: Vec<u32>,
}

/// Storage backend behind a `UserDict`.
#[derive(Debug)]
pub enum UserDictStore {
    InMemory,
    Redb(RedbUserStore),
}

#[derive(Debug)]
pub struct UserDict {
    spl_trie: Arc<SpellingTrie>,
    lemmas: Vec<UserLemma>,
    index: AHashMap<(String, Vec<SplId>), u32>,
    total_count: u64,
    total_other: u64,
    mile_stones: Vec<UserMileStone>,
    store: UserDictStore,
}

impl UserDict {
    /// An empty dictionary that is never persisted.
    pub fn new_in_memory(spl_trie: Arc<SpellingTrie>) -> Self {
        Self {
            spl_trie,
            lemmas: Vec::new(),
            index: AHashMap::new(),
            total_count: 0,
            total_other: SYS_DICT_TOTAL_FREQ as u64,
            mile_stones: Vec::new(),
            store: UserDictStore::InMemory,
        }
    }

    /// Open (or create) a redb-backed dictionary and load its entries.
    pub fn open_redb<P: AsRef<Path>>(path: P, spl_trie: Arc<SpellingTrie>) -> Result<Self, Box<dyn Error>> {
        let mut dict = Self::new_in_memory(spl_trie);
        dict.load_dict(path.as_ref())?;
        Ok(dict)
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.store, UserDictStore::Redb(_))
    }

    fn slot_of(id: LemmaId) -> Option<usize> {
        if (USER_DICT_ID_START..=USER_DICT_ID_END).contains(&id) {
            Some((id - USER_DICT_ID_START) as usize)
        } else {
            None
        }
    }

    fn live(&self, slot: usize) -> Option<&UserLemma> {
        self.lemmas.get(slot).filter(|l| !l.removed)
    }

    /// Id of an exact `(hanzi, spelling ids)` entry, 0 if absent.
    pub fn get_lemma_id(&self, hanzi: &str, splids: &[SplId]) -> LemmaId {
        self.index
            .get(&(hanzi.to_string(), splids.to_vec()))
            .filter(|&&slot| self.live(slot as usize).is_some())
            .map(|&slot| USER_DICT_ID_START + slot)
            .unwrap_or(0)
    }

    pub fn get_lemma_count(&self, id: LemmaId) -> u32 {
        Self::slot_of(id)
            .and_then(|s| self.live(s))
            .map(|l| l.count)
            .unwrap_or(0)
    }

    fn score(&self, count: u32) -> f32 {
        let total = (self.total_count + self.total_other).max(1) as f64;
        convert_psb_to_score(count.max(1) as f64 / total)
    }

    fn lpi(&self, slot: usize, lemma: &UserLemma) -> LmaPsbItem {
        LmaPsbItem {
            id: USER_DICT_ID_START + slot as LemmaId,
            lma_len: lemma.splids.len() as u16,
            psb: self.score(lemma.count),
            hanzi: lemma.hanzi.chars().next().unwrap_or('\0'),
        }
    }

    fn spelling_key(&self, splids: &[SplId]) -> String {
        splids
            .iter()
            .map(|&s| self.spl_trie.get_spelling_str_lower(s))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn persist(&self, lemma: &UserLemma) {
        if let UserDictStore::Redb(store) = &self.store {
            let key = format!("{}\t{}", lemma.hanzi, self.spelling_key(&lemma.splids));
            let res = if lemma.removed {
                store.remove(&key)
            } else {
                store.put(&key, lemma.count as u64)
            };
            if let Err(e) = res {
                warn!(error = %e, key = %key, "user dictionary write failed");
            }
        }
    }

    fn insert_loaded(&mut self, hanzi: &str, splids: Vec<SplId>, count: u32) {
        let slot = self.lemmas.len() as u32;
        self.index.insert((hanzi.to_string(), splids.clone()), slot);
        self.lemmas.push(UserLemma {
            hanzi: hanzi.to_string(),
            splids,
            count,
            removed: false,
        });
        self.total_count += count as u64;
    }
}

impl AtomDict for UserDict {
    fn load_dict(&mut self, path: &Path) -> Result<(), Box<dyn Error>> {
        let store = RedbUserStore::new(path)?;
        let entries = store.iter_all()?;
        self.lemmas.clear();
        self.index.clear();
        self.total_count = 0;
        self.mile_stones.clear();

        for (key, count) in entries {
            let Some((hanzi, spellings)) = key.split_once('\t') else {
                debug!(key = %key, "malformed user dictionary key");
                continue;
            };
            let splids: Option<Vec<SplId>> = spellings
                .split(' ')
                .map(|p| self.spl_trie.full_id_of(&format_spelling_str(p)))
                .collect();
            match splids {
                Some(ids) if ids.len() == hanzi.chars().count() => {
                    self.insert_loaded(hanzi, ids, count.min(u32::MAX as u64) as u32)
                }
                _ => debug!(key = %key, "user lemma with unknown spelling skipped"),
            }
        }
        debug!(lemmas = self.lemmas.len(), total = self.total_count, "user dictionary loaded");
        self.store = UserDictStore::Redb(store);
        Ok(())
    }

    fn number_of_lemmas(&self) -> usize {
        self.lemmas.iter().filter(|l| !l.removed).count()
    }

    fn reset_milestones(&mut self, from_step: u16, _from_handle: MileStoneHandle) {
        let keep = self.mile_stones.partition_point(|m| m.step < from_step);
        self.mile_stones.truncate(keep);
    }

    fn extend_dict(&mut self, from_handle: MileStoneHandle, para: &DictExtPara) -> Extension {
        let ext_len = para.ext_len();
        if ext_len == 0 || ext_len > MAX_LEMMA_SIZE || (from_handle == 0) != (ext_len == 1) {
            return Extension::default();
        }
        let candidates: Vec<u32> = if from_handle == 0 {
            (0..self.lemmas.len() as u32).collect()
        } else {
            assert!(
                from_handle as usize <= self.mile_stones.len(),
                "stale milestone handle {}",
                from_handle
            );
            self.mile_stones[from_handle as usize - 1].slots.clone()
        };

        let mut items = Vec::new();
        let mut longer = Vec::new();
        for slot in candidates {
            let Some(lemma) = self.live(slot as usize) else {
                continue;
            };
            if lemma.splids.len() < ext_len || !para.matches(lemma.splids[ext_len - 1]) {
                continue;
            }
            if lemma.splids.len() == ext_len {
                items.push(self.lpi(slot as usize, lemma));
            } else {
                longer.push(slot);
            }
        }

        let handle = if longer.is_empty() {
            0
        } else if self.mile_stones.len() >= MAX_MILESTONE {
            warn!("user dictionary milestone space exhausted");
            0
        } else {
            self.mile_stones.push(UserMileStone {
                step: para.step_no,
                slots: longer,
            });
            self.mile_stones.len() as MileStoneHandle
        };
        Extension { handle, items }
    }

    fn get_lpis(&self, splids: &[SplId], max: usize) -> Vec<LmaPsbItem> {
        let ranges: Vec<(SplId, u16)> = splids.iter().map(|&s| self.spl_trie.id_range(s)).collect();
        self.lemmas
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.removed && l.splids.len() == splids.len())
            .filter(|(_, l)| {
                l.splids
                    .iter()
                    .zip(&ranges)
                    .all(|(&s, &(start, num))| s >= start && s < start + num)
            })
            .take(max)
            .map(|(slot, l)| self.lpi(slot, l))
            .collect()
    }

    fn get_lemma_str(&self, id: LemmaId) -> String {
        Self::slot_of(id)
            .and_then(|s| self.live(s))
            .map(|l| l.hanzi.clone())
            .unwrap_or_default()
    }

    fn get_lemma_splids(&self, id: LemmaId, _hint: &[SplId]) -> Vec<SplId> {
        Self::slot_of(id)
            .and_then(|s| self.live(s))
            .map(|l| l.splids.clone())
            .unwrap_or_default()
    }

    fn predict(&self, last_hzs: &[char], max: usize) -> Vec<NPredictItem> {
        let his: String = last_hzs.iter().collect();
        let mut out = Vec::new();
        for l in self.lemmas.iter().filter(|l| !l.removed) {
            if out.len() >= max {
                break;
            }
            if l.hanzi.len() > his.len() && l.hanzi.starts_with(&his) {
                out.push(NPredictItem {
                    psb: self.score(l.count),
                    pre_hzs: l.hanzi[his.len()..].to_string(),
                    his_len: last_hzs.len() as u16,
                });
            }
        }
        out
    }

    fn put_lemma(&mut self, lemma: &str, splids: &[SplId], count: u32) -> LemmaId {
        let len = lemma.chars().count();
        if len == 0 || len > MAX_LEMMA_SIZE || len != splids.len() {
            return 0;
        }
        if !splids.iter().all(|&s| self.spl_trie.is_full_id(s)) {
            return 0;
        }

        let key = (lemma.to_string(), splids.to_vec());
        let slot = match self.index.get(&key) {
            Some(&slot) => {
                let l = &mut self.lemmas[slot as usize];
                if l.removed {
                    l.removed = false;
                    l.count = count;
                } else {
                    l.count = l.count.saturating_add(count);
                }
                self.total_count += count as u64;
                slot
            }
            None => {
                if USER_DICT_ID_START as u64 + self.lemmas.len() as u64 > USER_DICT_ID_END as u64 {
                    warn!("user dictionary is full");
                    return 0;
                }
                let slot = self.lemmas.len() as u32;
                self.insert_loaded(lemma, splids.to_vec(), count);
                slot
            }
        };
        self.persist(&self.lemmas[slot as usize]);
        USER_DICT_ID_START + slot
    }

    fn update_lemma(&mut self, id: LemmaId, delta: i32, selected: bool) -> LemmaId {
        let Some(slot) = Self::slot_of(id).filter(|&s| self.live(s).is_some()) else {
            return 0;
        };
        let l = &mut self.lemmas[slot];
        let old = l.count;
        l.count = if selected {
            (old as i64 + delta as i64).clamp(0, u32::MAX as i64) as u32
        } else {
            delta.max(0) as u32
        };
        self.total_count = self.total_count - old as u64 + l.count as u64;
        self.persist(&self.lemmas[slot]);
        id
    }

    fn remove_lemma(&mut self, id: LemmaId) -> bool {
        let Some(slot) = Self::slot_of(id).filter(|&s| self.live(s).is_some()) else {
            return false;
        };
        let l = &mut self.lemmas[slot];
        l.removed = true;
        self.total_count -= l.count as u64;
        self.persist(&self.lemmas[slot]);
        true
    }

    fn get_total_lemma_count(&self) -> u64 {
        self.total_count
    }

    fn set_total_lemma_count_of_others(&mut self, count: u64) {
        self.total_other = count;
    }

    fn flush_cache(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

/// Redb table of user lemma counts.
pub struct RedbUserStore {
    db: redb::Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbUserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbUserStore").field("path", &self.path).finish()
    }
}

impl RedbUserStore {
    const TABLE_DEF: redb::TableDefinition<'static, &'static str, u64> =
        redb::TableDefinition::new("user_lemmas");

    /// Create or open a redb database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, redb::Error> {
        if let Some(parent) = path.as_ref().parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let db = redb::Database::create(path.as_ref())?;
        // Make sure the table exists so that read transactions can open it.
        let write_txn = db.begin_write()?;
        write_txn.open_table(Self::TABLE_DEF)?;
        write_txn.commit()?;
        Ok(Self {
            db,
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn put(&self, key: &str, count: u64) -> Result<(), redb::Error> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(Self::TABLE_DEF)?;
            table.insert(key, &count)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), redb::Error> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(Self::TABLE_DEF)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn iter_all(&self) -> Result<Vec<(String, u64)>, redb::Error> {
        let mut out = Vec::new();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::TABLE_DEF)?;
        for item in table.iter()? {
            let (k, v) = item?;
            out.push((k.value().to_string(), v.value()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie() -> Arc<SpellingTrie> {
        Arc::new(SpellingTrie::with_default_spellings())
    }

    fn ids(t: &SpellingTrie, pys: &[&str]) -> Vec<SplId> {
        pys.iter().map(|p| t.full_id_of(&format_spelling_str(p)).unwrap()).collect()
    }

    #[test]
    fn put_update_remove() {
        let t = trie();
        let mut d = UserDict::new_in_memory(t.clone());
        let bj = ids(&t, &["bei", "jing"]);
        let id = d.put_lemma("北京", &bj, 1);
        assert_eq!(id, USER_DICT_ID_START);
        assert_eq!(d.put_lemma("北京", &bj, 2), id);
        assert_eq!(d.get_lemma_count(id), 3);
        assert_eq!(d.get_total_lemma_count(), 3);

        assert_eq!(d.update_lemma(id, 1, true), id);
        assert_eq!(d.get_lemma_count(id), 4);
        d.update_lemma(id, 2, false);
        assert_eq!(d.get_lemma_count(id), 2);

        assert!(d.remove_lemma(id));
        assert_eq!(d.number_of_lemmas(), 0);
        assert_eq!(d.get_lemma_str(id), "");
        assert_eq!(d.get_total_lemma_count(), 0);
    }

    #[test]
    fn rejects_bad_lemmas() {
        let t = trie();
        let mut d = UserDict::new_in_memory(t.clone());
        assert_eq!(d.put_lemma("北京", &ids(&t, &["bei"]), 1), 0);
        let half = t.full_to_half(ids(&t, &["bei"])[0]);
        assert_eq!(d.put_lemma("北", &[half], 1), 0);
    }

    #[test]
    fn extend_and_lpis() {
        let t = trie();
        let mut d = UserDict::new_in_memory(t.clone());
        let bj = ids(&t, &["bei", "jing"]);
        d.put_lemma("北京", &bj, 5);
        d.put_lemma("背景", &bj, 1);

        let para1 = DictExtPara { splids: vec![bj[0]], step_no: 1, splid_end_split: false, id_start: bj[0], id_num: 1 };
        let e1 = d.extend_dict(0, &para1);
        assert!(e1.items.is_empty());
        assert_ne!(e1.handle, 0);

        let (j_start, j_num) = t.id_range(t.full_to_half(bj[1]));
        let para2 = DictExtPara { splids: bj.clone(), step_no: 2, splid_end_split: false, id_start: j_start, id_num: j_num };
        let e2 = d.extend_dict(e1.handle, &para2);
        assert_eq!(e2.items.len(), 2);
        // Higher count scores lower.
        let bjing = e2.items.iter().find(|i| d.get_lemma_str(i.id) == "北京").unwrap();
        let bjing2 = e2.items.iter().find(|i| d.get_lemma_str(i.id) == "背景").unwrap();
        assert!(bjing.psb < bjing2.psb);

        let b = t.full_to_half(bj[0]);
        let j = t.full_to_half(bj[1]);
        assert_eq!(d.get_lpis(&[b, j], 10).len(), 2);
        assert_eq!(d.get_lpis(&[b], 10).len(), 0);

        let pre = d.predict(&['北'], 10);
        assert_eq!(pre.len(), 1);
        assert_eq!(pre[0].pre_hzs, "京");
    }

    #[test]
    fn redb_persists_entries() {
        let t = trie();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.redb");
        let bj = ids(&t, &["bei", "jing"]);
        {
            let mut d = UserDict::open_redb(&path, t.clone()).unwrap();
            assert!(d.is_persistent());
            d.put_lemma("北京", &bj, 3);
            let gone = d.put_lemma("背景", &bj, 1);
            d.remove_lemma(gone);
        }
        let d = UserDict::open_redb(&path, t.clone()).unwrap();
        assert_eq!(d.number_of_lemmas(), 1);
        let id = d.get_lemma_id("北京", &bj);
        assert_ne!(id, 0);
        assert_eq!(d.get_lemma_count(id), 3);
    }
}
