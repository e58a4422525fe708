//! The composing phrase: fixed lemmas merged back into one editable unit.
//!
//! When the user deletes inside text that was already chosen, the fixed
//! lemmas are merged into a `ComposingPhrase`. `ComposingDict` exposes the
//! phrase to the decoder as a one-lemma dictionary with id
//! `LEMMA_ID_COMPOSING`, so the remaining part can still be matched as a
//! whole.
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use crate::atom_dict::{AtomDict, Extension};
use crate::dict_def::{
    DictExtPara, LemmaId, LmaPsbItem, MileStoneHandle, NPredictItem, SplId, LEMMA_ID_COMPOSING,
};
use crate::spelling_trie::SpellingTrie;

/// Hanzi with one spelling id each, plus the boundaries of the lemmas it was
/// merged from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposingPhrase {
    pub hanzi: Vec<char>,
    pub splids: Vec<SplId>,
    /// Input position of each spelling, plus the end of the last one.
    pub spl_start: Vec<u16>,
    /// Hanzi index where each sub-lemma starts, plus the total length.
    pub sublma_start: Vec<usize>,
}

impl ComposingPhrase {
    pub fn len(&self) -> usize {
        self.hanzi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hanzi.is_empty()
    }

    pub fn text(&self) -> String {
        self.hanzi.iter().collect()
    }

    /// Append a lemma. `spl_start` holds its spelling positions and its end.
    pub fn push_lemma(&mut self, hanzi: &str, splids: &[SplId], spl_start: &[u16]) {
        if self.sublma_start.is_empty() {
            self.sublma_start.push(0);
        }
        self.spl_start.pop();
        self.hanzi.extend(hanzi.chars());
        self.splids.extend_from_slice(splids);
        self.spl_start.extend_from_slice(spl_start);
        self.sublma_start.push(self.hanzi.len());
    }

    /// Remove spelling `pos` and its hanzi; later spellings move left by the
    /// removed input length.
    pub fn remove_spelling(&mut self, pos: usize) {
        if pos >= self.splids.len() {
            return;
        }
        let width = self.spl_start[pos + 1] - self.spl_start[pos];
        self.hanzi.remove(pos);
        self.splids.remove(pos);
        self.spl_start.remove(pos + 1);
        for s in self.spl_start.iter_mut().skip(pos + 1) {
            *s -= width;
        }
        for b in self.sublma_start.iter_mut() {
            if *b > pos {
                *b -= 1;
            }
        }
        self.sublma_start.dedup();
        if self.hanzi.is_empty() {
            self.clear();
        }
    }

    /// Keep only the first `n` spellings.
    pub fn truncate(&mut self, n: usize) {
        if n >= self.splids.len() {
            return;
        }
        if n == 0 {
            self.clear();
            return;
        }
        self.hanzi.truncate(n);
        self.splids.truncate(n);
        self.spl_start.truncate(n + 1);
        self.sublma_start.retain(|&b| b < n);
        self.sublma_start.push(n);
    }

    /// Index of the spelling covering input position `ch`.
    pub fn spelling_at(&self, ch: u16) -> Option<usize> {
        (0..self.splids.len()).find(|&i| self.spl_start[i] <= ch && ch < self.spl_start[i + 1])
    }

    /// Input position right after the phrase.
    pub fn end(&self) -> u16 {
        self.spl_start.last().copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy)]
struct ComposingMileStone {
    step: u16,
}

/// One-lemma dictionary over the current composing phrase. Matches score 0.
#[derive(Debug, Clone)]
pub struct ComposingDict {
    spl_trie: Arc<SpellingTrie>,
    phrase: Option<ComposingPhrase>,
    mile_stones: Vec<ComposingMileStone>,
}

impl ComposingDict {
    pub fn new(spl_trie: Arc<SpellingTrie>) -> Self {
        Self {
            spl_trie,
            phrase: None,
            mile_stones: Vec::new(),
        }
    }

    pub fn set_phrase(&mut self, phrase: Option<ComposingPhrase>) {
        self.phrase = phrase.filter(|p| !p.is_empty());
        self.mile_stones.clear();
    }

    pub fn phrase(&self) -> Option<&ComposingPhrase> {
        self.phrase.as_ref()
    }

    fn item(&self, len: usize) -> LmaPsbItem {
        LmaPsbItem {
            id: LEMMA_ID_COMPOSING,
            lma_len: len as u16,
            psb: 0.0,
            hanzi: self
                .phrase
                .as_ref()
                .and_then(|p| p.hanzi.first().copied())
                .unwrap_or('\0'),
        }
    }
}

impl AtomDict for ComposingDict {
    fn load_dict(&mut self, _path: &Path) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn number_of_lemmas(&self) -> usize {
        usize::from(self.phrase.is_some())
    }

    fn reset_milestones(&mut self, from_step: u16, _from_handle: MileStoneHandle) {
        let keep = self.mile_stones.partition_point(|m| m.step < from_step);
        self.mile_stones.truncate(keep);
    }

    fn extend_dict(&mut self, from_handle: MileStoneHandle, para: &DictExtPara) -> Extension {
        let Some(phrase) = &self.phrase else {
            return Extension::default();
        };
        let ext_len = para.ext_len();
        if ext_len == 0 || ext_len > phrase.len() || (from_handle == 0) != (ext_len == 1) {
            return Extension::default();
        }
        if from_handle != 0 {
            assert!(
                from_handle as usize <= self.mile_stones.len(),
                "stale milestone handle {}",
                from_handle
            );
        }
        if !para.matches(phrase.splids[ext_len - 1]) {
            return Extension::default();
        }

        if ext_len == phrase.len() {
            return Extension {
                handle: 0,
                items: vec![self.item(ext_len)],
            };
        }
        self.mile_stones.push(ComposingMileStone { step: para.step_no });
        Extension {
            handle: self.mile_stones.len() as MileStoneHandle,
            items: Vec::new(),
        }
    }

    fn get_lpis(&self, splids: &[SplId], _max: usize) -> Vec<LmaPsbItem> {
        match &self.phrase {
            Some(p)
                if p.splids.len() == splids.len()
                    && splids.iter().zip(&p.splids).all(|(&typed, &own)| {
                        let (start, num) = self.spl_trie.id_range(typed);
                        own >= start && own < start + num
                    }) =>
            {
                vec![self.item(splids.len())]
            }
            _ => Vec::new(),
        }
    }

    fn get_lemma_str(&self, id: LemmaId) -> String {
        match &self.phrase {
            Some(p) if id == LEMMA_ID_COMPOSING => p.text(),
            _ => String::new(),
        }
    }

    fn get_lemma_splids(&self, id: LemmaId, _hint: &[SplId]) -> Vec<SplId> {
        match &self.phrase {
            Some(p) if id == LEMMA_ID_COMPOSING => p.splids.clone(),
            _ => Vec::new(),
        }
    }

    fn predict(&self, _last_hzs: &[char], _max: usize) -> Vec<NPredictItem> {
        Vec::new()
    }

    fn put_lemma(&mut self, _lemma: &str, _splids: &[SplId], _count: u32) -> LemmaId {
        0
    }

    fn update_lemma(&mut self, _id: LemmaId, _delta: i32, _selected: bool) -> LemmaId {
        0
    }

    fn remove_lemma(&mut self, _id: LemmaId) -> bool {
        false
    }

    fn get_total_lemma_count(&self) -> u64 {
        0
    }

    fn set_total_lemma_count_of_others(&mut self, _count: u64) {}

    fn flush_cache(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrase() -> ComposingPhrase {
        let mut p = ComposingPhrase::default();
        // "bei'jing" + "shi"
        p.push_lemma("北京", &[40, 50], &[0, 4, 8]);
        p.push_lemma("市", &[60], &[8, 11]);
        p
    }

    #[test]
    fn merge_keeps_boundaries() {
        let p = phrase();
        assert_eq!(p.text(), "北京市");
        assert_eq!(p.spl_start, vec![0, 4, 8, 11]);
        assert_eq!(p.sublma_start, vec![0, 2, 3]);
        assert_eq!(p.spelling_at(5), Some(1));
        assert_eq!(p.end(), 11);
    }

    #[test]
    fn remove_and_truncate() {
        let mut p = phrase();
        p.remove_spelling(1);
        assert_eq!(p.text(), "北市");
        assert_eq!(p.spl_start, vec![0, 4, 7]);
        assert_eq!(p.sublma_start, vec![0, 1, 2]);

        let mut p = phrase();
        p.truncate(1);
        assert_eq!(p.text(), "北");
        assert_eq!(p.spl_start, vec![0, 4]);
        assert_eq!(p.sublma_start, vec![0, 1]);
    }

    #[test]
    fn dict_matches_whole_phrase_only() {
        let mut d = ComposingDict::new(Arc::new(SpellingTrie::with_default_spellings()));
        d.set_phrase(Some(phrase()));
        let p1 = DictExtPara { splids: vec![40], step_no: 3, splid_end_split: false, id_start: 40, id_num: 1 };
        let e1 = d.extend_dict(0, &p1);
        assert!(e1.items.is_empty());
        let p2 = DictExtPara { splids: vec![40, 50], step_no: 7, splid_end_split: false, id_start: 50, id_num: 1 };
        let e2 = d.extend_dict(e1.handle, &p2);
        let p3 = DictExtPara { splids: vec![40, 50, 60], step_no: 10, splid_end_split: false, id_start: 60, id_num: 1 };
        let e3 = d.extend_dict(e2.handle, &p3);
        assert_eq!(e3.items.len(), 1);
        assert_eq!(e3.items[0].id, LEMMA_ID_COMPOSING);
        assert_eq!(d.get_lemma_str(LEMMA_ID_COMPOSING), "北京市");
        assert_eq!(d.get_lpis(&[40, 50, 60], 10).len(), 1);
        assert!(d.get_lpis(&[40, 50], 10).is_empty());
    }
}
