//! Hanzi list of the system dictionary, addressed by lemma id.
//!
//! Lemma strings are stored grouped by length and sorted within each group,
//! so the id of a lemma is `start_id[len - 1] + index_in_group`. A `fst::Map`
//! gives the reverse mapping (string → smallest id carrying it).
use fst::{Map, MapBuilder};
use serde::{Deserialize, Serialize};

use crate::dict_def::{LemmaId, NPredictItem, SplId, MAX_LEMMA_SIZE, MAX_PREDICT_SIZE};
use crate::ngram::NGram;
use crate::spelling_trie::SpellingTrie;

/// One hanzi with one of its readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SingleCharItem {
    pub freq: f32,
    pub hz: char,
    pub half_splid: SplId,
    pub full_splid: SplId,
}

impl SingleCharItem {
    /// Entry 0 of the list; id 0 is invalid.
    pub fn blank() -> Self {
        Self {
            freq: 0.0,
            hz: '\0',
            half_splid: 0,
            full_splid: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictList {
    scis: Vec<SingleCharItem>,
    buf: Vec<char>,
    /// `start_pos[i]`: offset in `buf` of the first word of length `i + 1`.
    start_pos: Vec<u32>,
    /// `start_id[i]`: id of the first word of length `i + 1`.
    start_id: Vec<u32>,
    #[serde(skip)]
    index: Option<Map<Vec<u8>>>,
}

impl DictList {
    /// Build the list from single-char items and lemma strings ordered by
    /// (length, string); the lemma at position `k` gets id `k + 1`.
    pub fn init_list(scis: Vec<SingleCharItem>, lemmas: &[String]) -> Result<Self, String> {
        if lemmas.is_empty() {
            return Err("empty lemma list".to_string());
        }

        let mut counts = [0u32; MAX_LEMMA_SIZE];
        let mut prev: Option<(usize, &str)> = None;
        for lemma in lemmas {
            let len = lemma.chars().count();
            if len == 0 || len > MAX_LEMMA_SIZE {
                return Err(format!("invalid lemma length: {:?}", lemma));
            }
            if let Some(p) = prev {
                if (len, lemma.as_str()) < p {
                    return Err(format!("lemmas not sorted at {:?}", lemma));
                }
            }
            prev = Some((len, lemma.as_str()));
            counts[len - 1] += 1;
        }

        let mut start_pos = vec![0u32; MAX_LEMMA_SIZE + 1];
        let mut start_id = vec![1u32; MAX_LEMMA_SIZE + 1];
        for i in 0..MAX_LEMMA_SIZE {
            start_pos[i + 1] = start_pos[i] + counts[i] * (i as u32 + 1);
            start_id[i + 1] = start_id[i] + counts[i];
        }

        let mut list = Self {
            scis,
            buf: lemmas.iter().flat_map(|l| l.chars()).collect(),
            start_pos,
            start_id,
            index: None,
        };
        list.build_index()?;
        Ok(list)
    }

    /// Rebuild the string → id index. Needed after deserialization.
    pub fn build_index(&mut self) -> Result<(), String> {
        if self.start_id.len() <= MAX_LEMMA_SIZE || self.start_pos.len() <= MAX_LEMMA_SIZE {
            return Err("dict list is not initialized".to_string());
        }
        let mut keys: Vec<(String, u64)> = (self.start_id[0]..self.start_id[MAX_LEMMA_SIZE])
            .map(|id| (self.get_lemma_str(id), id as u64))
            .collect();
        keys.sort();
        keys.dedup_by(|later, kept| later.0 == kept.0);

        let mut builder = MapBuilder::memory();
        for (k, v) in keys {
            builder.insert(k, v).map_err(|e| e.to_string())?;
        }
        let bytes = builder.into_inner().map_err(|e| e.to_string())?;
        self.index = Some(Map::new(bytes).map_err(|e| e.to_string())?);
        Ok(())
    }

    pub fn lemma_count(&self) -> usize {
        (self.start_id[MAX_LEMMA_SIZE] - self.start_id[0]) as usize
    }

    /// One past the largest lemma id.
    pub fn next_id(&self) -> LemmaId {
        self.start_id.get(MAX_LEMMA_SIZE).copied().unwrap_or(1)
    }

    pub fn scis(&self) -> &[SingleCharItem] {
        &self.scis
    }

    /// Hanzi string of a lemma, empty if the id is not in the list.
    pub fn get_lemma_str(&self, id: LemmaId) -> String {
        if self.start_id.is_empty() {
            return String::new();
        }
        for i in 0..MAX_LEMMA_SIZE {
            if self.start_id[i] <= id && id < self.start_id[i + 1] {
                let len = i + 1;
                let pos = (self.start_pos[i] + (id - self.start_id[i]) * len as u32) as usize;
                return self.buf[pos..pos + len].iter().collect();
            }
        }
        String::new()
    }

    /// Smallest id whose string is `s`, 0 if none.
    pub fn get_lemma_id(&self, s: &str) -> LemmaId {
        self.index
            .as_ref()
            .and_then(|m| m.get(s))
            .map(|v| v as LemmaId)
            .unwrap_or(0)
    }

    /// Word `k` of the length-`len` group.
    fn word(&self, len: usize, k: usize) -> &[char] {
        let pos = self.start_pos[len - 1] as usize + k * len;
        &self.buf[pos..pos + len]
    }

    fn group_size(&self, len: usize) -> usize {
        ((self.start_pos[len] - self.start_pos[len - 1]) as usize) / len
    }

    /// Words that extend `last_hzs`, scored by unigram psb.
    ///
    /// Each item carries only the predicted tail; at most `max_num` items
    /// are returned.
    pub fn predict(&self, last_hzs: &[char], ngram: &NGram, max_num: usize) -> Vec<NPredictItem> {
        let hzs_len = last_hzs.len();
        let mut items = Vec::new();
        if hzs_len == 0 || hzs_len > MAX_PREDICT_SIZE || self.start_pos.is_empty() {
            return items;
        }

        for pre_len in 1..=(MAX_PREDICT_SIZE + 1 - hzs_len) {
            let word_len = hzs_len + pre_len;
            if word_len > MAX_LEMMA_SIZE {
                break;
            }
            let n = self.group_size(word_len);
            let first = partition(n, |k| &self.word(word_len, k)[..hzs_len] < last_hzs);
            for k in first..n {
                if items.len() >= max_num {
                    return items;
                }
                let w = self.word(word_len, k);
                if &w[..hzs_len] != last_hzs {
                    break;
                }
                let id = self.start_id[word_len - 1] + k as u32;
                items.push(NPredictItem {
                    psb: ngram.get_uni_psb(id),
                    pre_hzs: w[hzs_len..].iter().collect(),
                    his_len: hzs_len as u16,
                });
            }
        }
        items
    }

    /// Full spelling ids the hanzi can be read as. A non-zero `half_splid`
    /// restricts the result to readings under that half id, falling back to
    /// merely compatible ones (`C` for `Ch..`) when no reading matches exactly.
    pub fn get_splids_for_hanzi(&self, hz: char, half_splid: SplId, trie: &SpellingTrie) -> Vec<SplId> {
        let start = self.scis.partition_point(|s| s.hz < hz);
        let end = self.scis.partition_point(|s| s.hz <= hz);
        let items = &self.scis[start..end];

        let strict = half_splid == 0 || items.iter().any(|s| s.half_splid == half_splid);
        items
            .iter()
            .filter(|s| {
                half_splid == 0
                    || (strict && s.half_splid == half_splid)
                    || (!strict && trie.half_full_compatible(half_splid, s.full_splid))
            })
            .map(|s| s.full_splid)
            .collect()
    }
}

/// First index in `0..n` for which `pred` is false; `pred` must be monotone.
fn partition<F: Fn(usize) -> bool>(n: usize, pred: F) -> usize {
    let (mut lo, mut hi) = (0usize, n);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DictList {
        let mut lemmas: Vec<String> = ["北", "京", "北京", "北方", "北京市", "北京人"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        lemmas.sort_by(|a, b| (a.chars().count(), a).cmp(&(b.chars().count(), b)));
        DictList::init_list(vec![SingleCharItem::blank()], &lemmas).unwrap()
    }

    #[test]
    fn ids_round_trip() {
        let list = sample();
        assert_eq!(list.lemma_count(), 6);
        for id in 1..=6 {
            let s = list.get_lemma_str(id);
            assert_eq!(list.get_lemma_id(&s), id);
        }
        assert_eq!(list.get_lemma_id("南京"), 0);
        assert_eq!(list.get_lemma_str(99), "");
    }

    #[test]
    fn predict_extends_history() {
        let list = sample();
        let ids: Vec<(LemmaId, f64)> = (1..=6).map(|i| (i, 10.0)).collect();
        let ngram = NGram::build_unigram(&ids, 7);
        let items = list.predict(&['北'], &ngram, 10);
        let tails: Vec<&str> = items.iter().map(|i| i.pre_hzs.as_str()).collect();
        assert_eq!(tails, vec!["京", "方", "京人", "京市"]);
        assert!(items.iter().all(|i| i.his_len == 1));

        let items = list.predict(&['北', '京'], &ngram, 10);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn unsorted_lemmas_rejected() {
        let lemmas = vec!["北京".to_string(), "北".to_string()];
        assert!(DictList::init_list(Vec::new(), &lemmas).is_err());
    }

    #[test]
    fn splids_for_hanzi() {
        let trie = SpellingTrie::with_default_spellings();
        let chang = trie.full_id_of("ChANG").unwrap();
        let zhang = trie.full_id_of("ZhANG").unwrap();
        let mut scis = vec![
            SingleCharItem::blank(),
            SingleCharItem { freq: 1.0, hz: '长', half_splid: trie.full_to_half(chang), full_splid: chang },
            SingleCharItem { freq: 1.0, hz: '长', half_splid: trie.full_to_half(zhang), full_splid: zhang },
        ];
        scis.sort_by(|a, b| a.hz.cmp(&b.hz).then(a.half_splid.cmp(&b.half_splid)));
        let list = DictList::init_list(scis, &["长".to_string()]).unwrap();

        assert_eq!(list.get_splids_for_hanzi('长', 0, &trie).len(), 2);
        assert_eq!(list.get_splids_for_hanzi('长', trie.full_to_half(zhang), &trie), vec![zhang]);
        // `C` is only compatible with the `Ch` reading.
        let c = trie.full_to_half(trie.full_id_of("CA").unwrap());
        assert_eq!(list.get_splids_for_hanzi('长', c, &trie), vec![chang]);
    }
}
