//! The system dictionary: a lemma trie keyed by spelling ids.
//!
//! Node layout:
//! - `root[0]` is the root, `root[1..]` are the level-0 nodes (one per
//!   first spelling id)
//! - every deeper node is an `LmaNodeGE1` in `nodes_ge1`
//!
//! Sons of a node are contiguous and sorted by spelling id. Lemmas ending at
//! a node ("homophones") are a run of 3-byte little-endian ids in
//! `lma_idx_buf`, addressed by `(homo_idx_buf_off, num_of_homo)`. The top
//! lemma ids follow the homophone runs at the end of the buffer.
//!
//! `DictData` is immutable once built and is shared through `Arc`; each
//! `DictTrie` handle keeps its own milestones, so every decoder session gets
//! its own handle via [`DictTrie::share`].
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::atom_dict::{AtomDict, Extension};
use crate::dict_def::{
    DictExtPara, LemmaId, LmaPsbItem, MileStoneHandle, NPredictItem, SplId, LEMMA_ID_SIZE,
    MAX_LEMMA_SIZE,
};
use crate::dict_list::DictList;
use crate::ngram::NGram;
use crate::spelling_trie::{SpellingData, SpellingTrie};

pub const DICT_MAGIC: &[u8; 4] = b"PYDT";
pub const DICT_VERSION: u32 = 1;
pub const MAX_MILESTONE: usize = 100;
pub const MAX_PARSING_MARK: usize = 600;

/// Root and level-0 node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmaNodeLE0 {
    pub son_1st_off: u32,
    pub homo_idx_buf_off: u32,
    pub spl_idx: SplId,
    pub num_of_son: u16,
    pub num_of_homo: u16,
}

/// Node at level 1 or deeper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmaNodeGE1 {
    pub son_1st_off: u32,
    pub homo_idx_buf_off: u32,
    pub spl_idx: SplId,
    pub num_of_son: u16,
    pub num_of_homo: u16,
}

/// Everything a compiled dictionary holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictData {
    pub spelling: SpellingData,
    pub root: Vec<LmaNodeLE0>,
    pub nodes_ge1: Vec<LmaNodeGE1>,
    pub lma_idx_buf: Vec<u8>,
    pub top_lmas_num: u32,
    pub dict_list: DictList,
    pub ngram: NGram,
}

/// Append a lemma id in the 3-byte buffer encoding.
pub fn encode_lemma_id(id: LemmaId, buf: &mut Vec<u8>) {
    for pos in 0..LEMMA_ID_SIZE {
        buf.push(((id >> (pos * 8)) & 0xff) as u8);
    }
}

impl DictData {
    /// Lemma id at slot `pos` of the id buffer.
    pub fn lemma_id_at(&self, pos: usize) -> LemmaId {
        let off = pos * LEMMA_ID_SIZE;
        self.lma_idx_buf[off..off + LEMMA_ID_SIZE]
            .iter()
            .enumerate()
            .fold(0, |id, (i, &b)| id | ((b as LemmaId) << (i * 8)))
    }

    pub fn lemma_id_num(&self) -> usize {
        self.lma_idx_buf.len() / LEMMA_ID_SIZE
    }

    pub fn top_lemma_ids(&self) -> Vec<LemmaId> {
        let total = self.lemma_id_num();
        let start = total.saturating_sub(self.top_lmas_num as usize);
        (start..total).map(|p| self.lemma_id_at(p)).collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Box<dyn Error>> {
        let mut out = Vec::new();
        out.extend_from_slice(DICT_MAGIC);
        out.extend_from_slice(&DICT_VERSION.to_le_bytes());
        bincode::serialize_into(&mut out, self)?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Box<dyn Error>> {
        if bytes.len() < 8 || &bytes[..4] != DICT_MAGIC {
            return Err("not a compiled pinyin dictionary".into());
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version);
        if version != DICT_VERSION {
            return Err(format!("unsupported dictionary version {}", version).into());
        }
        Ok(bincode::deserialize(&bytes[8..])?)
    }

    fn node(&self, r: NodeRef) -> NodeView {
        match r {
            NodeRef::Le0(i) => {
                let n = &self.root[i];
                NodeView {
                    son_1st_off: n.son_1st_off as usize,
                    num_of_son: n.num_of_son as usize,
                    homo_off: n.homo_idx_buf_off as usize,
                    num_of_homo: n.num_of_homo as usize,
                    spl_idx: n.spl_idx,
                }
            }
            NodeRef::Ge1(i) => {
                let n = &self.nodes_ge1[i];
                NodeView {
                    son_1st_off: n.son_1st_off as usize,
                    num_of_son: n.num_of_son as usize,
                    homo_off: n.homo_idx_buf_off as usize,
                    num_of_homo: n.num_of_homo as usize,
                    spl_idx: n.spl_idx,
                }
            }
        }
    }

    /// Sons of `r`; only the root has level-0 (`Le0`) sons.
    fn sons(&self, r: NodeRef) -> impl Iterator<Item = NodeRef> {
        let v = self.node(r);
        let range = v.son_1st_off..v.son_1st_off + v.num_of_son;
        let root = r == NodeRef::Le0(0);
        range.map(move |i| if root { NodeRef::Le0(i) } else { NodeRef::Ge1(i) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeRef {
    Le0(usize),
    Ge1(usize),
}

#[derive(Debug, Clone, Copy)]
struct NodeView {
    son_1st_off: usize,
    num_of_son: usize,
    homo_off: usize,
    num_of_homo: usize,
    spl_idx: SplId,
}

/// A run of nodes matched at one step.
#[derive(Debug, Clone, Copy)]
struct ParsingMark {
    node_offset: u32,
    node_num: u16,
}

#[derive(Debug, Clone, Copy)]
struct MileStone {
    mark_start: u16,
    mark_num: u16,
    step: u16,
}

#[derive(Debug, Clone)]
pub struct DictTrie {
    data: Arc<DictData>,
    spl_trie: Arc<SpellingTrie>,
    parsing_marks: Vec<ParsingMark>,
    mile_stones: Vec<MileStone>,
}

impl DictTrie {
    pub fn from_data(mut data: DictData) -> Result<Self, String> {
        let spl_trie = SpellingTrie::from_data(&data.spelling)?;
        data.dict_list.build_index()?;
        if data.root.is_empty() {
            return Err("dictionary has no root node".to_string());
        }
        Ok(Self {
            data: Arc::new(data),
            spl_trie: Arc::new(spl_trie),
            parsing_marks: Vec::new(),
            mile_stones: Vec::new(),
        })
    }

    /// Read a dictionary written by `save_dict`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
        let data = DictData::from_bytes(&bytes)?;
        Ok(Self::from_data(data)?)
    }

    pub fn save_dict<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let mut w = BufWriter::new(File::create(path)?);
        w.write_all(&self.data.to_bytes()?)?;
        w.flush()?;
        Ok(())
    }

    /// A new handle on the same dictionary data with fresh milestones.
    pub fn share(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            spl_trie: Arc::clone(&self.spl_trie),
            parsing_marks: Vec::new(),
            mile_stones: Vec::new(),
        }
    }

    pub fn data(&self) -> &DictData {
        &self.data
    }

    pub fn spelling_trie(&self) -> Arc<SpellingTrie> {
        Arc::clone(&self.spl_trie)
    }

    pub fn ngram(&self) -> &NGram {
        &self.data.ngram
    }

    /// Smallest lemma id with this hanzi string, 0 if none.
    pub fn get_lemma_id(&self, lemma: &str) -> LemmaId {
        self.data.dict_list.get_lemma_id(lemma)
    }

    fn lpi(&self, id: LemmaId, lma_len: usize) -> LmaPsbItem {
        LmaPsbItem {
            id,
            lma_len: lma_len as u16,
            psb: self.data.ngram.get_uni_psb(id),
            hanzi: self.data.dict_list.get_lemma_str(id).chars().next().unwrap_or('\0'),
        }
    }

    fn push_homophones(&self, node: &NodeView, lma_len: usize, items: &mut Vec<LmaPsbItem>, max: usize) {
        for p in node.homo_off..node.homo_off + node.num_of_homo {
            if items.len() >= max {
                return;
            }
            items.push(self.lpi(self.data.lemma_id_at(p), lma_len));
        }
    }

    /// Parent nodes recorded under a milestone.
    fn milestone_nodes(&self, handle: MileStoneHandle, ext_len: usize) -> Vec<NodeRef> {
        assert!(
            handle as usize <= self.mile_stones.len(),
            "stale milestone handle {}",
            handle
        );
        let ms = self.mile_stones[handle as usize - 1];
        let mut nodes = Vec::new();
        for mark in &self.parsing_marks[ms.mark_start as usize..(ms.mark_start + ms.mark_num) as usize] {
            for i in mark.node_offset as usize..mark.node_offset as usize + mark.node_num as usize {
                nodes.push(if ext_len == 2 { NodeRef::Le0(i) } else { NodeRef::Ge1(i) });
            }
        }
        nodes
    }

    fn record_milestone(&mut self, marks: Vec<ParsingMark>, step: u16) -> MileStoneHandle {
        if self.mile_stones.len() >= MAX_MILESTONE || self.parsing_marks.len() + marks.len() > MAX_PARSING_MARK {
            warn!(
                milestones = self.mile_stones.len(),
                marks = self.parsing_marks.len(),
                "milestone space exhausted"
            );
            return 0;
        }
        let ms = MileStone {
            mark_start: self.parsing_marks.len() as u16,
            mark_num: marks.len() as u16,
            step,
        };
        self.parsing_marks.extend(marks);
        self.mile_stones.push(ms);
        self.mile_stones.len() as MileStoneHandle
    }

    /// Top lemmas as predictions, skipping strings already in `exclude`.
    pub fn predict_top_lmas(&self, his_len: u16, exclude: &[NPredictItem], max: usize) -> Vec<NPredictItem> {
        let mut out: Vec<NPredictItem> = Vec::new();
        for id in self.data.top_lemma_ids() {
            if out.len() >= max {
                break;
            }
            let s = self.data.dict_list.get_lemma_str(id);
            if s.is_empty() || exclude.iter().chain(out.iter()).any(|e| e.pre_hzs == s) {
                continue;
            }
            out.push(NPredictItem {
                psb: self.data.ngram.get_uni_psb(id),
                pre_hzs: s,
                his_len,
            });
        }
        out
    }

    /// Whether the full spelling id string `splids` leads to lemma `id`.
    fn path_has_lemma(&self, splids: &[SplId], id: LemmaId) -> bool {
        self.get_lpis(splids, usize::MAX).iter().any(|i| i.id == id)
    }
}

impl AtomDict for DictTrie {
    fn load_dict(&mut self, path: &Path) -> Result<(), Box<dyn Error>> {
        *self = Self::open(path)?;
        Ok(())
    }

    fn number_of_lemmas(&self) -> usize {
        self.data.dict_list.lemma_count()
    }

    fn reset_milestones(&mut self, from_step: u16, _from_handle: MileStoneHandle) {
        if from_step == 0 {
            self.parsing_marks.clear();
            self.mile_stones.clear();
            return;
        }
        let keep = self.mile_stones.partition_point(|m| m.step < from_step);
        if let Some(first_dropped) = self.mile_stones.get(keep) {
            self.parsing_marks.truncate(first_dropped.mark_start as usize);
        }
        self.mile_stones.truncate(keep);
    }

    fn extend_dict(&mut self, from_handle: MileStoneHandle, para: &DictExtPara) -> Extension {
        let ext_len = para.ext_len();
        if ext_len == 0 || ext_len > MAX_LEMMA_SIZE || (from_handle == 0) != (ext_len == 1) {
            return Extension::default();
        }
        let parents = if from_handle == 0 {
            vec![NodeRef::Le0(0)]
        } else {
            self.milestone_nodes(from_handle, ext_len)
        };

        let mut items = Vec::new();
        let mut marks: Vec<ParsingMark> = Vec::new();
        let id_end = para.id_start + para.id_num;
        for parent in parents {
            for son in self.data.sons(parent) {
                let v = self.data.node(son);
                if v.spl_idx >= id_end {
                    break;
                }
                if !para.matches(v.spl_idx) {
                    continue;
                }
                self.push_homophones(&v, ext_len, &mut items, usize::MAX);
                if v.num_of_son > 0 {
                    let idx = match son {
                        NodeRef::Le0(i) | NodeRef::Ge1(i) => i as u32,
                    };
                    match marks.last_mut() {
                        Some(m) if m.node_offset + m.node_num as u32 == idx => m.node_num += 1,
                        _ => marks.push(ParsingMark { node_offset: idx, node_num: 1 }),
                    }
                }
            }
        }

        let handle = if marks.is_empty() {
            0
        } else {
            self.record_milestone(marks, para.step_no)
        };
        Extension { handle, items }
    }

    fn get_lpis(&self, splids: &[SplId], max: usize) -> Vec<LmaPsbItem> {
        let mut items = Vec::new();
        if splids.is_empty() || splids.len() > MAX_LEMMA_SIZE {
            return items;
        }
        let mut frontier = vec![NodeRef::Le0(0)];
        for (level, &splid) in splids.iter().enumerate() {
            let (start, num) = self.spl_trie.id_range(splid);
            let mut next = Vec::new();
            for &node in &frontier {
                for son in self.data.sons(node) {
                    let spl = self.data.node(son).spl_idx;
                    if spl >= start && spl < start + num {
                        next.push(son);
                    }
                }
            }
            if level + 1 == splids.len() {
                for son in next {
                    self.push_homophones(&self.data.node(son), splids.len(), &mut items, max);
                }
                break;
            }
            frontier = next;
        }
        items
    }

    fn get_lemma_str(&self, id: LemmaId) -> String {
        self.data.dict_list.get_lemma_str(id)
    }

    fn get_lemma_splids(&self, id: LemmaId, hint: &[SplId]) -> Vec<SplId> {
        let hzs: Vec<char> = self.get_lemma_str(id).chars().collect();
        let mut options: Vec<Vec<SplId>> = Vec::with_capacity(hzs.len());
        for (i, &hz) in hzs.iter().enumerate() {
            let h = hint.get(i).copied().unwrap_or(0);
            if self.spl_trie.is_full_id(h) {
                options.push(vec![h]);
                continue;
            }
            let half = if self.spl_trie.is_half_id(h) { h } else { 0 };
            let found = self.data.dict_list.get_splids_for_hanzi(hz, half, &self.spl_trie);
            if found.is_empty() {
                debug!(id, hz = %hz, "no reading for hanzi");
                return Vec::new();
            }
            options.push(found);
        }

        // Pick the reading combination whose trie path holds the lemma.
        let mut pick = vec![0usize; options.len()];
        loop {
            let splids: Vec<SplId> = pick.iter().zip(&options).map(|(&k, o)| o[k]).collect();
            if options.iter().all(|o| o.len() == 1) || self.path_has_lemma(&splids, id) {
                return splids;
            }
            let mut pos = 0;
            while pos < pick.len() {
                pick[pos] += 1;
                if pick[pos] < options[pos].len() {
                    break;
                }
                pick[pos] = 0;
                pos += 1;
            }
            if pos == pick.len() {
                return pick.iter().zip(&options).map(|(_, o)| o[0]).collect();
            }
        }
    }

    fn predict(&self, last_hzs: &[char], max: usize) -> Vec<NPredictItem> {
        self.data.dict_list.predict(last_hzs, &self.data.ngram, max)
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

    fn set_total_lemma_count_of_others(&mut self, count: u64) {
        self.data.ngram.set_total_freq_none_sys(count);
    }

    fn flush_cache(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict_builder::DictBuilder;

    const RAW: &str = "北 800 0 bei\n京 500 0 jing\n背 300 0 bei\n北京 100 0 bei jing\n背景 90 0 bei jing\n北京市 80 0 bei jing shi\n";

    fn trie() -> DictTrie {
        let data = DictBuilder::new().build_dict(RAW).unwrap();
        DictTrie::from_data(data).unwrap()
    }

    fn para(t: &DictTrie, splids: &[SplId], step: u16) -> DictExtPara {
        let (id_start, id_num) = t.spelling_trie().id_range(*splids.last().unwrap());
        DictExtPara { splids: splids.to_vec(), step_no: step, splid_end_split: false, id_start, id_num }
    }

    fn full(t: &DictTrie, s: &str) -> SplId {
        t.spelling_trie().full_id_of(s).unwrap()
    }

    #[test]
    fn lpis_by_full_and_half_ids() {
        let t = trie();
        let bei = full(&t, "BEI");
        let jing = full(&t, "JING");
        let words: Vec<String> = t.get_lpis(&[bei, jing], 10).iter().map(|i| t.get_lemma_str(i.id)).collect();
        assert_eq!(words.len(), 2);
        assert!(words.contains(&"北京".to_string()) && words.contains(&"背景".to_string()));

        let b = t.spelling_trie().full_to_half(bei);
        let j = t.spelling_trie().full_to_half(jing);
        assert_eq!(t.get_lpis(&[b, j], 10).len(), 2);
        assert_eq!(t.get_lpis(&[b], 10).len(), 2);
    }

    #[test]
    fn incremental_extension_matches_lpis() {
        let mut t = trie();
        let bei = full(&t, "BEI");
        let jing = full(&t, "JING");
        let shi = full(&t, "ShI");

        let e1 = t.extend_dict(0, &para(&t, &[bei], 1));
        assert_eq!(e1.items.len(), 2);
        assert_ne!(e1.handle, 0);
        let e2 = t.extend_dict(e1.handle, &para(&t, &[bei, jing], 2));
        assert_eq!(e2.items.len(), 2);
        let e3 = t.extend_dict(e2.handle, &para(&t, &[bei, jing, shi], 3));
        assert_eq!(e3.items.len(), 1);
        assert_eq!(t.get_lemma_str(e3.items[0].id), "北京市");
        assert_eq!(e3.handle, 0);
    }

    #[test]
    fn reset_drops_later_milestones() {
        let mut t = trie();
        let bei = full(&t, "BEI");
        let jing = full(&t, "JING");
        let e1 = t.extend_dict(0, &para(&t, &[bei], 1));
        let e2 = t.extend_dict(e1.handle, &para(&t, &[bei, jing], 2));
        assert_eq!(e2.handle, 2);
        t.reset_milestones(2, 0);
        let again = t.extend_dict(e1.handle, &para(&t, &[bei, jing], 2));
        assert_eq!(again.handle, 2);
        assert_eq!(again.items.len(), e2.items.len());
    }

    #[test]
    #[should_panic]
    fn stale_handle_panics() {
        let mut t = trie();
        let bei = full(&t, "BEI");
        let jing = full(&t, "JING");
        let e1 = t.extend_dict(0, &para(&t, &[bei], 1));
        t.reset_milestones(1, 0);
        t.extend_dict(e1.handle, &para(&t, &[bei, jing], 2));
    }

    #[test]
    fn splids_of_lemma() {
        let t = trie();
        let id = t.get_lemma_id("北京");
        let bei = full(&t, "BEI");
        let jing = full(&t, "JING");
        assert_eq!(t.get_lemma_splids(id, &[]), vec![bei, jing]);
    }

    #[test]
    fn top_lemmas_and_prediction() {
        let t = trie();
        let top = t.predict_top_lmas(0, &[], 3);
        assert_eq!(top[0].pre_hzs, "北");
        let pre = t.predict(&['北'], 10);
        let tails: Vec<&str> = pre.iter().map(|p| p.pre_hzs.as_str()).collect();
        assert_eq!(tails, vec!["京", "京市"]);
    }

    #[test]
    fn save_and_open() {
        let t = trie();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.bin");
        t.save_dict(&path).unwrap();
        let loaded = DictTrie::open(&path).unwrap();
        assert_eq!(loaded.number_of_lemmas(), t.number_of_lemmas());
        assert_eq!(loaded.get_lemma_id("北京市"), t.get_lemma_id("北京市"));
        assert!(DictData::from_bytes(b"XXXX0000").is_err());
    }

    #[test]
    fn milestone_space_recovers_after_reset() {
        let mut t = trie();
        let bei = full(&t, "BEI");
        let jing = full(&t, "JING");
        for step in 1..=MAX_MILESTONE {
            let e = t.extend_dict(0, &para(&t, &[bei], step as u16));
            assert_eq!(e.handle as usize, step);
        }

        // no handle once full, but the lemmas are still found
        let over = t.extend_dict(0, &para(&t, &[bei], MAX_MILESTONE as u16 + 1));
        assert_eq!(over.handle, 0);
        assert_eq!(over.items.len(), 2);

        t.reset_milestones(0, 0);
        let e1 = t.extend_dict(0, &para(&t, &[bei], 1));
        assert_eq!(e1.handle, 1);
        let e2 = t.extend_dict(e1.handle, &para(&t, &[bei, jing], 2));
        assert_eq!(e2.items.len(), 2);
        assert_ne!(e2.handle, 0);
    }
}
