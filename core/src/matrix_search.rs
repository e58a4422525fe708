//! Incremental Viterbi decoder over the spelling matrix.
//!
//! Row `s` of the matrix holds the search state after `s` input chars:
//! - up to `MAX_NODE_A_ROW` lattice nodes, each the best way found so far to
//!   end a lemma at `s`, sorted by score
//! - dictionary match infos (DMIs): spelling-id chains ending at `s` with the
//!   milestone handles needed to extend them in every dictionary
//!
//! Nodes and DMIs live in two shared pools and every row owns a contiguous
//! range of both, so cutting the matrix back to a row is a pool truncation.
//! Row 0 holds the root node. A fixed (chosen) lemma ending at `b` replaces
//! row `b` with a single node and no DMIs; no spelling may start before the
//! last fixed boundary.
use ahash::AHashSet;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::atom_dict::AtomDict;
use crate::candidate::{Candidate, CandidateKind};
use crate::composing::{ComposingDict, ComposingPhrase};
use crate::dict_def::{
    remove_duplicate_npre, DictExtPara, LemmaId, LemmaSource, MileStoneHandle, NPredictItem,
    SplId, LEMMA_ID_COMPOSING, MAX_LEMMA_SIZE, MAX_PINYIN_SIZE, MAX_PREDICT_NUM_BY2,
    MAX_PREDICT_NUM_BY3, MAX_PREDICT_NUM_BY_GT3, MAX_PREDICT_SIZE, MAX_SEARCH_STEPS,
    SYS_DICT_TOTAL_FREQ,
};
use crate::dict_trie::DictTrie;
use crate::spelling_parser::SpellingParser;
use crate::spelling_trie::SpellingTrie;
use crate::userdict::UserDict;
use crate::Config;

pub const MAX_ROW_NUM: usize = MAX_SEARCH_STEPS;
pub const MAX_LMA_PSB_ITEMS: usize = 1450;
pub const MAX_NODE_A_ROW: usize = 5;
pub const MAX_SENTENCE_LENGTH: usize = 16;
pub const MTRX_ND_POOL_SIZE: usize = 200;
pub const DMI_POOL_SIZE: usize = 800;
pub const MAX_PRE_ITEMS: usize = 800;
pub const MAX_SPL_IDS_PER_SEARCH: usize = 9;

const DICT_SYS: usize = 0;
const DICT_USER: usize = 1;
const DICT_COMPOSING: usize = 2;
const DICT_NUM: usize = 3;

#[derive(Debug, Clone, Copy)]
struct MatrixNode {
    id: LemmaId,
    score: f32,
    from: Option<usize>,
    /// Last DMI of the lemma; `None` for the root and fixed nodes.
    dmi_fr: Option<usize>,
    step: u16,
}

#[derive(Debug, Clone, Copy)]
struct DictMatchInfo {
    handles: [MileStoneHandle; DICT_NUM],
    dmi_fr: Option<usize>,
    spl_id: SplId,
    /// Number of spelling ids in the chain.
    dict_level: u8,
    spl_start: u16,
    lemma_start: u16,
    all_full_id: bool,
}

#[derive(Debug, Clone, Copy)]
struct MatrixRow {
    node_start: usize,
    node_end: usize,
    dmi_start: usize,
    dmi_end: usize,
}

impl MatrixRow {
    fn has_nodes(&self) -> bool {
        self.node_end > self.node_start
    }

    fn is_empty(&self) -> bool {
        !self.has_nodes() && self.dmi_end == self.dmi_start
    }
}

#[derive(Debug, Clone)]
struct FixedLemma {
    id: LemmaId,
    text: String,
    splids: Vec<SplId>,
    /// Input position of each spelling, plus the lemma end.
    spl_start: Vec<u16>,
    psb: f32,
}

impl FixedLemma {
    fn end(&self) -> usize {
        self.spl_start.last().copied().unwrap_or(0) as usize
    }
}

#[derive(Debug)]
struct Dicts {
    sys: DictTrie,
    user: Option<UserDict>,
    composing: ComposingDict,
}

impl Dicts {
    fn get(&self, i: usize) -> Option<&dyn AtomDict> {
        match i {
            DICT_SYS => Some(&self.sys as &dyn AtomDict),
            DICT_USER => self.user.as_ref().map(|u| u as &dyn AtomDict),
            _ => Some(&self.composing as &dyn AtomDict),
        }
    }

    fn get_mut(&mut self, i: usize) -> Option<&mut dyn AtomDict> {
        match i {
            DICT_SYS => Some(&mut self.sys as &mut dyn AtomDict),
            DICT_USER => self.user.as_mut().map(|u| u as &mut dyn AtomDict),
            _ => Some(&mut self.composing as &mut dyn AtomDict),
        }
    }

    fn of_lemma(&self, id: LemmaId) -> Option<&dyn AtomDict> {
        match LemmaSource::of(id) {
            LemmaSource::System => self.get(DICT_SYS),
            LemmaSource::User => self.get(DICT_USER),
            LemmaSource::Composing => self.get(DICT_COMPOSING),
            LemmaSource::Unknown => None,
        }
    }

    fn reset_milestones(&mut self, from_step: u16) {
        for i in 0..DICT_NUM {
            if let Some(d) = self.get_mut(i) {
                d.reset_milestones(from_step, 0);
            }
        }
    }

    fn lemma_str(&self, id: LemmaId) -> String {
        self.of_lemma(id).map(|d| d.get_lemma_str(id)).unwrap_or_default()
    }
}

/// One decoding session.
///
/// Calls must be sequential. Several sessions can share one system
/// dictionary through [`DictTrie::share`].
#[derive(Debug)]
pub struct MatrixSearch {
    config: Config,
    spl_trie: Arc<SpellingTrie>,
    parser: SpellingParser,
    dicts: Dicts,
    pys: String,
    pys_decoded_len: usize,
    rows: Vec<MatrixRow>,
    nodes: Vec<MatrixNode>,
    dmis: Vec<DictMatchInfo>,
    fixed: Vec<FixedLemma>,
    spl_ids: Vec<SplId>,
    spl_start: Vec<u16>,
    candidates: Vec<Candidate>,
}

impl MatrixSearch {
    /// Create a session over a system dictionary and an optional user
    /// dictionary. Abbreviation switches from `config` apply to this session
    /// only.
    pub fn new(dict_trie: DictTrie, user_dict: Option<UserDict>, config: Config) -> Self {
        let mut trie = (*dict_trie.spelling_trie()).clone();
        trie.szm_enable_shm(config.szm_enable_shm);
        trie.szm_enable_ym(config.szm_enable_ym);
        let spl_trie = Arc::new(trie);

        let mut dicts = Dicts {
            sys: dict_trie,
            user: user_dict,
            composing: ComposingDict::new(Arc::clone(&spl_trie)),
        };
        if let Some(user) = dicts.user.as_mut() {
            user.set_total_lemma_count_of_others(SYS_DICT_TOTAL_FREQ as u64);
        }

        let mut ms = Self {
            config,
            parser: SpellingParser::new(Arc::clone(&spl_trie)),
            spl_trie,
            dicts,
            pys: String::new(),
            pys_decoded_len: 0,
            rows: Vec::new(),
            nodes: Vec::new(),
            dmis: Vec::new(),
            fixed: Vec::new(),
            spl_ids: Vec::new(),
            spl_start: Vec::new(),
            candidates: Vec::new(),
        };
        ms.reset_search();
        ms
    }

    /// Open a compiled system dictionary. The user dictionary is persisted in
    /// redb when `config` names a path, otherwise kept in memory.
    pub fn open<P: AsRef<Path>>(dict_path: P, config: Config) -> Result<Self, Box<dyn Error>> {
        let dict_trie = DictTrie::open(dict_path)?;
        let user = match config.user_dict_path() {
            Some(path) => UserDict::open_redb(path, dict_trie.spelling_trie())?,
            None => UserDict::new_in_memory(dict_trie.spelling_trie()),
        };
        Ok(Self::new(dict_trie, Some(user), config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Discard all decoding state.
    pub fn reset_search(&mut self) {
        self.pys.clear();
        self.fixed.clear();
        self.dicts.composing.set_phrase(None);
        self.reset_matrix();
        self.spl_ids.clear();
        self.spl_start = vec![0];
        self.candidates.clear();
    }

    /// Flush the user dictionary and reset.
    pub fn close(&mut self) -> Result<(), Box<dyn Error>> {
        if let Some(user) = self.dicts.user.as_mut() {
            user.flush_cache()?;
        }
        self.reset_search();
        Ok(())
    }

    /// Decode `py`, reusing the rows shared with the previous input.
    ///
    /// Returns the number of chars decoded. Decoding stops at the first char
    /// that is neither a letter nor `'`; the rest of the input is kept but not
    /// decoded. Input longer than `MAX_ROW_NUM - 1` is cut.
    pub fn search(&mut self, py: &str) -> usize {
        let py: String = py.chars().take(MAX_ROW_NUM - 1).collect();
        if py.is_empty() {
            self.reset_search();
            return 0;
        }
        self.search_from(py)
    }

    fn search_from(&mut self, py: String) -> usize {
        let mut ch_pos = py
            .bytes()
            .zip(self.pys.bytes())
            .take(self.pys_decoded_len)
            .take_while(|(a, b)| a == b)
            .count();

        if let Some(phrase_end) = self.dicts.composing.phrase().map(|p| p.end() as usize) {
            if !self.phrase_is_fixed() && ch_pos < phrase_end {
                self.fixed.clear();
                self.dicts.composing.set_phrase(None);
                ch_pos = 0;
            }
        }
        if self.fixed_end() > ch_pos {
            while self.fixed_end() > ch_pos {
                self.unfix_last();
            }
            ch_pos = self.fixed_end();
        }

        self.truncate_rows(ch_pos + 1);
        self.pys = py;
        self.readd_chars();
        self.compute_spellings();

        while self.spl_ids.len() > MAX_SPL_IDS_PER_SEARCH && self.pys.len() > self.fixed_end() {
            self.pys.pop();
            let keep = self.pys_decoded_len.min(self.pys.len());
            self.truncate_rows(keep + 1);
            self.pys_decoded_len = keep;
            self.compute_spellings();
        }

        self.prepare_candidates();
        self.pys_decoded_len
    }

    /// Delete input and search again.
    ///
    /// With `is_pos_in_splid`, `pos` is a spelling index and every char of
    /// that spelling is removed; otherwise `pos` is a char index. A spelling
    /// inside the fixed part is removed together with its hanzi, and the
    /// remaining fixed lemmas stay fixed as one composing phrase. A single
    /// char inside the fixed part cannot be deleted. When the deleted char
    /// directly follows the fixed part, `clear_fixed` unlocks the last fixed
    /// lemma (or the last sub-lemma of the composing phrase).
    pub fn del_search(&mut self, pos: usize, is_pos_in_splid: bool, clear_fixed: bool) -> usize {
        if self.pys.is_empty() {
            return 0;
        }
        let (del_start, del_end) = if is_pos_in_splid {
            if pos + 1 >= self.spl_start.len() || pos >= self.spl_ids.len() {
                return self.pys_decoded_len;
            }
            (self.spl_start[pos] as usize, self.spl_start[pos + 1] as usize)
        } else {
            if pos >= self.pys.len() || !self.pys.is_char_boundary(pos) {
                return self.pys_decoded_len;
            }
            let width = self.pys[pos..].chars().next().map_or(1, char::len_utf8);
            (pos, pos + width)
        };
        let mut py = self.pys.clone();
        py.replace_range(del_start..del_end, "");

        if is_pos_in_splid && pos < self.fixed_spl_num() {
            let mut phrase = self.merge_fixed();
            phrase.remove_spelling(pos);
            return self.research_with_phrase(py, phrase, true);
        }

        let fixed_end = self.fixed_end();
        if del_start < fixed_end {
            return self.pys_decoded_len;
        }
        if del_start == fixed_end && clear_fixed && !self.fixed.is_empty() {
            if self.phrase_is_fixed() && self.fixed.len() == 1 {
                if let Some(mut phrase) = self.dicts.composing.phrase().cloned() {
                    let subs = phrase.sublma_start.len();
                    if subs > 2 {
                        phrase.truncate(phrase.sublma_start[subs - 2]);
                        return self.research_with_phrase(py, phrase, true);
                    }
                    return self.research_with_phrase(py, phrase, false);
                }
            }
            self.unfix_last();
        }
        if py.is_empty() {
            self.reset_search();
            return 0;
        }
        self.search_from(py)
    }

    /// Number of candidates after the last search or choice.
    pub fn get_candidate_num(&self) -> usize {
        self.candidates.len()
    }

    pub fn get_candidate(&self, cand_id: usize) -> Option<&Candidate> {
        self.candidates.get(cand_id)
    }

    pub fn get_candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Fix a candidate and decode the rest. Returns the new candidate count.
    ///
    /// Choosing the sentence fixes every lemma of the best path. Choosing a
    /// lemma fixes it over the first unfixed spellings. When everything is
    /// fixed the only candidate left is the full sentence.
    pub fn choose(&mut self, cand_id: usize) -> usize {
        let Some(cand) = self.candidates.get(cand_id).cloned() else {
            return self.candidates.len();
        };
        if self.is_fully_fixed() {
            return self.candidates.len();
        }

        match cand.kind {
            CandidateKind::Raw => return self.candidates.len(),
            CandidateKind::Sentence => {
                let lemmas: Vec<FixedLemma> = self
                    .best_path(self.pys_decoded_len)
                    .into_iter()
                    .map(|n| self.path_lemma(n))
                    .collect();
                for lemma in lemmas {
                    if self.rows.len() < lemma.end() {
                        break;
                    }
                    self.fix_lemma(lemma);
                    self.readd_chars();
                }
            }
            CandidateKind::Lemma { id, spl_len } => {
                let first = self.fixed_spl_num();
                let last = first + spl_len as usize;
                if last > self.spl_ids.len() || last >= self.spl_start.len() {
                    return self.candidates.len();
                }
                let lemma = FixedLemma {
                    id,
                    text: cand.text.clone(),
                    splids: self.spl_ids[first..last].to_vec(),
                    spl_start: self.spl_start[first..=last].to_vec(),
                    psb: cand.score,
                };
                if self.rows.len() < lemma.end() {
                    return self.candidates.len();
                }
                self.fix_lemma(lemma);
                self.readd_chars();
            }
        }

        self.compute_spellings();
        if self.is_fully_fixed() {
            self.learn();
        }
        self.prepare_candidates();
        self.candidates.len()
    }

    /// Number of fixed hanzi.
    pub fn get_fixed_len(&self) -> usize {
        self.fixed.iter().map(|l| l.text.chars().count()).sum()
    }

    /// Input position of each spelling id, plus the end of the parsed input.
    pub fn get_spl_start(&self) -> &[u16] {
        &self.spl_start
    }

    pub fn get_spl_ids(&self) -> &[SplId] {
        &self.spl_ids
    }

    /// The whole input, or only its decoded part.
    pub fn get_pystr(&self, decoded: bool) -> &str {
        if decoded {
            &self.pys[..self.pys_decoded_len.min(self.pys.len())]
        } else {
            &self.pys
        }
    }

    /// Fixed lemma ids followed by the lemmas of the best unfixed sentence.
    pub fn get_lemma_ids(&self) -> Vec<LemmaId> {
        let mut ids: Vec<LemmaId> = self.fixed.iter().map(|l| l.id).collect();
        if self.pys_decoded_len > self.fixed_end() {
            ids.extend(self.best_path(self.pys_decoded_len).iter().map(|&n| self.nodes[n].id));
        }
        ids
    }

    /// Hanzi strings likely to follow `history`, longest matched history
    /// first. Falls back to the dictionary's top lemmas.
    pub fn get_predicts(&self, history: &str) -> Vec<String> {
        let his: Vec<char> = crate::utils::normalize(history).chars().collect();
        let his = &his[his.len().saturating_sub(MAX_PREDICT_SIZE)..];
        let max = self.config.max_predictions;

        let mut all: Vec<NPredictItem> = Vec::new();
        for his_len in (1..=his.len()).rev() {
            let tail = &his[his.len() - his_len..];
            let mut items = self.dicts.sys.predict(tail, MAX_PRE_ITEMS);
            if let Some(user) = &self.dicts.user {
                items.extend(user.predict(tail, MAX_PRE_ITEMS));
            }
            remove_duplicate_npre(&mut items);
            let cap = match his_len {
                1 => MAX_PRE_ITEMS,
                2 => MAX_PREDICT_NUM_BY2,
                3 => MAX_PREDICT_NUM_BY3,
                _ => MAX_PREDICT_NUM_BY_GT3,
            };
            items.truncate(cap);
            all.extend(items);
        }
        remove_duplicate_npre(&mut all);

        if all.len() < max {
            let top = self.dicts.sys.predict_top_lmas(0, &all, max - all.len());
            all.extend(top);
        }
        all.truncate(max);
        all.into_iter().map(|item| item.pre_hzs).collect()
    }

    fn reset_matrix(&mut self) {
        self.rows.clear();
        self.nodes.clear();
        self.dmis.clear();
        self.nodes.push(MatrixNode {
            id: 0,
            score: 0.0,
            from: None,
            dmi_fr: None,
            step: 0,
        });
        self.rows.push(MatrixRow {
            node_start: 0,
            node_end: 1,
            dmi_start: 0,
            dmi_end: 0,
        });
        self.pys_decoded_len = 0;
        self.dicts.reset_milestones(0);
    }

    /// Keep rows `0..keep` (`keep >= 1`).
    fn truncate_rows(&mut self, keep: usize) {
        self.rows.truncate(keep.max(1));
        if let Some(last) = self.rows.last() {
            self.nodes.truncate(last.node_end);
            self.dmis.truncate(last.dmi_end);
        }
        self.dicts.reset_milestones(self.rows.len() as u16);
        self.pys_decoded_len = self.pys_decoded_len.min(self.rows.len() - 1);
    }

    fn fixed_end(&self) -> usize {
        self.fixed.last().map_or(0, FixedLemma::end)
    }

    fn fixed_spl_num(&self) -> usize {
        self.fixed.iter().map(|l| l.splids.len()).sum()
    }

    fn is_fully_fixed(&self) -> bool {
        !self.fixed.is_empty() && self.fixed_spl_num() >= self.spl_ids.len()
    }

    fn phrase_is_fixed(&self) -> bool {
        self.fixed.first().is_some_and(|l| l.id == LEMMA_ID_COMPOSING)
    }

    fn readd_chars(&mut self) {
        while self.rows.len() <= self.pys.len() {
            if !self.add_char() {
                break;
            }
        }
        self.pys_decoded_len = self.rows.len() - 1;
    }

    /// Build the row for input char `rows.len() - 1`. Returns false when the
    /// char is neither a letter nor a splitter, cannot continue any spelling,
    /// or a pool is full.
    fn add_char(&mut self) -> bool {
        let step = self.rows.len();
        if step >= MAX_ROW_NUM || step > self.pys.len() || self.dmis.len() >= DMI_POOL_SIZE {
            return false;
        }
        let ch = self.pys.as_bytes()[step - 1];
        if ch == b'\'' {
            return self.add_splitter_row(step);
        }
        if !SpellingParser::is_valid_to_parse(ch) {
            trace!(step, "input stops at unparseable char");
            return false;
        }

        let node_start = self.nodes.len();
        let dmi_start = self.dmis.len();
        let mut new_nodes = Vec::new();
        let mut in_spelling = false;

        let max_ext = MAX_PINYIN_SIZE.min(step - self.fixed_end());
        for ext_len in 1..=max_ext {
            let start = step - ext_len;
            let sub = &self.pys.as_bytes()[start..step];
            if !sub.iter().all(|&c| SpellingParser::is_valid_to_parse(c)) {
                break;
            }
            let row = self.rows[start];
            if row.is_empty() {
                continue;
            }
            if self.parser.is_spelling_prefix(sub) {
                in_spelling = true;
            }
            let Some((splid, _)) = self.parser.get_splid_by_str(sub) else {
                continue;
            };

            if row.has_nodes() && !self.extend_dmi(None, start, step, splid, &mut new_nodes) {
                return self.abort_row(step, dmi_start);
            }
            for d in row.dmi_start..row.dmi_end {
                if self.dmis[d].dict_level as usize >= MAX_LEMMA_SIZE {
                    continue;
                }
                if !self.extend_dmi(Some(d), start, step, splid, &mut new_nodes) {
                    return self.abort_row(step, dmi_start);
                }
            }
        }

        if self.dmis.len() == dmi_start && new_nodes.is_empty() && !in_spelling {
            trace!(step, "no spelling continues here");
            return false;
        }

        new_nodes.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        new_nodes.truncate(MAX_NODE_A_ROW);
        if self.nodes.len() + new_nodes.len() > MTRX_ND_POOL_SIZE {
            warn!(step, nodes = self.nodes.len(), "matrix node pool exhausted");
            return self.abort_row(step, dmi_start);
        }
        self.nodes.extend(new_nodes);
        self.rows.push(MatrixRow {
            node_start,
            node_end: self.nodes.len(),
            dmi_start,
            dmi_end: self.dmis.len(),
        });
        true
    }

    fn abort_row(&mut self, step: usize, dmi_start: usize) -> bool {
        self.dmis.truncate(dmi_start);
        self.dicts.reset_milestones(step as u16);
        false
    }

    /// A splitter carries the previous row over unchanged.
    fn add_splitter_row(&mut self, step: usize) -> bool {
        let prev = self.rows[step - 1];
        if self.nodes.len() + (prev.node_end - prev.node_start) > MTRX_ND_POOL_SIZE
            || self.dmis.len() + (prev.dmi_end - prev.dmi_start) > DMI_POOL_SIZE
        {
            warn!(step, "matrix pools exhausted at splitter");
            return false;
        }
        let node_start = self.nodes.len();
        let dmi_start = self.dmis.len();
        for i in prev.node_start..prev.node_end {
            let mut node = self.nodes[i];
            node.step = step as u16;
            self.nodes.push(node);
        }
        for d in prev.dmi_start..prev.dmi_end {
            let dmi = self.dmis[d];
            self.dmis.push(dmi);
        }
        self.rows.push(MatrixRow {
            node_start,
            node_end: self.nodes.len(),
            dmi_start,
            dmi_end: self.dmis.len(),
        });
        true
    }

    /// Extend `parent` (or a new lemma starting at `start`) by `splid` in
    /// every dictionary. Returns false only when the DMI pool is full.
    fn extend_dmi(
        &mut self,
        parent: Option<usize>,
        start: usize,
        step: usize,
        splid: SplId,
        new_nodes: &mut Vec<MatrixNode>,
    ) -> bool {
        let (id_start, id_num) = self.spl_trie.id_range(splid);
        if id_num == 0 {
            return true;
        }
        let mut splids = parent.map(|p| self.dmi_splids(p)).unwrap_or_default();
        splids.push(splid);
        let lemma_start = parent.map_or(start, |p| self.dmis[p].lemma_start as usize);
        let para = DictExtPara {
            splids,
            step_no: step as u16,
            splid_end_split: false,
            id_start,
            id_num,
        };

        let mut handles = [0; DICT_NUM];
        let mut items = Vec::new();
        for (i, handle) in handles.iter_mut().enumerate() {
            let from = match parent {
                Some(p) => match self.dmis[p].handles[i] {
                    0 => continue,
                    h => h,
                },
                None if i == DICT_COMPOSING && (start != 0 || !self.fixed.is_empty()) => continue,
                None => 0,
            };
            let Some(dict) = self.dicts.get_mut(i) else {
                continue;
            };
            let ext = dict.extend_dict(from, &para);
            *handle = ext.handle;
            items.extend(ext.items);
        }
        if handles.iter().all(|&h| h == 0) && items.is_empty() {
            return true;
        }

        if self.dmis.len() >= DMI_POOL_SIZE {
            warn!(step, "DMI pool exhausted");
            return false;
        }
        let dmi = self.dmis.len();
        self.dmis.push(DictMatchInfo {
            handles,
            dmi_fr: parent,
            spl_id: splid,
            dict_level: para.ext_len() as u8,
            spl_start: start as u16,
            lemma_start: lemma_start as u16,
            all_full_id: parent.map_or(true, |p| self.dmis[p].all_full_id)
                && self.spl_trie.is_full_id(splid),
        });

        let row = self.rows[lemma_start];
        if row.has_nodes() {
            let base = self.nodes[row.node_start].score;
            new_nodes.extend(items.into_iter().map(|item| MatrixNode {
                id: item.id,
                score: base + item.psb,
                from: Some(row.node_start),
                dmi_fr: Some(dmi),
                step: step as u16,
            }));
        }
        true
    }

    fn dmi_chain(&self, mut dmi: usize) -> Vec<DictMatchInfo> {
        let mut chain = vec![self.dmis[dmi]];
        while let Some(p) = self.dmis[dmi].dmi_fr {
            chain.push(self.dmis[p]);
            dmi = p;
        }
        chain.reverse();
        chain
    }

    fn dmi_splids(&self, dmi: usize) -> Vec<SplId> {
        self.dmi_chain(dmi).iter().map(|d| d.spl_id).collect()
    }

    /// Nodes of the best path ending at `row`, after the fixed part.
    fn best_path(&self, row: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let Some(r) = self.rows.get(row).filter(|r| r.has_nodes()) else {
            return path;
        };
        let mut cur = Some(r.node_start);
        while let Some(n) = cur {
            let node = &self.nodes[n];
            if node.dmi_fr.is_none() {
                break;
            }
            path.push(n);
            cur = node.from;
        }
        path.reverse();
        path
    }

    fn path_lemma(&self, n: usize) -> FixedLemma {
        let node = self.nodes[n];
        let chain = node.dmi_fr.map(|d| self.dmi_chain(d)).unwrap_or_default();
        let mut spl_start: Vec<u16> = chain.iter().map(|d| d.spl_start).collect();
        spl_start.push(node.step);
        let base = node.from.map_or(0.0, |f| self.nodes[f].score);
        let mut splids: Vec<SplId> = chain.iter().map(|d| d.spl_id).collect();
        if !chain.iter().all(|d| d.all_full_id) {
            let full = self.lemma_splids(node.id, &splids);
            if full.len() == splids.len() {
                splids = full;
            }
        }
        FixedLemma {
            id: node.id,
            text: self.dicts.lemma_str(node.id),
            splids,
            spl_start,
            psb: node.score - base,
        }
    }

    fn lemma_splids(&self, id: LemmaId, hint: &[SplId]) -> Vec<SplId> {
        self.dicts
            .of_lemma(id)
            .map(|d| d.get_lemma_splids(id, hint))
            .unwrap_or_default()
    }

    fn compute_spellings(&mut self) {
        self.spl_ids.clear();
        self.spl_start.clear();
        for lemma in &self.fixed {
            self.spl_ids.extend_from_slice(&lemma.splids);
            self.spl_start.extend_from_slice(&lemma.spl_start[..lemma.splids.len()]);
        }

        let fixed_end = self.fixed_end();
        let top = self.pys_decoded_len.min(self.rows.len() - 1);
        let last = (fixed_end..=top)
            .rev()
            .find(|&r| self.rows[r].has_nodes())
            .unwrap_or(fixed_end);
        for n in self.best_path(last) {
            let node = self.nodes[n];
            if let Some(d) = node.dmi_fr {
                for dmi in self.dmi_chain(d) {
                    self.spl_ids.push(dmi.spl_id);
                    self.spl_start.push(dmi.spl_start);
                }
            }
        }

        let tail = &self.pys.as_bytes()[last..self.pys_decoded_len.max(last)];
        let parsed = self.parser.splstr_to_idxs(tail);
        self.spl_ids.extend_from_slice(&parsed.spl_idx);
        self.spl_start
            .extend(parsed.start_pos.iter().take(parsed.len()).map(|&p| p + last as u16));
        self.spl_start.push((last + parsed.parsed_len()) as u16);
    }

    fn prepare_candidates(&mut self) {
        self.candidates.clear();
        let fixed_end = self.fixed_end();
        let fixed_score = self.nodes[self.rows[fixed_end].node_start].score;

        if self.is_fully_fixed() {
            let text: String = self.fixed.iter().map(|l| l.text.as_str()).collect();
            self.candidates
                .push(Candidate::new(text, fixed_score, CandidateKind::Sentence));
            return;
        }

        let mut seen: AHashSet<String> = AHashSet::new();
        let decoded = self.pys_decoded_len;
        if decoded > fixed_end && self.rows[decoded].has_nodes() {
            let text: String = self
                .best_path(decoded)
                .iter()
                .map(|&n| self.dicts.lemma_str(self.nodes[n].id))
                .collect();
            let len = text.chars().count();
            if len > 0 && len <= MAX_SENTENCE_LENGTH {
                let score = self.nodes[self.rows[decoded].node_start].score - fixed_score;
                seen.insert(text.clone());
                self.candidates
                    .push(Candidate::new(text, score, CandidateKind::Sentence));
            }
        }

        let rest = self.spl_ids[self.fixed_spl_num().min(self.spl_ids.len())..].to_vec();
        'lengths: for len in (1..=rest.len().min(MAX_LEMMA_SIZE)).rev() {
            let splids = &rest[..len];
            let mut items = Vec::new();
            for i in 0..DICT_NUM {
                if i == DICT_COMPOSING && !self.fixed.is_empty() {
                    continue;
                }
                if let Some(d) = self.dicts.get(i) {
                    items.extend(d.get_lpis(splids, MAX_LMA_PSB_ITEMS));
                }
            }
            items.sort_by(|a, b| a.psb.partial_cmp(&b.psb).unwrap_or(std::cmp::Ordering::Equal));
            for item in items {
                if self.candidates.len() >= MAX_LMA_PSB_ITEMS {
                    break 'lengths;
                }
                let text = self.dicts.lemma_str(item.id);
                if text.is_empty() || !seen.insert(text.clone()) {
                    continue;
                }
                self.candidates.push(Candidate::new(
                    text,
                    item.psb,
                    CandidateKind::Lemma {
                        id: item.id,
                        spl_len: len as u16,
                    },
                ));
            }
        }

        if self.candidates.is_empty() {
            let raw = &self.pys[fixed_end.min(self.pys.len())..];
            if !raw.is_empty() {
                self.candidates
                    .push(Candidate::new(raw, 0.0, CandidateKind::Raw));
            }
        }
    }

    /// Replace row `lemma.end()` with a single fixed node.
    fn fix_lemma(&mut self, lemma: FixedLemma) {
        let end = lemma.end();
        let prev = self.rows[self.fixed_end()].node_start;
        let score = self.nodes[prev].score + lemma.psb;
        self.truncate_rows(end);
        let node_start = self.nodes.len();
        self.nodes.push(MatrixNode {
            id: lemma.id,
            score,
            from: Some(prev),
            dmi_fr: None,
            step: end as u16,
        });
        self.rows.push(MatrixRow {
            node_start,
            node_end: node_start + 1,
            dmi_start: self.dmis.len(),
            dmi_end: self.dmis.len(),
        });
        self.pys_decoded_len = end;
        debug!(id = lemma.id, end, "lemma fixed");
        self.fixed.push(lemma);
    }

    fn unfix_last(&mut self) {
        if let Some(lemma) = self.fixed.pop() {
            let end = self.fixed_end();
            self.truncate_rows(end + 1);
            if lemma.id == LEMMA_ID_COMPOSING {
                self.dicts.composing.set_phrase(None);
            }
            self.pys_decoded_len = end;
        }
    }

    /// Fixed lemmas merged into one composing phrase.
    fn merge_fixed(&self) -> ComposingPhrase {
        let mut phrase = ComposingPhrase::default();
        for lemma in &self.fixed {
            if lemma.id == LEMMA_ID_COMPOSING {
                if let Some(p) = self.dicts.composing.phrase() {
                    phrase = p.clone();
                    continue;
                }
            }
            phrase.push_lemma(&lemma.text, &lemma.splids, &lemma.spl_start);
        }
        phrase
    }

    /// Decode `py` from scratch with `phrase` as the composing phrase,
    /// either fixed over its span or offered as a candidate.
    fn research_with_phrase(&mut self, py: String, phrase: ComposingPhrase, fix: bool) -> usize {
        self.fixed.clear();
        self.pys = py;
        self.dicts.composing.set_phrase(Some(phrase.clone()));
        self.reset_matrix();

        if fix && !phrase.is_empty() {
            let end = phrase.end() as usize;
            while self.rows.len() < end && self.add_char() {}
            if self.rows.len() >= end {
                self.fix_lemma(FixedLemma {
                    id: LEMMA_ID_COMPOSING,
                    text: phrase.text(),
                    splids: phrase.splids.clone(),
                    spl_start: phrase.spl_start.clone(),
                    psb: 0.0,
                });
            }
        }
        self.readd_chars();
        self.compute_spellings();
        self.prepare_candidates();
        self.pys_decoded_len
    }

    /// Feed a completed sentence back into the user dictionary.
    fn learn(&mut self) {
        if !self.config.learn_user_phrases || self.dicts.user.is_none() {
            return;
        }

        let mut splids = Vec::new();
        let mut all_full = true;
        let mut lemma_num = 0;
        for lemma in &self.fixed {
            let ids = if lemma.splids.iter().all(|&s| self.spl_trie.is_full_id(s)) {
                lemma.splids.clone()
            } else {
                self.lemma_splids(lemma.id, &lemma.splids)
            };
            if ids.len() != lemma.text.chars().count()
                || !ids.iter().all(|&s| self.spl_trie.is_full_id(s))
            {
                all_full = false;
            }
            splids.extend(ids);
            lemma_num += match (lemma.id, self.dicts.composing.phrase()) {
                (LEMMA_ID_COMPOSING, Some(p)) => p.sublma_start.len().saturating_sub(1),
                _ => 1,
            };
        }
        let text: String = self.fixed.iter().map(|l| l.text.as_str()).collect();
        let user_ids: Vec<LemmaId> = self
            .fixed
            .iter()
            .map(|l| l.id)
            .filter(|&id| LemmaSource::of(id) == LemmaSource::User)
            .collect();

        let Some(user) = self.dicts.user.as_mut() else {
            return;
        };
        if lemma_num > 1 && text.chars().count() <= MAX_LEMMA_SIZE && all_full {
            let id = user.put_lemma(&text, &splids, 1);
            debug!(id, text = %text, "sentence learned");
        }
        for id in user_ids {
            user.update_lemma(id, 1, true);
        }
        let total = user.get_total_lemma_count();
        user.set_total_lemma_count_of_others(SYS_DICT_TOTAL_FREQ as u64);
        self.dicts.sys.set_total_lemma_count_of_others(total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict_builder::DictBuilder;

    const RAW: &str = "北 800 0 bei\n\
                       京 500 0 jing\n\
                       背 300 0 bei\n\
                       景 200 0 jing\n\
                       市 400 0 shi\n\
                       是 900 0 shi\n\
                       北京 100 0 bei jing\n\
                       背景 90 0 bei jing\n\
                       北京市 80 0 bei jing shi\n";

    fn searcher_with(raw: &str) -> MatrixSearch {
        let data = DictBuilder::new().build_dict(raw).expect("build");
        let dict = DictTrie::from_data(data).expect("dict");
        let user = UserDict::new_in_memory(dict.spelling_trie());
        MatrixSearch::new(dict, Some(user), Config::default())
    }

    fn texts(ms: &MatrixSearch) -> Vec<String> {
        ms.get_candidates().iter().map(|c| c.text.clone()).collect()
    }

    #[test]
    fn decodes_whole_input() {
        let mut ms = searcher_with(RAW);
        assert_eq!(ms.search("beijing"), 7);
        assert_eq!(ms.get_candidate(0).map(|c| c.text.as_str()), Some("北京"));
        assert!(texts(&ms).contains(&"背景".to_string()));
        assert_eq!(ms.get_spl_start(), &[0, 3, 7]);
        assert_eq!(ms.get_pystr(true), "beijing");
    }

    #[test]
    fn splitter_keeps_decoding() {
        let mut ms = searcher_with(RAW);
        assert_eq!(ms.search("bei'jing"), 8);
        assert_eq!(ms.get_candidate(0).map(|c| c.text.as_str()), Some("北京"));
        assert_eq!(ms.get_spl_start(), &[0, 4, 8]);
    }

    #[test]
    fn unparseable_char_stops_decoding() {
        let mut ms = searcher_with(RAW);
        assert_eq!(ms.search("beiv"), 3);
        assert_eq!(ms.get_pystr(false), "beiv");
        assert_eq!(ms.get_pystr(true), "bei");
    }

    #[test]
    fn choose_lemma_advances_fixed_part() {
        let mut ms = searcher_with(RAW);
        ms.search("beijingshi");
        let pos = ms
            .get_candidates()
            .iter()
            .position(|c| c.text == "北")
            .expect("single char candidate");
        ms.choose(pos);
        assert_eq!(ms.get_fixed_len(), 1);
        assert!(texts(&ms).contains(&"京".to_string()));

        ms.choose(0);
        assert!(ms.get_fixed_len() > 1);
    }

    #[test]
    fn full_choice_is_learned() {
        let mut ms = searcher_with(RAW);
        ms.search("beijingshi");
        let find = |ms: &MatrixSearch, t: &str| ms.get_candidates().iter().position(|c| c.text == t);
        let p = find(&ms, "北京").expect("北京");
        ms.choose(p);
        let p = find(&ms, "是").expect("是");
        assert_eq!(ms.choose(p), 1);
        assert_eq!(ms.get_candidate(0).map(|c| c.text.as_str()), Some("北京是"));
        assert_eq!(ms.get_fixed_len(), 3);

        ms.reset_search();
        ms.search("beijingshi");
        assert!(texts(&ms).contains(&"北京是".to_string()));
    }

    #[test]
    fn delete_char_after_fixed_part() {
        let mut ms = searcher_with(RAW);
        ms.search("beijingshi");
        let p = ms.get_candidates().iter().position(|c| c.text == "北京").expect("北京");
        ms.choose(p);
        assert_eq!(ms.get_fixed_len(), 2);

        // inside the fixed part: locked
        ms.del_search(2, false, false);
        assert_eq!(ms.get_pystr(false), "beijingshi");

        // right after it, unlocking the fixed lemma
        ms.del_search(7, false, true);
        assert_eq!(ms.get_pystr(false), "beijinghi");
        assert_eq!(ms.get_fixed_len(), 0);
    }

    #[test]
    fn delete_fixed_spelling_keeps_composing_phrase() {
        let mut ms = searcher_with(RAW);
        ms.search("beijingshi");
        let p = ms.get_candidates().iter().position(|c| c.text == "北京").expect("北京");
        ms.choose(p);
        ms.del_search(1, true, false);
        assert_eq!(ms.get_pystr(false), "beishi");
        assert_eq!(ms.get_fixed_len(), 1);
        assert_eq!(ms.get_lemma_ids().first(), Some(&LEMMA_ID_COMPOSING));
    }

    #[test]
    fn search_again_inside_fixed_part_unfixes() {
        let mut ms = searcher_with(RAW);
        ms.search("beijingshi");
        ms.choose(0);
        let before = ms.get_fixed_len();
        assert_eq!(before, 3);
        ms.search("bei");
        assert!(ms.get_fixed_len() < before);
        assert_eq!(ms.get_pystr(false), "bei");
        assert_eq!(ms.search("beijing"), 7);
    }

    #[test]
    fn predictions_follow_history() {
        let ms = searcher_with(RAW);
        let predicts = ms.get_predicts("北");
        assert_eq!(predicts.first().map(String::as_str), Some("京"));
        assert!(predicts.contains(&"京市".to_string()));
        assert!(!ms.get_predicts("").is_empty());
        assert_eq!(ms.get_predicts("北\n"), predicts);
    }

    #[test]
    fn deleting_multibyte_char_after_decoded_part() {
        let mut ms = searcher_with(RAW);
        assert_eq!(ms.search("bei中"), 3);
        assert_eq!(ms.del_search(4, false, false), 3);
        assert_eq!(ms.get_pystr(false), "bei中");
        assert_eq!(ms.del_search(3, false, false), 3);
        assert_eq!(ms.get_pystr(false), "bei");
    }

    /// Run the search steps that follow a change of `pys`.
    fn redecode(ms: &mut MatrixSearch, py: &str) {
        ms.pys = py.to_string();
        ms.readd_chars();
        ms.compute_spellings();
        ms.prepare_candidates();
    }

    #[test]
    fn full_dmi_pool_keeps_decoded_prefix() {
        let mut ms = searcher_with(RAW);
        assert_eq!(ms.search("bei"), 3);
        let filler = ms.dmis[ms.dmis.len() - 1];
        ms.dmis.resize(DMI_POOL_SIZE, filler);

        redecode(&mut ms, "beijing");
        assert_eq!(ms.pys_decoded_len, 3);
        assert_eq!(ms.rows.len(), 4);
        assert_eq!(ms.get_pystr(true), "bei");
        assert_eq!(ms.get_candidate(0).map(|c| c.text.as_str()), Some("北"));

        // a new search drops the unused pool entries
        assert_eq!(ms.search("beijing"), 7);
        assert_eq!(ms.get_candidate(0).map(|c| c.text.as_str()), Some("北京"));
    }

    #[test]
    fn full_node_pool_keeps_decoded_prefix() {
        let mut ms = searcher_with(RAW);
        assert_eq!(ms.search("bei"), 3);
        let filler = ms.nodes[ms.nodes.len() - 1];
        ms.nodes.resize(MTRX_ND_POOL_SIZE, filler);
        let dmis = ms.dmis.len();

        redecode(&mut ms, "beijing");
        assert_eq!(ms.pys_decoded_len, 3);
        assert_eq!(ms.dmis.len(), dmis);
        assert_eq!(ms.get_spl_start(), &[0, 3]);
        assert_eq!(ms.get_candidate(0).map(|c| c.text.as_str()), Some("北"));

        assert_eq!(ms.search("beijing"), 7);
        assert!(ms.nodes.len() <= MTRX_ND_POOL_SIZE);
    }
}
