//! Compile a raw word list into `DictData`.
//!
//! Raw line format: `hanzi freq gbk_flag py1 py2 ...`, whitespace separated,
//! one pinyin per hanzi. Malformed lines are dropped with a debug
//! diagnostic; the build only fails when nothing usable remains.
use std::collections::HashSet;
use std::error::Error;
use std::fs;
use std::path::Path;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::dict_def::{LemmaId, SplId, MAX_LEMMA_SIZE, MAX_PINYIN_SIZE, TOP_SCORE_LEMMA_NUM};
use crate::dict_list::{DictList, SingleCharItem};
use crate::dict_trie::{encode_lemma_id, DictData, LmaNodeGE1, LmaNodeLE0};
use crate::ngram::NGram;
use crate::spelling_table::SpellingTable;
use crate::spelling_trie::{format_spelling_str, SpellingTrie};

/// Multi-char lemmas below this frequency are dropped.
const MIN_PHRASE_FREQ: f64 = 60.0;
/// Frequency of a hanzi reading taken from inside a phrase.
const PHRASE_CHAR_FREQ: f32 = 0.000_001;

#[derive(Debug, Clone)]
struct LemmaEntry {
    hanzi: String,
    freq: f64,
    pinyin: Vec<String>,
    splids: Vec<SplId>,
    idx_by_hz: LemmaId,
}

impl LemmaEntry {
    fn len(&self) -> usize {
        self.splids.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DictBuilder {
    valid_hzs: Option<HashSet<char>>,
}

impl DictBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict lemmas to the given hanzi. Without a list, lemmas flagged as
    /// containing non-GBK characters are dropped instead.
    pub fn with_valid_hanzis(mut self, hanzis: &str) -> Self {
        self.valid_hzs = Some(hanzis.nfc().filter(|c| !c.is_whitespace()).collect());
        self
    }

    pub fn build_dict_from_file<P: AsRef<Path>>(&self, path: P) -> Result<DictData, Box<dyn Error>> {
        let raw = fs::read_to_string(path)?;
        Ok(self.build_dict(&raw)?)
    }

    pub fn build_dict(&self, raw: &str) -> Result<DictData, String> {
        let mut table = SpellingTable::new();
        table.init_table(MAX_PINYIN_SIZE);
        let mut lemmas = self.read_raw_dict(raw, &mut table);
        if lemmas.is_empty() {
            return Err("no valid lemma in raw dictionary".to_string());
        }

        let arranged = table.arrange();
        let spl_trie = SpellingTrie::construct(arranged, table.get_average_score())?;
        debug!(spellings = spl_trie.full_spelling_num(), "spelling trie built");

        lemmas.retain_mut(|lemma| {
            let ids: Option<Vec<SplId>> = lemma.pinyin.iter().map(|p| spl_trie.full_id_of(p)).collect();
            match ids {
                Some(ids) => {
                    lemma.splids = ids;
                    true
                }
                None => {
                    debug!(hanzi = %lemma.hanzi, "spelling not in trie, dropped");
                    false
                }
            }
        });

        // Ids follow (length, hanzi) order.
        lemmas.sort_by(|a, b| (a.len(), &a.hanzi).cmp(&(b.len(), &b.hanzi)));
        for (k, lemma) in lemmas.iter_mut().enumerate() {
            lemma.idx_by_hz = k as LemmaId + 1;
        }

        let scis = build_scis(&lemmas, &spl_trie);
        let hanzis: Vec<String> = lemmas.iter().map(|l| l.hanzi.clone()).collect();
        let dict_list = DictList::init_list(scis, &hanzis)?;

        let freqs: Vec<(LemmaId, f64)> = lemmas.iter().map(|l| (l.idx_by_hz, l.freq)).collect();
        let ngram = NGram::build_unigram(&freqs, lemmas.len() + 1);

        lemmas.sort_by(|a, b| {
            a.splids
                .cmp(&b.splids)
                .then(a.freq.partial_cmp(&b.freq).unwrap_or(std::cmp::Ordering::Equal))
        });
        let top = top_lemmas(&lemmas);

        let mut tb = TrieBuild {
            lemmas: &lemmas,
            le0: vec![LmaNodeLE0::default()],
            ge1: Vec::new(),
            homo: Vec::new(),
        };
        tb.construct_subset(Parent::Le0(0), 0, lemmas.len(), 0);
        let TrieBuild { le0, ge1, homo, .. } = tb;
        debug!(
            le0 = le0.len(),
            ge1 = ge1.len(),
            homophones = homo.len(),
            top = top.len(),
            "lemma trie built"
        );

        let mut lma_idx_buf = Vec::with_capacity((homo.len() + top.len()) * 3);
        for id in homo.iter().chain(top.iter()) {
            encode_lemma_id(*id, &mut lma_idx_buf);
        }

        Ok(DictData {
            spelling: spl_trie.to_data(),
            root: le0,
            nodes_ge1: ge1,
            lma_idx_buf,
            top_lmas_num: top.len() as u32,
            dict_list,
            ngram,
        })
    }

    fn read_raw_dict(&self, raw: &str, table: &mut SpellingTable) -> Vec<LemmaEntry> {
        let mut lemmas = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() < 4 {
                debug!(line = line_no + 1, "too few fields, dropped");
                continue;
            }

            let hanzi = crate::utils::normalize(tokens[0]);
            let hz_len = hanzi.chars().count();
            if hz_len > MAX_LEMMA_SIZE {
                debug!(hanzi = %hanzi, "lemma too long, dropped");
                continue;
            }
            let freq: f64 = match tokens[1].parse() {
                Ok(f) => f,
                Err(_) => {
                    debug!(line = line_no + 1, "bad frequency, dropped");
                    continue;
                }
            };
            if hz_len > 1 && freq < MIN_PHRASE_FREQ {
                debug!(hanzi = %hanzi, freq, "rare phrase, dropped");
                continue;
            }

            let gbk_flag: i64 = tokens[2].parse().unwrap_or(1);
            match &self.valid_hzs {
                None if gbk_flag != 0 => {
                    debug!(hanzi = %hanzi, "non-gbk lemma, dropped");
                    continue;
                }
                Some(valid) if !hanzi.chars().all(|c| valid.contains(&c)) => {
                    debug!(hanzi = %hanzi, "lemma outside valid hanzi list, dropped");
                    continue;
                }
                _ => {}
            }

            let pinyin = &tokens[3..];
            if pinyin.len() != hz_len {
                debug!(hanzi = %hanzi, "pinyin count does not match hanzi count, dropped");
                continue;
            }

            let mut formatted = Vec::with_capacity(hz_len);
            let mut supported = true;
            for py in pinyin {
                let f = format_spelling_str(py);
                if !table.put_spelling(&f, freq) {
                    supported = false;
                    break;
                }
                formatted.push(f);
            }
            if !supported {
                debug!(hanzi = %hanzi, "unsupported spelling, dropped");
                continue;
            }

            lemmas.push(LemmaEntry {
                hanzi,
                freq,
                pinyin: formatted,
                splids: Vec::new(),
                idx_by_hz: 0,
            });
        }
        debug!(lemmas = lemmas.len(), "raw dictionary read");
        lemmas
    }
}

/// Single-char items: one per distinct (hanzi, reading), entry 0 blank.
fn build_scis(lemmas: &[LemmaEntry], spl_trie: &SpellingTrie) -> Vec<SingleCharItem> {
    let mut scis = Vec::new();
    for lemma in lemmas {
        let single = lemma.len() == 1;
        for (hz, &full) in lemma.hanzi.chars().zip(&lemma.splids) {
            scis.push(SingleCharItem {
                freq: if single { lemma.freq as f32 } else { PHRASE_CHAR_FREQ },
                hz,
                half_splid: spl_trie.full_to_half(full),
                full_splid: full,
            });
        }
    }
    scis.sort_by(|a, b| {
        a.hz.cmp(&b.hz)
            .then(a.half_splid.cmp(&b.half_splid))
            .then(a.full_splid.cmp(&b.full_splid))
            .then(b.freq.partial_cmp(&a.freq).unwrap_or(std::cmp::Ordering::Equal))
    });
    scis.dedup_by(|later, kept| later.hz == kept.hz && later.full_splid == kept.full_splid);
    scis.insert(0, SingleCharItem::blank());
    scis
}

/// Ids of the most frequent lemmas, best first.
fn top_lemmas(lemmas: &[LemmaEntry]) -> Vec<LemmaId> {
    let mut order: Vec<&LemmaEntry> = lemmas.iter().collect();
    order.sort_by(|a, b| b.freq.partial_cmp(&a.freq).unwrap_or(std::cmp::Ordering::Equal));
    order.iter().take(TOP_SCORE_LEMMA_NUM).map(|l| l.idx_by_hz).collect()
}

#[derive(Debug, Clone, Copy)]
enum Parent {
    Le0(usize),
    Ge1(usize),
}

struct TrieBuild<'a> {
    lemmas: &'a [LemmaEntry],
    le0: Vec<LmaNodeLE0>,
    ge1: Vec<LmaNodeGE1>,
    homo: Vec<LemmaId>,
}

impl TrieBuild<'_> {
    /// Build the sons of `parent` from lemmas `[start, end)`, which share
    /// their first `level` spelling ids and are sorted by spelling ids.
    fn construct_subset(&mut self, parent: Parent, start: usize, end: usize, level: usize) {
        if level >= MAX_LEMMA_SIZE || end <= start {
            return;
        }

        let mut groups: Vec<(SplId, usize, usize)> = Vec::new();
        for i in start..end {
            let spl = self.lemmas[i].splids[level];
            match groups.last_mut() {
                Some((s, _, e)) if *s == spl => *e = i + 1,
                _ => groups.push((spl, i, i + 1)),
            }
        }

        let first_son = if level == 0 {
            let f = self.le0.len();
            self.le0.resize(f + groups.len(), LmaNodeLE0::default());
            f
        } else {
            let f = self.ge1.len();
            self.ge1.resize(f + groups.len(), LmaNodeGE1::default());
            f
        };
        match parent {
            Parent::Le0(p) => {
                self.le0[p].son_1st_off = first_son as u32;
                self.le0[p].num_of_son = groups.len() as u16;
            }
            Parent::Ge1(p) => {
                self.ge1[p].son_1st_off = first_son as u32;
                self.ge1[p].num_of_son = groups.len() as u16;
            }
        }

        for (k, &(spl, g_start, g_end)) in groups.iter().enumerate() {
            // Lemmas ending here sort first within the group.
            let homo_num = self.lemmas[g_start..g_end]
                .iter()
                .take_while(|l| l.len() == level + 1)
                .count();
            let homo_off = self.homo.len() as u32;
            self.homo
                .extend(self.lemmas[g_start..g_start + homo_num].iter().map(|l| l.idx_by_hz));

            let son = first_son + k;
            let son_ref = if level == 0 {
                let n = &mut self.le0[son];
                n.spl_idx = spl;
                n.homo_idx_buf_off = homo_off;
                n.num_of_homo = homo_num as u16;
                Parent::Le0(son)
            } else {
                let n = &mut self.ge1[son];
                n.spl_idx = spl;
                n.homo_idx_buf_off = homo_off;
                n.num_of_homo = homo_num as u16;
                Parent::Ge1(son)
            };

            if g_end - g_start > homo_num {
                self.construct_subset(son_ref, g_start + homo_num, g_end, level + 1);
            }
        }
    }
}
