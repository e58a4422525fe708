//! Spelling trie: the syllable alphabet of the decoder.
//!
//! Spellings are stored formatted: uppercase, with the `zh/ch/sh` initials
//! written `Zh/Ch/Sh` so that the digraph gets its own level-1 node. Full
//! spelling ids are assigned in sorted order starting at
//! `FULL_SPL_ID_START`; half ids (abbreviations) use the fixed layout of
//! `HALF_ID_TO_CHAR`.
//!
//! Nodes live in a flat arena (`Vec<SpellingNode>`), root at index 0, and the
//! sons of a node are contiguous.
use serde::{Deserialize, Serialize};

use crate::dict_def::{SplId, FULL_SPL_ID_START, HALF_SPELLING_ID_NUM, MAX_PINYIN_SIZE, MAX_SPELLING_NUM};
use crate::spelling_table::{ArrangedSpelling, SpellingTable};

/// Half id → representative char. Lowercase letters stand for the digraphs
/// `Ch`, `Sh` and `Zh`.
pub const HALF_ID_TO_CHAR: &[u8; HALF_SPELLING_ID_NUM + 1] = b"0ABCcDEFGHIJKLMNOPQRSsTUVWXYZz";

const HALF_ID_CH: SplId = 4;
const HALF_ID_SH: SplId = 21;
const HALF_ID_ZH: SplId = 29;

/// Standard pinyin syllables without tones.
pub const PINYIN_SYLLABLES: &[&str] = &[
    "a", "ai", "an", "ang", "ao", "ba", "bai", "ban", "bang", "bao", "bei", "ben", "beng", "bi",
    "bian", "biao", "bie", "bin", "bing", "bo", "bu", "ca", "cai", "can", "cang", "cao", "ce",
    "cen", "ceng", "cha", "chai", "chan", "chang", "chao", "che", "chen", "cheng", "chi", "chong",
    "chou", "chu", "chua", "chuai", "chuan", "chuang", "chui", "chun", "chuo", "ci", "cong", "cou",
    "cu", "cuan", "cui", "cun", "cuo", "da", "dai", "dan", "dang", "dao", "de", "dei", "deng", "di",
    "dia", "dian", "diao", "die", "ding", "diu", "dong", "dou", "du", "duan", "dui", "dun", "duo",
    "e", "ei", "en", "er", "fa", "fan", "fang", "fei", "fen", "feng", "fo", "fou", "fu", "ga",
    "gai", "gan", "gang", "gao", "ge", "gei", "gen", "geng", "gong", "gou", "gu", "gua", "guai",
    "guan", "guang", "gui", "gun", "guo", "ha", "hai", "han", "hang", "hao", "he", "hei", "hen",
    "heng", "hong", "hou", "hu", "hua", "huai", "huan", "huang", "hui", "hun", "huo", "ji", "jia",
    "jian", "jiang", "jiao", "jie", "jin", "jing", "jiong", "jiu", "ju", "juan", "jue", "jun",
    "ka", "kai", "kan", "kang", "kao", "ke", "ken", "keng", "kong", "kou", "ku", "kua", "kuai",
    "kuan", "kuang", "kui", "kun", "kuo", "la", "lai", "lan", "lang", "lao", "le", "lei", "leng",
    "li", "lia", "lian", "liang", "liao", "lie", "lin", "ling", "liu", "long", "lou", "lu",
    "luan", "lun", "luo", "lv", "lve", "ma", "mai", "man", "mang", "mao", "me", "mei", "men",
    "meng", "mi", "mian", "miao", "mie", "min", "ming", "miu", "mo", "mou", "mu", "na", "nai",
    "nan", "nang", "nao", "ne", "nei", "nen", "neng", "ni", "nian", "niang", "niao", "nie",
    "nin", "ning", "niu", "nong", "nou", "nu", "nuan", "nuo", "nv", "nve", "o", "ou", "pa", "pai",
    "pan", "pang", "pao", "pei", "pen", "peng", "pi", "pian", "piao", "pie", "pin", "ping", "po",
    "pou", "pu", "qi", "qia", "qian", "qiang", "qiao", "qie", "qin", "qing", "qiong", "qiu", "qu",
    "quan", "que", "qun", "ran", "rang", "rao", "re", "ren", "reng", "ri", "rong", "rou", "ru",
    "ruan", "rui", "run", "ruo", "sa", "sai", "san", "sang", "sao", "se", "sen", "seng", "sha",
    "shai", "shan", "shang", "shao", "she", "shei", "shen", "sheng", "shi", "shou", "shu", "shua",
    "shuai", "shuan", "shuang", "shui", "shun", "shuo", "si", "song", "sou", "su", "suan", "sui",
    "sun", "suo", "ta", "tai", "tan", "tang", "tao", "te", "teng", "ti", "tian", "tiao", "tie",
    "ting", "tong", "tou", "tu", "tuan", "tui", "tun", "tuo", "wa", "wai", "wan", "wang", "wei",
    "wen", "weng", "wo", "wu", "xi", "xia", "xian", "xiang", "xiao", "xie", "xin", "xing", "xiong",
    "xiu", "xu", "xuan", "xue", "xun", "ya", "yan", "yang", "yao", "ye", "yi", "yin", "ying",
    "yong", "you", "yu", "yuan", "yue", "yun", "za", "zai", "zan", "zang", "zao", "ze", "zei",
    "zen", "zeng", "zha", "zhai", "zhan", "zhang", "zhao", "zhe", "zhen", "zheng", "zhi", "zhong",
    "zhou", "zhu", "zhua", "zhuai", "zhuan", "zhuang", "zhui", "zhun", "zhuo", "zi", "zong", "zou",
    "zu", "zuan", "zui", "zun", "zuo",
];

/// Format a raw pinyin string the way spellings are stored: uppercase with
/// `ZH/CH/SH` initials written `Zh/Ch/Sh`.
///
/// # Example
/// ```
/// use pinyinime_core::spelling_trie::format_spelling_str;
/// assert_eq!(format_spelling_str("zhang"), "ZhANG");
/// assert_eq!(format_spelling_str("bei"), "BEI");
/// ```
pub fn format_spelling_str(raw: &str) -> String {
    let mut out: Vec<u8> = raw.bytes().map(|b| b.to_ascii_uppercase()).collect();
    if out.len() >= 2 && out[1] == b'H' && matches!(out[0], b'Z' | b'C' | b'S') {
        out[1] = b'h';
    }
    String::from_utf8(out).unwrap_or_default()
}

/// One trie node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpellingNode {
    pub first_son: u32,
    pub num_of_son: u16,
    pub char_this_node: u8,
    pub level: u8,
    /// Full id of the spelling ending here, 0 if none.
    pub spelling_idx: SplId,
    /// Half id owned by this node (level-0 letters and the digraphs), 0 if none.
    pub half_idx: SplId,
    /// Minimum score of this node and its descendants.
    pub score: u8,
}

/// Serializable form: the arranged spelling list the trie was built from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpellingData {
    pub spellings: Vec<ArrangedSpelling>,
    pub average_score: u8,
}

/// The spelling trie plus half/full id tables.
#[derive(Debug, Clone)]
pub struct SpellingTrie {
    spellings: Vec<ArrangedSpelling>,
    average_score: u8,
    nodes: Vec<SpellingNode>,
    h2f_start: [SplId; HALF_SPELLING_ID_NUM + 1],
    h2f_num: [u16; HALF_SPELLING_ID_NUM + 1],
    f2h: Vec<SplId>,
    ym_buf: Vec<String>,
    spl_ym_ids: Vec<u8>,
    szm_enable_shm: bool,
    szm_enable_ym: bool,
}

impl SpellingTrie {
    /// Build the trie from a sorted, arranged spelling list.
    pub fn construct(spellings: Vec<ArrangedSpelling>, average_score: u8) -> Result<Self, String> {
        if spellings.len() > MAX_SPELLING_NUM {
            return Err(format!("too many spellings: {}", spellings.len()));
        }
        for w in spellings.windows(2) {
            if w[0].spelling >= w[1].spelling {
                return Err(format!(
                    "spellings not sorted or duplicated: {} / {}",
                    w[0].spelling, w[1].spelling
                ));
            }
        }
        for s in &spellings {
            validate_spelling(&s.spelling)?;
        }

        let mut trie = Self {
            spellings,
            average_score,
            nodes: vec![SpellingNode::default()],
            h2f_start: [0; HALF_SPELLING_ID_NUM + 1],
            h2f_num: [0; HALF_SPELLING_ID_NUM + 1],
            f2h: Vec::new(),
            ym_buf: Vec::new(),
            spl_ym_ids: Vec::new(),
            szm_enable_shm: true,
            szm_enable_ym: true,
        };

        let num = trie.spellings.len();
        if num > 0 {
            trie.construct_spellings_subset(0, num, 0, 0);
        }
        trie.build_f2h();
        trie.build_ym_info();
        Ok(trie)
    }

    /// Build from the standard pinyin syllable list with uniform frequency.
    pub fn with_default_spellings() -> Self {
        Self::from_raw_spellings(PINYIN_SYLLABLES.iter().copied())
            .unwrap_or_else(|_| Self::empty())
    }

    /// Build from raw lowercase spellings, each counted once.
    pub fn from_raw_spellings<'a, I>(raw: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut table = SpellingTable::new();
        for s in raw {
            table.put_spelling(&format_spelling_str(s), 1.0);
        }
        let arranged = table.arrange();
        Self::construct(arranged, table.get_average_score())
    }

    pub fn from_data(data: &SpellingData) -> Result<Self, String> {
        Self::construct(data.spellings.clone(), data.average_score)
    }

    pub fn to_data(&self) -> SpellingData {
        SpellingData {
            spellings: self.spellings.clone(),
            average_score: self.average_score,
        }
    }

    fn empty() -> Self {
        Self {
            spellings: Vec::new(),
            average_score: 0,
            nodes: vec![SpellingNode::default()],
            h2f_start: [0; HALF_SPELLING_ID_NUM + 1],
            h2f_num: [0; HALF_SPELLING_ID_NUM + 1],
            f2h: Vec::new(),
            ym_buf: Vec::new(),
            spl_ym_ids: Vec::new(),
            szm_enable_shm: true,
            szm_enable_ym: true,
        }
    }

    /// Recursively build the sons of `parent` from spellings
    /// `[item_start, item_end)`, all sharing a prefix of length `level`.
    /// Returns the minimum score in the range.
    fn construct_spellings_subset(
        &mut self,
        item_start: usize,
        item_end: usize,
        level: usize,
        parent: usize,
    ) -> u8 {
        let mut min_score = u8::MAX;
        let mut start = item_start;

        // A spelling equal to the shared prefix terminates at the parent.
        if level > 0 && self.spellings[start].spelling.len() == level {
            self.nodes[parent].spelling_idx = FULL_SPL_ID_START + start as SplId;
            min_score = self.spellings[start].score;
            start += 1;
        }

        // Group the rest by the char at `level`.
        let mut groups: Vec<(u8, usize, usize)> = Vec::new();
        for i in start..item_end {
            let ch = self.spellings[i].spelling.as_bytes()[level];
            match groups.last_mut() {
                Some((c, _, end)) if *c == ch => *end = i + 1,
                _ => groups.push((ch, i, i + 1)),
            }
        }

        let first_son = self.nodes.len();
        self.nodes[parent].first_son = first_son as u32;
        self.nodes[parent].num_of_son = groups.len() as u16;
        for &(ch, _, _) in &groups {
            self.nodes.push(SpellingNode {
                char_this_node: ch,
                level: level as u8,
                ..SpellingNode::default()
            });
        }

        let parent_char = self.nodes[parent].char_this_node;
        for (k, &(ch, g_start, g_end)) in groups.iter().enumerate() {
            let son = first_son + k;
            let half = if level == 0 {
                half_id_for_initial(ch)
            } else if level == 1 && ch == b'h' {
                match parent_char {
                    b'C' => HALF_ID_CH,
                    b'S' => HALF_ID_SH,
                    b'Z' => HALF_ID_ZH,
                    _ => 0,
                }
            } else {
                0
            };
            if half != 0 {
                self.nodes[son].half_idx = half;
                self.h2f_start[half as usize] = FULL_SPL_ID_START + g_start as SplId;
                self.h2f_num[half as usize] = (g_end - g_start) as u16;
            }

            let son_score = self.construct_spellings_subset(g_start, g_end, level + 1, son);
            self.nodes[son].score = son_score;
            min_score = min_score.min(son_score);
        }

        min_score
    }

    fn build_f2h(&mut self) {
        self.f2h = self
            .spellings
            .iter()
            .map(|s| {
                let b = s.spelling.as_bytes();
                if b.len() >= 2 && b[1] == b'h' {
                    match b[0] {
                        b'C' => return HALF_ID_CH,
                        b'S' => return HALF_ID_SH,
                        b'Z' => return HALF_ID_ZH,
                        _ => {}
                    }
                }
                half_id_for_initial(b[0])
            })
            .collect();
    }

    /// Collect the distinct finals (yunmu) and map each full spelling to one.
    fn build_ym_info(&mut self) {
        let finals: Vec<String> = self
            .spellings
            .iter()
            .map(|s| yunmu_of(&s.spelling).to_string())
            .collect();

        let mut ym_table = SpellingTable::new();
        for f in finals.iter().filter(|f| !f.is_empty()) {
            ym_table.put_spelling(f, 1.0);
        }
        self.ym_buf = ym_table.arrange().into_iter().map(|a| a.spelling).collect();

        self.spl_ym_ids = finals
            .iter()
            .map(|f| {
                self.ym_buf
                    .iter()
                    .position(|y| y == f)
                    .map(|p| (p + 1) as u8)
                    .unwrap_or(0)
            })
            .collect();
    }

    pub fn root(&self) -> &SpellingNode {
        &self.nodes[0]
    }

    pub fn node(&self, idx: usize) -> &SpellingNode {
        &self.nodes[idx]
    }

    /// Find the son of `node` carrying `ch` (already formatted).
    pub fn find_son(&self, node: usize, ch: u8) -> Option<usize> {
        let n = &self.nodes[node];
        let first = n.first_son as usize;
        (first..first + n.num_of_son as usize).find(|&i| self.nodes[i].char_this_node == ch)
    }

    pub fn full_spelling_num(&self) -> usize {
        self.spellings.len()
    }

    pub fn average_score(&self) -> u8 {
        self.average_score
    }

    pub fn is_half_id(&self, splid: SplId) -> bool {
        splid > 0 && splid < FULL_SPL_ID_START
    }

    pub fn is_full_id(&self, splid: SplId) -> bool {
        splid >= FULL_SPL_ID_START && ((splid - FULL_SPL_ID_START) as usize) < self.spellings.len()
    }

    /// Half ids whose letter is a vowel initial (A, E, O).
    pub fn is_half_id_yunmu(&self, splid: SplId) -> bool {
        self.is_half_id(splid) && matches!(HALF_ID_TO_CHAR[splid as usize], b'A' | b'E' | b'O')
    }

    /// `(start, count)` of the full ids covered by a half id.
    pub fn half_to_full(&self, half: SplId) -> (SplId, u16) {
        if !self.is_half_id(half) {
            return (0, 0);
        }
        (self.h2f_start[half as usize], self.h2f_num[half as usize])
    }

    /// Half id owning a full id, 0 if the id is not a full id.
    pub fn full_to_half(&self, full: SplId) -> SplId {
        if !self.is_full_id(full) {
            return 0;
        }
        self.f2h[(full - FULL_SPL_ID_START) as usize]
    }

    /// Whether a half id can stand for a full id. `C` is compatible with
    /// both `CA..` and `ChA..` spellings.
    pub fn half_full_compatible(&self, half: SplId, full: SplId) -> bool {
        let owner = self.full_to_half(full);
        if owner == 0 || !self.is_half_id(half) {
            return false;
        }
        if owner == half {
            return true;
        }
        let ch_f = HALF_ID_TO_CHAR[owner as usize].to_ascii_uppercase();
        ch_f == HALF_ID_TO_CHAR[half as usize]
    }

    /// Full-id range compatible with any spelling id.
    pub fn id_range(&self, splid: SplId) -> (SplId, u16) {
        if self.is_half_id(splid) {
            self.half_to_full(splid)
        } else if self.is_full_id(splid) {
            (splid, 1)
        } else {
            (0, 0)
        }
    }

    /// Formatted spelling string (`"ZhANG"`, `"B"`, `"Ch"`).
    pub fn get_spelling_str(&self, splid: SplId) -> String {
        if self.is_full_id(splid) {
            return self.spellings[(splid - FULL_SPL_ID_START) as usize].spelling.clone();
        }
        if self.is_half_id(splid) {
            let c = HALF_ID_TO_CHAR[splid as usize];
            return if c.is_ascii_lowercase() {
                format!("{}h", c.to_ascii_uppercase() as char)
            } else {
                (c as char).to_string()
            };
        }
        String::new()
    }

    /// Lowercase spelling string (`"zhang"`, `"b"`, `"ch"`).
    pub fn get_spelling_str_lower(&self, splid: SplId) -> String {
        self.get_spelling_str(splid).to_ascii_lowercase()
    }

    /// Number of input letters a spelling id stands for.
    pub fn get_spelling_len(&self, splid: SplId) -> usize {
        self.get_spelling_str(splid).len()
    }

    /// Score of a full spelling.
    pub fn get_spelling_score(&self, splid: SplId) -> Option<u8> {
        if !self.is_full_id(splid) {
            return None;
        }
        Some(self.spellings[(splid - FULL_SPL_ID_START) as usize].score)
    }

    /// Full id of an exact formatted spelling.
    pub fn full_id_of(&self, formatted: &str) -> Option<SplId> {
        self.spellings
            .binary_search_by(|s| s.spelling.as_str().cmp(formatted))
            .ok()
            .map(|p| FULL_SPL_ID_START + p as SplId)
    }

    /// Check a spelling id against the abbreviation switches.
    ///
    /// A disabled vowel half id is turned into the full id of the
    /// single-letter spelling (`A` → `"A"`) when one exists.
    pub fn if_valid_id_update(&self, splid: SplId) -> Option<SplId> {
        if self.is_full_id(splid) {
            return Some(splid);
        }
        if !self.is_half_id(splid) || self.h2f_num[splid as usize] == 0 {
            return None;
        }
        if self.is_half_id_yunmu(splid) {
            if self.szm_enable_ym {
                return Some(splid);
            }
            let single = (HALF_ID_TO_CHAR[splid as usize] as char).to_string();
            return self.full_id_of(&single);
        }
        if self.szm_enable_shm {
            Some(splid)
        } else {
            None
        }
    }

    /// Enable or disable consonant-initial abbreviations.
    pub fn szm_enable_shm(&mut self, enable: bool) {
        self.szm_enable_shm = enable;
    }

    /// Enable or disable vowel-initial abbreviations.
    pub fn szm_enable_ym(&mut self, enable: bool) {
        self.szm_enable_ym = enable;
    }

    /// Whether abbreviations starting with `ch` are enabled.
    pub fn szm_is_enabled(&self, ch: char) -> bool {
        match ch.to_ascii_uppercase() {
            'A' | 'E' | 'O' => self.szm_enable_ym,
            'I' | 'U' | 'V' => false,
            c if c.is_ascii_uppercase() => self.szm_enable_shm,
            _ => false,
        }
    }

    /// Final (yunmu) id of a full spelling, 0 if none.
    pub fn get_ym_id(&self, splid: SplId) -> u8 {
        if !self.is_full_id(splid) {
            return 0;
        }
        self.spl_ym_ids[(splid - FULL_SPL_ID_START) as usize]
    }

    /// Yunmu string for a yunmu id.
    pub fn get_ym_str(&self, ym_id: u8) -> Option<&str> {
        if ym_id == 0 {
            return None;
        }
        self.ym_buf.get(ym_id as usize - 1).map(|s| s.as_str())
    }
}

/// Half id for an uppercase initial letter.
fn half_id_for_initial(ch: u8) -> SplId {
    if !ch.is_ascii_uppercase() {
        return 0;
    }
    let mut id = (ch - b'A') as SplId + 1;
    if ch > b'C' {
        id += 1;
    }
    if ch > b'S' {
        id += 1;
    }
    id
}

/// The final part of a formatted spelling (`"ZhANG"` → `"ANG"`).
fn yunmu_of(spelling: &str) -> &str {
    let b = spelling.as_bytes();
    if b.is_empty() || matches!(b[0], b'A' | b'E' | b'O') {
        return spelling;
    }
    if b.len() >= 2 && b[1] == b'h' {
        &spelling[2..]
    } else {
        &spelling[1..]
    }
}

fn validate_spelling(s: &str) -> Result<(), String> {
    let b = s.as_bytes();
    if b.is_empty() || b.len() > MAX_PINYIN_SIZE {
        return Err(format!("invalid spelling length: {:?}", s));
    }
    for (i, &c) in b.iter().enumerate() {
        let ok = c.is_ascii_uppercase() || (i == 1 && c == b'h' && matches!(b[0], b'C' | b'S' | b'Z'));
        if !ok {
            return Err(format!("invalid spelling: {:?}", s));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_id_layout() {
        assert_eq!(half_id_for_initial(b'A'), 1);
        assert_eq!(half_id_for_initial(b'C'), 3);
        assert_eq!(half_id_for_initial(b'D'), 5);
        assert_eq!(half_id_for_initial(b'S'), 20);
        assert_eq!(half_id_for_initial(b'T'), 22);
        assert_eq!(half_id_for_initial(b'Z'), 28);
        assert_eq!(HALF_ID_TO_CHAR[HALF_ID_CH as usize], b'c');
        assert_eq!(HALF_ID_TO_CHAR[HALF_ID_SH as usize], b's');
        assert_eq!(HALF_ID_TO_CHAR[HALF_ID_ZH as usize], b'z');
    }

    #[test]
    fn full_to_half_ranges_are_consistent() {
        let trie = SpellingTrie::with_default_spellings();
        assert!(trie.full_spelling_num() > 390);
        for i in 0..trie.full_spelling_num() {
            let full = FULL_SPL_ID_START + i as SplId;
            let half = trie.full_to_half(full);
            assert!(trie.is_half_id(half), "no half for {}", trie.get_spelling_str(full));
            let (start, num) = trie.half_to_full(half);
            assert!(full >= start && full < start + num);
            assert!(trie.half_full_compatible(half, full));
        }
    }

    #[test]
    fn digraph_half_ids() {
        let trie = SpellingTrie::with_default_spellings();
        let zhang = trie.full_id_of("ZhANG").unwrap();
        assert_eq!(trie.full_to_half(zhang), HALF_ID_ZH);
        assert!(trie.half_full_compatible(half_id_for_initial(b'Z'), zhang));
        let zao = trie.full_id_of("ZAO").unwrap();
        assert!(!trie.half_full_compatible(HALF_ID_ZH, zao));
        assert_eq!(trie.get_spelling_str_lower(HALF_ID_ZH), "zh");
        assert_eq!(trie.get_spelling_len(zhang), 5);
    }

    #[test]
    fn vowel_half_id_update() {
        let mut trie = SpellingTrie::with_default_spellings();
        let a = half_id_for_initial(b'A');
        assert!(trie.is_half_id_yunmu(a));
        assert_eq!(trie.if_valid_id_update(a), Some(a));
        trie.szm_enable_ym(false);
        assert_eq!(trie.if_valid_id_update(a), trie.full_id_of("A"));
        // No spelling starts with I.
        assert_eq!(trie.if_valid_id_update(half_id_for_initial(b'I')), None);
    }

    #[test]
    fn yunmu_ids() {
        let trie = SpellingTrie::with_default_spellings();
        let zhang = trie.full_id_of("ZhANG").unwrap();
        let bang = trie.full_id_of("BANG").unwrap();
        assert_ne!(trie.get_ym_id(zhang), 0);
        assert_eq!(trie.get_ym_id(zhang), trie.get_ym_id(bang));
        assert_eq!(trie.get_ym_str(trie.get_ym_id(bang)), Some("ANG"));
    }

    #[test]
    fn node_scores_are_min_of_descendants() {
        let mut table = SpellingTable::new();
        table.put_spelling("BA", 100.0);
        table.put_spelling("BAN", 1.0);
        table.put_spelling("BANG", 10.0);
        let arranged = table.arrange();
        let trie = SpellingTrie::construct(arranged, table.get_average_score()).unwrap();
        let b = trie.find_son(0, b'B').unwrap();
        let ba = trie.find_son(b, b'A').unwrap();
        assert_eq!(trie.node(ba).score, trie.get_spelling_score(trie.full_id_of("BA").unwrap()).unwrap());
        assert_eq!(trie.node(b).score, trie.node(ba).score);
    }

    #[test]
    fn unsorted_input_rejected() {
        let items = vec![
            ArrangedSpelling { spelling: "BEI".into(), score: 0 },
            ArrangedSpelling { spelling: "BA".into(), score: 0 },
        ];
        assert!(SpellingTrie::construct(items, 0).is_err());
    }
}
