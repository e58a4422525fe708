//! Dictionary-wide constants and small shared record types.
//!
//! Lemma ids are partitioned by provenance:
//! - system dictionary: `[1, SYS_DICT_ID_END]`
//! - user dictionary: `[USER_DICT_ID_START, USER_DICT_ID_END]`
//! - `LEMMA_ID_COMPOSING` for the ad hoc composing phrase
use serde::{Deserialize, Serialize};

/// Spelling id (half or full).
pub type SplId = u16;

/// Lemma id.
pub type LemmaId = u32;

/// Opaque incremental-search checkpoint returned by `AtomDict::extend_dict`.
/// Zero means "no match / root".
pub type MileStoneHandle = u16;

pub const MAX_LEMMA_SIZE: usize = 8;
pub const MAX_PINYIN_SIZE: usize = 6;
pub const HALF_SPELLING_ID_NUM: usize = 29;
pub const FULL_SPL_ID_START: SplId = HALF_SPELLING_ID_NUM as SplId + 1;
pub const MAX_SPELLING_NUM: usize = 512 - HALF_SPELLING_ID_NUM - 1;
pub const MAX_SEARCH_STEPS: usize = 40;
pub const MAX_PREDICT_SIZE: usize = MAX_LEMMA_SIZE - 1;
pub const LEMMA_ID_SIZE: usize = 3;
pub const LEMMA_ID_COMPOSING: LemmaId = 0xff_ffff;
pub const TOP_SCORE_LEMMA_NUM: usize = 10;

pub const MAX_PREDICT_NUM_BY_GT3: usize = 1;
pub const MAX_PREDICT_NUM_BY3: usize = 2;
pub const MAX_PREDICT_NUM_BY2: usize = 2;

pub const SYS_DICT_ID_END: LemmaId = 500_000;
pub const USER_DICT_ID_START: LemmaId = 500_001;
pub const USER_DICT_ID_END: LemmaId = 600_000;

/// Total frequency mass the system dictionary is normalized against.
pub const SYS_DICT_TOTAL_FREQ: f64 = 100_000_000.0;

/// Where a lemma id comes from, derived from its range alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LemmaSource {
    System,
    User,
    Composing,
    Unknown,
}

impl LemmaSource {
    pub fn of(id: LemmaId) -> Self {
        match id {
            LEMMA_ID_COMPOSING => LemmaSource::Composing,
            1..=SYS_DICT_ID_END => LemmaSource::System,
            USER_DICT_ID_START..=USER_DICT_ID_END => LemmaSource::User,
            _ => LemmaSource::Unknown,
        }
    }
}

/// A lemma together with its "possibility" score (lower is better).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmaPsbItem {
    pub id: LemmaId,
    /// Number of hanzi (and spelling ids) in the lemma.
    pub lma_len: u16,
    pub psb: f32,
    /// First hanzi of the lemma, used for quick duplicate checks.
    pub hanzi: char,
}

/// Compare two items by psb normalized per character.
///
/// `psb1 / len1 < psb2 / len2` is evaluated as `psb1 * len2 < psb2 * len1`.
pub fn cmp_lpi_with_unified_psb(a: &LmaPsbItem, b: &LmaPsbItem) -> std::cmp::Ordering {
    let up1 = a.psb * b.lma_len as f32;
    let up2 = b.psb * a.lma_len as f32;
    up1.partial_cmp(&up2).unwrap_or(std::cmp::Ordering::Equal)
}

/// A prediction: the hanzi that would follow the history.
#[derive(Debug, Clone, PartialEq)]
pub struct NPredictItem {
    pub psb: f32,
    pub pre_hzs: String,
    /// Length of the history the prediction was made from.
    pub his_len: u16,
}

/// Drop duplicate prediction strings, keeping the item with the longest
/// history (then the best psb). The rest is ordered by history length
/// descending, then psb.
pub fn remove_duplicate_npre(items: &mut Vec<NPredictItem>) {
    items.sort_by(|a, b| {
        a.pre_hzs
            .cmp(&b.pre_hzs)
            .then(b.his_len.cmp(&a.his_len))
            .then(a.psb.partial_cmp(&b.psb).unwrap_or(std::cmp::Ordering::Equal))
    });
    items.dedup_by(|later, kept| later.pre_hzs == kept.pre_hzs);
    items.sort_by(|a, b| {
        b.his_len
            .cmp(&a.his_len)
            .then(a.psb.partial_cmp(&b.psb).unwrap_or(std::cmp::Ordering::Equal))
    });
}

/// Parameters for one `extend_dict` step.
#[derive(Debug, Clone, Default)]
pub struct DictExtPara {
    /// Spelling ids from the start of the lemma up to and including the new one.
    pub splids: Vec<SplId>,
    /// Decoder step (input char index) this extension belongs to.
    pub step_no: u16,
    /// Whether the new spelling id was terminated by a splitter.
    pub splid_end_split: bool,
    /// Full-id range compatible with the last spelling id.
    pub id_start: SplId,
    pub id_num: u16,
}

impl DictExtPara {
    /// Number of spelling ids; equals the lemma length being matched.
    pub fn ext_len(&self) -> usize {
        self.splids.len()
    }

    pub fn last_splid(&self) -> SplId {
        self.splids.last().copied().unwrap_or(0)
    }

    pub fn matches(&self, splid: SplId) -> bool {
        splid >= self.id_start && splid < self.id_start + self.id_num
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lemma_source_by_range() {
        assert_eq!(LemmaSource::of(1), LemmaSource::System);
        assert_eq!(LemmaSource::of(SYS_DICT_ID_END), LemmaSource::System);
        assert_eq!(LemmaSource::of(USER_DICT_ID_START), LemmaSource::User);
        assert_eq!(LemmaSource::of(LEMMA_ID_COMPOSING), LemmaSource::Composing);
        assert_eq!(LemmaSource::of(0), LemmaSource::Unknown);
    }

    #[test]
    fn unified_psb_prefers_lower_per_char() {
        let long = LmaPsbItem { id: 1, lma_len: 2, psb: 10.0, hanzi: '北' };
        let short = LmaPsbItem { id: 2, lma_len: 1, psb: 6.0, hanzi: '北' };
        assert_eq!(cmp_lpi_with_unified_psb(&long, &short), std::cmp::Ordering::Less);
    }

    #[test]
    fn npre_dedup_keeps_best() {
        let mut items = vec![
            NPredictItem { psb: 5.0, pre_hzs: "京".into(), his_len: 1 },
            NPredictItem { psb: 3.0, pre_hzs: "京".into(), his_len: 1 },
            NPredictItem { psb: 4.0, pre_hzs: "方".into(), his_len: 1 },
        ];
        remove_duplicate_npre(&mut items);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].pre_hzs, "京");
        assert_eq!(items[0].psb, 3.0);
    }
}
