//! The capability set shared by every dictionary the decoder queries.
use std::error::Error;
use std::path::Path;

use crate::dict_def::{DictExtPara, LemmaId, LmaPsbItem, MileStoneHandle, NPredictItem, SplId};

/// Result of one `AtomDict::extend_dict` step.
#[derive(Debug, Clone, Default)]
pub struct Extension {
    /// Checkpoint to continue from at the next step; 0 if nothing can follow.
    pub handle: MileStoneHandle,
    /// Lemmas ending exactly at this step.
    pub items: Vec<LmaPsbItem>,
}

impl Extension {
    pub fn is_dead(&self) -> bool {
        self.handle == 0 && self.items.is_empty()
    }
}

/// An atomic dictionary: system dictionary, user dictionary, or the
/// composing phrase.
///
/// Incremental search works through milestone handles: `extend_dict` at
/// step `n` continues from a handle returned at an earlier step instead of
/// walking from the root again. `reset_milestones` invalidates handles
/// created at or after a step; reusing one afterwards is a programming
/// error.
pub trait AtomDict {
    /// Load dictionary content from `path`.
    fn load_dict(&mut self, path: &Path) -> Result<(), Box<dyn Error>>;

    fn number_of_lemmas(&self) -> usize;

    /// Drop milestones created at `from_step` or later. `from_step == 0`
    /// clears everything.
    fn reset_milestones(&mut self, from_step: u16, from_handle: MileStoneHandle);

    /// Extend the search from `from_handle` (0 = root) by the last spelling
    /// id of `para`.
    fn extend_dict(&mut self, from_handle: MileStoneHandle, para: &DictExtPara) -> Extension;

    /// All lemmas matching a spelling id string, half ids included.
    fn get_lpis(&self, splids: &[SplId], max: usize) -> Vec<LmaPsbItem>;

    fn get_lemma_str(&self, id: LemmaId) -> String;

    /// Spelling ids of a lemma. Full ids in `hint` are kept, half ids
    /// narrow the lookup.
    fn get_lemma_splids(&self, id: LemmaId, hint: &[SplId]) -> Vec<SplId>;

    /// Lemmas that extend `last_hzs`.
    fn predict(&self, last_hzs: &[char], max: usize) -> Vec<NPredictItem>;

    /// Add a lemma; returns its id or 0 if the dictionary is read-only.
    fn put_lemma(&mut self, lemma: &str, splids: &[SplId], count: u32) -> LemmaId;

    /// Change a lemma's count; `selected` adds `delta`, otherwise `delta`
    /// replaces it. Returns the id or 0.
    fn update_lemma(&mut self, id: LemmaId, delta: i32, selected: bool) -> LemmaId;

    fn remove_lemma(&mut self, id: LemmaId) -> bool;

    /// Total frequency mass of this dictionary.
    fn get_total_lemma_count(&self) -> u64;

    /// Frequency mass of the other dictionaries, for cross-dictionary
    /// score calibration.
    fn set_total_lemma_count_of_others(&mut self, count: u64);

    /// Persist pending changes.
    fn flush_cache(&mut self) -> Result<(), Box<dyn Error>>;
}
