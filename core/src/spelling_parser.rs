//! Split raw Latin input into spelling ids by walking the `SpellingTrie`.
//!
//! Only `[a-zA-Z]` is parsed; every other byte is a segment splitter.
use std::sync::Arc;

use crate::dict_def::SplId;
use crate::spelling_trie::{format_spelling_str, SpellingTrie};

/// Result of `SpellingParser::splstr_to_idxs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSpellings {
    pub spl_idx: Vec<SplId>,
    /// Start position of each id, plus one trailing entry for the end of the
    /// parsed part.
    pub start_pos: Vec<u16>,
    /// The last id comes from an incomplete tail that may still grow into a
    /// longer spelling.
    pub last_is_pre: bool,
}

impl ParsedSpellings {
    pub fn len(&self) -> usize {
        self.spl_idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spl_idx.is_empty()
    }

    /// Number of input bytes consumed.
    pub fn parsed_len(&self) -> usize {
        self.start_pos.last().copied().unwrap_or(0) as usize
    }
}

#[derive(Debug, Clone)]
pub struct SpellingParser {
    trie: Arc<SpellingTrie>,
}

impl SpellingParser {
    pub fn new(trie: Arc<SpellingTrie>) -> Self {
        Self { trie }
    }

    pub fn trie(&self) -> &SpellingTrie {
        &self.trie
    }

    pub fn trie_arc(&self) -> Arc<SpellingTrie> {
        Arc::clone(&self.trie)
    }

    pub fn is_valid_to_parse(ch: u8) -> bool {
        ch.is_ascii_alphabetic()
    }

    /// Follow one input letter from `node`. The `h` of `zh/ch/sh` lives in a
    /// lowercase node.
    fn son_for_input(&self, node: usize, ch: u8) -> Option<usize> {
        let n = self.trie.node(node);
        if node != 0
            && n.level == 0
            && matches!(n.char_this_node, b'C' | b'S' | b'Z')
            && ch.eq_ignore_ascii_case(&b'h')
        {
            return self.trie.find_son(node, b'h');
        }
        self.trie.find_son(node, ch.to_ascii_uppercase())
    }

    /// Id to commit when the walk stops at `node`.
    fn commit_id(&self, node: usize) -> Option<SplId> {
        let n = self.trie.node(node);
        if n.spelling_idx != 0 {
            return Some(n.spelling_idx);
        }
        if n.half_idx != 0 {
            return self.trie.if_valid_id_update(n.half_idx);
        }
        None
    }

    /// Half id of the initial of a segment (`"bia"` → `B`, `"zho"` → `Zh`).
    fn initial_half(&self, seg: &[u8]) -> Option<SplId> {
        let first = self.son_for_input(0, *seg.first()?)?;
        if seg.len() >= 2 {
            if let Some(second) = self.son_for_input(first, seg[1]) {
                let half = self.trie.node(second).half_idx;
                if half != 0 {
                    return self.trie.if_valid_id_update(half);
                }
            }
        }
        self.trie.if_valid_id_update(self.trie.node(first).half_idx)
    }

    /// Greedy longest-match split of `s` into spelling ids.
    ///
    /// Parsing stops at the first position that cannot continue; the ids
    /// parsed so far are returned with `last_is_pre = false`.
    pub fn splstr_to_idxs(&self, s: &[u8]) -> ParsedSpellings {
        let mut out = ParsedSpellings::default();
        let mut node = 0usize;
        let mut seg_start = 0usize;
        let mut i = 0usize;

        while i < s.len() {
            let ch = s[i];
            if !Self::is_valid_to_parse(ch) {
                if node != 0 {
                    match self.commit_id(node) {
                        Some(id) => {
                            out.spl_idx.push(id);
                            out.start_pos.push(seg_start as u16);
                        }
                        None => return finish(out, seg_start, false),
                    }
                    node = 0;
                }
                i += 1;
                seg_start = i;
                continue;
            }

            match self.son_for_input(node, ch) {
                Some(son) => {
                    node = son;
                    i += 1;
                }
                None => {
                    if node == 0 {
                        return finish(out, seg_start, false);
                    }
                    match self.commit_id(node) {
                        Some(id) => {
                            out.spl_idx.push(id);
                            out.start_pos.push(seg_start as u16);
                            node = 0;
                            seg_start = i;
                        }
                        None => return finish(out, seg_start, false),
                    }
                }
            }
        }

        if node == 0 {
            return finish(out, s.len(), false);
        }

        let n = self.trie.node(node);
        if n.spelling_idx != 0 {
            out.spl_idx.push(n.spelling_idx);
            out.start_pos.push(seg_start as u16);
            let more = n.num_of_son > 0;
            finish(out, s.len(), more)
        } else if let Some(id) = self.commit_id(node).or_else(|| self.initial_half(&s[seg_start..])) {
            out.spl_idx.push(id);
            out.start_pos.push(seg_start as u16);
            finish(out, s.len(), true)
        } else {
            finish(out, seg_start, false)
        }
    }

    /// Like `splstr_to_idxs`, but vowel half ids are replaced by the full id
    /// of the single-letter spelling.
    pub fn splstr_to_idxs_f(&self, s: &[u8]) -> ParsedSpellings {
        let mut parsed = self.splstr_to_idxs(s);
        for id in parsed.spl_idx.iter_mut() {
            if self.trie.is_half_id_yunmu(*id) {
                let letter = self.trie.get_spelling_str(*id);
                if let Some(full) = self.trie.full_id_of(&letter) {
                    *id = full;
                }
            }
        }
        parsed
    }

    /// Id of a whole string, with whether it may be a prefix of a longer
    /// spelling. Single letters and `zh/ch/sh` map to half ids.
    pub fn get_splid_by_str(&self, s: &[u8]) -> Option<(SplId, bool)> {
        if s.is_empty() || !s.iter().all(|&c| Self::is_valid_to_parse(c)) {
            return None;
        }
        let mut node = 0usize;
        for &c in s {
            node = self.son_for_input(node, c)?;
        }
        let n = self.trie.node(node);
        if s.len() == 1 {
            return self.trie.if_valid_id_update(n.half_idx).map(|id| (id, true));
        }
        if n.spelling_idx != 0 {
            return Some((n.spelling_idx, n.num_of_son > 0));
        }
        if n.half_idx != 0 {
            return self.trie.if_valid_id_update(n.half_idx).map(|id| (id, true));
        }
        None
    }

    /// Whether `s` is a (possibly complete) prefix of some spelling.
    pub fn is_spelling_prefix(&self, s: &[u8]) -> bool {
        if s.is_empty() {
            return false;
        }
        let mut node = 0usize;
        for &c in s {
            if !Self::is_valid_to_parse(c) {
                return false;
            }
            match self.son_for_input(node, c) {
                Some(son) => node = son,
                None => return false,
            }
        }
        true
    }

    /// Parse a splitter-separated string where every segment is one
    /// spelling (`"bei'jing"`). Full ids are preferred; returns an empty
    /// vector if any segment is not a spelling.
    pub fn get_splids_parallel(&self, s: &str) -> Vec<SplId> {
        let mut ids = Vec::new();
        for seg in s.split(|c: char| !c.is_ascii_alphabetic()).filter(|p| !p.is_empty()) {
            let id = self
                .trie
                .full_id_of(&format_spelling_str(seg))
                .or_else(|| self.get_splid_by_str(seg.as_bytes()).map(|(id, _)| id));
            match id {
                Some(id) => ids.push(id),
                None => return Vec::new(),
            }
        }
        ids
    }
}

fn finish(mut out: ParsedSpellings, end: usize, last_is_pre: bool) -> ParsedSpellings {
    out.start_pos.push(end as u16);
    out.last_is_pre = last_is_pre;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> SpellingParser {
        SpellingParser::new(Arc::new(SpellingTrie::with_default_spellings()))
    }

    fn strs(p: &SpellingParser, parsed: &ParsedSpellings) -> Vec<String> {
        parsed
            .spl_idx
            .iter()
            .map(|&id| p.trie().get_spelling_str_lower(id))
            .collect()
    }

    #[test]
    fn greedy_split() {
        let p = parser();
        let r = p.splstr_to_idxs(b"beijing");
        assert_eq!(strs(&p, &r), vec!["bei", "jing"]);
        assert_eq!(r.start_pos, vec![0, 3, 7]);
        assert!(r.last_is_pre == false);
    }

    #[test]
    fn splitter_forces_segment() {
        let p = parser();
        let r = p.splstr_to_idxs(b"xi'an");
        assert_eq!(strs(&p, &r), vec!["xi", "an"]);
        assert_eq!(r.start_pos, vec![0, 3, 5]);
        let r = p.splstr_to_idxs(b"xian");
        assert_eq!(strs(&p, &r), vec!["xian"]);
    }

    #[test]
    fn abbreviations_and_prefix_tail() {
        let p = parser();
        let r = p.splstr_to_idxs(b"bj");
        assert_eq!(strs(&p, &r), vec!["b", "j"]);
        assert!(r.last_is_pre);

        let r = p.splstr_to_idxs(b"zh");
        assert_eq!(strs(&p, &r), vec!["zh"]);
        assert!(r.last_is_pre);

        // "bia" is only a prefix of "bian"/"biao".
        let r = p.splstr_to_idxs(b"bia");
        assert_eq!(strs(&p, &r), vec!["b"]);
        assert!(r.last_is_pre);
    }

    #[test]
    fn failure_keeps_progress() {
        let p = parser();
        let r = p.splstr_to_idxs(b"beiiii");
        assert_eq!(strs(&p, &r), vec!["bei"]);
        assert!(!r.last_is_pre);
        assert_eq!(r.parsed_len(), 3);
    }

    #[test]
    fn splid_by_str() {
        let p = parser();
        let (id, pre) = p.get_splid_by_str(b"b").unwrap();
        assert!(p.trie().is_half_id(id));
        assert!(pre);
        let (id, pre) = p.get_splid_by_str(b"jing").unwrap();
        assert!(p.trie().is_full_id(id));
        assert!(!pre);
        assert!(p.get_splid_by_str(b"bia").is_none());
        assert!(p.get_splid_by_str(b"i").is_none());
        assert!(p.get_splid_by_str(b"b'").is_none());
    }

    #[test]
    fn vowel_halves_become_full() {
        let p = parser();
        let r = p.splstr_to_idxs_f(b"a");
        assert!(p.trie().is_full_id(r.spl_idx[0]));
        assert_eq!(p.trie().get_spelling_str_lower(r.spl_idx[0]), "a");
    }

    #[test]
    fn parallel_ids() {
        let p = parser();
        let ids = p.get_splids_parallel("bei'jing");
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|&id| p.trie().is_full_id(id)));
        assert!(p.get_splids_parallel("bei'qqq").is_empty());
    }
}
