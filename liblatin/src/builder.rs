//! Compile a word list into a prediction dictionary blob.
//!
//! Input is either an Android style XML word list (`<w f="120">word</w>`) or
//! plain `word freq` lines. Frequencies are clamped to 1..=255.
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::codec::{
    bloom_hashes, bloom_slot, put_vlu, vlu_len, END_OF_PREFIXES_NO_SUFFIXES,
    END_OF_PREFIXES_SUFFIXES_FOLLOW,
};
use crate::config::PredictionConfig;
use crate::dictionary::{base_char_map, BLOOM_UNIT};

fn word_entry_regex() -> Option<Regex> {
    Regex::new(r#"<w\b[^>]*\bf="(\d+)"[^>]*>([^<]+)</w>"#).ok()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[derive(Default)]
struct Node {
    children: BTreeMap<u32, Node>,
    /// (frequency, rest of the word after this node's path)
    suffixes: Vec<(u8, Vec<u32>)>,
}

impl Node {
    fn insert(&mut self, word: &[u32], depth: usize, limit: usize, freq: u8) {
        if depth > 0 {
            self.suffixes.push((freq, word[depth..].to_vec()));
        }
        if depth < limit.min(word.len()) {
            self.children
                .entry(word[depth])
                .or_default()
                .insert(word, depth + 1, limit, freq);
        }
    }

    fn trim(&mut self, max_suffixes: usize) {
        self.suffixes.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        self.suffixes.truncate(max_suffixes);
        for child in self.children.values_mut() {
            child.trim(max_suffixes);
        }
    }

    /// Pre-order flattening; children always follow their parent.
    fn flatten(self, out: &mut Vec<FlatNode>) -> usize {
        let index = out.len();
        out.push(FlatNode {
            children: Vec::new(),
            suffixes: self.suffixes,
        });
        let mut children = Vec::with_capacity(self.children.len());
        for (symbol, child) in self.children {
            children.push((symbol, child.flatten(out)));
        }
        out[index].children = children;
        index
    }
}

struct FlatNode {
    children: Vec<(u32, usize)>,
    suffixes: Vec<(u8, Vec<u32>)>,
}

impl FlatNode {
    fn size(&self, offsets: &[usize]) -> usize {
        let mut size = 0;
        let mut last = 0;
        for &(symbol, child) in &self.children {
            let offset = offsets[child];
            size += vlu_len(symbol) + vlu_len(offset.saturating_sub(last) as u32);
            last = offset;
        }
        if self.suffixes.is_empty() {
            return size + vlu_len(END_OF_PREFIXES_NO_SUFFIXES);
        }
        size += vlu_len(END_OF_PREFIXES_SUFFIXES_FOLLOW);
        for (_, rest) in &self.suffixes {
            size += 1 + rest.iter().map(|&c| vlu_len(c)).sum::<usize>() + 1;
        }
        size + 1
    }

    fn write(&self, offsets: &[usize], out: &mut Vec<u8>) {
        let mut last = 0;
        for &(symbol, child) in &self.children {
            let offset = offsets[child];
            put_vlu(out, symbol);
            put_vlu(out, (offset - last) as u32);
            last = offset;
        }
        if self.suffixes.is_empty() {
            put_vlu(out, END_OF_PREFIXES_NO_SUFFIXES);
            return;
        }
        put_vlu(out, END_OF_PREFIXES_SUFFIXES_FOLLOW);
        for (freq, rest) in &self.suffixes {
            out.push(*freq);
            for &c in rest {
                put_vlu(out, c);
            }
            put_vlu(out, 0);
        }
        out.push(0);
    }
}

pub struct DictionaryBuilder {
    prefix_limit: usize,
    bloom_units: usize,
    max_suffixes: usize,
    words: BTreeMap<String, u8>,
}

impl Default for DictionaryBuilder {
    fn default() -> Self {
        Self::from_config(&PredictionConfig::default())
    }
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PredictionConfig) -> Self {
        Self {
            prefix_limit: config.prefix_limit,
            bloom_units: config.bloom_filter_units,
            max_suffixes: config.max_suffixes_per_node,
            words: BTreeMap::new(),
        }
    }

    pub fn with_prefix_limit(mut self, limit: usize) -> Self {
        self.prefix_limit = limit;
        self
    }

    pub fn with_bloom_units(mut self, units: usize) -> Self {
        self.bloom_units = units;
        self
    }

    pub fn with_max_suffixes(mut self, max: usize) -> Self {
        self.max_suffixes = max;
        self
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Add a word; a repeated word keeps its highest frequency.
    pub fn add_word(&mut self, word: &str, freq: u32) {
        let word = word.trim();
        if word.is_empty() {
            return;
        }
        let freq = freq.clamp(1, 255) as u8;
        let entry = self.words.entry(word.to_string()).or_insert(freq);
        *entry = (*entry).max(freq);
    }

    /// Add every word of an XML or plain text word list. Returns how many
    /// entries were read.
    pub fn add_word_list(&mut self, text: &str) -> usize {
        let mut count = 0;
        if text.contains("<w") {
            let Some(re) = word_entry_regex() else {
                return 0;
            };
            for caps in re.captures_iter(text) {
                let freq = caps[1].parse::<u32>().unwrap_or(1);
                self.add_word(&unescape_xml(&caps[2]), freq);
                count += 1;
            }
            return count;
        }

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (word, freq) = match line.rsplit_once(char::is_whitespace) {
                Some((word, freq)) => match freq.parse::<u32>() {
                    Ok(freq) => (word.trim(), freq),
                    Err(_) => (line, 1),
                },
                None => (line, 1),
            };
            self.add_word(word, freq);
            count += 1;
        }
        count
    }

    pub fn add_word_list_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, Box<dyn Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(self.add_word_list(&text))
    }

    /// Build the blob.
    pub fn build(&self) -> Result<Vec<u8>, String> {
        if self.prefix_limit == 0 || self.prefix_limit > u8::MAX as usize {
            return Err(format!("prefix limit {} out of range", self.prefix_limit));
        }
        if !self.bloom_units.is_power_of_two() || self.bloom_units > u8::MAX as usize {
            return Err(format!("bloom filter units {} must be a power of two below 256", self.bloom_units));
        }

        let mut char_map = base_char_map();
        let mut diacritics: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        let mut accepted: Vec<(Vec<u32>, u8)> = Vec::with_capacity(self.words.len());
        'words: for (word, &freq) in &self.words {
            let codes: Vec<u32> = word.chars().map(u32::from).collect();
            for ch in word.chars() {
                if char_map.contains_key(&(ch as u32)) {
                    continue;
                }
                let base = ch.nfd().next().and_then(|b| char_map.get(&(b as u32)).copied());
                match base {
                    Some(base) => {
                        char_map.insert(ch as u32, base);
                        diacritics.entry(base).or_default().insert(ch as u32);
                    }
                    None => {
                        debug!("skipping {:?}: no base letter for {:?}", word, ch);
                        continue 'words;
                    }
                }
            }
            accepted.push((codes, freq));
        }
        if accepted.is_empty() {
            return Err("no usable words".to_string());
        }

        let mut out = vec![self.prefix_limit as u8, self.bloom_units as u8];
        for (base, marks) in &diacritics {
            put_vlu(&mut out, *base);
            for &mark in marks {
                put_vlu(&mut out, mark);
            }
            put_vlu(&mut out, 0);
        }
        put_vlu(&mut out, 0);

        let bloom_start = out.len();
        let bloom_size = self.bloom_units * BLOOM_UNIT;
        let mask = (bloom_size - 1) as u32;
        out.resize(bloom_start + bloom_size, 0);
        let mut root = Node::default();
        let mut base_codes = Vec::new();
        for (codes, freq) in &accepted {
            base_codes.clear();
            base_codes.extend(codes.iter().map(|c| char_map.get(c).copied().unwrap_or(*c)));
            for len in 1..=self.prefix_limit.min(base_codes.len()) {
                let (h1, h2) = bloom_hashes(&base_codes[..len]);
                for hash in [h1, h2] {
                    let (offset, bit) = bloom_slot(hash, mask);
                    out[bloom_start + offset] |= bit;
                }
            }
            root.insert(codes, 0, self.prefix_limit, *freq);
        }
        root.trim(self.max_suffixes.max(1));

        let mut nodes = Vec::new();
        root.flatten(&mut nodes);
        let trie_start = out.len();
        let offsets = layout(&nodes, trie_start)?;
        for node in &nodes {
            node.write(&offsets, &mut out);
        }

        let set_bits: u32 = out[bloom_start..bloom_start + bloom_size].iter().map(|b| b.count_ones()).sum();
        let fill = set_bits as f64 / (bloom_size * 8) as f64;
        if fill > 0.5 {
            warn!("bloom filter {:.0}% full, consider more filter units", fill * 100.0);
        }
        debug!(
            "built prediction dictionary: {} words, {} trie nodes, {} bytes",
            accepted.len(),
            nodes.len(),
            out.len()
        );
        Ok(out)
    }

    pub fn build_to_file<P: AsRef<Path>>(&self, path: P) -> Result<usize, Box<dyn Error>> {
        let blob = self.build()?;
        std::fs::write(path, &blob)?;
        Ok(blob.len())
    }
}

/// Absolute node offsets. Branch deltas are VLU coded, so node sizes depend
/// on the offsets; sizes only grow between passes, which bounds the loop.
fn layout(nodes: &[FlatNode], trie_start: usize) -> Result<Vec<usize>, String> {
    let mut offsets = vec![0usize; nodes.len()];
    loop {
        let mut next = Vec::with_capacity(nodes.len());
        let mut pos = trie_start;
        for node in nodes {
            next.push(pos);
            pos += node.size(&offsets);
        }
        if pos > u32::MAX as usize {
            return Err("prediction dictionary too large".to_string());
        }
        if next == offsets {
            return Ok(offsets);
        }
        offsets = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;

    fn codes(s: &str) -> Vec<u32> {
        s.chars().map(u32::from).collect()
    }

    #[test]
    fn plain_and_xml_word_lists() {
        let mut b = DictionaryBuilder::new();
        assert_eq!(b.add_word_list("# comment\nthe 200\nhello\n\nice cream 40\n"), 3);
        assert_eq!(b.len(), 3);
        let mut x = DictionaryBuilder::new();
        let xml = r#"<wordlist><w f="120" flags="">don&apos;t</w><w f="300">the</w></wordlist>"#;
        assert_eq!(x.add_word_list(xml), 2);
        let blob = x.build().unwrap();
        let dict = Dictionary::from_bytes(blob).unwrap();
        let words = dict.lookup_prefix(&codes("do"));
        assert_eq!(words[0].word, "don't");
        assert_eq!(words[0].freq, 120);
    }

    #[test]
    fn frequencies_clamped_and_deduplicated() {
        let mut b = DictionaryBuilder::new();
        b.add_word("the", 0);
        b.add_word("the", 900);
        let dict = Dictionary::from_bytes(b.build().unwrap()).unwrap();
        let words = dict.lookup_prefix(&codes("th"));
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].freq, 255);
    }

    #[test]
    fn diacritics_map_to_base_letters() {
        let mut b = DictionaryBuilder::new();
        b.add_word("café", 50);
        b.add_word("Élan", 40);
        b.add_word("bad#word", 10);
        let dict = Dictionary::from_bytes(b.build().unwrap()).unwrap();
        assert_eq!(dict.base_letter('é' as u32), Some('e' as u32));
        assert_eq!(dict.base_letter('É' as u32), Some('e' as u32));
        assert_eq!(dict.lookup_prefix(&codes("cafe"))[0].word, "café");
        assert_eq!(dict.lookup_prefix(&codes("el"))[0].word, "Élan");
        assert!(dict.lookup_prefix(&codes("bad")).is_empty());
    }

    #[test]
    fn suffix_lists_sorted_and_capped() {
        let mut b = DictionaryBuilder::new().with_max_suffixes(2);
        b.add_word("tea", 10);
        b.add_word("team", 30);
        b.add_word("tear", 20);
        let dict = Dictionary::from_bytes(b.build().unwrap()).unwrap();
        let words: Vec<String> = dict.lookup_prefix(&codes("te")).into_iter().map(|w| w.word).collect();
        assert_eq!(words, vec!["team", "tear"]);
    }

    #[test]
    fn prefixes_beyond_limit_are_not_in_trie() {
        let mut b = DictionaryBuilder::new().with_prefix_limit(3);
        b.add_word("prediction", 10);
        let dict = Dictionary::from_bytes(b.build().unwrap()).unwrap();
        assert_eq!(dict.prefix_limit(), 3);
        assert_eq!(dict.lookup_prefix(&codes("pre"))[0].word, "prediction");
        assert!(dict.lookup_prefix(&codes("pred")).is_empty());
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut b = DictionaryBuilder::new().with_bloom_units(3);
        b.add_word("a", 1);
        assert!(b.build().is_err());
        assert!(DictionaryBuilder::new().build().is_err());
    }
}
