//! Read-only view of a prediction dictionary blob.
//!
//! Layout, in order:
//! - `prefix_limit: u8`, `bloom_size / 65536: u8`
//! - diacritic table: `base, diacritic.., 0` groups as VLUs, closed by a 0 base
//! - bloom filter bytes
//! - prefix trie, root first. A node is a list of `(symbol, offset delta)`
//!   VLU pairs, each delta relative to the previous branch's absolute offset,
//!   closed by `&`, or by `#` and a suffix list of `freq: u8` + 0-terminated
//!   VLU string entries ending with a zero frequency.
use ahash::AHashMap;
use tracing::{debug, trace};

use crate::codec::{
    bloom_hashes, bloom_slot, get_vlu, BASE_LETTERS, END_OF_PREFIXES_NO_SUFFIXES,
    END_OF_PREFIXES_SUFFIXES_FOLLOW,
};
use crate::error::PredictError;

/// Bloom filter sizes are stored in units of this many bytes.
pub const BLOOM_UNIT: usize = 65536;

/// A word found in the trie with its stored frequency (1..=255).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordFreq {
    pub word: String,
    pub freq: u8,
}

/// Lower case letters, digits and a few punctuation marks map to themselves.
pub(crate) fn base_char_map() -> AHashMap<u32, u32> {
    let mut map = AHashMap::new();
    for ch in BASE_LETTERS.chars() {
        map.insert(ch as u32, ch as u32);
        for upper in ch.to_uppercase() {
            map.insert(upper as u32, ch as u32);
        }
    }
    map
}

#[derive(Debug, Clone)]
pub struct Dictionary {
    data: Vec<u8>,
    prefix_limit: usize,
    bloom_size: usize,
    bloom_mask: u32,
    char_map: AHashMap<u32, u32>,
    /// Offset of the bloom filter; the trie follows it.
    start: usize,
}

fn bad(msg: &str) -> PredictError {
    PredictError::BadDictionary(msg.to_string())
}

impl Dictionary {
    /// Parse the header and diacritic table. The rest of the blob is kept as
    /// is and read on demand.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, PredictError> {
        if data.len() < 2 {
            return Err(bad("truncated header"));
        }
        let prefix_limit = data[0] as usize;
        if prefix_limit == 0 {
            return Err(bad("zero prefix limit"));
        }
        let bloom_size = data[1] as usize * BLOOM_UNIT;
        if !bloom_size.is_power_of_two() {
            return Err(bad("bloom filter size is not a power of two"));
        }

        let mut char_map = base_char_map();
        let mut pos = 2;
        loop {
            let base = get_vlu(&data, &mut pos).ok_or_else(|| bad("truncated diacritic table"))?;
            if base == 0 {
                break;
            }
            loop {
                let diacritic = get_vlu(&data, &mut pos).ok_or_else(|| bad("truncated diacritic table"))?;
                if diacritic == 0 {
                    break;
                }
                char_map.insert(diacritic, base);
            }
        }

        let start = pos;
        if data.len() <= start + bloom_size {
            return Err(bad("bloom filter or trie missing"));
        }
        debug!(
            "prediction dictionary: {} bytes, prefix limit {}, bloom filter {} bytes",
            data.len(),
            prefix_limit,
            bloom_size
        );
        Ok(Self {
            data,
            prefix_limit,
            bloom_size,
            bloom_mask: (bloom_size - 1) as u32,
            char_map,
            start,
        })
    }

    pub fn prefix_limit(&self) -> usize {
        self.prefix_limit
    }

    pub fn bloom_size(&self) -> usize {
        self.bloom_size
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Base letter for a character code, if the dictionary knows it.
    pub fn base_letter(&self, code: u32) -> Option<u32> {
        self.char_map.get(&code).copied()
    }

    /// Base letter, or the code itself when it has none.
    pub fn to_base(&self, code: u32) -> u32 {
        self.base_letter(code).unwrap_or(code)
    }

    fn filter(&self, hash: u32) -> bool {
        let (offset, bit) = bloom_slot(hash, self.bloom_mask);
        self.data[self.start + offset] & bit != 0
    }

    /// Whether the filter may contain the base-letter prefix. Never false for
    /// a prefix that is in the trie.
    pub fn bloom_contains(&self, codes: &[u32]) -> bool {
        let (h1, h2) = bloom_hashes(codes);
        self.filter(h1) && self.filter(h2)
    }

    /// Every word whose first characters map to `prefix`. Words may differ
    /// from it in case and diacritics.
    pub fn lookup_prefix(&self, prefix: &[u32]) -> Vec<WordFreq> {
        let mut result = Vec::new();
        if prefix.is_empty() {
            return result;
        }
        let mut path = Vec::with_capacity(prefix.len());
        if self
            .search_prefix(prefix, &mut path, self.start + self.bloom_size, &mut result)
            .is_none()
        {
            debug!("prediction trie truncated while looking up {:?}", prefix);
        }
        result
    }

    fn search_prefix(
        &self,
        prefix: &[u32],
        path: &mut Vec<u32>,
        mut pos: usize,
        result: &mut Vec<WordFreq>,
    ) -> Option<()> {
        let wanted = prefix[path.len()];
        let mut last = 0u32;
        loop {
            let symbol = get_vlu(&self.data, &mut pos)?;
            if symbol == END_OF_PREFIXES_NO_SUFFIXES || symbol == END_OF_PREFIXES_SUFFIXES_FOLLOW {
                return Some(());
            }
            let offset = get_vlu(&self.data, &mut pos)?.checked_add(last)?;
            if self.base_letter(symbol) == Some(wanted) {
                path.push(symbol);
                let found = if path.len() == prefix.len() {
                    trace!("prefix node at {}", offset);
                    self.add_suffixes(path, offset as usize, result)
                } else {
                    self.search_prefix(prefix, path, offset as usize, result)
                };
                path.pop();
                found?;
            }
            last = offset;
        }
    }

    fn add_suffixes(&self, path: &[u32], mut pos: usize, result: &mut Vec<WordFreq>) -> Option<()> {
        let stem: String = path.iter().map(|&c| char::from_u32(c)).collect::<Option<String>>()?;
        loop {
            let symbol = get_vlu(&self.data, &mut pos)?;
            if symbol == END_OF_PREFIXES_NO_SUFFIXES {
                return Some(());
            }
            if symbol == END_OF_PREFIXES_SUFFIXES_FOLLOW {
                loop {
                    let freq = *self.data.get(pos)?;
                    pos += 1;
                    if freq == 0 {
                        return Some(());
                    }
                    let mut word = stem.clone();
                    loop {
                        let code = get_vlu(&self.data, &mut pos)?;
                        if code == 0 {
                            break;
                        }
                        word.push(char::from_u32(code)?);
                    }
                    result.push(WordFreq { word, freq });
                }
            }
            // branch offset, not needed here
            get_vlu(&self.data, &mut pos)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_headers() {
        assert!(matches!(Dictionary::from_bytes(vec![]), Err(PredictError::BadDictionary(_))));
        assert!(Dictionary::from_bytes(vec![6, 3, 0]).is_err());
        assert!(Dictionary::from_bytes(vec![0, 1, 0]).is_err());
        // bloom filter shorter than the header claims
        assert!(Dictionary::from_bytes(vec![6, 1, 0, 0, 0]).is_err());
    }

    #[test]
    fn reads_minimal_blob() {
        let mut data = vec![4, 1];
        // é -> e
        data.extend_from_slice(&[b'e', 0xe9, 0x01, 0, 0]);
        data.extend(std::iter::repeat(0).take(BLOOM_UNIT));
        data.push(b'&');
        let dict = Dictionary::from_bytes(data).unwrap();
        assert_eq!(dict.prefix_limit(), 4);
        assert_eq!(dict.base_letter('é' as u32), Some('e' as u32));
        assert_eq!(dict.base_letter('Q' as u32), Some('q' as u32));
        assert_eq!(dict.base_letter('!' as u32), None);
        assert!(!dict.bloom_contains(&['a' as u32]));
        assert!(dict.lookup_prefix(&['a' as u32]).is_empty());
    }
}
