//! Primitives shared by the dictionary reader and builder: variable length
//! integers, trie markers and the two bloom filter hashes.

/// Branch list ends and a suffix list follows.
pub const END_OF_PREFIXES_SUFFIXES_FOLLOW: u32 = b'#' as u32;
/// Branch list ends, no suffixes at this node.
pub const END_OF_PREFIXES_NO_SUFFIXES: u32 = b'&' as u32;

/// Characters every dictionary maps to themselves. Their upper case forms
/// map to the lower case ones.
pub const BASE_LETTERS: &str = "0123456789abcdefghijklmnopqrstuvwxyz'- ";

/// Append `value` as a little-endian base-128 integer; the high bit of each
/// byte marks a continuation.
pub fn put_vlu(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn vlu_len(value: u32) -> usize {
    let mut len = 1;
    let mut v = value >> 7;
    while v != 0 {
        len += 1;
        v >>= 7;
    }
    len
}

/// Read a variable length integer at `*pos`, advancing it.
/// `None` on truncation or overflow.
pub fn get_vlu(data: &[u8], pos: &mut usize) -> Option<u32> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *data.get(*pos)?;
        *pos += 1;
        if shift > 28 {
            return None;
        }
        value |= ((byte & 0x7f) as u32) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
}

/// Both bloom filter hashes of a code sequence.
///
/// `h1 = h1 * 33 + ch` and `h2 = h2 * 73 ^ ch`, wrapping at 32 bits.
pub fn bloom_hashes(codes: &[u32]) -> (u32, u32) {
    let mut h1: u32 = 0;
    let mut h2: u32 = 0xdead_beef;
    for &ch in codes {
        h1 = h1.wrapping_mul(33).wrapping_add(ch);
        h2 = h2.wrapping_mul(73) ^ ch;
    }
    (h1, h2)
}

/// Byte index and bit mask of a hash in a filter of `mask + 1` bytes.
pub fn bloom_slot(hash: u32, mask: u32) -> (usize, u8) {
    (((hash >> 3) & mask) as usize, 1u8 << (hash & 7))
}
