//! Unigram scoring with a vector-quantized frequency codebook.
//!
//! Every system lemma's normalized frequency is assigned to one of at most
//! `CODEBOOK_SIZE` codewords, refined Lloyd-style. Codewords are stored as
//! fixed-point scores `ln(p) * LOG_VALUE_AMPLIFIER`; since the amplifier is
//! negative, lower scores mean higher probability.
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

use crate::dict_def::{LemmaId, SYS_DICT_TOTAL_FREQ};

pub const CODEBOOK_SIZE: usize = 256;
pub const MAX_SCORE: f32 = 0x3fff as f32;
pub const LOG_VALUE_AMPLIFIER: f64 = -800.0;

/// Frequency substituted for lemmas with zero or negative frequency.
const MIN_FREQ: f64 = 0.3;
const MAX_ITERATIONS: usize = 1000;

/// Convert a probability to a fixed-point score.
pub fn convert_psb_to_score(psb: f64) -> f32 {
    let score = psb.ln() * LOG_VALUE_AMPLIFIER;
    if !score.is_finite() || score > MAX_SCORE as f64 {
        MAX_SCORE
    } else {
        score as f32
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NGram {
    /// Score of each codeword.
    freq_codes: Vec<f32>,
    /// Codeword index per lemma id.
    lma_freq_idx: Vec<u8>,
    /// f32 bits of the score added to every system lemma.
    #[serde(skip)]
    sys_score_compensation: AtomicU32,
}

impl Clone for NGram {
    fn clone(&self) -> Self {
        Self {
            freq_codes: self.freq_codes.clone(),
            lma_freq_idx: self.lma_freq_idx.clone(),
            sys_score_compensation: AtomicU32::new(
                self.sys_score_compensation.load(Ordering::Relaxed),
            ),
        }
    }
}

impl NGram {
    /// Build the codebook from `(lemma_id, freq)` pairs. Ids must be below
    /// `next_id`; an id seen twice keeps its first frequency.
    pub fn build_unigram(lemmas: &[(LemmaId, f64)], next_id: usize) -> Self {
        let mut freqs = vec![0.0f64; next_id.max(1)];
        let mut seen = vec![false; freqs.len()];
        freqs[0] = MIN_FREQ;
        seen[0] = true;
        let mut total = MIN_FREQ;

        for &(id, freq) in lemmas {
            let idx = id as usize;
            if idx >= freqs.len() || seen[idx] {
                continue;
            }
            let f = if freq <= 0.0 { MIN_FREQ } else { freq };
            freqs[idx] = f;
            seen[idx] = true;
            total += f;
        }
        for (f, s) in freqs.iter_mut().zip(&seen) {
            *f = if *s { *f / total } else { MIN_FREQ / total };
        }

        // Initial codebook: the first distinct frequencies, sorted.
        let mut code_book: Vec<f64> = Vec::with_capacity(CODEBOOK_SIZE);
        for &f in &freqs {
            if code_book.len() >= CODEBOOK_SIZE {
                break;
            }
            if !code_book.iter().any(|&c| c == f) {
                code_book.push(f);
            }
        }
        code_book.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mut code_idx = vec![0u8; freqs.len()];
        let iterations = iterate_codes(&freqs, &mut code_book, &mut code_idx);
        debug!(
            lemmas = freqs.len(),
            codes = code_book.len(),
            iterations,
            "unigram codebook built"
        );

        Self {
            freq_codes: code_book.iter().map(|&c| convert_psb_to_score(c)).collect(),
            lma_freq_idx: code_idx,
            sys_score_compensation: AtomicU32::new(0f32.to_bits()),
        }
    }

    /// Score of a system lemma, including the current compensation.
    pub fn get_uni_psb(&self, id: LemmaId) -> f32 {
        let base = self
            .lma_freq_idx
            .get(id as usize)
            .and_then(|&k| self.freq_codes.get(k as usize))
            .copied()
            .unwrap_or(MAX_SCORE);
        base + self.compensation()
    }

    /// Re-calibrate system scores against a non-system frequency mass.
    pub fn set_total_freq_none_sys(&self, freq_none_sys: u64) {
        let comp = if freq_none_sys == 0 {
            0.0
        } else {
            let factor = SYS_DICT_TOTAL_FREQ / (SYS_DICT_TOTAL_FREQ + freq_none_sys as f64);
            (factor.ln() * LOG_VALUE_AMPLIFIER) as f32
        };
        self.sys_score_compensation.store(comp.to_bits(), Ordering::Relaxed);
    }

    pub fn compensation(&self) -> f32 {
        f32::from_bits(self.sys_score_compensation.load(Ordering::Relaxed))
    }

    pub fn codebook_len(&self) -> usize {
        self.freq_codes.len()
    }

    pub fn lemma_count(&self) -> usize {
        self.lma_freq_idx.len()
    }
}

fn distance(freq: f64, code: f64) -> f64 {
    freq * (freq.ln() - code.ln()).abs()
}

/// Index of the codeword nearest to `freq` in a sorted codebook.
fn qsearch_nearest(code_book: &[f64], freq: f64) -> usize {
    let pos = code_book.partition_point(|&c| c < freq);
    if pos == 0 {
        return 0;
    }
    if pos >= code_book.len() {
        return code_book.len() - 1;
    }
    if distance(freq, code_book[pos - 1]) <= distance(freq, code_book[pos]) {
        pos - 1
    } else {
        pos
    }
}

fn update_code_idx(freqs: &[f64], code_book: &[f64], code_idx: &mut [u8]) -> f64 {
    let mut delta = 0.0;
    for (i, &f) in freqs.iter().enumerate() {
        let k = qsearch_nearest(code_book, f);
        code_idx[i] = k as u8;
        delta += distance(f, code_book[k]);
    }
    delta
}

fn recalculate_kernel(freqs: &[f64], code_idx: &[u8], code_book: &mut [f64]) {
    let mut sums = vec![0.0f64; code_book.len()];
    let mut counts = vec![0usize; code_book.len()];
    for (&f, &k) in freqs.iter().zip(code_idx) {
        sums[k as usize] += f;
        counts[k as usize] += 1;
    }
    for k in 0..code_book.len() {
        if counts[k] > 0 {
            code_book[k] = sums[k] / counts[k] as f64;
        }
    }
    code_book.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

/// Lloyd iterations until the total distortion stops changing.
fn iterate_codes(freqs: &[f64], code_book: &mut [f64], code_idx: &mut [u8]) -> usize {
    let mut iter = 0usize;
    let mut delta_last = 0.0f64;
    loop {
        iter += 1;
        let delta = update_code_idx(freqs, code_book, code_idx);
        if iter > 1 && (delta == 0.0 || ((delta_last - delta).abs() / delta.abs()) < 1e-9) {
            break;
        }
        if iter >= MAX_ITERATIONS {
            break;
        }
        recalculate_kernel(freqs, code_idx, code_book);
        delta_last = delta;
    }
    iter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequent_lemmas_score_lower() {
        let lemmas = vec![(1, 1000.0), (2, 10.0), (3, 0.0)];
        let ng = NGram::build_unigram(&lemmas, 4);
        assert_eq!(ng.lemma_count(), 4);
        assert!(ng.get_uni_psb(1) < ng.get_uni_psb(2));
        assert!(ng.get_uni_psb(2) < ng.get_uni_psb(3));
        assert!(ng.get_uni_psb(1) > 0.0);
    }

    #[test]
    fn unknown_id_gets_max_score() {
        let ng = NGram::build_unigram(&[(1, 5.0)], 2);
        assert_eq!(ng.get_uni_psb(99), MAX_SCORE);
    }

    #[test]
    fn codebook_is_bounded() {
        let lemmas: Vec<(LemmaId, f64)> = (1..2000).map(|i| (i as LemmaId, i as f64)).collect();
        let ng = NGram::build_unigram(&lemmas, 2000);
        assert!(ng.codebook_len() <= CODEBOOK_SIZE);
        assert!(ng.get_uni_psb(1999) <= ng.get_uni_psb(1));
    }

    #[test]
    fn compensation_raises_system_scores() {
        let ng = NGram::build_unigram(&[(1, 50.0), (2, 5.0)], 3);
        let before = ng.get_uni_psb(1);
        ng.set_total_freq_none_sys(100_000_000);
        let after = ng.get_uni_psb(1);
        assert!((after - before - (2f64.ln() * 800.0) as f32).abs() < 0.01);
        ng.set_total_freq_none_sys(0);
        assert_eq!(ng.get_uni_psb(1), before);
    }

    #[test]
    fn score_conversion_caps() {
        assert_eq!(convert_psb_to_score(0.0), MAX_SCORE);
        assert!((convert_psb_to_score(1.0)).abs() < 1e-6);
    }
}
