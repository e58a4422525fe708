use anyhow::{Context, Result};
use libpinyin::{Engine, PinyinConfig, RecordingGlue, TermDatabase};
use pinyinime_core::{CandidateKind, MatrixSearch};
use std::path::Path;

use crate::lib_error;

pub struct Options<'a> {
    pub config: Option<&'a Path>,
    pub user_dict: Option<&'a Path>,
    pub choose: &'a [usize],
    pub limit: usize,
}

fn load_config(opts: &Options) -> Result<PinyinConfig> {
    let mut config = match opts.config {
        Some(path) => PinyinConfig::load_toml(path)
            .map_err(lib_error)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PinyinConfig::default(),
    };
    if let Some(path) = opts.user_dict {
        config.base_mut().set_user_dict_path(Some(path));
    }
    Ok(config)
}

fn print_decoder_state(ms: &MatrixSearch, limit: usize) {
    println!(
        "  spellings: {} (fixed {})",
        ms.get_pystr(true),
        ms.get_fixed_len()
    );
    for (i, cand) in ms.get_candidates().iter().take(limit).enumerate() {
        let kind = match cand.kind {
            CandidateKind::Sentence => "sentence",
            CandidateKind::Lemma { .. } => "lemma",
            CandidateKind::Raw => "raw",
        };
        println!("  [{}] {}\t{:.1}\t{}", i, cand.text, cand.score, kind);
    }
}

/// Decode with the matrix decoder over a compiled dictionary.
pub fn run_decoder(dict: &Path, inputs: &[String], opts: &Options) -> Result<()> {
    let config = load_config(opts)?;
    let mut ms = MatrixSearch::open(dict, config.into_base())
        .map_err(lib_error)
        .with_context(|| format!("opening {}", dict.display()))?;

    for input in inputs {
        let parsed = ms.search(input);
        println!("{} ({} chars decoded)", input, parsed);
        print_decoder_state(&ms, opts.limit);

        for &id in opts.choose {
            if id >= ms.get_candidate_num() {
                eprintln!("  no candidate {}", id);
                break;
            }
            let left = ms.choose(id);
            println!("  chose {}, {} candidates left", id, left);
            print_decoder_state(&ms, opts.limit);
        }

        if ms.get_fixed_len() == ms.get_spl_ids().len() {
            if let Some(done) = ms.get_candidate(0) {
                let predicts = ms.get_predicts(&done.text);
                if !predicts.is_empty() {
                    println!("  predictions: {}", predicts.join(" "));
                }
            }
        }
        ms.reset_search();
    }
    ms.close().map_err(lib_error)?;
    Ok(())
}

/// Type each input into the keyboard engine over a JSON term list and print
/// the candidate bar after the last key.
pub fn run_terms(terms: &Path, store: Option<&Path>, inputs: &[String], opts: &Options) -> Result<()> {
    let config = load_config(opts)?;
    let db = TermDatabase::open(terms, store, &config)
        .map_err(lib_error)
        .with_context(|| format!("opening {}", terms.display()))?;
    let mut engine = Engine::new(db, RecordingGlue::new(), config);
    engine.init();

    for input in inputs {
        for ch in input.chars() {
            engine.handle_key(ch as i32);
        }
        println!("{}", input);
        for (i, cand) in engine.candidates().iter().take(opts.limit).enumerate() {
            println!("  [{}] {}\t{}", i, cand.text, cand.syllables);
        }
        for &id in opts.choose {
            let Some(cand) = engine.candidates().get(id).cloned() else {
                eprintln!("  no candidate {}", id);
                break;
            };
            engine.select(&cand.text, &cand.syllables);
            println!("  chose {}: pending {:?}", cand.text, engine.pending());
            for (i, cand) in engine.candidates().iter().take(opts.limit).enumerate() {
                println!("  [{}] {}\t{}", i, cand.text, cand.syllables);
            }
        }
        let committed = engine.glue().committed();
        if !committed.is_empty() {
            println!("  committed: {}", committed);
        }
        engine.empty();
        engine.glue_mut().events.clear();
    }
    Ok(())
}
