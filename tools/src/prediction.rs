use anyhow::{Context, Result};
use liblatin::{DictionaryBuilder, KeyboardLayout, PredictionConfig, Predictor};
use std::path::Path;

use crate::lib_error;

fn load_config(path: Option<&Path>) -> Result<PredictionConfig> {
    match path {
        Some(path) => PredictionConfig::load_toml(path)
            .map_err(lib_error)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(PredictionConfig::default()),
    }
}

pub fn build(input: &Path, out: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let mut builder = DictionaryBuilder::from_config(&config);
    let read = builder
        .add_word_list_file(input)
        .map_err(lib_error)
        .with_context(|| format!("reading {}", input.display()))?;
    let size = builder.build_to_file(out).map_err(lib_error).context("building prediction dictionary")?;
    println!(
        "Read {} entries ({} distinct words), wrote {} bytes to {}",
        read,
        builder.len(),
        size,
        out.display()
    );
    Ok(())
}

pub fn predict(dict: &Path, layout: Option<&Path>, config: Option<&Path>, words: &[String], verbose: bool) -> Result<()> {
    let config = load_config(config)?;
    let layout = match layout {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<KeyboardLayout>(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => KeyboardLayout::qwerty(),
    };

    let mut predictor = Predictor::with_config(&config);
    predictor
        .load_dictionary(dict)
        .map_err(lib_error)
        .with_context(|| format!("loading {}", dict.display()))?;
    predictor.set_layout(&layout);

    for word in words {
        if verbose {
            println!("{}:", word);
            for p in predictor.predict_ranked(word)? {
                println!("  {}\tfreq {}\tdistance {}\t{:?}\trank {:.1}", p.word, p.freq, p.distance, p.variant, p.rank);
            }
        } else {
            println!("{}: {}", word, predictor.predict(word)?.join(" "));
        }
    }
    Ok(())
}
