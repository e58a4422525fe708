use anyhow::{Context, Result};
use pinyinime_core::{AtomDict, DictBuilder, DictTrie};
use std::path::Path;

use crate::lib_error;

pub fn run(input: &Path, out: &Path, valid_hanzi: Option<&Path>) -> Result<()> {
    let mut builder = DictBuilder::new();
    if let Some(path) = valid_hanzi {
        let hanzis = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        builder = builder.with_valid_hanzis(&hanzis);
    }

    let data = builder
        .build_dict_from_file(input)
        .map_err(lib_error)
        .with_context(|| format!("building dictionary from {}", input.display()))?;
    let dict = DictTrie::from_data(data).map_err(|e| anyhow::anyhow!(e))?;
    dict.save_dict(out).map_err(lib_error).context("saving dictionary")?;

    println!("Wrote {} lemmas to {}", dict.number_of_lemmas(), out.display());
    Ok(())
}
