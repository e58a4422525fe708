mod build_dict;
mod prediction;
mod search;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Build and query the pinyin and prediction dictionaries.
#[derive(Parser)]
#[command(name = "pinyinime", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a raw pinyin dictionary (`hanzi freq gbk_flag py1 py2 ...`).
    BuildDict {
        input: PathBuf,
        #[arg(long, default_value = "dict_pinyin.bin")]
        out: PathBuf,
        /// File listing the hanzi lemmas may use.
        #[arg(long)]
        valid_hanzi: Option<PathBuf>,
    },
    /// Decode pinyin strings and print candidates.
    Search {
        /// Pinyin inputs, decoded one after another.
        #[arg(required = true)]
        pinyin: Vec<String>,
        /// Compiled dictionary from `build-dict`.
        #[arg(long, required_unless_present = "terms")]
        dict: Option<PathBuf>,
        /// JSON term list; uses the keyboard engine instead of the decoder.
        #[arg(long, conflicts_with = "dict")]
        terms: Option<PathBuf>,
        /// redb file that keeps the term list between runs (with --terms).
        #[arg(long, requires = "terms")]
        term_store: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        user_dict: Option<PathBuf>,
        /// Candidate ids to choose, in order, after decoding.
        #[arg(long, num_args = 1..)]
        choose: Vec<usize>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Compile a word list (Android XML or `word freq` lines) into a
    /// prediction blob.
    BuildPrediction {
        input: PathBuf,
        #[arg(long, default_value = "predictions.dict")]
        out: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print predictions for partly typed words.
    Predict {
        #[arg(required = true)]
        words: Vec<String>,
        #[arg(long)]
        dict: PathBuf,
        /// Keyboard layout as JSON; QWERTY when omitted.
        #[arg(long)]
        layout: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print rank details.
        #[arg(long)]
        verbose: bool,
    },
}

/// Library loaders report `Box<dyn Error>`, which is not `Send`.
pub(crate) fn lib_error(e: Box<dyn std::error::Error>) -> anyhow::Error {
    anyhow::anyhow!("{}", e)
}

fn main() -> Result<()> {
    match Args::parse().command {
        Command::BuildDict { input, out, valid_hanzi } => build_dict::run(&input, &out, valid_hanzi.as_deref()),
        Command::Search {
            pinyin,
            dict,
            terms,
            term_store,
            config,
            user_dict,
            choose,
            limit,
        } => {
            let opts = search::Options {
                config: config.as_deref(),
                user_dict: user_dict.as_deref(),
                choose: &choose,
                limit,
            };
            match (dict, terms) {
                (_, Some(terms)) => search::run_terms(&terms, term_store.as_deref(), &pinyin, &opts),
                (Some(dict), None) => search::run_decoder(&dict, &pinyin, &opts),
                (None, None) => anyhow::bail!("either --dict or --terms is required"),
            }
        }
        Command::BuildPrediction { input, out, config } => prediction::build(&input, &out, config.as_deref()),
        Command::Predict {
            words,
            dict,
            layout,
            config,
            verbose,
        } => prediction::predict(&dict, layout.as_deref(), config.as_deref(), &words, verbose),
    }
}
