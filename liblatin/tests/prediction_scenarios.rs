// liblatin/tests/prediction_scenarios.rs
//
// End-to-end prediction over blobs built from small word lists.
// Tests cover:
// - bloom filter has no false negatives for stored prefixes
// - nearby-key corrections rank below exact prefix matches
// - repeated calls give identical results
// - predict before initialization fails loudly
// - blobs written to and read from disk

use liblatin::{
    levenshtein_distance, Dictionary, DictionaryBuilder, KeyboardLayout, PredictError, PredictionConfig, Predictor,
    Variant,
};

const WORDS: &str = "the 10\n\
                     three 10\n\
                     they 40\n\
                     this 60\n\
                     there 30\n\
                     hello 50\n\
                     help 45\n\
                     world 70\n\
                     work 55\n\
                     café 20\n\
                     naïve 12\n";

fn blob() -> Vec<u8> {
    let mut builder = DictionaryBuilder::new();
    assert_eq!(builder.add_word_list(WORDS), 11);
    builder.build().expect("build")
}

fn ready_predictor() -> Predictor {
    let mut p = Predictor::new();
    p.set_dictionary(blob()).expect("dictionary");
    p.set_layout(&KeyboardLayout::qwerty());
    p
}

#[test]
fn bloom_filter_has_no_false_negatives() {
    let dict = Dictionary::from_bytes(blob()).expect("parse");
    for line in WORDS.lines() {
        let word = line.split_whitespace().next().unwrap();
        let base: Vec<u32> = word.chars().map(|c| dict.to_base(c as u32)).collect();
        for len in 1..=base.len().min(dict.prefix_limit()) {
            assert!(dict.bloom_contains(&base[..len]), "{} prefix {}", word, len);
            let found = dict.lookup_prefix(&base[..len]);
            assert!(found.iter().any(|w| w.word == word), "{} not under prefix {}", word, len);
        }
    }
}

#[test]
fn nearby_key_correction_ranks_below_exact_prefix() {
    // "three" matches "thr" as typed; "the" needs 'r' -> 'e', which are
    // neighbours on the QWERTY layout. Both have frequency 10.
    let mut builder = DictionaryBuilder::new();
    builder.add_word("the", 10);
    builder.add_word("three", 10);
    let mut p = Predictor::new();
    p.set_dictionary(builder.build().unwrap()).unwrap();
    p.set_layout(&KeyboardLayout::qwerty());

    let ranked = p.predict_ranked("thr").unwrap();
    let words: Vec<&str> = ranked.iter().map(|c| c.word.as_str()).collect();
    assert_eq!(words, vec!["three", "the"]);
    assert_eq!(ranked[0].variant, Variant::Prefix);
    assert_eq!(ranked[1].variant, Variant::EditDistance);
    assert!(ranked[0].rank > ranked[1].rank);
}

#[test]
fn results_capped_and_deterministic() {
    let p = ready_predictor();
    let first = p.predict("th").unwrap();
    assert_eq!(first.len(), 3);
    for _ in 0..5 {
        assert_eq!(p.predict("th").unwrap(), first);
    }
    assert_eq!(first[0], "this");
}

#[test]
fn accents_ignored_when_matching() {
    let p = ready_predictor();
    assert_eq!(p.predict("caf").unwrap()[0], "café");
    assert_eq!(p.predict("naiv").unwrap()[0], "naïve");
    assert_eq!(levenshtein_distance("naive", "naïve"), 1);
}

#[test]
fn capitalised_input_capitalises_results() {
    let p = ready_predictor();
    let out = p.predict("Wor").unwrap();
    assert_eq!(out[0], "World");
    assert!(out.iter().all(|w| w.starts_with('W')));
}

#[test]
fn configured_suggestion_count() {
    let mut config = PredictionConfig::default();
    config.set_max_suggestions(1);
    let mut p = Predictor::with_config(&config);
    p.set_dictionary(blob()).unwrap();
    p.set_layout(&KeyboardLayout::qwerty());
    assert_eq!(p.predict("th").unwrap().len(), 1);
}

#[test]
fn predict_requires_dictionary_and_layout() {
    let mut p = Predictor::new();
    assert_eq!(p.predict("th"), Err(PredictError::NotInitialized));
    p.set_dictionary(blob()).unwrap();
    assert_eq!(p.predict("th"), Err(PredictError::NotInitialized));
    p.set_layout(&KeyboardLayout::qwerty());
    assert!(p.predict("th").is_ok());
    assert_eq!(p.predict("").unwrap(), Vec::<String>::new());
}

#[test]
fn blob_file_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let list = dir.path().join("words.txt");
    std::fs::write(&list, WORDS).unwrap();
    let out = dir.path().join("en.dict");

    let mut builder = DictionaryBuilder::new();
    builder.add_word_list_file(&list).expect("read list");
    let size = builder.build_to_file(&out).expect("write blob");
    assert_eq!(std::fs::metadata(&out).unwrap().len() as usize, size);

    let mut p = Predictor::new();
    p.load_dictionary(&out).expect("load");
    p.set_layout(&KeyboardLayout::qwerty());
    assert_eq!(p.predict("hel").unwrap()[0], "hello");
    assert_eq!(Dictionary::from_bytes(std::fs::read(&out).unwrap()).unwrap().size(), size);
}
