// core/tests/decoder_scenarios.rs
//
// End-to-end decoder behavior on small dictionaries built in memory.
//
// Tests cover:
// - whole-input conversion and the raw-text fallback
// - repeated and incremental searches
// - fixing progress through choose()
// - decoding stops at chars that are neither letters nor splitters
// - shared system dictionary across sessions

use pinyinime_core::{CandidateKind, Config, DictBuilder, DictTrie, MatrixSearch, UserDict};

const RAW: &str = "北 800 0 bei\n\
                   京 500 0 jing\n\
                   背 300 0 bei\n\
                   景 200 0 jing\n\
                   市 400 0 shi\n\
                   是 900 0 shi\n\
                   中 700 0 zhong\n\
                   国 600 0 guo\n\
                   北京 100 0 bei jing\n\
                   背景 90 0 bei jing\n\
                   北京市 80 0 bei jing shi\n\
                   中国 300 0 zhong guo\n";

fn dict(raw: &str) -> DictTrie {
    let data = DictBuilder::new().build_dict(raw).expect("build dictionary");
    DictTrie::from_data(data).expect("load dictionary")
}

fn session(dict: DictTrie) -> MatrixSearch {
    let user = UserDict::new_in_memory(dict.spelling_trie());
    MatrixSearch::new(dict, Some(user), Config::default())
}

fn texts(ms: &MatrixSearch) -> Vec<String> {
    ms.get_candidates().iter().map(|c| c.text.clone()).collect()
}

#[test]
fn single_lemma_dictionary_converts_whole_input() {
    let mut ms = session(dict("北京 100 0 bei jing\n"));
    assert_eq!(ms.search("beijing"), 7);
    assert_eq!(ms.get_candidate(0).map(|c| c.text.as_str()), Some("北京"));
}

#[test]
fn abbreviation_without_match_falls_back_to_raw_text() {
    let mut ms = session(dict("北京 100 0 bei jing\n"));
    ms.search("b");
    let raw = ms.get_candidates().iter().find(|c| c.is_raw()).expect("raw fallback");
    assert_eq!(raw.text, "b");

    // choosing the raw text changes nothing
    ms.choose(0);
    assert_eq!(ms.get_fixed_len(), 0);
}

#[test]
fn abbreviated_input_matches_lemmas() {
    let mut ms = session(dict(RAW));
    ms.search("bj");
    assert!(texts(&ms).contains(&"北京".to_string()));

    let mut config = Config::default();
    config.set_szm(false, true);
    let d = dict(RAW);
    let mut strict = MatrixSearch::new(d, None, config);
    strict.search("bj");
    assert!(!texts(&strict).contains(&"北京".to_string()));
}

#[test]
fn searching_twice_gives_same_candidates() {
    let mut ms = session(dict(RAW));
    ms.search("zhongguobeijing");
    let first = ms.get_candidates().to_vec();
    ms.search("zhongguobeijing");
    assert_eq!(ms.get_candidates(), first.as_slice());
}

#[test]
fn incremental_search_matches_cold_search() {
    let d = dict(RAW);
    let mut warm = session(d.share());
    let mut cold = session(d);

    warm.search("zhongguo");
    warm.search("zhongguobeijingshi");
    cold.reset_search();
    cold.search("zhongguobeijingshi");

    assert_eq!(warm.get_candidates(), cold.get_candidates());
    assert_eq!(warm.get_spl_start(), cold.get_spl_start());
    assert_eq!(warm.get_lemma_ids(), cold.get_lemma_ids());

    // shrinking the input behaves the same way
    warm.search("zhongguobei");
    cold.reset_search();
    cold.search("zhongguobei");
    assert_eq!(warm.get_candidates(), cold.get_candidates());
}

#[test]
fn choose_makes_progress_until_fully_fixed() {
    let mut ms = session(dict(RAW));
    ms.search("zhongguobeijing");
    let mut fixed = ms.get_fixed_len();
    for _ in 0..10 {
        let lemma = ms
            .get_candidates()
            .iter()
            .position(|c| matches!(c.kind, CandidateKind::Lemma { .. }));
        let Some(pos) = lemma else {
            break;
        };
        ms.choose(pos);
        assert!(ms.get_fixed_len() > fixed);
        fixed = ms.get_fixed_len();
    }
    if ms.get_candidate_num() > 1 || ms.get_fixed_len() < 4 {
        ms.choose(0);
    }
    assert_eq!(ms.get_fixed_len(), 4);
    assert_eq!(ms.get_candidate_num(), 1);

    // fully fixed: choosing again keeps the state
    ms.choose(0);
    assert_eq!(ms.get_fixed_len(), 4);
}

#[test]
fn too_many_spellings_are_cut() {
    let mut ms = session(dict(RAW));
    ms.search("shishishishishishishishishishi");
    assert!(ms.get_spl_start().len() - 1 <= 9);
    assert!(ms.get_pystr(false).len() < 30);
}

#[test]
fn sessions_share_one_dictionary() {
    let d = dict(RAW);
    let mut a = session(d.share());
    let mut b = session(d.share());
    a.search("beijing");
    b.search("zhongguo");
    a.search("beijingshi");
    assert_eq!(b.get_candidate(0).map(|c| c.text.as_str()), Some("中国"));
    assert!(texts(&a).contains(&"北京市".to_string()));
}

#[test]
fn predictions_after_commit() {
    let ms = session(dict(RAW));
    let predicts = ms.get_predicts("中");
    assert_eq!(predicts.first().map(String::as_str), Some("国"));
    assert!(ms.get_predicts("北京").contains(&"市".to_string()));
}

#[test]
fn decoding_stops_at_unparseable_char() {
    let mut ms = session(dict(RAW));
    assert_eq!(ms.search("bei1jing"), 3);
    assert_eq!(ms.get_pystr(false), "bei1jing");
    assert_eq!(ms.get_pystr(true), "bei");
    assert_eq!(ms.get_spl_start(), &[0, 3]);
    assert_eq!(ms.get_candidate(0).map(|c| c.text.as_str()), Some("北"));
    assert!(!texts(&ms).contains(&"北京".to_string()));

    // non-ASCII input is kept, not skipped
    assert_eq!(ms.search("bei中jing"), 3);
    assert_eq!(ms.get_pystr(false), "bei中jing");
    assert_eq!(ms.get_pystr(true), "bei");

    // only the splitter lets decoding go on
    assert_eq!(ms.search("bei'jing"), 8);
    assert_eq!(ms.get_candidate(0).map(|c| c.text.as_str()), Some("北京"));
}

#[test]
fn repeated_edits_give_cold_results() {
    let d = dict(RAW);
    let mut warm = session(d.share());
    let mut cold = session(d);
    for _ in 0..60 {
        warm.search("zhongguobeijingshi");
        warm.search("zhongguo");
        warm.del_search(0, true, false);
        warm.search("bei");
    }
    warm.search("beijingshi");
    cold.search("beijingshi");
    assert_eq!(warm.get_candidates(), cold.get_candidates());
    assert_eq!(warm.get_lemma_ids(), cold.get_lemma_ids());
}
