// Segmentation vectors for the pinyin buffer parser
//
// Purpose:
// - Check that every letters-and-apostrophes input has a segmentation that
//   spells the input back.
// - Check that results are ordered by incompleteness.
// - Pin down a few well-known ambiguous inputs.
//
// File: libpinyin/tests/segmentation_vectors.rs

use libpinyin::parser::incompleteness;
use libpinyin::{PinyinParser, Segment, SyllableKind};

const INPUTS: &[&str] = &[
    "a",
    "nihao",
    "zhongguo",
    "xian",
    "xi'an",
    "fangan",
    "dier",
    "zhzh",
    "bjsh",
    "beijingshi",
    "shangh",
    "qwerty",
    "'ni'''hao'",
    "lvxing",
    "zhuangzhuangzhuang",
];

fn spelled(segment: &Segment) -> String {
    segment.iter().map(|s| s.text.replace('\'', "")).collect()
}

#[test]
fn some_segmentation_spells_the_input() {
    let parser = PinyinParser::new();
    for input in INPUTS {
        let results = parser.parse(input);
        let expected: String = input.trim_matches('\'').replace('\'', "");
        assert!(!results.is_empty(), "no segmentation for {}", input);
        assert!(
            results.iter().any(|s| spelled(s) == expected),
            "no segmentation of {} spells it back",
            input
        );
    }
}

#[test]
fn incompleteness_never_decreases() {
    let parser = PinyinParser::new();
    for input in INPUTS {
        let scores: Vec<usize> = parser.parse(input).iter().map(|s| incompleteness(s)).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]), "{}: {:?}", input, scores);
    }
}

#[test]
fn xian_prefers_one_syllable() {
    let parser = PinyinParser::new();
    let results = parser.parse("xian");
    let texts: Vec<&str> = results[0].iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["xian"]);
    assert!(results
        .iter()
        .any(|s| s.iter().map(|x| x.text.as_str()).collect::<Vec<_>>() == vec!["xi", "an"]));
}

#[test]
fn abbreviations_are_marked() {
    let parser = PinyinParser::new();
    let results = parser.parse("bjsh");
    let best = &results[0];
    assert_eq!(best.len(), 3);
    assert!(best.iter().all(|s| s.kind == SyllableKind::Abbreviated));
    assert_eq!(best[2].text, "sh");
}

#[test]
fn invalid_input_is_one_token() {
    let parser = PinyinParser::new();
    let results = parser.parse("bvv");
    let last = results[0].last().unwrap();
    assert_eq!(last.kind, SyllableKind::Invalid);
    assert_eq!(last.text, "vv");
    assert_eq!(spelled(&results[0]), "bvv");
}
