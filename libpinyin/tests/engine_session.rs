// Keyboard engine sessions against an in-memory word list
//
// Purpose:
// - Drive the engine key by key the way a host keyboard does and check what
//   reaches the host through the glue.
// - Cover candidate list order, partial selection, suggestions after a
//   selection, backspace handling and the buffer limit.
//
// File: libpinyin/tests/engine_session.rs

use libpinyin::{
    keys, Engine, Homonyms, MemoryStore, PinyinConfig, RecordingGlue, Term, TermDatabase,
};

const SPACE: i32 = 32;

fn word_list() -> MemoryStore {
    MemoryStore::from_homonyms(vec![
        Homonyms::new("bei'jing", vec![Term::new("北京", 1.0e6), Term::new("背景", 5.0e5)]),
        Homonyms::new("bei'jing'shi", vec![Term::new("北京市", 2.0e5)]),
        Homonyms::new("bei", vec![Term::new("北", 2.0e6), Term::new("被", 1.0e6)]),
        Homonyms::new("jing", vec![Term::new("京", 1.0e6)]),
        Homonyms::new("shi", vec![Term::new("是", 5.0e6)]),
        Homonyms::new("ren", vec![Term::new("人", 4.0e6)]),
    ])
}

fn engine_with(config: PinyinConfig) -> Engine<RecordingGlue> {
    let mut engine = Engine::new(TermDatabase::new(Box::new(word_list())), RecordingGlue::new(), config);
    engine.init();
    engine
}

fn engine() -> Engine<RecordingGlue> {
    engine_with(PinyinConfig::default())
}

fn type_str(engine: &mut Engine<RecordingGlue>, s: &str) {
    for b in s.bytes() {
        engine.handle_key(b as i32);
    }
}

fn texts(engine: &Engine<RecordingGlue>) -> Vec<String> {
    engine.candidates().iter().map(|c| c.text.clone()).collect()
}

#[test]
fn whole_buffer_terms_come_first() {
    let mut e = engine();
    type_str(&mut e, "beijing");
    assert_eq!(texts(&e), vec!["北京", "背景", "北", "被"]);
    assert_eq!(e.candidates()[2].syllables, "bei");
    assert_eq!(e.glue().last_candidates().map(|c| c.len()), Some(4));
}

#[test]
fn sentence_follows_whole_buffer_terms() {
    let mut e = engine();
    type_str(&mut e, "beijingren");
    let list = texts(&e);
    assert_eq!(list[0], "北京人");
    assert_eq!(e.candidates()[0].syllables, "bei'jing'ren");
    assert!(list.contains(&"北京".to_string()));
}

#[test]
fn abbreviated_input_finds_terms() {
    let mut e = engine();
    type_str(&mut e, "bj");
    assert_eq!(texts(&e)[0], "北京");
}

#[test]
fn unknown_single_syllable_shows_raw_text() {
    let mut e = engine();
    type_str(&mut e, "zzz");
    assert_eq!(texts(&e)[0], "zzz");
}

#[test]
fn space_commits_first_candidate() {
    let mut e = engine();
    type_str(&mut e, "beijing");
    e.handle_key(SPACE);
    assert_eq!(e.glue().committed(), "北京");
    assert_eq!(e.pending(), "");
    assert_eq!(e.glue().keys(), vec![SPACE]);
    assert!(e.candidates().is_empty());
}

#[test]
fn return_commits_without_passing_key() {
    let mut e = engine();
    type_str(&mut e, "ren");
    e.handle_key(keys::RETURN);
    assert_eq!(e.glue().committed(), "人");
    assert!(e.glue().keys().is_empty());
}

#[test]
fn partial_selection_keeps_the_rest() {
    let mut e = engine();
    type_str(&mut e, "beijingren");
    e.select("北京", "bei'jing");
    assert_eq!(e.pending(), "ren");
    assert_eq!(texts(&e), vec!["人"]);
    e.select("人", "ren");
    assert_eq!(e.glue().committed(), "北京人");
    assert_eq!(e.pending(), "");
}

#[test]
fn selection_is_followed_by_suggestions() {
    let mut e = engine();
    type_str(&mut e, "beijing");
    e.select("北京", "bei'jing");
    assert_eq!(texts(&e), vec!["市"]);

    // first backspace clears the suggestions, the second goes to the host
    e.handle_key(keys::BACKSPACE);
    assert!(e.candidates().is_empty());
    e.handle_key(keys::BACKSPACE);
    assert_eq!(e.glue().keys(), vec![keys::BACKSPACE]);
}

#[test]
fn suggestions_can_be_disabled() {
    let mut config = PinyinConfig::default();
    config.auto_suggest = false;
    let mut e = engine_with(config);
    type_str(&mut e, "beijing");
    e.select("北京", "bei'jing");
    assert!(e.candidates().is_empty());
}

#[test]
fn backspace_edits_pending_input() {
    let mut e = engine();
    type_str(&mut e, "beij");
    e.handle_key(keys::BACKSPACE);
    assert_eq!(e.pending(), "bei");
    assert_eq!(e.glue().last_pending(), Some("bei"));
    assert_eq!(texts(&e)[0], "北");
}

#[test]
fn full_buffer_forces_the_first_candidate() {
    let mut config = PinyinConfig::default();
    config.buffer_limit = 3;
    let mut e = engine_with(config);
    type_str(&mut e, "bei");
    e.handle_key(b'j' as i32);
    assert_eq!(e.glue().committed(), "北");
    assert_eq!(e.glue().keys(), vec![b'j' as i32]);
    assert_eq!(e.pending(), "");
}
