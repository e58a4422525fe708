// Term database over file-backed stores
//
// Purpose:
// - A JSON word list fills an empty redb store on first open.
// - Later opens are served by the redb store even without the JSON file.
// - A missing word list with nothing persisted is an error.
//
// File: libpinyin/tests/term_database_files.rs

use libpinyin::{Homonyms, PinyinConfig, Term, TermDatabase};

fn write_word_list(path: &std::path::Path) {
    let items = vec![
        Homonyms::new("zhong'guo", vec![Term::new("中国", 3.0e6)]),
        Homonyms::new("zhong", vec![Term::new("中", 5.0e6)]),
        Homonyms::new("guo", vec![Term::new("国", 4.0e6)]),
    ];
    std::fs::write(path, serde_json::to_string(&items).unwrap()).unwrap();
}

#[test]
fn json_fills_persistent_store() {
    let dir = tempfile::tempdir().unwrap();
    let json = dir.path().join("db.json");
    let redb = dir.path().join("terms.redb");
    write_word_list(&json);
    let config = PinyinConfig::default();

    {
        let db = TermDatabase::open(&json, Some(&redb), &config).unwrap();
        assert_eq!(db.get_terms(&["zhong", "guo"])[0].phrase, "中国");
    }

    std::fs::remove_file(&json).unwrap();
    let db = TermDatabase::open(&json, Some(&redb), &config).unwrap();
    assert_eq!(db.get_terms(&["z", "g"])[0].phrase, "中国");
    assert_eq!(db.get_sentence(&["zhong", "guo"]), "中国");
}

#[test]
fn json_only_database() {
    let dir = tempfile::tempdir().unwrap();
    let json = dir.path().join("db.json");
    write_word_list(&json);
    let db = TermDatabase::open(&json, None, &PinyinConfig::default()).unwrap();
    assert!(db.is_ready());
    assert_eq!(db.get_suggestions(&["zhong"], "中")[0].phrase, "中国");
}

#[test]
fn missing_word_list_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = TermDatabase::open(&dir.path().join("none.json"), None, &PinyinConfig::default());
    assert!(result.is_err());
}
