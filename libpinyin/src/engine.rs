//! Keyboard-facing pinyin engine
//!
//! Keeps the pending input, turns it into a candidate list through the
//! `PinyinParser` and a `TermDatabase`, and reports everything to the host
//! through `Glue`. Calls are synchronous; one engine serves one input field.
//!
//! Candidate list order:
//! 1. terms for the whole buffer
//! 2. the best sentence for the whole buffer, if not already listed
//! 3. terms for the first n-1, n-2, ... 1 syllables; the first syllable
//!    falls back to its literal text

use tracing::debug;

use crate::config::PinyinConfig;
use crate::database::TermDatabase;
use crate::glue::Glue;
use crate::parser::PinyinParser;
use crate::store::join_syllables;

/// Key codes understood by `Engine::handle_key`.
pub mod keys {
    pub const BACKSPACE: i32 = 0x08;
    pub const RETURN: i32 = 0x0d;
    pub const APOSTROPHE: i32 = 39;

    pub const SWITCH_TRADITIONAL: i32 = -10;
    pub const SWITCH_SIMPLIFIED: i32 = -11;
    pub const SWITCH_NUMBER: i32 = -12;
    pub const SWITCH_SYMBOL0: i32 = -13;
    pub const SWITCH_SYMBOL1: i32 = -14;
    pub const SWITCH_SYMBOL2: i32 = -15;
    pub const SWITCH_BASIC: i32 = -20;
}

const KEYBOARD_SIMPLIFIED: &str = "zh-Hans-Pinyin";
const KEYBOARD_TRADITIONAL: &str = "zh-Hans-Pinyin-tr";

/// One entry of the candidate list: the text and the syllables it consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    /// Syllables joined with `'`, such as "bei'jing".
    pub syllables: String,
}

impl Candidate {
    pub fn new<T: Into<String>, S: Into<String>>(text: T, syllables: S) -> Self {
        Self {
            text: text.into(),
            syllables: syllables.into(),
        }
    }
}

pub struct Engine<G: Glue> {
    parser: PinyinParser,
    simplified: TermDatabase,
    traditional: Option<TermDatabase>,
    glue: G,
    config: PinyinConfig,
    traditional_mode: bool,
    keyboard: String,
    pending: String,
    candidates: Vec<Candidate>,
    selected_text: String,
    selected_syllables: Vec<String>,
}

impl<G: Glue> Engine<G> {
    pub fn new(db: TermDatabase, glue: G, config: PinyinConfig) -> Self {
        let traditional_mode = config.traditional;
        Self {
            parser: PinyinParser::new(),
            simplified: db,
            traditional: None,
            glue,
            config,
            traditional_mode,
            keyboard: KEYBOARD_SIMPLIFIED.to_string(),
            pending: String::new(),
            candidates: Vec::new(),
            selected_text: String::new(),
            selected_syllables: Vec::new(),
        }
    }

    /// Word list used in traditional Chinese mode. Without one the
    /// simplified list is used in both modes.
    pub fn with_traditional(mut self, db: TermDatabase) -> Self {
        self.traditional = Some(db);
        self
    }

    /// Show the basic keyboard for the current mode.
    pub fn init(&mut self) {
        let keyboard = self.basic_keyboard();
        self.alter_keyboard(keyboard);
    }

    pub fn glue(&self) -> &G {
        &self.glue
    }

    pub fn glue_mut(&mut self) -> &mut G {
        &mut self.glue
    }

    pub fn config(&self) -> &PinyinConfig {
        &self.config
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn keyboard(&self) -> &str {
        &self.keyboard
    }

    pub fn is_traditional(&self) -> bool {
        self.traditional_mode
    }

    /// The candidate list last sent to the host.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    fn db(&self) -> &TermDatabase {
        match (&self.traditional, self.traditional_mode) {
            (Some(db), true) => db,
            _ => &self.simplified,
        }
    }

    fn basic_keyboard(&self) -> &'static str {
        if self.traditional_mode {
            KEYBOARD_TRADITIONAL
        } else {
            KEYBOARD_SIMPLIFIED
        }
    }

    fn is_symbol(code: i32) -> bool {
        code == keys::APOSTROPHE || (97..=122).contains(&code)
    }

    /// Process one key press.
    ///
    /// Lowercase letters and `'` are appended to the pending input. Backspace
    /// removes the last one, or clears suggestions when there is no input.
    /// Return and any other key commit the first candidate first; Return is
    /// then consumed, other keys are passed to the host. A full buffer makes
    /// every key behave like a non-letter key. Negative codes switch keyboards.
    pub fn handle_key(&mut self, code: i32) {
        match code {
            keys::SWITCH_TRADITIONAL => {
                self.traditional_mode = true;
                self.alter_keyboard(KEYBOARD_TRADITIONAL);
                return;
            }
            keys::SWITCH_SIMPLIFIED => {
                self.traditional_mode = false;
                self.alter_keyboard(KEYBOARD_SIMPLIFIED);
                return;
            }
            keys::SWITCH_NUMBER => {
                self.alter_keyboard("zh-Hans-Pinyin-number");
                return;
            }
            keys::SWITCH_SYMBOL0 => {
                self.alter_keyboard("zh-Hans-Pinyin-symbol0");
                return;
            }
            keys::SWITCH_SYMBOL1 => {
                self.alter_keyboard("zh-Hans-Pinyin-symbol1");
                return;
            }
            keys::SWITCH_SYMBOL2 => {
                self.alter_keyboard("zh-Hans-Pinyin-symbol2");
                return;
            }
            keys::SWITCH_BASIC => {
                let keyboard = self.basic_keyboard();
                self.alter_keyboard(keyboard);
                return;
            }
            _ => {}
        }

        if code == keys::BACKSPACE {
            if self.pending.is_empty() {
                if !self.candidates.is_empty() {
                    debug!("remove candidates");
                    self.selected_text.clear();
                    self.selected_syllables.clear();
                    self.update_candidate_list();
                    return;
                }
                self.glue.send_key(code);
                return;
            }
            self.pending.pop();
            self.send_pending_symbols();
            self.update_candidate_list();
            return;
        }

        if code == keys::RETURN
            || !Self::is_symbol(code)
            || self.pending.len() >= self.config.buffer_limit
        {
            let mut send_key = true;
            if let Some(first) = self.candidates.first().map(|c| c.text.clone()) {
                if !self.pending.is_empty() {
                    debug!("sending first candidate");
                    self.glue.send_string(&first);
                    self.empty();
                    if code == keys::RETURN {
                        send_key = false;
                    }
                }
                self.send_candidates(Vec::new());
            }
            if send_key {
                self.glue.send_key(code);
            }
            return;
        }

        // is_symbol() guarantees an ASCII code
        self.pending.push(code as u8 as char);
        self.send_pending_symbols();
        self.update_candidate_list();
    }

    /// Commit a candidate and drop the syllables it consumed from the
    /// pending input.
    pub fn select(&mut self, text: &str, syllables: &str) {
        self.glue.send_string(text);

        let consumed: Vec<String> = syllables
            .split('\'')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if !self.pending.is_empty() {
            for syllable in &consumed {
                let rest = self.pending.trim_start_matches('\'');
                let cut = syllable.len().min(rest.len());
                self.pending = rest.get(cut..).unwrap_or_default().to_string();
            }
        }

        self.selected_text = text.to_string();
        self.selected_syllables = consumed;
        self.send_pending_symbols();
        self.update_candidate_list();
    }

    /// Drop the pending input and the last selection.
    pub fn empty(&mut self) {
        debug!("empty");
        self.pending.clear();
        self.selected_text.clear();
        self.selected_syllables.clear();
        self.send_pending_symbols();
    }

    /// The host shows the keyboard for a field of `input_type`.
    pub fn show(&mut self, input_type: &str) {
        let keyboard = if matches!(input_type, "" | "text" | "textarea") {
            self.keyboard.clone()
        } else {
            self.basic_keyboard().to_string()
        };
        self.glue.alter_keyboard(&keyboard);
    }

    fn alter_keyboard(&mut self, keyboard: &str) {
        self.keyboard = keyboard.to_string();
        self.empty();
        self.glue.alter_keyboard(keyboard);
    }

    fn send_pending_symbols(&mut self) {
        self.glue.send_pending_symbols(&self.pending);
    }

    fn send_candidates(&mut self, candidates: Vec<Candidate>) {
        self.candidates = candidates;
        self.glue.send_candidates(&self.candidates);
    }

    fn update_candidate_list(&mut self) {
        if self.pending.is_empty() {
            let suggestions = if self.config.auto_suggest && !self.selected_syllables.is_empty() {
                self.suggestions()
            } else {
                Vec::new()
            };
            self.send_candidates(suggestions);
            return;
        }

        self.selected_text.clear();
        self.selected_syllables.clear();
        let candidates = self.lookup_candidates();
        self.send_candidates(candidates);
    }

    /// Continuations of the last selection, without the selected text.
    fn suggestions(&self) -> Vec<Candidate> {
        let text = &self.selected_text;
        let syllables = join_syllables(&self.selected_syllables);
        self.db()
            .get_suggestions(&self.selected_syllables, text)
            .into_iter()
            .map(|t| {
                let rest = t.phrase.strip_prefix(text.as_str()).unwrap_or(&t.phrase);
                Candidate::new(rest, syllables.clone())
            })
            .collect()
    }

    fn lookup_candidates(&self) -> Vec<Candidate> {
        let db = self.db();
        let segments = self.parser.parse(&self.pending);
        let syllables: Vec<String> = segments
            .first()
            .map(|s| s.iter().map(|x| x.text.clone()).collect())
            .unwrap_or_default();
        let syllables_str = join_syllables(&syllables);

        if syllables.is_empty() {
            return vec![Candidate::new(self.pending.clone(), syllables_str)];
        }

        let mut candidates: Vec<Candidate> = db
            .get_terms(&syllables)
            .into_iter()
            .map(|t| Candidate::new(t.phrase, syllables_str.clone()))
            .collect();

        if syllables.len() == 1 {
            if candidates.is_empty() {
                candidates.push(Candidate::new(self.pending.clone(), syllables_str));
            }
            return candidates;
        }

        let sentence = db.get_sentence(&syllables);
        if !candidates.iter().any(|c| c.text == sentence) {
            candidates.push(Candidate::new(sentence, syllables_str));
        }

        let mut i = self.config.term_max_length.min(syllables.len() - 1);
        while i > 0 {
            let head = &syllables[..i];
            let head_str = join_syllables(head);
            let terms = db.get_terms(head);
            if i == 1 && terms.is_empty() {
                candidates.push(Candidate::new(head.concat(), head_str.clone()));
            }
            candidates.extend(terms.into_iter().map(|t| Candidate::new(t.phrase, head_str.clone())));
            i -= 1;
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glue::RecordingGlue;
    use crate::store::{Homonyms, MemoryStore, Term};

    fn engine() -> Engine<RecordingGlue> {
        let store = MemoryStore::from_homonyms(vec![
            Homonyms::new("bei'jing", vec![Term::new("北京", 1.0e6)]),
            Homonyms::new("bei", vec![Term::new("北", 2.0e6)]),
        ]);
        Engine::new(TermDatabase::new(Box::new(store)), RecordingGlue::new(), PinyinConfig::default())
    }

    fn type_str(e: &mut Engine<RecordingGlue>, s: &str) {
        for b in s.bytes() {
            e.handle_key(b as i32);
        }
    }

    #[test]
    fn letters_accumulate() {
        let mut e = engine();
        type_str(&mut e, "bei");
        assert_eq!(e.pending(), "bei");
        assert_eq!(e.glue().last_pending(), Some("bei"));
        assert_eq!(e.candidates()[0].text, "北");
    }

    #[test]
    fn keyboard_switch_changes_mode() {
        let mut e = engine();
        e.handle_key(keys::SWITCH_TRADITIONAL);
        assert!(e.is_traditional());
        assert_eq!(e.keyboard(), KEYBOARD_TRADITIONAL);
        e.handle_key(keys::SWITCH_NUMBER);
        e.handle_key(keys::SWITCH_BASIC);
        assert_eq!(e.keyboard(), KEYBOARD_TRADITIONAL);
    }
}
