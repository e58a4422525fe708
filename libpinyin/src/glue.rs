//! Callbacks from the engine to the host keyboard.

use crate::engine::Candidate;

/// Host side of the input method. The engine only calls these.
pub trait Glue {
    /// Replace the candidate list shown to the user.
    fn send_candidates(&mut self, candidates: &[Candidate]);

    /// Show the not yet converted input.
    fn send_pending_symbols(&mut self, symbols: &str);

    /// Let the host apply its default action for a key.
    fn send_key(&mut self, key_code: i32);

    /// Commit text to the edited field.
    fn send_string(&mut self, text: &str);

    fn alter_keyboard(&mut self, keyboard: &str);
}

/// One recorded glue call.
#[derive(Debug, Clone, PartialEq)]
pub enum GlueEvent {
    Candidates(Vec<Candidate>),
    PendingSymbols(String),
    Key(i32),
    String(String),
    Keyboard(String),
}

/// Glue that records every call, for hosts that poll and for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingGlue {
    pub events: Vec<GlueEvent>,
}

impl RecordingGlue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text committed so far, concatenated.
    pub fn committed(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                GlueEvent::String(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn last_candidates(&self) -> Option<&[Candidate]> {
        self.events.iter().rev().find_map(|e| match e {
            GlueEvent::Candidates(c) => Some(c.as_slice()),
            _ => None,
        })
    }

    pub fn last_pending(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|e| match e {
            GlueEvent::PendingSymbols(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn keys(&self) -> Vec<i32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GlueEvent::Key(k) => Some(*k),
                _ => None,
            })
            .collect()
    }
}

impl Glue for RecordingGlue {
    fn send_candidates(&mut self, candidates: &[Candidate]) {
        self.events.push(GlueEvent::Candidates(candidates.to_vec()));
    }

    fn send_pending_symbols(&mut self, symbols: &str) {
        self.events.push(GlueEvent::PendingSymbols(symbols.to_string()));
    }

    fn send_key(&mut self, key_code: i32) {
        self.events.push(GlueEvent::Key(key_code));
    }

    fn send_string(&mut self, text: &str) {
        self.events.push(GlueEvent::String(text.to_string()));
    }

    fn alter_keyboard(&mut self, keyboard: &str) {
        self.events.push(GlueEvent::Keyboard(keyboard.to_string()));
    }
}
