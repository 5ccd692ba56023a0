//! Trigger detection over typed input.
//!
//! Each input tracks the text present at the last generation (the baseline).
//! Whatever was typed since then is the delta, and the detector fires when
//! the delta completes a sentence, grows by enough words, or sits idle.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TriggerConfig;
use crate::error::{CoreError, Result};
use crate::layout::Point;
use crate::thought::TriggerKind;

static SENTENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*").unwrap());

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Typing state for one input box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSession {
    pub id: Uuid,
    pub current_text: String,
    /// Text at the last generation.
    pub baseline_text: String,
    pub last_activity: u64,
    pub idle_fired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

impl InputSession {
    pub fn new(id: Uuid, now: u64) -> Self {
        Self {
            id,
            current_text: String::new(),
            baseline_text: String::new(),
            last_activity: now,
            idle_fired: false,
            position: None,
        }
    }

    /// A keystroke: replaces the text and re-arms the idle trigger.
    pub fn record_input(&mut self, text: &str, now: u64) {
        self.current_text = text.to_string();
        self.last_activity = self.last_activity.max(now);
        self.idle_fired = false;
    }

    /// Text typed since the baseline. An edit before the baseline makes the
    /// whole current text new.
    pub fn delta(&self) -> &str {
        self.current_text
            .strip_prefix(self.baseline_text.as_str())
            .unwrap_or(self.current_text.as_str())
    }

    /// Last sentence of the delta, or the whole input when the delta is blank.
    pub fn event_text(&self) -> String {
        let last = SENTENCE
            .find_iter(self.delta())
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .last();
        match last {
            Some(sentence) => sentence.to_string(),
            None => self.current_text.trim().to_string(),
        }
    }

    /// Consume the delta after a trigger fired.
    pub fn activate(&mut self, kind: TriggerKind) {
        self.baseline_text = self.current_text.clone();
        if kind == TriggerKind::IdleTime {
            self.idle_fired = true;
        }
    }
}

#[derive(Clone, Debug)]
pub struct TriggerDetector {
    config: TriggerConfig,
}

impl TriggerDetector {
    pub fn new(config: TriggerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Full check: sentence-end, then word-count, then idle.
    pub fn evaluate(&self, session: &InputSession, now: u64) -> Option<TriggerKind> {
        let delta = session.delta();
        if self.is_sentence_end(delta) {
            Some(TriggerKind::SentenceEnd)
        } else if self.is_word_count(delta) {
            Some(TriggerKind::WordCountChange)
        } else {
            self.evaluate_idle(session, now)
        }
    }

    /// Idle only; used by the periodic poll where no keystroke happened.
    pub fn evaluate_idle(&self, session: &InputSession, now: u64) -> Option<TriggerKind> {
        let elapsed = now.saturating_sub(session.last_activity);
        let substantial = session.delta().trim().chars().count() >= self.config.min_idle_chars;
        (elapsed > self.config.idle_threshold_ms && !session.idle_fired && substantial)
            .then_some(TriggerKind::IdleTime)
    }

    fn is_sentence_end(&self, delta: &str) -> bool {
        delta.trim_end().ends_with(['.', '!', '?'])
            && word_count(delta) >= self.config.sentence_threshold
    }

    fn is_word_count(&self, delta: &str) -> bool {
        delta.ends_with(char::is_whitespace) && word_count(delta) >= self.config.word_threshold
    }
}

/// Insertion-ordered input sessions.
#[derive(Debug, Default)]
pub struct InputStore {
    sessions: Vec<InputSession>,
}

impl InputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh input and return its id.
    pub fn open(&mut self, now: u64) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.push(InputSession::new(id, now));
        id
    }

    /// Insert or replace a session (snapshot import).
    pub fn insert(&mut self, session: InputSession) {
        match self.get_mut(session.id) {
            Some(existing) => *existing = session,
            None => self.sessions.push(session),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&InputSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut InputSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn require_mut(&mut self, id: Uuid) -> Result<&mut InputSession> {
        self.get_mut(id).ok_or(CoreError::UnknownInput(id))
    }

    pub fn remove(&mut self, id: Uuid) -> Option<InputSession> {
        let i = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputSession> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns whether the stored position changed.
    pub fn set_position(&mut self, id: Uuid, position: Point) -> Result<bool> {
        let s = self.require_mut(id)?;
        if s.position == Some(position) {
            return Ok(false);
        }
        s.position = Some(position);
        Ok(true)
    }
}
