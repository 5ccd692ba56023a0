use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::DEFAULT_WEIGHT;
use crate::layout::Point;
use crate::time::now_millis;

/// Input condition that requested a thought.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    /// Explicit click on the canvas.
    Click,
    /// The user paused typing past the idle threshold.
    IdleTime,
    /// Enough new words were typed since the last generation.
    WordCountChange,
    /// A sentence was completed.
    SentenceEnd,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "CLICK",
            Self::IdleTime => "IDLE_TIME",
            Self::WordCountChange => "WORD_COUNT_CHANGE",
            Self::SentenceEnd => "SENTENCE_END",
        }
    }
}

/// How much the user may interact with a thought.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interactivity {
    #[default]
    View,
    Comment,
    Edit,
}

impl Interactivity {
    /// View-only thoughts cannot collect reactions.
    pub fn accepts_reactions(&self) -> bool {
        !matches!(self, Self::View)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThoughtContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ThoughtConfig {
    /// Pinned thoughts are exempt from decay and eviction.
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub interactivity: Interactivity,
}

/// Importance scores, both kept in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saliency: Option<f64>,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            weight: DEFAULT_WEIGHT,
            saliency: None,
        }
    }
}

impl Score {
    pub fn new(weight: f64) -> Self {
        Self {
            weight: clamp_unit(weight),
            saliency: None,
        }
    }

    /// Eviction priority: weight plus saliency when the generator supplied one.
    pub fn priority(&self) -> f64 {
        self.weight + self.saliency.unwrap_or(0.0)
    }

    /// Raise weight by `amount`, capped at 1. Returns the new weight.
    pub fn boost(&mut self, amount: f64) -> f64 {
        self.weight = clamp_unit(self.weight + amount);
        self.weight
    }

    /// Lower weight by `amount`, floored at 0. Returns the new weight.
    pub fn decay(&mut self, amount: f64) -> f64 {
        self.weight = clamp_unit(self.weight - amount);
        self.weight
    }

    /// Force both fields back into [0, 1]; NaN becomes 0.
    pub fn normalize(&mut self) {
        self.weight = clamp_unit(self.weight);
        self.saliency = self.saliency.map(clamp_unit);
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// An ephemeral content unit with a decaying importance score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    pub id: Uuid,
    pub content: ThoughtContent,
    #[serde(default)]
    pub config: ThoughtConfig,
    #[serde(default)]
    pub score: Score,
    pub trigger: TriggerKind,
    pub created_at: u64,
    pub updated_at: u64,
    pub active: bool,
    /// Two-phase removal in progress: inactive, waiting for hard removal.
    #[serde(default)]
    pub removing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_comments: Vec<String>,
}

impl Thought {
    pub fn new(text: &str, trigger: TriggerKind, now: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: ThoughtContent {
                text: text.to_string(),
                embedding: None,
            },
            config: ThoughtConfig::default(),
            score: Score::default(),
            trigger,
            created_at: now,
            updated_at: now,
            active: true,
            removing: false,
            position: None,
            user_comments: Vec::new(),
        }
    }

    pub fn builder(text: &str) -> ThoughtBuilder {
        ThoughtBuilder {
            thought: Self::new(text, TriggerKind::Click, now_millis()),
        }
    }

    pub fn text(&self) -> &str {
        &self.content.text
    }

    pub fn embedding(&self) -> Option<&[f64]> {
        self.content.embedding.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.config.persistent
    }

    /// Active, not pinned and not already on its way out.
    pub fn is_evictable(&self) -> bool {
        self.active && !self.removing && !self.config.persistent
    }

    pub fn touch(&mut self, now: u64) {
        self.updated_at = self.updated_at.max(now);
    }
}

/// Fluent constructor, mostly for candidates coming back from a generator.
#[derive(Debug)]
pub struct ThoughtBuilder {
    thought: Thought,
}

impl ThoughtBuilder {
    pub fn id(mut self, id: Uuid) -> Self {
        self.thought.id = id;
        self
    }

    pub fn embedding(mut self, embedding: Vec<f64>) -> Self {
        self.thought.content.embedding = Some(embedding);
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.thought.score.weight = clamp_unit(weight);
        self
    }

    pub fn saliency(mut self, saliency: f64) -> Self {
        self.thought.score.saliency = Some(clamp_unit(saliency));
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.thought.config.persistent = persistent;
        self
    }

    pub fn interactivity(mut self, interactivity: Interactivity) -> Self {
        self.thought.config.interactivity = interactivity;
        self
    }

    pub fn trigger(mut self, trigger: TriggerKind) -> Self {
        self.thought.trigger = trigger;
        self
    }

    pub fn created_at(mut self, now: u64) -> Self {
        self.thought.created_at = now;
        self.thought.updated_at = now;
        self
    }

    pub fn position(mut self, position: Point) -> Self {
        self.thought.position = Some(position);
        self
    }

    pub fn build(self) -> Thought {
        self.thought
    }
}
