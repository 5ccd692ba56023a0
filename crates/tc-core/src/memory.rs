use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryKind {
    LongTerm,
    ShortTerm,
}

/// One remembered fact or chat message, supplied to the generator as context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
    pub created_at: u64,
}

impl MemoryItem {
    pub fn new(kind: MemoryKind, text: &str, now: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            text: text.to_string(),
            embedding: None,
            created_at: now,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    #[serde(default)]
    pub long_term: Vec<MemoryItem>,
    #[serde(default)]
    pub short_term: Vec<MemoryItem>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: MemoryItem) {
        match item.kind {
            MemoryKind::LongTerm => self.long_term.push(item),
            MemoryKind::ShortTerm => self.short_term.push(item),
        }
    }

    pub fn len(&self) -> usize {
        self.long_term.len() + self.short_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All long-term items plus the `limit` most recent short-term items.
    pub fn recent(&self, limit: usize) -> Memory {
        let skip = self.short_term.len().saturating_sub(limit);
        Memory {
            long_term: self.long_term.clone(),
            short_term: self.short_term[skip..].to_vec(),
        }
    }

    /// Drop all but the `keep` most recent short-term items.
    pub fn trim_short_term(&mut self, keep: usize) {
        let excess = self.short_term.len().saturating_sub(keep);
        self.short_term.drain(..excess);
    }

    pub fn clear_short_term(&mut self) {
        self.short_term.clear();
    }
}
