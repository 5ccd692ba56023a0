//! Versioned JSON snapshots of a canvas session.
//!
//! Thoughts on their way out are not exported; a restored session starts
//! with only live entities.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::memory::Memory;
use crate::store::ThoughtStore;
use crate::thought::Thought;
use crate::time::now_iso8601;
use crate::trigger::{InputSession, InputStore};

pub const CURRENT_VERSION: &str = "1";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: String,
    pub timestamp: String,
    pub thoughts: Vec<Thought>,
    #[serde(default)]
    pub inputs: Vec<InputSession>,
    #[serde(default)]
    pub memory: Memory,
}

impl Snapshot {
    pub fn capture(thoughts: &ThoughtStore, inputs: &InputStore, memory: &Memory) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            timestamp: now_iso8601(),
            thoughts: thoughts.iter().filter(|t| !t.removing).cloned().collect(),
            inputs: inputs.iter().cloned().collect(),
            memory: memory.clone(),
        }
    }

    pub fn into_parts(self) -> (ThoughtStore, InputStore, Memory) {
        let mut inputs = InputStore::new();
        for s in self.inputs {
            inputs.insert(s);
        }
        (ThoughtStore::from_thoughts(self.thoughts), inputs, self.memory)
    }
}

pub fn export_json(
    thoughts: &ThoughtStore,
    inputs: &InputStore,
    memory: &Memory,
) -> Result<String> {
    Ok(serde_json::to_string_pretty(&Snapshot::capture(thoughts, inputs, memory))?)
}

pub fn import_json(json: &str) -> Result<Snapshot> {
    let mut snapshot: Snapshot = serde_json::from_str(json)?;
    if snapshot.version != CURRENT_VERSION {
        return Err(CoreError::UnsupportedSnapshot(snapshot.version));
    }
    for t in &mut snapshot.thoughts {
        t.score.normalize();
    }
    Ok(snapshot)
}
