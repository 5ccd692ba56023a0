//! Near-duplicate detection for freshly generated thoughts.
//!
//! A candidate whose embedding is close enough to an active thought is not
//! inserted; the existing thought absorbs it and gains weight instead.

use uuid::Uuid;

use crate::error::Result;
use crate::similarity::best_match;
use crate::store::ThoughtStore;
use crate::thought::Thought;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MergeDecision {
    /// Similarity to `target` exceeded the merge threshold.
    Merge { target: Uuid, similarity: f64 },
    /// No active thought is similar enough; `best_similarity` is `None` when
    /// there were no active thoughts at all.
    Insert { best_similarity: Option<f64> },
}

/// Compare the candidate against every active thought.
pub fn find_merge_target(
    candidate: &Thought,
    store: &ThoughtStore,
    threshold: f64,
) -> MergeDecision {
    match best_match(candidate.embedding(), store.active()) {
        Some((target, similarity)) if similarity > threshold => {
            MergeDecision::Merge { target, similarity }
        }
        best => MergeDecision::Insert {
            best_similarity: best.map(|(_, s)| s),
        },
    }
}

/// Boost the target by `boost` (capped at 1) and mark it active.
/// Returns the new weight.
pub fn merge_into(store: &mut ThoughtStore, target: Uuid, boost: f64, now: u64) -> Result<f64> {
    let t = store.require_mut(target)?;
    t.active = true;
    let weight = t.score.boost(boost);
    t.touch(now);
    Ok(weight)
}
