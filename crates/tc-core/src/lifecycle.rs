//! The generation cycle: dedup → evict → insert → decay.
//!
//! `Lifecycle` is the state container for thoughts. It never removes a
//! thought in one step: destructive paths mark the thought and report its id,
//! and the caller hard-removes it through [`Lifecycle::finalize_removal`]
//! once the exit transition has had time to run.

use uuid::Uuid;

use crate::config::LifecycleConfig;
use crate::decay::{DecayChange, apply_decay, select_eviction_victim};
use crate::dedup::{MergeDecision, find_merge_target, merge_into};
use crate::error::{CoreError, Result};
use crate::layout::Point;
use crate::store::ThoughtStore;
use crate::thought::Thought;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Disposition {
    /// The candidate was a near-duplicate of `id`, which absorbed it.
    Merged { id: Uuid, similarity: f64, weight: f64 },
    /// The candidate became a new active thought.
    Inserted { id: Uuid },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CycleOutcome {
    pub disposition: Disposition,
    /// Thoughts marked for removal to make room (awaiting hard removal).
    pub evicted: Vec<Uuid>,
    pub decayed: Vec<DecayChange>,
}

impl CycleOutcome {
    /// The thought this cycle produced or reinforced.
    pub fn thought_id(&self) -> Uuid {
        match self.disposition {
            Disposition::Merged { id, .. } | Disposition::Inserted { id } => id,
        }
    }

    pub fn is_merge(&self) -> bool {
        matches!(self.disposition, Disposition::Merged { .. })
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    config: LifecycleConfig,
    store: ThoughtStore,
}

impl Lifecycle {
    pub fn new(config: LifecycleConfig) -> Result<Self> {
        Self::with_store(config, ThoughtStore::new())
    }

    pub fn with_store(config: LifecycleConfig, store: ThoughtStore) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn store(&self) -> &ThoughtStore {
        &self.store
    }

    pub fn get(&self, id: Uuid) -> Option<&Thought> {
        self.store.get(id)
    }

    pub fn thoughts(&self) -> impl Iterator<Item = &Thought> {
        self.store.iter()
    }

    pub fn active_thoughts(&self) -> Vec<Thought> {
        self.store.active().cloned().collect()
    }

    pub fn active_non_persistent_count(&self) -> usize {
        self.store.active_non_persistent_count()
    }

    /// Run one generation cycle for a candidate returned by the generator.
    pub fn absorb(&mut self, mut candidate: Thought, now: u64) -> CycleOutcome {
        candidate.score.normalize();

        let (disposition, evicted) =
            match find_merge_target(&candidate, &self.store, self.config.merge_threshold) {
                MergeDecision::Merge { target, similarity } => {
                    // The target came out of the store a moment ago.
                    let weight = merge_into(&mut self.store, target, self.config.merge_boost, now)
                        .unwrap_or_default();
                    (
                        Disposition::Merged {
                            id: target,
                            similarity,
                            weight,
                        },
                        Vec::new(),
                    )
                }
                MergeDecision::Insert { .. } => {
                    let evicted = self.evict_until_below(self.config.max_thought_count, now);
                    if self.store.contains(candidate.id) {
                        candidate.id = Uuid::new_v4();
                    }
                    candidate.active = true;
                    candidate.removing = false;
                    candidate.touch(now);
                    let id = candidate.id;
                    self.store.insert(candidate);
                    (Disposition::Inserted { id }, evicted)
                }
            };

        let produced = match disposition {
            Disposition::Merged { id, .. } | Disposition::Inserted { id } => id,
        };
        let decayed = apply_decay(&mut self.store, produced, &self.config);

        CycleOutcome {
            disposition,
            evicted,
            decayed,
        }
    }

    /// Mark the lowest-priority thoughts until fewer than `limit` evictable
    /// thoughts remain (room for one insertion). Stops early when nothing is
    /// evictable.
    fn evict_until_below(&mut self, limit: usize, now: u64) -> Vec<Uuid> {
        let mut marked = Vec::new();
        while self.store.active_non_persistent_count() >= limit {
            let Some(victim) = select_eviction_victim(&self.store) else {
                break;
            };
            match self.store.mark_removing(victim, now) {
                Ok(true) => marked.push(victim),
                _ => break,
            }
        }
        marked
    }

    /// Change capacity at runtime, evicting down to the new limit.
    pub fn set_max_thought_count(&mut self, max: usize, now: u64) -> Result<Vec<Uuid>> {
        if max < 1 {
            return Err(CoreError::InvalidConfig(
                "max_thought_count must be at least 1".to_string(),
            ));
        }
        self.config.max_thought_count = max;
        Ok(self.evict_until_below(max + 1, now))
    }

    pub fn like(&mut self, id: Uuid, now: u64) -> Result<f64> {
        self.store.like(id, self.config.like_amount, now)
    }

    pub fn dislike(&mut self, id: Uuid, now: u64) -> Result<f64> {
        self.store.dislike(id, self.config.like_amount, now)
    }

    pub fn react(&mut self, id: Uuid, reaction: &str, now: u64) -> Result<f64> {
        self.store.react(id, reaction, self.config.like_amount, now)
    }

    pub fn pin(&mut self, id: Uuid, now: u64) -> Result<()> {
        self.store.pin(id, now)
    }

    pub fn unpin(&mut self, id: Uuid, now: u64) -> Result<()> {
        self.store.unpin(id, now)
    }

    pub fn set_position(&mut self, id: Uuid, position: Point) -> Result<bool> {
        self.store.set_position(id, position)
    }

    /// User deletion, first phase. `Ok(false)` if already being removed.
    pub fn delete(&mut self, id: Uuid, now: u64) -> Result<bool> {
        self.store.mark_removing(id, now)
    }

    /// Session reset, first phase: marks every thought, pinned ones included.
    pub fn reset(&mut self, now: u64) -> Vec<Uuid> {
        let ids = self.store.ids();
        ids.into_iter()
            .filter(|id| matches!(self.store.mark_removing(*id, now), Ok(true)))
            .collect()
    }

    /// Second phase. Only thoughts previously marked are removed.
    pub fn finalize_removal(&mut self, id: Uuid) -> Option<Thought> {
        if !self.store.get(id)?.removing {
            return None;
        }
        self.store.remove(id)
    }
}
