//! Per-cycle score decay and capacity eviction.
//!
//! Every generation cycle ages the other active, non-persistent thoughts.
//! Thoughts with no similar neighbour lose an extra isolation penalty, so
//! connected clusters outlive stray ones. Pinned thoughts never decay.

use std::collections::HashSet;

use uuid::Uuid;

use crate::config::LifecycleConfig;
use crate::similarity::thought_similarity;
use crate::store::ThoughtStore;
use crate::thought::Thought;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayChange {
    pub id: Uuid,
    pub before: f64,
    pub after: f64,
    /// No similar neighbour: the isolation penalty was applied.
    pub isolated: bool,
}

/// Age every active non-persistent thought except `produced`.
pub fn apply_decay(
    store: &mut ThoughtStore,
    produced: Uuid,
    cfg: &LifecycleConfig,
) -> Vec<DecayChange> {
    let active: Vec<&Thought> = store.active().collect();
    let produced_thought = active.iter().find(|t| t.id == produced).copied();

    let mut isolated: HashSet<Uuid> = HashSet::new();
    let mut targets: Vec<Uuid> = Vec::new();
    for t in active.iter().filter(|t| t.id != produced && !t.is_persistent()) {
        let near_produced = produced_thought
            .is_some_and(|p| thought_similarity(t, p) > cfg.decay_similarity_threshold);
        let near_other = near_produced
            || active.iter().any(|o| {
                o.id != t.id && thought_similarity(t, o) > cfg.decay_similarity_threshold
            });
        if !near_other {
            isolated.insert(t.id);
        }
        targets.push(t.id);
    }

    let mut changes = Vec::with_capacity(targets.len());
    for id in targets {
        let Some(t) = store.get_mut(id) else {
            continue;
        };
        let is_isolated = isolated.contains(&id);
        let amount = if is_isolated {
            cfg.decay_rate + cfg.isolation_penalty
        } else {
            cfg.decay_rate
        };
        let before = t.score.weight;
        let after = t.score.decay(amount);
        changes.push(DecayChange {
            id,
            before,
            after,
            isolated: is_isolated,
        });
    }
    changes
}

/// Arg-min of `weight + saliency` over evictable thoughts; ties go to the
/// first in store order. `None` when nothing is evictable.
pub fn select_eviction_victim(store: &ThoughtStore) -> Option<Uuid> {
    let mut victim: Option<(Uuid, f64)> = None;
    for t in store.iter().filter(|t| t.is_evictable()) {
        let priority = t.score.priority();
        match victim {
            Some((_, lowest)) if priority >= lowest => {}
            _ => victim = Some((t.id, priority)),
        }
    }
    victim.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg() -> LifecycleConfig {
        LifecycleConfig {
            decay_rate: 0.05,
            isolation_penalty: 0.1,
            decay_similarity_threshold: 0.2,
            ..Default::default()
        }
    }

    fn thought(embedding: Vec<f64>, weight: f64) -> Thought {
        Thought::builder("t").embedding(embedding).weight(weight).build()
    }

    #[test]
    fn test_isolated_thought_gets_penalty() {
        let produced = thought(vec![1.0, 0.0, 0.0], 0.5);
        let lonely = thought(vec![0.0, 1.0, 0.0], 0.5);
        let (pid, lid) = (produced.id, lonely.id);
        let mut store = ThoughtStore::from_thoughts(vec![produced, lonely]);

        let changes = apply_decay(&mut store, pid, &cfg());
        assert_eq!(changes.len(), 1);
        assert!(changes[0].isolated);
        assert!((store.get(lid).unwrap().score.weight - 0.35).abs() < 1e-12);
        // The produced thought is untouched.
        assert_eq!(store.get(pid).unwrap().score.weight, 0.5);
    }

    #[test]
    fn test_connected_thought_gets_base_decay() {
        let produced = thought(vec![1.0, 0.0], 0.5);
        let near = thought(vec![1.0, 0.5], 0.5);
        let nid = near.id;
        let pid = produced.id;
        let mut store = ThoughtStore::from_thoughts(vec![produced, near]);

        let changes = apply_decay(&mut store, pid, &cfg());
        assert!(!changes[0].isolated);
        assert!((store.get(nid).unwrap().score.weight - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_similar_to_other_active_counts_as_connected() {
        let produced = thought(vec![0.0, 0.0, 1.0], 0.5);
        let a = thought(vec![1.0, 0.0, 0.0], 0.5);
        let b = thought(vec![1.0, 0.1, 0.0], 0.5);
        let pid = produced.id;
        let mut store = ThoughtStore::from_thoughts(vec![produced, a, b]);

        let changes = apply_decay(&mut store, pid, &cfg());
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| !c.isolated));
    }

    #[test]
    fn test_persistent_exempt() {
        let produced = thought(vec![1.0, 0.0], 0.5);
        let mut pinned = thought(vec![0.0, 1.0], 0.5);
        pinned.config.persistent = true;
        let (pid, pinned_id) = (produced.id, pinned.id);
        let mut store = ThoughtStore::from_thoughts(vec![produced, pinned]);

        assert!(apply_decay(&mut store, pid, &cfg()).is_empty());
        assert_eq!(store.get(pinned_id).unwrap().score.weight, 0.5);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let produced = thought(vec![1.0, 0.0], 0.5);
        let weak = thought(vec![0.0, 1.0], 0.1);
        let (pid, wid) = (produced.id, weak.id);
        let mut store = ThoughtStore::from_thoughts(vec![produced, weak]);
        apply_decay(&mut store, pid, &cfg());
        assert_eq!(store.get(wid).unwrap().score.weight, 0.0);
    }

    #[test]
    fn test_removing_thoughts_do_not_decay() {
        let produced = thought(vec![1.0, 0.0], 0.5);
        let mut leaving = thought(vec![0.0, 1.0], 0.5);
        leaving.removing = true;
        leaving.active = false;
        let pid = produced.id;
        let mut store = ThoughtStore::from_thoughts(vec![produced, leaving]);
        assert!(apply_decay(&mut store, pid, &cfg()).is_empty());
    }

    #[test]
    fn test_victim_is_lowest_priority() {
        let a = thought(vec![1.0], 0.4);
        let b = thought(vec![1.0], 0.2);
        let c = thought(vec![1.0], 0.3);
        let bid = b.id;
        let store = ThoughtStore::from_thoughts(vec![a, b, c]);
        assert_eq!(select_eviction_victim(&store), Some(bid));
    }

    #[test]
    fn test_victim_uses_saliency() {
        let mut a = thought(vec![1.0], 0.2);
        a.score.saliency = Some(0.5);
        let b = thought(vec![1.0], 0.3);
        let bid = b.id;
        let store = ThoughtStore::from_thoughts(vec![a, b]);
        assert_eq!(select_eviction_victim(&store), Some(bid));
    }

    #[test]
    fn test_victim_tie_goes_to_first() {
        let a = thought(vec![1.0], 0.3);
        let b = thought(vec![1.0], 0.3);
        let aid = a.id;
        let store = ThoughtStore::from_thoughts(vec![a, b]);
        assert_eq!(select_eviction_victim(&store), Some(aid));
    }

    #[test]
    fn test_no_victim_when_all_pinned() {
        let mut a = thought(vec![1.0], 0.1);
        a.config.persistent = true;
        let store = ThoughtStore::from_thoughts(vec![a]);
        assert_eq!(select_eviction_victim(&store), None);
    }

    proptest! {
        #[test]
        fn prop_decay_non_increasing_and_bounded(
            weights in prop::collection::vec(0.0f64..=1.0, 2..8),
            dims in prop::collection::vec(prop::collection::vec(-1.0f64..1.0, 3), 8),
            pinned_mask in prop::collection::vec(any::<bool>(), 8),
        ) {
            let mut thoughts = Vec::new();
            for (i, w) in weights.iter().enumerate() {
                let mut t = thought(dims[i].clone(), *w);
                t.config.persistent = pinned_mask[i];
                thoughts.push(t);
            }
            let before: Vec<(Uuid, f64, bool)> = thoughts
                .iter()
                .map(|t| (t.id, t.score.weight, t.config.persistent))
                .collect();
            let produced = before[0].0;
            let mut store = ThoughtStore::from_thoughts(thoughts);

            apply_decay(&mut store, produced, &cfg());

            for (id, w, pinned) in before {
                let after = store.get(id).unwrap().score.weight;
                prop_assert!(after <= w);
                prop_assert!((0.0..=1.0).contains(&after));
                if pinned || id == produced {
                    prop_assert_eq!(after, w);
                }
            }
        }
    }
}
