use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::layout::Point;
use crate::thought::Thought;

/// Insertion-ordered thought container with a lazily rebuilt id index.
///
/// Store order is significant: eviction and merge ties go to the thought
/// encountered first.
#[derive(Debug, Default)]
pub struct ThoughtStore {
    thoughts: Vec<Thought>,
    index: HashMap<Uuid, usize>,
    index_dirty: bool,
}

impl ThoughtStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_thoughts(thoughts: Vec<Thought>) -> Self {
        Self {
            thoughts,
            index: HashMap::new(),
            index_dirty: true,
        }
    }

    fn ensure_index(&mut self) {
        if !self.index_dirty {
            return;
        }
        self.index.clear();
        for (i, t) in self.thoughts.iter().enumerate() {
            self.index.insert(t.id, i);
        }
        self.index_dirty = false;
    }

    fn position_of(&self, id: Uuid) -> Option<usize> {
        if self.index_dirty {
            self.thoughts.iter().position(|t| t.id == id)
        } else {
            self.index.get(&id).copied()
        }
    }

    pub fn len(&self) -> usize {
        self.thoughts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thoughts.is_empty()
    }

    pub fn insert(&mut self, thought: Thought) {
        if !self.index_dirty {
            self.index.insert(thought.id, self.thoughts.len());
        }
        self.thoughts.push(thought);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.position_of(id).is_some()
    }

    pub fn get(&self, id: Uuid) -> Option<&Thought> {
        self.position_of(id).map(|i| &self.thoughts[i])
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Thought> {
        self.ensure_index();
        let i = *self.index.get(&id)?;
        Some(&mut self.thoughts[i])
    }

    pub fn require_mut(&mut self, id: Uuid) -> Result<&mut Thought> {
        self.get_mut(id).ok_or(CoreError::UnknownThought(id))
    }

    /// Hard removal. Later indexes shift, so the index is rebuilt lazily.
    pub fn remove(&mut self, id: Uuid) -> Option<Thought> {
        let i = self.position_of(id)?;
        self.index_dirty = true;
        Some(self.thoughts.remove(i))
    }

    pub fn clear(&mut self) {
        self.thoughts.clear();
        self.index.clear();
        self.index_dirty = false;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thought> {
        self.thoughts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Thought> {
        self.thoughts.iter_mut()
    }

    pub fn active(&self) -> impl Iterator<Item = &Thought> {
        self.thoughts.iter().filter(|t| t.active && !t.removing)
    }

    pub fn active_non_persistent_count(&self) -> usize {
        self.thoughts.iter().filter(|t| t.is_evictable()).count()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.thoughts.iter().map(|t| t.id).collect()
    }

    // --- user operations -------------------------------------------------

    /// Raise weight by `amount`, capped at 1. View-only thoughts refuse.
    pub fn like(&mut self, id: Uuid, amount: f64, now: u64) -> Result<f64> {
        let t = self.require_interactive(id)?;
        let w = t.score.boost(amount);
        t.touch(now);
        Ok(w)
    }

    /// Lower weight by `amount`, floored at 0.
    pub fn dislike(&mut self, id: Uuid, amount: f64, now: u64) -> Result<f64> {
        let t = self.require_interactive(id)?;
        let w = t.score.decay(amount);
        t.touch(now);
        Ok(w)
    }

    pub fn pin(&mut self, id: Uuid, now: u64) -> Result<()> {
        self.set_persistent(id, true, now)
    }

    pub fn unpin(&mut self, id: Uuid, now: u64) -> Result<()> {
        self.set_persistent(id, false, now)
    }

    fn set_persistent(&mut self, id: Uuid, persistent: bool, now: u64) -> Result<()> {
        let t = self.require_mut(id)?;
        t.config.persistent = persistent;
        t.touch(now);
        Ok(())
    }

    /// Attach a reaction and boost weight. View-only thoughts refuse;
    /// an empty reaction is ignored.
    pub fn react(&mut self, id: Uuid, reaction: &str, amount: f64, now: u64) -> Result<f64> {
        let t = self.require_interactive(id)?;
        if reaction.trim().is_empty() {
            return Ok(t.score.weight);
        }
        t.user_comments.push(reaction.to_string());
        let w = t.score.boost(amount);
        t.touch(now);
        Ok(w)
    }

    fn require_interactive(&mut self, id: Uuid) -> Result<&mut Thought> {
        let t = self.require_mut(id)?;
        if !t.config.interactivity.accepts_reactions() {
            return Err(CoreError::NotInteractive(id));
        }
        Ok(t)
    }

    /// Returns whether the stored position changed.
    pub fn set_position(&mut self, id: Uuid, position: Point) -> Result<bool> {
        let t = self.require_mut(id)?;
        if t.position == Some(position) {
            return Ok(false);
        }
        t.position = Some(position);
        Ok(true)
    }

    /// First phase of destruction. Returns false when the thought was already
    /// marked, so a thought is never marked twice.
    pub fn mark_removing(&mut self, id: Uuid, now: u64) -> Result<bool> {
        let t = self.require_mut(id)?;
        if t.removing {
            return Ok(false);
        }
        t.removing = true;
        t.active = false;
        t.touch(now);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thought::Interactivity;

    fn store_with(weights: &[f64]) -> (ThoughtStore, Vec<Uuid>) {
        let mut store = ThoughtStore::new();
        let mut ids = Vec::new();
        for (i, &w) in weights.iter().enumerate() {
            let t = Thought::builder(&format!("t{i}"))
                .interactivity(Interactivity::Comment)
                .weight(w)
                .build();
            ids.push(t.id);
            store.insert(t);
        }
        (store, ids)
    }

    #[test]
    fn test_lookup_after_remove() {
        let (mut store, ids) = store_with(&[0.1, 0.2, 0.3]);
        assert!(store.remove(ids[0]).is_some());
        assert!(store.get(ids[0]).is_none());
        assert_eq!(store.get(ids[2]).unwrap().text(), "t2");
        assert_eq!(store.get_mut(ids[1]).unwrap().text(), "t1");
        assert!(store.remove(ids[0]).is_none());
    }

    #[test]
    fn test_insert_keeps_order() {
        let (store, ids) = store_with(&[0.5, 0.5, 0.5]);
        assert_eq!(store.ids(), ids);
    }

    #[test]
    fn test_like_and_dislike_clamp() {
        let (mut store, ids) = store_with(&[0.95, 0.05]);
        assert_eq!(store.like(ids[0], 0.1, 1).unwrap(), 1.0);
        assert_eq!(store.dislike(ids[1], 0.1, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_unknown_id() {
        let (mut store, _) = store_with(&[0.5]);
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.like(missing, 0.1, 0),
            Err(CoreError::UnknownThought(id)) if id == missing
        ));
        assert!(store.pin(missing, 0).is_err());
    }

    #[test]
    fn test_pin_unpin() {
        let (mut store, ids) = store_with(&[0.5]);
        store.pin(ids[0], 10).unwrap();
        assert!(store.get(ids[0]).unwrap().is_persistent());
        assert_eq!(store.active_non_persistent_count(), 0);
        store.unpin(ids[0], 11).unwrap();
        assert_eq!(store.active_non_persistent_count(), 1);
    }

    #[test]
    fn test_react_requires_interactivity() {
        let view = Thought::builder("view").build();
        let comment = Thought::builder("comment")
            .interactivity(Interactivity::Comment)
            .weight(0.5)
            .build();
        let (vid, cid) = (view.id, comment.id);
        let mut store = ThoughtStore::from_thoughts(vec![view, comment]);

        assert!(matches!(
            store.react(vid, "🔥", 0.1, 0),
            Err(CoreError::NotInteractive(_))
        ));
        let w = store.react(cid, "🔥", 0.1, 0).unwrap();
        assert!((w - 0.6).abs() < 1e-12);
        assert_eq!(store.get(cid).unwrap().user_comments, vec!["🔥".to_string()]);

        // Empty reaction leaves everything unchanged.
        let w = store.react(cid, "  ", 0.1, 0).unwrap();
        assert!((w - 0.6).abs() < 1e-12);
        assert_eq!(store.get(cid).unwrap().user_comments.len(), 1);
    }

    #[test]
    fn test_like_and_dislike_require_interactivity() {
        let view = Thought::builder("view").weight(0.5).build();
        let vid = view.id;
        let mut store = ThoughtStore::from_thoughts(vec![view]);

        assert!(matches!(
            store.like(vid, 0.1, 1),
            Err(CoreError::NotInteractive(id)) if id == vid
        ));
        assert!(matches!(
            store.dislike(vid, 0.1, 1),
            Err(CoreError::NotInteractive(_))
        ));
        let t = store.get(vid).unwrap();
        assert_eq!(t.score.weight, 0.5);
        assert_eq!(t.updated_at, t.created_at);
    }

    #[test]
    fn test_mark_removing_once() {
        let (mut store, ids) = store_with(&[0.5]);
        assert!(store.mark_removing(ids[0], 0).unwrap());
        assert!(!store.mark_removing(ids[0], 0).unwrap());
        let t = store.get(ids[0]).unwrap();
        assert!(!t.active);
        assert!(t.removing);
        assert_eq!(store.active().count(), 0);
    }

    #[test]
    fn test_set_position_reports_change() {
        let (mut store, ids) = store_with(&[0.5]);
        let p = Point::new(1.0, 2.0);
        assert!(store.set_position(ids[0], p).unwrap());
        assert!(!store.set_position(ids[0], p).unwrap());
    }
}
