//! Projection of domain entities onto canvas nodes.
//!
//! The canvas keeps its own node collection, separate from the thought and
//! input stores, and looks nodes up by the id of the entity they render.
//! [`CanvasSync::reconcile`] brings the projection up to date and reports
//! exactly what it changed; a second run over the same entities reports
//! nothing.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LayoutConfig;
use crate::layout::{Bounds, Point, place_node};
use crate::thought::Thought;
use crate::trigger::InputSession;

/// What a node renders, by entity kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodePayload {
    Thought {
        text: String,
        weight: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        saliency: Option<f64>,
        persistent: bool,
        active: bool,
    },
    Input {
        text: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualNode {
    pub id: Uuid,
    pub position: Point,
    pub entity_id: Uuid,
    /// Exit transition running; kept until `finish_removal`.
    pub is_removing: bool,
    pub payload: NodePayload,
}

/// The domain side of one entity, as seen by the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySnapshot {
    pub entity_id: Uuid,
    pub position: Option<Point>,
    pub removing: bool,
    pub payload: NodePayload,
}

impl From<&Thought> for EntitySnapshot {
    fn from(t: &Thought) -> Self {
        Self {
            entity_id: t.id,
            position: t.position,
            removing: t.removing,
            payload: NodePayload::Thought {
                text: t.content.text.clone(),
                weight: t.score.weight,
                saliency: t.score.saliency,
                persistent: t.config.persistent,
                active: t.active,
            },
        }
    }
}

impl From<&InputSession> for EntitySnapshot {
    fn from(s: &InputSession) -> Self {
        Self {
            entity_id: s.id,
            position: s.position,
            removing: false,
            payload: NodePayload::Input {
                text: s.current_text.clone(),
            },
        }
    }
}

/// A position to write to one side of the projection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEdit {
    pub entity_id: Uuid,
    pub position: Point,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncDiff {
    pub created: Vec<VisualNode>,
    pub updated: Vec<VisualNode>,
    /// Node ids.
    pub deleted: Vec<Uuid>,
    /// Positions computed for entities that had none; write back to the domain.
    pub placements: Vec<PositionEdit>,
}

impl SyncDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.placements.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct CanvasSync {
    nodes: Vec<VisualNode>,
    by_entity: HashMap<Uuid, usize>,
}

impl CanvasSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[VisualNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_for(&self, entity_id: Uuid) -> Option<&VisualNode> {
        self.by_entity.get(&entity_id).map(|&i| &self.nodes[i])
    }

    fn reindex(&mut self) {
        self.by_entity.clear();
        for (i, n) in self.nodes.iter().enumerate() {
            self.by_entity.insert(n.entity_id, i);
        }
    }

    /// Bring the nodes in line with `entities`.
    ///
    /// Orphaned nodes are deleted first (unless mid-removal) so the space they
    /// held is free for new placements. Removing entities never get a new
    /// node.
    pub fn reconcile(
        &mut self,
        entities: &[EntitySnapshot],
        bounds: &Bounds,
        cfg: &LayoutConfig,
        rng: &mut impl Rng,
    ) -> SyncDiff {
        let mut diff = SyncDiff::default();
        let present: HashSet<Uuid> = entities.iter().map(|e| e.entity_id).collect();

        let before = self.nodes.len();
        self.nodes.retain(|n| {
            let keep = n.is_removing || present.contains(&n.entity_id);
            if !keep {
                diff.deleted.push(n.id);
            }
            keep
        });
        if self.nodes.len() != before {
            self.reindex();
        }

        for entity in entities {
            match self.by_entity.get(&entity.entity_id).copied() {
                Some(i) => {
                    let node = &mut self.nodes[i];
                    let position = entity.position.unwrap_or(node.position);
                    if node.position != position
                        || node.is_removing != entity.removing
                        || node.payload != entity.payload
                    {
                        node.position = position;
                        node.is_removing = entity.removing;
                        node.payload = entity.payload.clone();
                        diff.updated.push(node.clone());
                    }
                }
                None if entity.removing => {}
                None => {
                    let position = match entity.position {
                        Some(p) => p,
                        None => {
                            let existing: Vec<Point> =
                                self.nodes.iter().map(|n| n.position).collect();
                            let placed = place_node(bounds, &existing, None, cfg, rng).position;
                            diff.placements.push(PositionEdit {
                                entity_id: entity.entity_id,
                                position: placed,
                            });
                            placed
                        }
                    };
                    let node = VisualNode {
                        id: Uuid::new_v4(),
                        position,
                        entity_id: entity.entity_id,
                        is_removing: false,
                        payload: entity.payload.clone(),
                    };
                    self.by_entity.insert(node.entity_id, self.nodes.len());
                    self.nodes.push(node.clone());
                    diff.created.push(node);
                }
            }
        }

        diff
    }

    /// A canvas drag. Returns the edit for the domain only when the node
    /// actually moved.
    pub fn move_node(&mut self, entity_id: Uuid, position: Point) -> Option<PositionEdit> {
        let &i = self.by_entity.get(&entity_id)?;
        let node = &mut self.nodes[i];
        if node.position == position {
            return None;
        }
        node.position = position;
        Some(PositionEdit {
            entity_id,
            position,
        })
    }

    /// Drop the node once its exit transition is over.
    pub fn finish_removal(&mut self, entity_id: Uuid) -> Option<VisualNode> {
        let i = self.by_entity.remove(&entity_id)?;
        let node = self.nodes.remove(i);
        self.reindex();
        Some(node)
    }

    /// Remove every node at once (session teardown).
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.by_entity.clear();
    }
}
