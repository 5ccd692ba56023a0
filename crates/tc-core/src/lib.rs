//! Thought lifecycle engine.
//!
//! Decides when typed input should produce a new thought, folds near-duplicate
//! thoughts into existing ones, ages and evicts thoughts under a capacity
//! bound, places their canvas nodes without collisions and keeps the canvas
//! projection reconciled with the domain state.
//!
//! Zero I/O. Time is passed in as Unix milliseconds and randomness comes from
//! the caller's RNG, so every operation is reproducible in tests.

pub mod canvas;
pub mod config;
pub mod constants;
pub mod decay;
pub mod dedup;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod memory;
pub mod similarity;
pub mod snapshot;
pub mod store;
pub mod thought;
pub mod time;
pub mod trigger;

pub use canvas::{CanvasSync, EntitySnapshot, NodePayload, PositionEdit, SyncDiff, VisualNode};
pub use config::{LayoutConfig, LifecycleConfig, TriggerConfig, positive_finite};
pub use decay::{DecayChange, apply_decay, select_eviction_victim};
pub use dedup::{MergeDecision, find_merge_target, merge_into};
pub use error::{CoreError, Result};
pub use layout::{Bounds, Placement, PlacementStrategy, Point, Side, place_node, total_overlap};
pub use lifecycle::{CycleOutcome, Disposition, Lifecycle};
pub use memory::{Memory, MemoryItem, MemoryKind};
pub use similarity::{best_match, cosine_similarity, thought_similarity};
pub use snapshot::{CURRENT_VERSION, Snapshot, export_json, import_json};
pub use store::ThoughtStore;
pub use thought::{
    Interactivity, Score, Thought, ThoughtBuilder, ThoughtConfig, ThoughtContent, TriggerKind,
};
pub use trigger::{InputSession, InputStore, TriggerDetector, word_count};
