//! Tunable lifecycle parameters.
//!
//! Every field has a default from [`crate::constants`], so a partial TOML or
//! JSON document deserializes into a complete config.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{CoreError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub max_thought_count: usize,
    pub decay_rate: f64,
    pub isolation_penalty: f64,
    pub like_amount: f64,
    pub merge_boost: f64,
    pub merge_threshold: f64,
    pub decay_similarity_threshold: f64,
    pub removal_delay_ms: u64,
    pub recent_memory_limit: usize,
    pub trigger: TriggerConfig,
    pub layout: LayoutConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_thought_count: MAX_THOUGHT_COUNT,
            decay_rate: DECAY_RATE,
            isolation_penalty: ISOLATION_PENALTY,
            like_amount: LIKE_AMOUNT,
            merge_boost: MERGE_BOOST,
            merge_threshold: MERGE_THRESHOLD,
            decay_similarity_threshold: DECAY_SIMILARITY_THRESHOLD,
            removal_delay_ms: REMOVAL_DELAY_MS,
            recent_memory_limit: RECENT_MEMORY_LIMIT,
            trigger: TriggerConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub idle_threshold_ms: u64,
    pub word_threshold: usize,
    pub sentence_threshold: usize,
    pub min_idle_chars: usize,
    pub debounce_ms: u64,
    pub idle_poll_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            idle_threshold_ms: IDLE_THRESHOLD_MS,
            word_threshold: WORD_THRESHOLD,
            sentence_threshold: SENTENCE_THRESHOLD,
            min_idle_chars: MIN_IDLE_CHARS,
            debounce_ms: DEBOUNCE_MS,
            idle_poll_ms: IDLE_POLL_MS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_width: f64,
    pub node_height: f64,
    pub grid_cols: usize,
    pub grid_rows: usize,
    pub samples_per_cell: usize,
    pub overlap_tolerance: f64,
    pub edge_padding: f64,
    pub jitter: f64,
    pub fallback_radius: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: NODE_WIDTH,
            node_height: NODE_HEIGHT,
            grid_cols: GRID_COLS,
            grid_rows: GRID_ROWS,
            samples_per_cell: SAMPLES_PER_CELL,
            overlap_tolerance: OVERLAP_TOLERANCE,
            edge_padding: EDGE_PADDING,
            jitter: JITTER,
            fallback_radius: FALLBACK_RADIUS,
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_thought_count < 1 {
            return invalid("max_thought_count must be at least 1");
        }
        for (name, v) in [
            ("decay_rate", self.decay_rate),
            ("isolation_penalty", self.isolation_penalty),
            ("like_amount", self.like_amount),
            ("merge_boost", self.merge_boost),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return invalid(&format!("{name} must be within [0, 1], got {v}"));
            }
        }
        for (name, v) in [
            ("merge_threshold", self.merge_threshold),
            ("decay_similarity_threshold", self.decay_similarity_threshold),
        ] {
            if !(-1.0..=1.0).contains(&v) {
                return invalid(&format!("{name} must be within [-1, 1], got {v}"));
            }
        }
        if self.trigger.word_threshold == 0 {
            return invalid("trigger.word_threshold must be at least 1");
        }
        self.layout.validate()
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.grid_cols == 0 || self.grid_rows == 0 {
            return invalid("layout grid must have at least one row and column");
        }
        if self.samples_per_cell == 0 {
            return invalid("layout.samples_per_cell must be at least 1");
        }
        if !(positive_finite(self.node_width) && positive_finite(self.node_height)) {
            return invalid("layout node size must be positive and finite");
        }
        if !(0.0..=1.0).contains(&self.overlap_tolerance) {
            return invalid("layout.overlap_tolerance must be within [0, 1]");
        }
        for (name, v) in [
            ("edge_padding", self.edge_padding),
            ("jitter", self.jitter),
            ("fallback_radius", self.fallback_radius),
        ] {
            if !(v >= 0.0 && v.is_finite()) {
                return invalid(&format!("layout.{name} must be finite and non-negative, got {v}"));
            }
        }
        Ok(())
    }

    pub fn node_area(&self) -> f64 {
        self.node_width * self.node_height
    }
}

pub fn positive_finite(v: f64) -> bool {
    v > 0.0 && v.is_finite()
}

fn invalid(msg: &str) -> Result<()> {
    Err(CoreError::InvalidConfig(msg.to_string()))
}
