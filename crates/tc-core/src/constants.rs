/// Non-persistent active thoughts allowed on the canvas at once.
pub const MAX_THOUGHT_COUNT: usize = 5;

/// Score subtracted from every other non-persistent thought per generation cycle.
pub const DECAY_RATE: f64 = 0.05;

/// Extra decay for thoughts with no similar neighbour.
pub const ISOLATION_PENALTY: f64 = 0.05;

/// Weight added by like/dislike/react.
pub const LIKE_AMOUNT: f64 = 0.1;

/// Weight added to an existing thought when a near-duplicate is merged into it.
pub const MERGE_BOOST: f64 = 0.1;

/// Cosine similarity above which a candidate merges into an existing thought.
pub const MERGE_THRESHOLD: f64 = 0.7;

/// Cosine similarity above which a thought counts as connected and skips the isolation penalty.
pub const DECAY_SIMILARITY_THRESHOLD: f64 = 0.2;

/// Delay between mark-for-removal and hard removal (exit transition window).
pub const REMOVAL_DELAY_MS: u64 = 1000;

/// Quiet period after the last keystroke before the idle trigger may fire.
pub const IDLE_THRESHOLD_MS: u64 = 3000;

/// Words typed since the last generation before the word-count trigger fires.
pub const WORD_THRESHOLD: usize = 5;

/// Minimum words in a completed sentence for the sentence-end trigger.
pub const SENTENCE_THRESHOLD: usize = 3;

/// Minimum non-whitespace delta length for the idle trigger.
pub const MIN_IDLE_CHARS: usize = 3;

/// Keystroke debounce before input triggers are evaluated.
pub const DEBOUNCE_MS: u64 = 300;

/// Idle poll period, independent of keystrokes.
pub const IDLE_POLL_MS: u64 = 1000;

/// Layout footprint of a visual node.
pub const NODE_WIDTH: f64 = 200.0;
pub const NODE_HEIGHT: f64 = 100.0;

/// Placement grid dimensions.
pub const GRID_COLS: usize = 4;
pub const GRID_ROWS: usize = 4;

/// Jittered candidates tried per grid cell.
pub const SAMPLES_PER_CELL: usize = 3;

/// Largest overlap ratio accepted when no overlap-free candidate exists.
pub const OVERLAP_TOLERANCE: f64 = 0.10;

/// Margin kept between nodes and the bounds edge.
pub const EDGE_PADDING: f64 = 20.0;

/// Max random offset applied to a candidate position on each axis.
pub const JITTER: f64 = 20.0;

/// Distance from the centroid of existing nodes used by the fallback placement.
pub const FALLBACK_RADIUS: f64 = 150.0;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// Memory items forwarded with each generation request.
pub const RECENT_MEMORY_LIMIT: usize = 5;

/// Starting weight for thoughts whose generator supplied no score seed.
pub const DEFAULT_WEIGHT: f64 = 0.5;
