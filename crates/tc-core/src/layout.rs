//! Collision-avoiding placement of new visual nodes.
//!
//! Nodes are axis-aligned rectangles of a fixed size addressed by their
//! top-left corner. Placement scans a coarse grid over the bounds, samples a
//! few jittered candidates per cell and keeps the first one with the least
//! overlap. The scan order and every random draw come from the caller's RNG,
//! so a seeded RNG gives a reproducible layout.

use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::constants::EPSILON;

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Placement rectangle given by its four corners (screen coordinates, y down).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

impl Bounds {
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            top_left: Point::new(x, y),
            top_right: Point::new(x + width, y),
            bottom_left: Point::new(x, y + height),
            bottom_right: Point::new(x + width, y + height),
        }
    }

    fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }

    pub fn min_x(&self) -> f64 {
        self.corners().iter().map(|p| p.x).fold(f64::INFINITY, f64::min)
    }

    pub fn max_x(&self) -> f64 {
        self.corners()
            .iter()
            .map(|p| p.x)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_y(&self) -> f64 {
        self.corners().iter().map(|p| p.y).fold(f64::INFINITY, f64::min)
    }

    pub fn max_y(&self) -> f64 {
        self.corners()
            .iter()
            .map(|p| p.y)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    pub fn height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x() + self.max_x()) / 2.0,
            (self.min_y() + self.max_y()) / 2.0,
        )
    }
}

/// Which edge of the bounds a new node should gravitate towards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStrategy {
    /// Nothing placed yet; sampled from the (preferred region of the) interior.
    Empty,
    /// Found by the grid scan.
    Grid,
    /// Grid scan found nothing within tolerance; offset from the centroid.
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Point,
    /// Summed overlap ratio against all existing nodes.
    pub overlap: f64,
    pub strategy: PlacementStrategy,
}

/// `intersectionArea / nodeArea` for two equally sized nodes.
pub fn overlap_ratio(a: Point, b: Point, cfg: &LayoutConfig) -> f64 {
    let ix = (a.x + cfg.node_width).min(b.x + cfg.node_width) - a.x.max(b.x);
    let iy = (a.y + cfg.node_height).min(b.y + cfg.node_height) - a.y.max(b.y);
    if ix <= 0.0 || iy <= 0.0 {
        return 0.0;
    }
    (ix * iy) / cfg.node_area()
}

/// Overlap of a candidate against every existing node, summed.
pub fn total_overlap(candidate: Point, existing: &[Point], cfg: &LayoutConfig) -> f64 {
    existing
        .iter()
        .map(|p| overlap_ratio(candidate, *p, cfg))
        .sum()
}

/// Range of top-left corners that keep a node inside the padded bounds.
#[derive(Clone, Copy, Debug)]
struct Region {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Region {
    fn interior(bounds: &Bounds, cfg: &LayoutConfig) -> Self {
        let min_x = bounds.min_x() + cfg.edge_padding;
        let min_y = bounds.min_y() + cfg.edge_padding;
        // Bounds smaller than a node collapse the range to its origin.
        let max_x = (bounds.max_x() - cfg.edge_padding - cfg.node_width).max(min_x);
        let max_y = (bounds.max_y() - cfg.edge_padding - cfg.node_height).max(min_y);
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// The third of the region nearest `side`.
    fn toward(&self, side: Side) -> Self {
        let third_w = (self.max_x - self.min_x) / 3.0;
        let third_h = (self.max_y - self.min_y) / 3.0;
        match side {
            Side::Left => Self {
                max_x: self.min_x + third_w,
                ..*self
            },
            Side::Right => Self {
                min_x: self.max_x - third_w,
                ..*self
            },
            Side::Top => Self {
                max_y: self.min_y + third_h,
                ..*self
            },
            Side::Bottom => Self {
                min_y: self.max_y - third_h,
                ..*self
            },
        }
    }

    fn sample(&self, rng: &mut impl Rng) -> Point {
        Point::new(
            rng.random_range(self.min_x..=self.max_x),
            rng.random_range(self.min_y..=self.max_y),
        )
    }

    fn clamp(&self, p: Point) -> Point {
        Point::new(
            p.x.clamp(self.min_x, self.max_x),
            p.y.clamp(self.min_y, self.max_y),
        )
    }
}

fn jitter(p: Point, amount: f64, rng: &mut impl Rng) -> Point {
    if amount <= 0.0 {
        return p;
    }
    Point::new(
        p.x + rng.random_range(-amount..=amount),
        p.y + rng.random_range(-amount..=amount),
    )
}

/// Compute a position for a new node.
///
/// `existing` holds the top-left corners of nodes already on the canvas.
pub fn place_node(
    bounds: &Bounds,
    existing: &[Point],
    preference: Option<Side>,
    cfg: &LayoutConfig,
    rng: &mut impl Rng,
) -> Placement {
    let region = Region::interior(bounds, cfg);

    if existing.is_empty() {
        let target = preference.map_or(region, |side| region.toward(side));
        let position = region.clamp(jitter(target.sample(rng), cfg.jitter, rng));
        return Placement {
            position,
            overlap: 0.0,
            strategy: PlacementStrategy::Empty,
        };
    }

    if let Some(found) = grid_search(bounds, &region, existing, preference, cfg, rng) {
        return found;
    }

    fallback(&region, existing, cfg, rng)
}

/// Grid cells as (col, row), ordered by preference.
fn cell_order(
    bounds: &Bounds,
    preference: Option<Side>,
    cfg: &LayoutConfig,
) -> Vec<(usize, usize)> {
    let cell_w = bounds.width() / cfg.grid_cols as f64;
    let cell_h = bounds.height() / cfg.grid_rows as f64;
    let center = bounds.center();

    let mut keyed: Vec<((usize, f64), (usize, usize))> =
        Vec::with_capacity(cfg.grid_cols * cfg.grid_rows);
    for row in 0..cfg.grid_rows {
        for col in 0..cfg.grid_cols {
            let cell_center = Point::new(
                bounds.min_x() + (col as f64 + 0.5) * cell_w,
                bounds.min_y() + (row as f64 + 0.5) * cell_h,
            );
            let edge_rank = match preference {
                Some(Side::Left) => col,
                Some(Side::Right) => cfg.grid_cols - 1 - col,
                Some(Side::Top) => row,
                Some(Side::Bottom) => cfg.grid_rows - 1 - row,
                None => 0,
            };
            keyed.push(((edge_rank, cell_center.distance(center)), (col, row)));
        }
    }

    // Stable: equal keys keep row-major order.
    keyed.sort_by(|(a, _), (b, _)| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
    keyed.into_iter().map(|(_, cell)| cell).collect()
}

fn grid_search(
    bounds: &Bounds,
    region: &Region,
    existing: &[Point],
    preference: Option<Side>,
    cfg: &LayoutConfig,
    rng: &mut impl Rng,
) -> Option<Placement> {
    let cell_w = bounds.width() / cfg.grid_cols as f64;
    let cell_h = bounds.height() / cfg.grid_rows as f64;
    let mut best: Option<(Point, f64)> = None;

    for (col, row) in cell_order(bounds, preference, cfg) {
        let base = Point::new(
            bounds.min_x() + (col as f64 + 0.5) * cell_w - cfg.node_width / 2.0,
            bounds.min_y() + (row as f64 + 0.5) * cell_h - cfg.node_height / 2.0,
        );
        for _ in 0..cfg.samples_per_cell {
            let candidate = region.clamp(jitter(base, cfg.jitter, rng));
            let overlap = total_overlap(candidate, existing, cfg);
            if overlap < EPSILON {
                return Some(Placement {
                    position: candidate,
                    overlap: 0.0,
                    strategy: PlacementStrategy::Grid,
                });
            }
            let better = best.is_none_or(|(_, best_overlap)| overlap < best_overlap);
            if overlap <= cfg.overlap_tolerance && better {
                best = Some((candidate, overlap));
            }
        }
    }

    best.map(|(position, overlap)| Placement {
        position,
        overlap,
        strategy: PlacementStrategy::Grid,
    })
}

fn fallback(
    region: &Region,
    existing: &[Point],
    cfg: &LayoutConfig,
    rng: &mut impl Rng,
) -> Placement {
    let n = existing.len() as f64;
    let centroid = Point::new(
        existing.iter().map(|p| p.x).sum::<f64>() / n,
        existing.iter().map(|p| p.y).sum::<f64>() / n,
    );
    let angle = rng.random_range(0.0..TAU);
    let position = region.clamp(Point::new(
        centroid.x + cfg.fallback_radius * angle.cos(),
        centroid.y + cfg.fallback_radius * angle.sin(),
    ));
    Placement {
        position,
        overlap: total_overlap(position, existing, cfg),
        strategy: PlacementStrategy::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn canvas() -> Bounds {
        Bounds::from_rect(0.0, 0.0, 1200.0, 800.0)
    }

    fn inside(p: Point, bounds: &Bounds, cfg: &LayoutConfig) -> bool {
        p.x >= bounds.min_x()
            && p.y >= bounds.min_y()
            && p.x + cfg.node_width <= bounds.max_x()
            && p.y + cfg.node_height <= bounds.max_y()
    }

    #[test]
    fn test_bounds_from_unordered_corners() {
        let b = Bounds {
            top_left: Point::new(100.0, 50.0),
            top_right: Point::new(10.0, 50.0),
            bottom_left: Point::new(100.0, 5.0),
            bottom_right: Point::new(10.0, 5.0),
        };
        assert_eq!(b.min_x(), 10.0);
        assert_eq!(b.max_x(), 100.0);
        assert_eq!(b.min_y(), 5.0);
        assert_eq!(b.max_y(), 50.0);
        assert_eq!(b.center(), Point::new(55.0, 27.5));
    }

    #[test]
    fn test_overlap_ratio() {
        let cfg = LayoutConfig::default();
        let a = Point::new(0.0, 0.0);
        assert!((overlap_ratio(a, a, &cfg) - 1.0).abs() < 1e-12);
        let half = Point::new(cfg.node_width / 2.0, 0.0);
        assert!((overlap_ratio(a, half, &cfg) - 0.5).abs() < 1e-12);
        let touching = Point::new(cfg.node_width, 0.0);
        assert_eq!(overlap_ratio(a, touching, &cfg), 0.0);
        let far = Point::new(1000.0, 1000.0);
        assert_eq!(overlap_ratio(a, far, &cfg), 0.0);
    }

    #[test]
    fn test_overlap_symmetric() {
        let cfg = LayoutConfig::default();
        let a = Point::new(10.0, 20.0);
        let b = Point::new(80.0, 55.0);
        assert_eq!(overlap_ratio(a, b, &cfg), overlap_ratio(b, a, &cfg));
    }

    #[test]
    fn test_empty_canvas_inside_bounds() {
        let cfg = LayoutConfig::default();
        let bounds = canvas();
        let mut rng = rng();
        for _ in 0..50 {
            let p = place_node(&bounds, &[], None, &cfg, &mut rng);
            assert_eq!(p.strategy, PlacementStrategy::Empty);
            assert!(inside(p.position, &bounds, &cfg), "{:?}", p.position);
        }
    }

    #[test]
    fn test_empty_canvas_respects_side() {
        let cfg = LayoutConfig::default();
        let bounds = canvas();
        let mut rng = rng();
        let region_w = bounds.width() - 2.0 * cfg.edge_padding - cfg.node_width;
        for _ in 0..50 {
            let left = place_node(&bounds, &[], Some(Side::Left), &cfg, &mut rng);
            assert!(left.position.x <= cfg.edge_padding + region_w / 3.0 + cfg.jitter);
            let right = place_node(&bounds, &[], Some(Side::Right), &cfg, &mut rng);
            assert!(right.position.x >= cfg.edge_padding + 2.0 * region_w / 3.0 - cfg.jitter);
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let cfg = LayoutConfig::default();
        let bounds = canvas();
        let existing = [Point::new(500.0, 350.0), Point::new(100.0, 100.0)];
        let a = place_node(&bounds, &existing, None, &cfg, &mut rng());
        let b = place_node(&bounds, &existing, None, &cfg, &mut rng());
        assert_eq!(a, b);
    }

    #[test]
    fn test_populated_finds_free_cell() {
        let cfg = LayoutConfig::default();
        let bounds = canvas();
        let existing = [Point::new(500.0, 350.0)];
        let p = place_node(&bounds, &existing, None, &cfg, &mut rng());
        assert_eq!(p.strategy, PlacementStrategy::Grid);
        assert_eq!(p.overlap, 0.0);
        assert_eq!(total_overlap(p.position, &existing, &cfg), 0.0);
    }

    #[test]
    fn test_sequential_placements_never_overlap() {
        let cfg = LayoutConfig::default();
        let bounds = canvas();
        let mut rng = rng();
        let mut placed: Vec<Point> = Vec::new();
        for _ in 0..10 {
            let p = place_node(&bounds, &placed, None, &cfg, &mut rng);
            assert_eq!(p.overlap, 0.0, "overlap after {} nodes", placed.len());
            assert!(inside(p.position, &bounds, &cfg));
            placed.push(p.position);
        }
    }

    #[test]
    fn test_side_preference_on_populated_canvas() {
        let cfg = LayoutConfig::default();
        let bounds = canvas();
        let existing = [Point::new(40.0, 40.0)];
        let p = place_node(&bounds, &existing, Some(Side::Right), &cfg, &mut rng());
        assert_eq!(p.strategy, PlacementStrategy::Grid);
        assert!(p.position.x > bounds.center().x, "{:?}", p.position);
    }

    #[test]
    fn test_centered_first_without_preference() {
        let cfg = LayoutConfig::default();
        let bounds = canvas();
        let order = cell_order(&bounds, None, &cfg);
        // The four middle cells of a 4x4 grid are equidistant from the centre.
        let first_four: Vec<_> = order[..4].to_vec();
        assert_eq!(first_four, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_edge_first_with_preference() {
        let cfg = LayoutConfig::default();
        let order = cell_order(&canvas(), Some(Side::Top), &cfg);
        assert!(order[..4].iter().all(|&(_, row)| row == 0));
        let order = cell_order(&canvas(), Some(Side::Left), &cfg);
        assert!(order[..4].iter().all(|&(col, _)| col == 0));
    }

    #[test]
    fn test_crowded_canvas_falls_back() {
        let cfg = LayoutConfig::default();
        // Exactly one node fits inside the padding.
        let bounds = Bounds::from_rect(
            0.0,
            0.0,
            cfg.node_width + 2.0 * cfg.edge_padding,
            cfg.node_height + 2.0 * cfg.edge_padding,
        );
        let existing = [Point::new(cfg.edge_padding, cfg.edge_padding)];
        let p = place_node(&bounds, &existing, None, &cfg, &mut rng());
        assert_eq!(p.strategy, PlacementStrategy::Fallback);
        assert!((p.overlap - 1.0).abs() < 1e-12);
        assert_eq!(p.position, existing[0]);
    }

    #[test]
    fn test_tolerated_overlap_is_minimal_candidate() {
        let cfg = LayoutConfig {
            grid_cols: 1,
            grid_rows: 1,
            samples_per_cell: 5,
            overlap_tolerance: 0.5,
            ..Default::default()
        };
        let bounds = Bounds::from_rect(0.0, 0.0, 400.0, 200.0);
        // Sits on the right half of the only cell.
        let existing = [Point::new(250.0, 50.0)];
        let p = place_node(&bounds, &existing, None, &cfg, &mut rng());
        assert_eq!(p.strategy, PlacementStrategy::Grid);
        assert!(p.overlap > 0.0 && p.overlap <= 0.5);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!("Left".parse::<Side>().unwrap(), Side::Left);
        assert_eq!("bottom".parse::<Side>().unwrap(), Side::Bottom);
        assert!("middle".parse::<Side>().is_err());
        assert_eq!(Side::Top.to_string(), "top");
    }
}
