//! Balance, sharpness and playability scores.
//!
//! All scores live in `[0, 1]`:
//! - **balance**: 0 for a dead-level start position, rising towards 1 as the
//!   root evaluation drifts away from equality (1 for a forced mate);
//! - **sharpness**: 1 when exactly one balanced line per colour survives,
//!   falling towards 0 as more lines stay playable;
//! - **playability**: harmonic mean of the two.
//!
//! Sharpness counts balanced nodes per colour. A node belongs to the colour
//! that played its move: plies 1, 3, 5, ... are White's, plies 2, 4, ... are
//! Black's. In the nested-set form the same split is read off `lft`: even
//! `lft` is a White move, odd `lft` other than the root (`lft == 1`) is a
//! Black move. The root itself is never counted.

use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::config::AnalysisConfig;
use crate::errors::{DfrcError, Result};
use crate::nested_set::TreeNode;
use crate::results::PositionNode;

/// `2ab / (a + b)`, or 0 when `a + b == 0`
pub fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b == 0.0 {
        return 0.0;
    }
    2.0 * a * b / (a + b)
}

/// Normalized logistic curve mapping `|cpl|` to an imbalance in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceCurve {
    /// Centipawn value at which the score saturates to 1
    pub threshold: f64,
    /// Steepness around the midpoint `threshold / 2`
    pub steepness: f64,
}

impl Default for BalanceCurve {
    fn default() -> Self {
        Self {
            threshold: 50.0,
            steepness: 10.0,
        }
    }
}

impl BalanceCurve {
    fn raw(&self, x: f64) -> f64 {
        let k = self.steepness / self.threshold;
        1.0 / (1.0 + (-k * (x - self.threshold / 2.0)).exp())
    }

    pub fn score(&self, cpl: Option<i32>, mate: Option<i32>) -> Result<f64> {
        if mate.is_some() {
            return Ok(1.0);
        }
        let cpl = cpl.ok_or(DfrcError::MissingEvaluation)?;

        let min = self.raw(0.0);
        let max = self.raw(self.threshold);
        let x = f64::from(cpl).abs();
        Ok(((self.raw(x) - min) / (max - min)).clamp(0.0, 1.0))
    }
}

/// Imbalance of a position under the default [`BalanceCurve`].
pub fn balance_score(cpl: Option<i32>, mate: Option<i32>) -> Result<f64> {
    BalanceCurve::default().score(cpl, mate)
}

/// Per-colour and combined sharpness; `None` means not enough balanced
/// lines to judge
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sharpness {
    pub white: Option<f64>,
    pub black: Option<f64>,
    pub total: Option<f64>,
}

/// Every score of one analysed position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionScores {
    pub balance: f64,
    pub sharpness: Sharpness,
    pub playability: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BalancedCounts {
    white: u64,
    black: u64,
}

impl BalancedCounts {
    fn record(&mut self, color: Color, cpl: Option<i32>, threshold: u32) {
        if !is_balanced(cpl, threshold) {
            return;
        }
        match color {
            Color::White => self.white += 1,
            Color::Black => self.black += 1,
        }
    }

    fn from_tree(root: &PositionNode, threshold: u32) -> Self {
        let mut counts = Self::default();
        let mut stack: Vec<(&PositionNode, usize)> = vec![(root, 0)];
        while let Some((node, ply)) = stack.pop() {
            if let Some(color) = color_of_ply(ply) {
                counts.record(color, node.analysis.cpl, threshold);
            }
            stack.extend(node.children.iter().map(|child| (child, ply + 1)));
        }
        counts
    }

    fn from_nodes(nodes: &[TreeNode], threshold: u32) -> Self {
        let mut counts = Self::default();
        for node in nodes {
            if let Some(color) = color_of_lft(node.lft) {
                counts.record(color, node.cpl, threshold);
            }
        }
        counts
    }
}

fn is_balanced(cpl: Option<i32>, threshold: u32) -> bool {
    cpl.is_some_and(|cpl| cpl.unsigned_abs() <= threshold)
}

/// Colour that played the move leading to a node `ply` halfmoves below the root
pub fn color_of_ply(ply: usize) -> Option<Color> {
    match ply {
        0 => None,
        p if p % 2 == 1 => Some(Color::White),
        _ => Some(Color::Black),
    }
}

/// Colour that played the move of a flattened node
pub fn color_of_lft(lft: u32) -> Option<Color> {
    match lft {
        1 => None,
        l if l % 2 == 0 => Some(Color::White),
        _ => Some(Color::Black),
    }
}

/// Nodes one complete line needs for `color`: `ceil(depth/2)` for White,
/// `floor(depth/2)` for Black
pub fn min_needed(cfg: &AnalysisConfig, color: Color) -> u64 {
    let depth = cfg.analysis_depth_ply as u64;
    match color {
        Color::White => depth.div_ceil(2),
        Color::Black => depth / 2,
    }
}

/// Nodes `color` would have if every candidate at every ply were balanced
pub fn max_possible(cfg: &AnalysisConfig, color: Color) -> u64 {
    let mut total = 0u64;
    let mut product = 1u64;
    for (ply, &moves) in cfg.num_top_moves_per_ply.iter().enumerate() {
        product = product.saturating_mul(moves as u64);
        let ply_color = if ply % 2 == 0 { Color::White } else { Color::Black };
        if ply_color == color {
            total = total.saturating_add(product);
        }
    }
    total
}

/// Sharpness of one colour given its balanced node count.
pub fn color_sharpness(balanced: u64, min_needed: u64, max_possible: u64) -> Option<f64> {
    if balanced == 0 || balanced < min_needed {
        return None;
    }
    if balanced == min_needed {
        return Some(1.0);
    }
    if max_possible <= min_needed {
        return Some(0.0);
    }
    let ratio = (balanced - min_needed) as f64 / (max_possible - min_needed) as f64;
    Some((1.0 - ratio).clamp(0.0, 1.0))
}

fn sharpness_from_counts(counts: BalancedCounts, cfg: &AnalysisConfig) -> Sharpness {
    let white = color_sharpness(
        counts.white,
        min_needed(cfg, Color::White),
        max_possible(cfg, Color::White),
    );
    let black = color_sharpness(
        counts.black,
        min_needed(cfg, Color::Black),
        max_possible(cfg, Color::Black),
    );
    let total = match (white, black) {
        (Some(w), Some(b)) => Some(harmonic_mean(w, b)),
        _ => None,
    };

    Sharpness { white, black, total }
}

/// Sharpness of a flattened tree
pub fn sharpness(nodes: &[TreeNode], cfg: &AnalysisConfig) -> Sharpness {
    sharpness_from_counts(BalancedCounts::from_nodes(nodes, cfg.balanced_threshold), cfg)
}

/// Sharpness of a recursive tree; equal to [`sharpness`] of its flattening
pub fn sharpness_from_tree(root: &PositionNode, cfg: &AnalysisConfig) -> Sharpness {
    sharpness_from_counts(BalancedCounts::from_tree(root, cfg.balanced_threshold), cfg)
}

/// Harmonic mean of balance and total sharpness, `None` without the latter
pub fn playability_score(balance: f64, sharpness: &Sharpness) -> Option<f64> {
    sharpness.total.map(|total| harmonic_mean(balance, total))
}

/// Score a recursive tree.
pub fn score_tree(root: &PositionNode, cfg: &AnalysisConfig) -> Result<PositionScores> {
    let balance = balance_score(root.analysis.cpl, root.analysis.mate)?;
    let sharpness = sharpness_from_tree(root, cfg);
    Ok(PositionScores {
        balance,
        playability: playability_score(balance, &sharpness),
        sharpness,
    })
}

/// Score a flattened tree; the root is the node with `lft == 1`.
pub fn score_nodes(nodes: &[TreeNode], cfg: &AnalysisConfig) -> Result<PositionScores> {
    let root = nodes
        .iter()
        .find(|node| node.lft == 1)
        .ok_or(DfrcError::MissingEvaluation)?;
    let balance = balance_score(root.cpl, root.mate)?;
    let sharpness = sharpness(nodes, cfg);
    Ok(PositionScores {
        balance,
        playability: playability_score(balance, &sharpness),
        sharpness,
    })
}
