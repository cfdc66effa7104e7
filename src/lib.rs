//! # DFRC Analysis
//!
//! Start-position analysis for **Double Fischer Random Chess**: each side gets
//! its own Chess960 back rank, giving 960 × 960 start positions. This crate
//! explores a position pair with a chess engine and rates how balanced and how
//! sharp it is.
//!
//! ## Features
//!
//! - **Position codec**: Scharnagl numbers ↔ back ranks, and a bijective pair id
//!   (`dfrc_id`) with the symmetric pairs first
//! - **Tree builder**: bounded-depth Multi-PV exploration with terminal pruning,
//!   driven by any [`Evaluator`] (Stockfish over UCI included)
//! - **Nested sets**: lossless flattening of analysis trees into `(lft, rgt)` rows
//! - **Scoring**: balance, per-colour sharpness and playability in `[0, 1]`
//! - **Storage**: JSON analysis units, SQLite result tables and CSV export
//!
//! ## Quick Start
//!
//! ```rust
//! use dfrc_analysis::codec::{decode_position, encode_position, pair_to_uid, uid_to_pair};
//!
//! # fn main() -> dfrc_analysis::Result<()> {
//! assert_eq!(encode_position(518)?, "rnbqkbnr");
//! assert_eq!(decode_position("rnbqkbnr")?, 518);
//!
//! // Symmetric pairs come first, so the classical start is 518 again
//! assert_eq!(pair_to_uid(518, 518)?, 518);
//! assert_eq!(uid_to_pair(960)?, (0, 1));
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod errors;

// Re-export commonly used types
pub use errors::{DfrcError, Result};

pub mod analyzer;
pub mod board;
pub mod codec;
pub mod config;
pub mod evaluator;
pub mod logging;
pub mod nested_set;
pub mod persistence;
pub mod results;
pub mod scoring;
pub mod stockfish;

pub use analyzer::{analyse, analyse_with_progress, BuildStats, TreeBuilder};
pub use board::{DfrcBoard, PositionState};
pub use config::{AnalysisConfig, AnalysisConfigs};
pub use evaluator::{Candidate, EngineIdentity, Evaluator, Score};
pub use nested_set::{flatten, rebuild, TreeNode};
pub use persistence::ResultStore;
pub use results::{build_analysis_result, AnalysisData, AnalysisParams, AnalysisResult, PositionAnalysis, PositionNode};
pub use scoring::{balance_score, harmonic_mean, playability_score, Sharpness};
pub use stockfish::{StockfishConfig, StockfishEngine};
