//! Analysis configurations.
//!
//! Configurations live in a TOML table keyed by config id:
//!
//! ```toml
//! [configs.XS]
//! stockfish_version = "17"
//! analysis_depth_ply = 4
//! stockfish_depth_per_ply = [24, 20, 20, 20]
//! num_top_moves_per_ply = [5, 3, 3, 3]
//! balanced_threshold = 50
//! ```
//!
//! Every entry is validated while it is deserialized, so a malformed config
//! never reaches the analyzer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config_error;
use crate::errors::{DfrcError, Result};

/// Default location of the configuration table
pub const DEFAULT_CONFIG_FILE: &str = "analysis_configs.toml";

/// Parameters of one analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAnalysisConfig")]
pub struct AnalysisConfig {
    /// Engine version the analysis must be produced with (e.g. "17")
    pub stockfish_version: String,
    /// How many halfmoves to explore
    pub analysis_depth_ply: usize,
    /// Engine search depth for each halfmove
    pub stockfish_depth_per_ply: Vec<u32>,
    /// Number of candidate moves (MultiPV) for each halfmove
    pub num_top_moves_per_ply: Vec<usize>,
    /// Centipawn cutoff for a balanced position
    pub balanced_threshold: u32,
}

#[derive(Deserialize)]
struct RawAnalysisConfig {
    stockfish_version: String,
    analysis_depth_ply: usize,
    stockfish_depth_per_ply: Vec<u32>,
    num_top_moves_per_ply: Vec<usize>,
    balanced_threshold: u32,
}

impl TryFrom<RawAnalysisConfig> for AnalysisConfig {
    type Error = DfrcError;

    fn try_from(raw: RawAnalysisConfig) -> Result<Self> {
        AnalysisConfig::new(
            raw.stockfish_version,
            raw.analysis_depth_ply,
            raw.stockfish_depth_per_ply,
            raw.num_top_moves_per_ply,
            raw.balanced_threshold,
        )
    }
}

impl AnalysisConfig {
    /// Build a validated configuration.
    pub fn new(
        stockfish_version: impl Into<String>,
        analysis_depth_ply: usize,
        stockfish_depth_per_ply: Vec<u32>,
        num_top_moves_per_ply: Vec<usize>,
        balanced_threshold: u32,
    ) -> Result<Self> {
        if analysis_depth_ply == 0 {
            return Err(config_error!("analysis_depth_ply", analysis_depth_ply, "at least 1"));
        }
        if stockfish_depth_per_ply.len() != analysis_depth_ply {
            return Err(config_error!(
                "stockfish_depth_per_ply",
                format!("{} entries", stockfish_depth_per_ply.len()),
                format!("{} entries (analysis_depth_ply)", analysis_depth_ply)
            ));
        }
        if num_top_moves_per_ply.len() != analysis_depth_ply {
            return Err(config_error!(
                "num_top_moves_per_ply",
                format!("{} entries", num_top_moves_per_ply.len()),
                format!("{} entries (analysis_depth_ply)", analysis_depth_ply)
            ));
        }
        if let Some(ply) = stockfish_depth_per_ply.iter().position(|&d| d == 0) {
            return Err(config_error!(
                format!("stockfish_depth_per_ply[{}]", ply),
                0,
                "a search depth of at least 1"
            ));
        }
        if let Some(ply) = num_top_moves_per_ply.iter().position(|&m| m == 0) {
            return Err(config_error!(
                format!("num_top_moves_per_ply[{}]", ply),
                0,
                "at least one candidate move"
            ));
        }

        Ok(Self {
            stockfish_version: stockfish_version.into(),
            analysis_depth_ply,
            stockfish_depth_per_ply,
            num_top_moves_per_ply,
            balanced_threshold,
        })
    }

    /// Engine name string the configured engine is expected to report.
    pub fn expected_engine_name(&self) -> String {
        format!("Stockfish {}", self.stockfish_version)
    }

    /// Node count of the subtree hanging below `start_ply`, assuming every
    /// candidate is expanded at every remaining ply:
    /// `Σ_{d=start}^{depth-1} Π_{p=start}^{d} moves[p]`.
    pub fn subtree_size(&self, start_ply: usize) -> u64 {
        let mut total = 0u64;
        let mut product = 1u64;
        for ply in start_ply..self.analysis_depth_ply {
            product = product.saturating_mul(self.num_top_moves_per_ply[ply] as u64);
            total = total.saturating_add(product);
        }
        total
    }

    /// Upper bound on the nodes an analysis can visit, root included.
    pub fn max_nodes(&self) -> u64 {
        self.subtree_size(0).saturating_add(1)
    }
}

/// Keyed table of named configurations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfigs {
    pub configs: BTreeMap<String, AnalysisConfig>,
}

impl AnalysisConfigs {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DfrcError::IoError(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn get(&self, cfg_id: &str) -> Result<&AnalysisConfig> {
        self.configs
            .get(cfg_id)
            .ok_or_else(|| DfrcError::UnknownConfig(cfg_id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }
}
