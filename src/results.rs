//! Analysis trees and the records derived from them.
//!
//! [`AnalysisData`] is the unit exchanged between the analyzer and the
//! scorer: the pair, the resources it was analysed with and the full
//! [`PositionNode`] tree, serialized as nested JSON. [`AnalysisResult`] is
//! the aggregate row computed from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::codec::{encode_position, is_flipped, is_mirrored, pair_to_uid, swapped_uid};
use crate::config::AnalysisConfig;
use crate::errors::{DfrcError, Result};
use crate::scoring::score_tree;

/// Move sentinel carried by the root of every analysis tree
pub const ROOT_MOVE: &str = "root";

/// Evaluation of one position, from White's point of view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAnalysis {
    pub cpl: Option<i32>,
    pub mate: Option<i32>,
    pub pv: Option<Vec<String>>,
}

/// One halfmove of the exploration tree and its evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionNode {
    #[serde(rename = "move")]
    pub mv: String,
    pub children: Vec<PositionNode>,
    pub analysis: PositionAnalysis,
}

impl PositionNode {
    pub fn new(mv: impl Into<String>, analysis: PositionAnalysis) -> Self {
        Self {
            mv: mv.into(),
            children: Vec::new(),
            analysis,
        }
    }

    pub fn root(analysis: PositionAnalysis) -> Self {
        Self::new(ROOT_MOVE, analysis)
    }

    pub fn is_root(&self) -> bool {
        self.mv == ROOT_MOVE
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, itself included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(PositionNode::node_count).sum::<usize>()
    }

    /// Length of the longest line below this node, in plies
    pub fn height(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.height() + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Pair and engine resources of one analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub white_id: u16,
    pub black_id: u16,
    pub threads: usize,
    #[serde(alias = "hash")]
    pub hash_size: usize,
    pub cfg_id: String,
}

impl AnalysisParams {
    pub fn dfrc_id(&self) -> Result<u32> {
        pair_to_uid(self.white_id, self.black_id)
    }
}

/// Serialized analysis unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisData {
    #[serde(flatten)]
    pub params: AnalysisParams,
    /// Who ran the analysis
    #[serde(rename = "analyzer_identity", alias = "analyzer")]
    pub analyzer: String,
    pub analysis_tree: PositionNode,
}

impl AnalysisData {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)
            .map_err(|e| DfrcError::IoError(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| DfrcError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}

/// Aggregate scores of one analysed pair (row of the results table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub dfrc_id: u32,
    pub cfg_id: String,

    pub white_id: u16,
    pub black_id: u16,
    pub white: String,
    pub black: String,

    pub analyzer: String,
    pub threads: usize,
    pub hash_size: usize,

    pub starting_pos_cpl: Option<i32>,
    pub starting_pos_mate: Option<i32>,

    pub white_sharpness: Option<f64>,
    pub black_sharpness: Option<f64>,
    pub total_sharpness: Option<f64>,
    pub balance_score: f64,
    pub playability_score: Option<f64>,

    pub mirrored: bool,
    pub flipped: bool,
    pub swapped_id: u32,

    pub created_at: DateTime<Utc>,
}

/// Score the tree of `data` under `cfg` and assemble its results row.
pub fn build_analysis_result(data: &AnalysisData, cfg: &AnalysisConfig) -> Result<AnalysisResult> {
    let params = &data.params;
    let white = encode_position(params.white_id)?;
    let black = encode_position(params.black_id)?;
    let dfrc_id = params.dfrc_id()?;

    let scores = score_tree(&data.analysis_tree, cfg)?;
    let root = &data.analysis_tree.analysis;

    Ok(AnalysisResult {
        dfrc_id,
        cfg_id: params.cfg_id.clone(),
        white_id: params.white_id,
        black_id: params.black_id,
        mirrored: is_mirrored(&white, &black),
        flipped: is_flipped(&white, &black),
        swapped_id: swapped_uid(dfrc_id)?,
        white,
        black,
        analyzer: data.analyzer.clone(),
        threads: params.threads,
        hash_size: params.hash_size,
        starting_pos_cpl: root.cpl,
        starting_pos_mate: root.mate,
        white_sharpness: scores.sharpness.white,
        black_sharpness: scores.sharpness.black,
        total_sharpness: scores.sharpness.total,
        balance_score: scores.balance,
        playability_score: scores.playability,
        created_at: Utc::now(),
    })
}
