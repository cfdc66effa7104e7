//! Nested-set linearization of analysis trees.
//!
//! Each node gets a `(lft, rgt)` interval: the root starts at `lft = 1`, a
//! first child starts right after its parent's `lft`, a later child right
//! after its left sibling's `rgt`, and a node closes one past its last
//! child's `rgt`. Ancestry is interval containment, so the flat records can
//! be stored and queried without child pointers.

use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::errors::{DfrcError, Result};
use crate::results::{PositionAnalysis, PositionNode};
use crate::validation_error;

/// One flattened tree node (row of the tree table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub dfrc_id: u32,
    pub cfg_id: String,
    pub lft: u32,
    pub rgt: u32,
    #[serde(rename = "move")]
    pub mv: String,
    pub cpl: Option<i32>,
    pub mate: Option<i32>,
    pub pv: Option<Vec<String>>,
}

impl TreeNode {
    /// True if `other` lies strictly inside this node's interval
    pub fn contains(&self, other: &TreeNode) -> bool {
        self.lft < other.lft && other.rgt < self.rgt
    }

    /// Number of descendants
    pub fn descendant_count(&self) -> u32 {
        self.rgt.saturating_sub(self.lft).saturating_sub(1) / 2
    }

    fn analysis(&self) -> PositionAnalysis {
        PositionAnalysis {
            cpl: self.cpl,
            mate: self.mate,
            pv: self.pv.clone(),
        }
    }
}

/// Flatten `root` into one record per node, in preorder (ascending `lft`).
pub fn flatten(root: &PositionNode, dfrc_id: u32, cfg_id: &str) -> Vec<TreeNode> {
    let mut nodes = Vec::with_capacity(root.node_count());
    assign_intervals(root, dfrc_id, cfg_id, 1, &mut nodes);
    nodes
}

/// Push `node` and its subtree starting at `lft`; returns the node's `rgt`.
fn assign_intervals(
    node: &PositionNode,
    dfrc_id: u32,
    cfg_id: &str,
    lft: u32,
    out: &mut Vec<TreeNode>,
) -> u32 {
    let index = out.len();
    out.push(TreeNode {
        dfrc_id,
        cfg_id: cfg_id.to_string(),
        lft,
        rgt: lft + 1,
        mv: node.mv.clone(),
        cpl: node.analysis.cpl,
        mate: node.analysis.mate,
        pv: node.analysis.pv.clone(),
    });

    let mut next = lft + 1;
    for child in &node.children {
        next = assign_intervals(child, dfrc_id, cfg_id, next, out) + 1;
    }
    out[index].rgt = next;
    next
}

/// Rebuild the recursive tree from flattened records given in any order.
///
/// Fails if the records mix trees, if an interval is empty or overlaps a
/// sibling, or if the numbering has gaps.
pub fn rebuild(nodes: &[TreeNode]) -> Result<PositionNode> {
    let mut sorted: Vec<&TreeNode> = nodes.iter().collect();
    sorted.sort_by_key(|node| node.lft);

    let first = sorted
        .first()
        .ok_or_else(|| validation_error!("nodes", 0, "at least one tree node"))?;
    if let Some(stray) = sorted
        .iter()
        .find(|node| node.dfrc_id != first.dfrc_id || node.cfg_id != first.cfg_id)
    {
        return Err(validation_error!(
            "dfrc_id/cfg_id",
            format!("{}/{}", stray.dfrc_id, stray.cfg_id),
            format!("{}/{} for every node", first.dfrc_id, first.cfg_id)
        ));
    }

    let mut stack: Vec<(u32, PositionNode)> = Vec::new();
    let mut root: Option<PositionNode> = None;

    for node in &sorted {
        if node.lft >= node.rgt {
            return Err(validation_error!(
                "rgt",
                node.rgt,
                format!("> lft ({})", node.lft)
            ));
        }
        while stack.last().is_some_and(|(rgt, _)| *rgt < node.lft) {
            close_subtree(&mut stack, &mut root)?;
        }
        match stack.last() {
            Some((parent_rgt, _)) if node.rgt >= *parent_rgt => {
                return Err(validation_error!(
                    "rgt",
                    node.rgt,
                    format!("< {} (enclosing interval)", parent_rgt)
                ));
            }
            None if root.is_some() => {
                return Err(validation_error!("lft", node.lft, "a node inside the root interval"));
            }
            _ => {}
        }
        stack.push((node.rgt, PositionNode::new(node.mv.clone(), node.analysis())));
    }
    while !stack.is_empty() {
        close_subtree(&mut stack, &mut root)?;
    }

    let root = root.ok_or_else(|| validation_error!("nodes", 0, "a root node"))?;

    // Gaps or duplicated bounds show up as a different numbering
    let renumbered = flatten(&root, first.dfrc_id, &first.cfg_id);
    for (expected, actual) in renumbered.iter().zip(&sorted) {
        if expected.lft != actual.lft || expected.rgt != actual.rgt {
            return Err(validation_error!(
                "interval",
                format!("({}, {})", actual.lft, actual.rgt),
                format!("({}, {})", expected.lft, expected.rgt)
            ));
        }
    }

    Ok(root)
}

fn close_subtree(stack: &mut Vec<(u32, PositionNode)>, root: &mut Option<PositionNode>) -> Result<()> {
    let Some((_, finished)) = stack.pop() else {
        return Ok(());
    };
    match stack.last_mut() {
        Some((_, parent)) => parent.children.push(finished),
        None if root.is_none() => *root = Some(finished),
        None => {
            return Err(validation_error!("root", finished.mv, "a single root node"));
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct CsvRow<'a> {
    dfrc_id: u32,
    cfg_id: &'a str,
    lft: u32,
    rgt: u32,
    #[serde(rename = "move")]
    mv: &'a str,
    cpl: Option<i32>,
    mate: Option<i32>,
    pv: Option<String>,
}

/// Write tree rows as CSV with a header; the PV is space-separated.
pub fn write_csv<W: Write>(nodes: &[TreeNode], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for node in nodes {
        csv_writer.serialize(CsvRow {
            dfrc_id: node.dfrc_id,
            cfg_id: &node.cfg_id,
            lft: node.lft,
            rgt: node.rgt,
            mv: &node.mv,
            cpl: node.cpl,
            mate: node.mate,
            pv: node.pv.as_ref().map(|pv| pv.join(" ")),
        })?;
    }
    csv_writer
        .flush()
        .map_err(|e| DfrcError::IoError(format!("CSV flush failed: {}", e)))
}
