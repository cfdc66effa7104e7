//! Recursive engine-driven exploration of a start position.
//!
//! At every ply the evaluator is asked for the configured number of
//! candidate lines. A node is terminal once the last ply is reached, a mate
//! is found or the evaluation leaves the balanced window; otherwise every
//! candidate is expanded. Pruned subtrees are accounted for on the progress
//! bar so it tracks the worst-case amount of work.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::board::PositionState;
use crate::config::AnalysisConfig;
use crate::errors::{DfrcError, Result};
use crate::evaluator::{Candidate, Evaluator};
use crate::results::{AnalysisParams, PositionAnalysis, PositionNode, ROOT_MOVE};
use crate::validation_error;

/// Work done by one tree build
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    /// Evaluator calls
    pub evaluated: u64,
    /// Nodes skipped by terminal pruning, per the worst-case tree shape
    pub pruned: u64,
}

/// Progress bar sized for one analysis under `cfg`
pub fn analysis_progress_bar(cfg: &AnalysisConfig) -> Result<ProgressBar> {
    let pb = ProgressBar::new(cfg.max_nodes());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("🔍 Analyzing [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .map_err(|e| DfrcError::ParseError(format!("progress template: {}", e)))?
            .progress_chars("██░"),
    );
    Ok(pb)
}

/// Builds [`PositionNode`] trees with an [`Evaluator`]
pub struct TreeBuilder<'a, E> {
    cfg: &'a AnalysisConfig,
    evaluator: E,
    only_terminal_pv: bool,
    progress: ProgressBar,
    stats: BuildStats,
}

impl<'a, E> TreeBuilder<'a, E> {
    pub fn new(cfg: &'a AnalysisConfig, evaluator: E) -> Self {
        Self {
            cfg,
            evaluator,
            only_terminal_pv: true,
            progress: ProgressBar::hidden(),
            stats: BuildStats::default(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Keep the PV on intermediate nodes too when `false`
    pub fn only_terminal_pv(mut self, only_terminal_pv: bool) -> Self {
        self.only_terminal_pv = only_terminal_pv;
        self
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    pub fn progress(&self) -> &ProgressBar {
        &self.progress
    }

    pub fn into_evaluator(self) -> E {
        self.evaluator
    }

    /// Explore `state`, which sits `ply` halfmoves below the analysed start
    /// position. The returned node is labelled as a subtree root.
    ///
    /// `Ok(None)` means the side to move has no legal moves.
    pub fn build<S>(&mut self, state: &S, ply: usize) -> Result<Option<PositionNode>>
    where
        S: PositionState,
        E: Evaluator<S>,
    {
        if ply >= self.cfg.analysis_depth_ply {
            return Err(validation_error!(
                "ply",
                ply,
                format!("< {}", self.cfg.analysis_depth_ply)
            ));
        }
        self.expand(state, ply, ROOT_MOVE)
    }

    fn expand<S>(&mut self, state: &S, ply: usize, mv: &str) -> Result<Option<PositionNode>>
    where
        S: PositionState,
        E: Evaluator<S>,
    {
        self.progress.inc(1);
        self.stats.evaluated += 1;

        let depth = self.cfg.stockfish_depth_per_ply[ply];
        let multipv = self.cfg.num_top_moves_per_ply[ply];
        let candidates = self.evaluator.evaluate(state, depth, multipv)?;
        debug!(ply, mv, candidates = candidates.len(), "evaluated {}", state.describe());

        let Some(best) = candidates.first() else {
            return Ok(None);
        };
        check_scores(&candidates, ply)?;
        let (cpl, mate) = white_eval(best, ply)?;

        let last_ply = ply + 1 >= self.cfg.analysis_depth_ply;
        let terminal = last_ply
            || mate.is_some()
            || cpl.is_some_and(|cp| cp.unsigned_abs() >= self.cfg.balanced_threshold);

        let mut children = Vec::new();
        if terminal {
            if !last_ply {
                let pruned = (candidates.len() as u64).saturating_mul(self.cfg.subtree_size(ply + 1));
                self.stats.pruned = self.stats.pruned.saturating_add(pruned);
                self.progress.inc(pruned);
            }
        } else {
            for candidate in &candidates {
                let mut next = state.clone();
                next.play(&candidate.mv)?;
                if let Some(child) = self.expand(&next, ply + 1, &candidate.mv)? {
                    children.push(child);
                }
            }
        }

        let pv = if ply == 0 || !self.only_terminal_pv || terminal {
            Some(best.pv.clone())
        } else {
            None
        };

        Ok(Some(PositionNode {
            mv: mv.to_string(),
            children,
            analysis: PositionAnalysis { cpl, mate, pv },
        }))
    }
}

fn check_scores(candidates: &[Candidate], ply: usize) -> Result<()> {
    match candidates.iter().position(|c| c.score.is_none()) {
        Some(rank) => Err(DfrcError::MissingScore { ply, rank }),
        None => Ok(()),
    }
}

/// `(cpl, mate)` of the best line; centipawns win over mate when both are set
fn white_eval(best: &Candidate, ply: usize) -> Result<(Option<i32>, Option<i32>)> {
    let score = best.score.ok_or(DfrcError::MissingScore { ply, rank: 0 })?;
    match (score.cp, score.mate) {
        (Some(cp), _) => Ok((Some(cp), None)),
        (None, Some(mate)) => Ok((None, Some(mate))),
        (None, None) => Err(DfrcError::MissingScore { ply, rank: 0 }),
    }
}

/// Analyse the start position of `params`' pair under `cfg`.
pub fn analyse<S, E>(params: &AnalysisParams, cfg: &AnalysisConfig, evaluator: E) -> Result<PositionNode>
where
    S: PositionState,
    E: Evaluator<S>,
{
    analyse_with_progress::<S, E>(params, cfg, evaluator, ProgressBar::hidden())
}

/// [`analyse`] reporting to `progress`, which is finished on success and
/// abandoned on error.
pub fn analyse_with_progress<S, E>(
    params: &AnalysisParams,
    cfg: &AnalysisConfig,
    mut evaluator: E,
    progress: ProgressBar,
) -> Result<PositionNode>
where
    S: PositionState,
    E: Evaluator<S>,
{
    let identity = evaluator.identity()?;
    let expected = cfg.expected_engine_name();
    info!(engine = %identity, "engine identified");
    if identity.to_string() != expected {
        return Err(DfrcError::EngineVersionMismatch {
            expected,
            found: identity.to_string(),
        });
    }

    let state = S::from_pair(params.white_id, params.black_id)?;
    info!(
        white_id = params.white_id,
        black_id = params.black_id,
        cfg_id = %params.cfg_id,
        "analyzing {}",
        state.describe()
    );

    let mut builder = TreeBuilder::new(cfg, evaluator).with_progress(progress);
    let tree = match builder.build(&state, 0) {
        Ok(tree) => tree,
        Err(e) => {
            builder.progress().abandon();
            return Err(e);
        }
    };
    builder.progress().finish();

    let tree = tree.ok_or_else(|| DfrcError::NoLegalMoves { fen: state.describe() })?;
    let stats = builder.stats();
    info!(
        white_id = params.white_id,
        black_id = params.black_id,
        nodes = tree.node_count(),
        evaluated = stats.evaluated,
        pruned = stats.pruned,
        "analysis complete"
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{EngineIdentity, Score};
    use std::collections::HashMap;

    /// Move list standing in for a board; any move is legal
    #[derive(Debug, Clone, PartialEq)]
    struct Line(Vec<String>);

    impl PositionState for Line {
        fn from_pair(_white_id: u16, _black_id: u16) -> Result<Self> {
            Ok(Line(Vec::new()))
        }

        fn play(&mut self, uci: &str) -> Result<()> {
            self.0.push(uci.to_string());
            Ok(())
        }

        fn describe(&self) -> String {
            self.0.join(" ")
        }
    }

    /// Answers from a table keyed by the line played so far
    struct Scripted {
        name: &'static str,
        answers: HashMap<String, Vec<Candidate>>,
        calls: Vec<(String, u32, usize)>,
    }

    impl Scripted {
        fn new(answers: &[(&str, Vec<Candidate>)]) -> Self {
            Self {
                name: "Stockfish 17",
                answers: answers
                    .iter()
                    .map(|(line, candidates)| (line.to_string(), candidates.clone()))
                    .collect(),
                calls: Vec::new(),
            }
        }
    }

    impl Evaluator<Line> for Scripted {
        fn identity(&mut self) -> Result<EngineIdentity> {
            Ok(EngineIdentity::parse(self.name))
        }

        fn evaluate(&mut self, state: &Line, depth: u32, multipv: usize) -> Result<Vec<Candidate>> {
            self.calls.push((state.describe(), depth, multipv));
            let mut candidates = self.answers.get(&state.describe()).cloned().unwrap_or_default();
            candidates.truncate(multipv);
            Ok(candidates)
        }
    }

    fn cp(mv: &str, cp: i32) -> Candidate {
        Candidate {
            mv: mv.to_string(),
            score: Some(Score::centipawns(cp)),
            pv: vec![mv.to_string(), format!("{}-reply", mv)],
        }
    }

    fn mate(mv: &str, moves: i32) -> Candidate {
        Candidate {
            mv: mv.to_string(),
            score: Some(Score::mate_in(moves)),
            pv: vec![mv.to_string()],
        }
    }

    fn config(depth: usize, moves: Vec<usize>, threshold: u32) -> AnalysisConfig {
        let depths = (0..depth as u32).map(|p| 20 - p).collect();
        AnalysisConfig::new("17", depth, depths, moves, threshold).unwrap()
    }

    fn params() -> AnalysisParams {
        AnalysisParams {
            white_id: 518,
            black_id: 518,
            threads: 1,
            hash_size: 16,
            cfg_id: "T".to_string(),
        }
    }

    #[test]
    fn test_expands_every_candidate_until_last_ply() {
        let cfg = config(3, vec![2, 2, 1], 50);
        let mut engine = Scripted::new(&[
            ("", vec![cp("a", 10), cp("b", 20)]),
            ("a", vec![cp("c", 5), cp("d", 15)]),
            ("b", vec![cp("e", 0), cp("f", -30)]),
            ("a c", vec![cp("g", 8)]),
            ("a d", vec![cp("h", 12)]),
            ("b e", vec![cp("i", 1)]),
            ("b f", vec![cp("j", -2)]),
        ]);

        let tree = analyse::<Line, _>(&params(), &cfg, &mut engine).unwrap();

        assert_eq!(tree.mv, "root");
        assert_eq!(tree.node_count(), 7);
        assert_eq!(tree.height(), 2);
        let first_moves: Vec<&str> = tree.children.iter().map(|c| c.mv.as_str()).collect();
        assert_eq!(first_moves, vec!["a", "b"]);
        assert_eq!(tree.children[1].children[1].mv, "f");
        assert_eq!(tree.children[1].children[1].analysis.cpl, Some(-2));

        // Depth and MultiPV follow the ply
        assert_eq!(engine.calls[0], ("".to_string(), 20, 2));
        assert_eq!(engine.calls[1], ("a".to_string(), 19, 2));
        assert_eq!(engine.calls[2], ("a c".to_string(), 18, 1));
        assert_eq!(engine.calls.len(), 7);
    }

    #[test]
    fn test_pv_kept_on_root_and_terminal_nodes_only() {
        let cfg = config(2, vec![1, 1], 50);
        let mut engine = Scripted::new(&[("", vec![cp("a", 10)]), ("a", vec![cp("b", 10)])]);

        let tree = analyse::<Line, _>(&params(), &cfg, &mut engine).unwrap();
        assert_eq!(tree.analysis.pv, Some(vec!["a".to_string(), "a-reply".to_string()]));
        assert!(tree.children[0].analysis.pv.is_some());

        let cfg = config(3, vec![1, 1, 1], 50);
        let mut engine = Scripted::new(&[
            ("", vec![cp("a", 10)]),
            ("a", vec![cp("b", 10)]),
            ("a b", vec![cp("c", 10)]),
        ]);
        let tree = analyse::<Line, _>(&params(), &cfg, &mut engine).unwrap();
        let middle = &tree.children[0];
        assert_eq!(middle.analysis.pv, None);
        assert!(middle.children[0].analysis.pv.is_some());
    }

    #[test]
    fn test_all_pvs_kept_when_requested() {
        let cfg = config(3, vec![1, 1, 1], 50);
        let mut engine = Scripted::new(&[
            ("", vec![cp("a", 10)]),
            ("a", vec![cp("b", 10)]),
            ("a b", vec![cp("c", 10)]),
        ]);
        let mut builder = TreeBuilder::new(&cfg, &mut engine).only_terminal_pv(false);
        let tree = builder.build(&Line(Vec::new()), 0).unwrap().unwrap();
        assert!(tree.children[0].analysis.pv.is_some());
    }

    #[test]
    fn test_unbalanced_and_mate_nodes_are_terminal() {
        let cfg = config(4, vec![2, 2, 2, 2], 50);
        let mut engine = Scripted::new(&[
            ("", vec![cp("a", 0), cp("b", 0)]),
            ("a", vec![cp("c", 50), cp("d", 60)]),
            ("b", vec![mate("e", 3), cp("f", 0)]),
        ]);

        let mut builder = TreeBuilder::new(&cfg, &mut engine);
        let tree = builder.build(&Line(Vec::new()), 0).unwrap().unwrap();

        assert_eq!(tree.node_count(), 3);
        let a = &tree.children[0];
        assert!(a.is_leaf());
        assert_eq!(a.analysis.cpl, Some(50));
        let b = &tree.children[1];
        assert!(b.is_leaf());
        assert_eq!((b.analysis.cpl, b.analysis.mate), (None, Some(3)));

        // Both ply-1 nodes pruned two candidates each, with subtree_size(2) = 2 + 4
        let stats = builder.stats();
        assert_eq!(stats.evaluated, 3);
        assert_eq!(stats.pruned, 2 * (2 * 6));
    }

    #[test]
    fn test_dead_end_branch_is_dropped() {
        let cfg = config(3, vec![2, 1, 1], 50);
        let mut engine = Scripted::new(&[
            ("", vec![cp("a", 10), cp("b", 20)]),
            // "a" has no answer: no legal moves
            ("b", vec![cp("c", 5)]),
            ("b c", vec![cp("d", 5)]),
        ]);

        let tree = analyse::<Line, _>(&params(), &cfg, &mut engine).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].mv, "b");
    }

    #[test]
    fn test_root_without_moves_fails() {
        let cfg = config(2, vec![2, 2], 50);
        let mut engine = Scripted::new(&[]);
        match analyse::<Line, _>(&params(), &cfg, &mut engine) {
            Err(DfrcError::NoLegalMoves { .. }) => {}
            other => panic!("Expected NoLegalMoves, got {:?}", other),
        }
    }

    #[test]
    fn test_engine_version_mismatch() {
        let cfg = config(1, vec![1], 50);
        let mut engine = Scripted::new(&[("", vec![cp("a", 0)])]);
        engine.name = "Stockfish 16.1";

        match analyse::<Line, _>(&params(), &cfg, &mut engine) {
            Err(DfrcError::EngineVersionMismatch { expected, found }) => {
                assert_eq!(expected, "Stockfish 17");
                assert_eq!(found, "Stockfish 16.1");
            }
            other => panic!("Expected EngineVersionMismatch, got {:?}", other),
        }
        assert!(engine.calls.is_empty());
    }

    #[test]
    fn test_missing_score_is_fatal() {
        let cfg = config(2, vec![2, 1], 50);
        let unscored = Candidate {
            mv: "b".to_string(),
            score: None,
            pv: vec!["b".to_string()],
        };
        let mut engine = Scripted::new(&[("", vec![cp("a", 0), unscored])]);

        assert_eq!(
            analyse::<Line, _>(&params(), &cfg, &mut engine),
            Err(DfrcError::MissingScore { ply: 0, rank: 1 })
        );

        let empty_score = Candidate {
            mv: "a".to_string(),
            score: Some(Score::default()),
            pv: vec!["a".to_string()],
        };
        let mut engine = Scripted::new(&[("", vec![empty_score])]);
        assert_eq!(
            analyse::<Line, _>(&params(), &cfg, &mut engine),
            Err(DfrcError::MissingScore { ply: 0, rank: 0 })
        );
    }

    #[test]
    fn test_progress_counts_evaluated_nodes() {
        let cfg = config(2, vec![2, 1], 50);
        let mut engine = Scripted::new(&[
            ("", vec![cp("a", 0), cp("b", 0)]),
            ("a", vec![cp("c", 0)]),
            ("b", vec![cp("d", 0)]),
        ]);
        let bar = ProgressBar::hidden();
        bar.set_length(cfg.max_nodes());
        let mut builder = TreeBuilder::new(&cfg, &mut engine).with_progress(bar);
        builder.build(&Line(Vec::new()), 0).unwrap();

        assert_eq!(builder.progress().position(), 3);
        assert_eq!(builder.stats(), BuildStats { evaluated: 3, pruned: 0 });
    }

    #[test]
    fn test_build_rejects_ply_past_the_last() {
        let cfg = config(2, vec![1, 1], 50);
        let mut engine = Scripted::new(&[("", vec![cp("a", 10)])]);
        let mut builder = TreeBuilder::new(&cfg, &mut engine);

        match builder.build(&Line(Vec::new()), 2) {
            Err(DfrcError::OutOfRange { field, value, .. }) => {
                assert_eq!(field, "ply");
                assert_eq!(value, "2");
            }
            other => panic!("Expected OutOfRange, got {:?}", other),
        }
        assert_eq!(builder.stats().evaluated, 0);
        assert!(builder.build(&Line(Vec::new()), 1).unwrap().is_some());
    }

    #[test]
    fn test_progress_abandoned_when_analysis_fails() {
        let cfg = config(2, vec![1, 1], 50);
        let unscored = Candidate {
            mv: "a".to_string(),
            score: None,
            pv: vec!["a".to_string()],
        };
        let mut engine = Scripted::new(&[("", vec![unscored])]);
        let progress = ProgressBar::hidden();

        let result = analyse_with_progress::<Line, _>(&params(), &cfg, &mut engine, progress.clone());
        assert!(matches!(result, Err(DfrcError::MissingScore { ply: 0, rank: 0 })));
        assert!(progress.is_finished());
    }
}
