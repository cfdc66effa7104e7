//! End-to-end run: real DFRC boards, a deterministic engine stand-in,
//! flattening, scoring and storage.

use dfrc_analysis::analyzer::{analyse, TreeBuilder};
use dfrc_analysis::board::{DfrcBoard, PositionState};
use dfrc_analysis::codec::{encode_position, pair_to_uid};
use dfrc_analysis::config::AnalysisConfig;
use dfrc_analysis::errors::{DfrcError, Result};
use dfrc_analysis::evaluator::{Candidate, EngineIdentity, Evaluator, Score};
use dfrc_analysis::nested_set::{flatten, rebuild};
use dfrc_analysis::persistence::ResultStore;
use dfrc_analysis::results::{build_analysis_result, AnalysisData, AnalysisParams};
use dfrc_analysis::scoring::{score_nodes, score_tree};

/// Pawn moves that are legal in every DFRC start position for the first
/// three plies, scored from the move history
struct PawnPusher {
    calls: usize,
}

const WHITE_FIRST: [&str; 3] = ["e2e4", "d2d4", "c2c4"];
const BLACK_REPLY: [&str; 3] = ["e7e5", "d7d5", "c7c6"];
const WHITE_SECOND: [&str; 3] = ["a2a3", "h2h3", "b2b3"];

impl Evaluator<DfrcBoard> for PawnPusher {
    fn identity(&mut self) -> Result<EngineIdentity> {
        Ok(EngineIdentity::parse("Stockfish 17"))
    }

    fn evaluate(&mut self, state: &DfrcBoard, _depth: u32, multipv: usize) -> Result<Vec<Candidate>> {
        self.calls += 1;
        let menu = match state.moves().len() {
            0 => WHITE_FIRST,
            1 => BLACK_REPLY,
            _ => WHITE_SECOND,
        };
        let history: usize = state.moves().iter().map(|m| m.len() + m.as_bytes()[1] as usize).sum();

        Ok(menu
            .iter()
            .take(multipv)
            .enumerate()
            .map(|(rank, mv)| Candidate {
                mv: mv.to_string(),
                score: Some(Score::centipawns(((history * 7 + rank * 23) % 90) as i32 - 30)),
                pv: vec![mv.to_string()],
            })
            .collect())
    }
}

fn config() -> AnalysisConfig {
    AnalysisConfig::new("17", 3, vec![16, 14, 12], vec![3, 2, 2], 50).unwrap()
}

fn params(white_id: u16, black_id: u16) -> AnalysisParams {
    AnalysisParams {
        white_id,
        black_id,
        threads: 2,
        hash_size: 64,
        cfg_id: "T".to_string(),
    }
}

#[test]
fn test_full_pipeline_on_real_boards() {
    let cfg = config();
    let mut engine = PawnPusher { calls: 0 };
    let params = params(0, 959);

    let tree = analyse::<DfrcBoard, _>(&params, &cfg, &mut engine).unwrap();
    assert_eq!(tree.mv, "root");
    assert!(tree.analysis.pv.is_some());
    assert!(tree.height() <= cfg.analysis_depth_ply - 1);
    assert_eq!(engine.calls, tree.node_count());

    // JSON unit survives a round trip
    let data = AnalysisData {
        params: params.clone(),
        analyzer: "pipeline".to_string(),
        analysis_tree: tree.clone(),
    };
    let restored = AnalysisData::from_json(&data.to_json().unwrap()).unwrap();
    assert_eq!(restored, data);

    // Flattening is lossless and scoring agrees across both forms
    let dfrc_id = pair_to_uid(0, 959).unwrap();
    let nodes = flatten(&tree, dfrc_id, "T");
    assert_eq!(nodes.len(), tree.node_count());
    assert_eq!(rebuild(&nodes).unwrap(), tree);
    assert_eq!(score_tree(&tree, &cfg).unwrap(), score_nodes(&nodes, &cfg).unwrap());

    // Results and tree rows land in the store
    let result = build_analysis_result(&data, &cfg).unwrap();
    assert_eq!(result.dfrc_id, dfrc_id);
    assert_eq!(result.white, encode_position(0).unwrap());
    assert_eq!(result.black, encode_position(959).unwrap());
    assert!(result.mirrored);
    assert!(!result.flipped);
    assert_eq!(result.swapped_id, pair_to_uid(959, 0).unwrap());

    let store = ResultStore::in_memory().unwrap();
    store.save_tree(&nodes).unwrap();
    store.save_result(&result).unwrap();
    assert_eq!(store.load_tree(dfrc_id, "T").unwrap(), nodes);
    assert_eq!(store.load_result(dfrc_id, "T").unwrap(), Some(result));
}

#[test]
fn test_illegal_engine_move_aborts_analysis() {
    struct Liar;

    impl Evaluator<DfrcBoard> for Liar {
        fn identity(&mut self) -> Result<EngineIdentity> {
            Ok(EngineIdentity::parse("Stockfish 17"))
        }

        fn evaluate(&mut self, _state: &DfrcBoard, _depth: u32, _multipv: usize) -> Result<Vec<Candidate>> {
            Ok(vec![Candidate {
                mv: "e2e5".to_string(),
                score: Some(Score::centipawns(0)),
                pv: vec!["e2e5".to_string()],
            }])
        }
    }

    match analyse::<DfrcBoard, _>(&params(518, 518), &config(), Liar) {
        Err(DfrcError::IllegalMove { mv, .. }) => assert_eq!(mv, "e2e5"),
        other => panic!("Expected IllegalMove, got {:?}", other),
    }
}

#[test]
fn test_builder_reuses_one_evaluator_across_pairs() {
    let cfg = config();
    let mut engine = PawnPusher { calls: 0 };
    let mut total = 0;

    for (white, black) in [(518, 518), (100, 200), (959, 0)] {
        let start = DfrcBoard::from_pair(white, black).unwrap();
        let mut builder = TreeBuilder::new(&cfg, &mut engine);
        let tree = builder.build(&start, 0).unwrap().unwrap();
        total += tree.node_count();
        assert_eq!(builder.stats().evaluated as usize, tree.node_count());
    }

    assert_eq!(engine.calls, total);
}
