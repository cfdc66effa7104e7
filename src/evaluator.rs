use serde::{Deserialize, Serialize};
use std::fmt;

use crate::board::PositionState;
use crate::errors::Result;

/// Engine score from White's point of view.
///
/// Exactly one of `cp` and `mate` is normally set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub cp: Option<i32>,
    pub mate: Option<i32>,
}

impl Score {
    pub fn centipawns(cp: i32) -> Self {
        Self { cp: Some(cp), mate: None }
    }

    pub fn mate_in(moves: i32) -> Self {
        Self { cp: None, mate: Some(moves) }
    }

    /// Same score seen from the other side
    pub fn negate(self) -> Self {
        Self {
            cp: self.cp.map(|cp| -cp),
            mate: self.mate.map(|mate| -mate),
        }
    }
}

/// One Multi-PV line reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// First move of the line in UCI notation
    pub mv: String,
    /// `None` only if the engine broke its contract
    pub score: Option<Score>,
    /// Principal variation, starting with `mv`
    pub pv: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineIdentity {
    pub name: String,
    pub version: String,
}

impl EngineIdentity {
    /// Split an `id name` value such as `Stockfish 17.1` at its last space.
    pub fn parse(id_name: &str) -> Self {
        let id_name = id_name.trim();
        match id_name.rsplit_once(' ') {
            Some((name, version)) => Self {
                name: name.to_string(),
                version: version.to_string(),
            },
            None => Self {
                name: id_name.to_string(),
                version: String::new(),
            },
        }
    }
}

impl fmt::Display for EngineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} {}", self.name, self.version)
        }
    }
}

/// Position-evaluation oracle consumed by the analyzer.
///
/// Calls block until the engine answers. Candidates are ordered best-first
/// and their scores are from White's point of view.
pub trait Evaluator<S: PositionState> {
    /// Engine name and version, queried once per analysis
    fn identity(&mut self) -> Result<EngineIdentity>;

    /// Up to `multipv` candidate lines for `state`, searched to `depth`.
    /// An empty list means the side to move has no legal moves.
    fn evaluate(&mut self, state: &S, depth: u32, multipv: usize) -> Result<Vec<Candidate>>;
}

impl<S: PositionState, E: Evaluator<S> + ?Sized> Evaluator<S> for &mut E {
    fn identity(&mut self) -> Result<EngineIdentity> {
        (**self).identity()
    }

    fn evaluate(&mut self, state: &S, depth: u32, multipv: usize) -> Result<Vec<Candidate>> {
        (**self).evaluate(state, depth, multipv)
    }
}
