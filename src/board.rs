use shakmaty::{fen::Fen, uci::Uci, CastlingMode, Chess, Color, Position};

use crate::codec::start_fen;
use crate::errors::{DfrcError, Result};

/// Position handed to an [`Evaluator`](crate::evaluator::Evaluator).
///
/// The analyzer only needs to create the start position of a DFRC pair and
/// advance it by UCI moves; legality is the implementation's concern.
pub trait PositionState: Clone {
    /// Start position of the given (white, black) back-rank pair
    fn from_pair(white_id: u16, black_id: u16) -> Result<Self>;

    /// Play a move given in UCI notation
    fn play(&mut self, uci: &str) -> Result<()>;

    /// Human-readable description for logs and errors
    fn describe(&self) -> String;
}

/// DFRC board backed by shakmaty with Chess960 castling.
///
/// Keeps the start FEN and the moves played so engines can be fed
/// `position fen <start> moves ...` without re-serializing the board.
#[derive(Debug, Clone)]
pub struct DfrcBoard {
    start_fen: String,
    moves: Vec<String>,
    position: Chess,
}

impl DfrcBoard {
    pub fn from_fen(fen: &str) -> Result<Self> {
        let parsed: Fen = fen
            .parse()
            .map_err(|e| DfrcError::ParseError(format!("Invalid FEN '{}': {}", fen, e)))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Chess960)
            .map_err(|e| DfrcError::ParseError(format!("Illegal FEN position '{}': {}", fen, e)))?;

        Ok(Self {
            start_fen: fen.to_string(),
            moves: Vec::new(),
            position,
        })
    }

    pub fn start_fen(&self) -> &str {
        &self.start_fen
    }

    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn white_to_move(&self) -> bool {
        self.position.turn() == Color::White
    }

    pub fn legal_move_count(&self) -> usize {
        self.position.legal_moves().len()
    }

    /// Argument of the UCI `position` command for this board
    pub fn uci_position(&self) -> String {
        if self.moves.is_empty() {
            format!("fen {}", self.start_fen)
        } else {
            format!("fen {} moves {}", self.start_fen, self.moves.join(" "))
        }
    }
}

impl PositionState for DfrcBoard {
    fn from_pair(white_id: u16, black_id: u16) -> Result<Self> {
        Self::from_fen(&start_fen(white_id, black_id)?)
    }

    fn play(&mut self, uci: &str) -> Result<()> {
        let illegal = |reason: String| DfrcError::IllegalMove {
            mv: uci.to_string(),
            reason,
        };
        let parsed: Uci = uci.parse().map_err(|e| illegal(format!("{}", e)))?;
        let chess_move = parsed
            .to_move(&self.position)
            .map_err(|e| illegal(format!("{} in {}", e, self.describe())))?;

        self.position.play_unchecked(&chess_move);
        self.moves.push(uci.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        self.uci_position()
    }
}
