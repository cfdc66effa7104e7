//! Stockfish driven over the UCI protocol.
//!
//! The engine runs as a child process; every call writes commands to its
//! stdin and blocks on its stdout until the expected terminator arrives.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

use crate::board::{DfrcBoard, PositionState};
use crate::engine_error;
use crate::errors::Result;
use crate::evaluator::{Candidate, EngineIdentity, Evaluator, Score};

/// Process and resource settings for the engine
#[derive(Debug, Clone)]
pub struct StockfishConfig {
    pub stockfish_path: String,
    pub threads: usize,
    pub hash_size_mb: usize,
}

impl Default for StockfishConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "stockfish".to_string(), // Assume stockfish in PATH
            threads: 1,
            hash_size_mb: 1024,
        }
    }
}

/// UCI communication channel
trait UciChannel {
    fn send_command(&mut self, command: &str) -> Result<()>;
    fn read_response(&mut self) -> Result<String>;
}

/// Stockfish UCI engine wrapper
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    identity: EngineIdentity,
    multipv: usize,
    closed: bool,
}

impl StockfishEngine {
    pub fn new(config: &StockfishConfig) -> Result<Self> {
        let mut process = Command::new(&config.stockfish_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| engine_error!("Failed to start {}: {}", config.stockfish_path, e))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| engine_error!("Failed to get stdin"))?;
        let stdout = BufReader::new(
            process
                .stdout
                .take()
                .ok_or_else(|| engine_error!("Failed to get stdout"))?,
        );

        let mut engine = Self {
            process,
            stdin,
            stdout,
            identity: EngineIdentity::parse("unknown"),
            multipv: 1,
            closed: false,
        };
        engine.initialize(config)?;

        Ok(engine)
    }

    fn initialize(&mut self, config: &StockfishConfig) -> Result<()> {
        self.send_command("uci")?;
        loop {
            let response = self.read_response()?;
            if let Some(name) = response.strip_prefix("id name ") {
                self.identity = EngineIdentity::parse(name);
            } else if response == "uciok" {
                break;
            }
        }
        info!(engine = %self.identity, "engine started");

        self.send_command("setoption name UCI_Chess960 value true")?;
        self.send_command(&format!("setoption name Threads value {}", config.threads))?;
        self.send_command(&format!("setoption name Hash value {}", config.hash_size_mb))?;
        self.wait_ready()
    }

    fn wait_ready(&mut self) -> Result<()> {
        self.send_command("isready")?;
        loop {
            if self.read_response()? == "readyok" {
                return Ok(());
            }
        }
    }

    /// Send `quit` and wait for the process to exit.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.send_command("quit")?;
        self.process
            .wait()
            .map_err(|e| engine_error!("Failed to close: {}", e))?;
        Ok(())
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("engine shutdown failed: {}", e);
        }
    }
}

impl UciChannel for StockfishEngine {
    fn send_command(&mut self, command: &str) -> Result<()> {
        debug!(target: "uci", "> {}", command);
        writeln!(self.stdin, "{}", command).map_err(|e| engine_error!("Send failed: {}", e))?;
        self.stdin.flush().map_err(|e| engine_error!("Flush failed: {}", e))?;
        Ok(())
    }

    fn read_response(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .map_err(|e| engine_error!("Read failed: {}", e))?;
        if read == 0 {
            return Err(engine_error!("Engine closed its output"));
        }
        let line = line.trim().to_string();
        debug!(target: "uci", "< {}", line);
        Ok(line)
    }
}

impl Evaluator<DfrcBoard> for StockfishEngine {
    fn identity(&mut self) -> Result<EngineIdentity> {
        Ok(self.identity.clone())
    }

    fn evaluate(&mut self, state: &DfrcBoard, depth: u32, multipv: usize) -> Result<Vec<Candidate>> {
        if multipv != self.multipv {
            self.send_command(&format!("setoption name MultiPV value {}", multipv))?;
            self.multipv = multipv;
        }
        self.send_command(&format!("position {}", state.uci_position()))?;
        self.send_command(&format!("go depth {}", depth))?;

        let candidates = collect_candidates(self, state.white_to_move())?;
        if candidates.is_empty() {
            debug!("no legal moves in {}", state.describe());
        }
        Ok(candidates)
    }
}

/// Read search output up to `bestmove`, keeping the last exact line of each
/// `multipv` slot. Scores are returned from White's point of view.
fn collect_candidates<C: UciChannel>(channel: &mut C, white_to_move: bool) -> Result<Vec<Candidate>> {
    let mut lines: BTreeMap<usize, InfoLine> = BTreeMap::new();
    loop {
        let response = channel.read_response()?;
        if response.starts_with("info") {
            match parse_info_line(&response) {
                Some(info) => {
                    lines.insert(info.multipv, info);
                }
                None => debug!(target: "uci", "ignored: {}", response),
            }
        } else if let Some(rest) = response.strip_prefix("bestmove") {
            if rest.split_whitespace().next() == Some("(none)") {
                return Ok(Vec::new());
            }
            break;
        } else if !response.is_empty() {
            warn!(target: "uci", "unexpected engine output: {}", response);
        }
    }

    Ok(lines
        .into_values()
        .map(|info| info.into_candidate(white_to_move))
        .collect())
}

/// Parsed `info` line carrying a principal variation
#[derive(Debug, Clone, PartialEq)]
struct InfoLine {
    multipv: usize,
    /// From the side to move's point of view
    score: Option<Score>,
    pv: Vec<String>,
}

impl InfoLine {
    fn into_candidate(self, white_to_move: bool) -> Candidate {
        let score = if white_to_move {
            self.score
        } else {
            self.score.map(Score::negate)
        };
        Candidate {
            mv: self.pv[0].clone(),
            score,
            pv: self.pv,
        }
    }
}

/// Parse an `info` line; lines without a PV, and bound-only scores, are skipped.
fn parse_info_line(line: &str) -> Option<InfoLine> {
    let mut tokens = line.split_whitespace().peekable();
    if tokens.next() != Some("info") {
        return None;
    }

    let mut multipv = 1;
    let mut score = None;
    let mut pv = Vec::new();

    while let Some(token) = tokens.next() {
        match token {
            "multipv" => multipv = tokens.next()?.parse().ok()?,
            "score" => {
                let kind = tokens.next()?;
                let value: i32 = tokens.next()?.parse().ok()?;
                if matches!(tokens.peek(), Some(&"lowerbound") | Some(&"upperbound")) {
                    return None;
                }
                score = match kind {
                    "cp" => Some(Score::centipawns(value)),
                    "mate" => Some(Score::mate_in(value)),
                    _ => None,
                };
            }
            "pv" => {
                pv = tokens.by_ref().map(str::to_string).collect();
            }
            "string" => return None,
            _ => {}
        }
    }

    if pv.is_empty() {
        return None;
    }
    Some(InfoLine { multipv, score, pv })
}
