use std::fmt;

/// Error type shared by the codec, analyzer, scorer and persistence layers
#[derive(Debug, Clone, PartialEq)]
pub enum DfrcError {
    /// Scharnagl number outside [0, 960)
    InvalidIndex { index: i64, max: u32 },
    /// Back-rank string that is not a Chess960 arrangement
    InvalidPosition { position: String, reason: String },
    /// Integer outside its permitted range
    OutOfRange {
        field: String,
        value: String,
        expected: String,
    },
    /// Malformed analysis configuration
    InvalidConfig {
        field: String,
        value: String,
        expected: String,
    },
    /// Configuration id missing from the config table
    UnknownConfig(String),
    /// Engine reported a different name/version than the config requires
    EngineVersionMismatch { expected: String, found: String },
    /// Engine returned a candidate without a score
    MissingScore { ply: usize, rank: usize },
    /// Root position has no legal moves
    NoLegalMoves { fen: String },
    /// Neither centipawns nor mate were available for scoring
    MissingEvaluation,
    /// Move could not be parsed or played on the board
    IllegalMove { mv: String, reason: String },
    /// Engine launch or transport failure
    EngineError(String),
    /// Unparseable external data
    ParseError(String),
    /// File I/O or serialization failure
    IoError(String),
    /// Database operation failed
    DatabaseError(String),
}

impl fmt::Display for DfrcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DfrcError::InvalidIndex { index, max } => {
                write!(f, "Invalid position index {}: expected 0 <= index < {}", index, max)
            }
            DfrcError::InvalidPosition { position, reason } => {
                write!(f, "Invalid position '{}': {}", position, reason)
            }
            DfrcError::OutOfRange { field, value, expected } => {
                write!(f, "Value out of range for '{}': got {}, expected {}", field, value, expected)
            }
            DfrcError::InvalidConfig { field, value, expected } => {
                write!(
                    f,
                    "Invalid analysis config field '{}': got '{}', expected {}",
                    field, value, expected
                )
            }
            DfrcError::UnknownConfig(id) => write!(f, "Unknown analysis config '{}'", id),
            DfrcError::EngineVersionMismatch { expected, found } => {
                write!(f, "Engine version mismatch: '{}' was used, but '{}' is required", found, expected)
            }
            DfrcError::MissingScore { ply, rank } => {
                write!(f, "Engine returned no score for candidate {} at ply {}", rank, ply)
            }
            DfrcError::NoLegalMoves { fen } => {
                write!(f, "Failed to analyze position: no legal moves in '{}'", fen)
            }
            DfrcError::MissingEvaluation => {
                write!(f, "At least one of mate or centipawns must be provided")
            }
            DfrcError::IllegalMove { mv, reason } => write!(f, "Illegal move '{}': {}", mv, reason),
            DfrcError::EngineError(msg) => write!(f, "Engine error: {}", msg),
            DfrcError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DfrcError::IoError(msg) => write!(f, "I/O error: {}", msg),
            DfrcError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for DfrcError {}

pub type Result<T> = std::result::Result<T, DfrcError>;

impl From<std::io::Error> for DfrcError {
    fn from(error: std::io::Error) -> Self {
        DfrcError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for DfrcError {
    fn from(error: serde_json::Error) -> Self {
        DfrcError::IoError(format!("JSON serialization error: {}", error))
    }
}

impl From<bincode::Error> for DfrcError {
    fn from(error: bincode::Error) -> Self {
        DfrcError::IoError(format!("Binary serialization error: {}", error))
    }
}

impl From<toml::de::Error> for DfrcError {
    fn from(error: toml::de::Error) -> Self {
        DfrcError::ParseError(format!("TOML config error: {}", error))
    }
}

impl From<csv::Error> for DfrcError {
    fn from(error: csv::Error) -> Self {
        DfrcError::IoError(format!("CSV error: {}", error))
    }
}

impl From<rusqlite::Error> for DfrcError {
    fn from(error: rusqlite::Error) -> Self {
        DfrcError::DatabaseError(error.to_string())
    }
}

impl From<std::num::ParseIntError> for DfrcError {
    fn from(error: std::num::ParseIntError) -> Self {
        DfrcError::ParseError(format!("invalid integer: {}", error))
    }
}

#[macro_export]
macro_rules! validation_error {
    ($field:expr, $value:expr, $expected:expr) => {
        $crate::errors::DfrcError::OutOfRange {
            field: $field.to_string(),
            value: $value.to_string(),
            expected: $expected.to_string(),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($field:expr, $value:expr, $expected:expr) => {
        $crate::errors::DfrcError::InvalidConfig {
            field: $field.to_string(),
            value: $value.to_string(),
            expected: $expected.to_string(),
        }
    };
}

#[macro_export]
macro_rules! engine_error {
    ($msg:expr) => {
        $crate::errors::DfrcError::EngineError($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::DfrcError::EngineError(format!($fmt, $($arg)*))
    };
}
