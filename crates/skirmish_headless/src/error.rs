//! Errors surfaced by the headless runner.

use thiserror::Error;

use skirmish_core::error::GameError;

/// Result type alias using [`HeadlessError`].
pub type Result<T> = std::result::Result<T, HeadlessError>;

/// Why a match could not be set up, run or reported.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// Map generation, roster or data loading failed in the core.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The match settings are unusable.
    #[error("Invalid match settings: {0}")]
    InvalidSettings(String),

    /// Reading a config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the report failed.
    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}
