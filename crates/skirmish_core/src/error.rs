//! Error types for the game simulation.

use serde::Serialize;
use thiserror::Error;

use crate::entity::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for setup and data loading.
#[derive(Debug, Error)]
pub enum GameError {
    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or label) of the source that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// A rules catalog is missing an entry the simulation needs.
    #[error("Rules catalog is missing an entry for {0}")]
    MissingRule(String),

    /// Invalid terrain layout.
    #[error("Invalid terrain: {0}")]
    InvalidTerrain(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

/// Why a player command (or AI action) was rejected.
///
/// Rejections never mutate state; the caller keeps the prior snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum CommandError {
    /// The player cannot afford the order.
    #[error("Insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// Credits required.
        required: i64,
        /// Credits available.
        available: i64,
    },

    /// A prerequisite building is missing or still under construction.
    #[error("Missing prerequisites for {0}")]
    MissingPrerequisites(String),

    /// No unit in the order could find a route.
    #[error("No path to destination")]
    NoPath,

    /// The order refers to an entity or patch that no longer exists.
    #[error("Stale reference: {0}")]
    StaleReference(EntityId),

    /// The building cannot be placed at the requested position.
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    /// The production queue is at capacity.
    #[error("Production queue is full")]
    QueueFull,

    /// The building or ability is not ready yet.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The acting player is not allowed to issue this order.
    #[error("Not permitted: {0}")]
    NotPermitted(String),
}
