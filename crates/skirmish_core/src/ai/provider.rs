//! The decision-provider seam.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::action::AiAction;
use super::observation::Observation;

/// Why a decision provider failed to produce an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum ProviderError {
    /// No answer within the provider's deadline.
    #[error("decision provider timed out")]
    Timeout,
    /// The provider refused the request for now.
    #[error("decision provider is rate limited")]
    RateLimited,
    /// The answer did not match the action contract.
    #[error("decision provider returned a malformed action")]
    Malformed,
    /// The provider is gone.
    #[error("decision provider disconnected")]
    Disconnected,
}

/// Anything that turns an observation into one action, synchronously.
///
/// The heuristic planner is the stock implementation. Out-of-process
/// providers go through [`ExternalDecisionBridge`](super::ExternalDecisionBridge)
/// instead, because their answers arrive ticks later.
pub trait DecisionProvider: Send {
    /// Decide on exactly one action for `observation.player`.
    fn decide(&mut self, observation: &Observation) -> Result<AiAction, ProviderError>;
}

impl<F> DecisionProvider for F
where
    F: FnMut(&Observation) -> Result<AiAction, ProviderError> + Send,
{
    fn decide(&mut self, observation: &Observation) -> Result<AiAction, ProviderError> {
        self(observation)
    }
}
