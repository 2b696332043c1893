//! AI opponents: fog-filtered observations, the action contract, the
//! heuristic planner and the bridge to external decision providers.

mod action;
mod bridge;
mod observation;
mod planner;
mod provider;

pub use action::{apply_ai_action, AiAction, AiActionKind, AttackTarget};
pub use bridge::{DecisionRequest, DecisionResponse, ExternalDecisionBridge, ProviderEndpoint, RequestId};
pub use observation::{
    Observation, OwnBuilding, OwnUnit, PatchSighting, ProductionOption, Sighting, SightingKind,
};
pub use planner::HeuristicPlanner;
pub use provider::{DecisionProvider, ProviderError};
