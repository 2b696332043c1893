//! Request/response channel to an out-of-process decision provider.
//!
//! The simulation side never blocks: requests are pushed onto an unbounded
//! channel and responses are drained with `try_recv` at tick boundaries.
//! At most one request per player is in flight. A response whose request id
//! is not the one in flight for that player is stale and dropped.

use std::collections::BTreeMap;

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::player::PlayerId;

use super::action::AiAction;
use super::observation::Observation;
use super::provider::ProviderError;

/// Identifier pairing a response with its request.
pub type RequestId = u64;

/// A decision request sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    /// Pairing id.
    pub id: RequestId,
    /// Deciding player.
    pub player: PlayerId,
    /// What the player may know.
    pub observation: Observation,
}

/// The provider's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionResponse {
    /// Id of the request being answered.
    pub id: RequestId,
    /// Deciding player.
    pub player: PlayerId,
    /// The action, or why there is none.
    pub result: Result<AiAction, ProviderError>,
}

/// Provider half of the channel pair, handed to the async task that talks to
/// the external service.
#[derive(Debug)]
pub struct ProviderEndpoint {
    /// Incoming requests.
    pub requests: UnboundedReceiver<DecisionRequest>,
    /// Outgoing responses.
    pub responses: UnboundedSender<DecisionResponse>,
}

/// Simulation half of the channel pair.
#[derive(Debug)]
pub struct ExternalDecisionBridge {
    requests: UnboundedSender<DecisionRequest>,
    responses: UnboundedReceiver<DecisionResponse>,
    in_flight: BTreeMap<PlayerId, RequestId>,
    next_id: RequestId,
}

impl ExternalDecisionBridge {
    /// Create a connected bridge and provider endpoint.
    #[must_use]
    pub fn channel() -> (Self, ProviderEndpoint) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let bridge = Self {
            requests: request_tx,
            responses: response_rx,
            in_flight: BTreeMap::new(),
            next_id: 1,
        };
        let endpoint = ProviderEndpoint {
            requests: request_rx,
            responses: response_tx,
        };
        (bridge, endpoint)
    }

    /// Whether `player` has a request outstanding.
    #[must_use]
    pub fn is_in_flight(&self, player: PlayerId) -> bool {
        self.in_flight.contains_key(&player)
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Send a request unless one is already outstanding for the player.
    ///
    /// Returns `Ok(None)` when a request was already in flight.
    pub fn request(&mut self, observation: Observation) -> Result<Option<RequestId>, ProviderError> {
        let player = observation.player;
        if self.is_in_flight(player) {
            return Ok(None);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.requests
            .send(DecisionRequest { id, player, observation })
            .map_err(|_| ProviderError::Disconnected)?;
        self.in_flight.insert(player, id);
        Ok(Some(id))
    }

    /// Forget any outstanding request for `player`. A late answer to it
    /// will be treated as stale.
    pub fn cancel(&mut self, player: PlayerId) {
        self.in_flight.remove(&player);
    }

    /// Take every response that has arrived, dropping stale ones.
    ///
    /// If the provider hung up, every outstanding request is answered with
    /// [`ProviderError::Disconnected`].
    pub fn drain(&mut self) -> Vec<DecisionResponse> {
        let mut ready = Vec::new();
        loop {
            match self.responses.try_recv() {
                Ok(response) => {
                    if self.in_flight.get(&response.player) == Some(&response.id) {
                        self.in_flight.remove(&response.player);
                        ready.push(response);
                    } else {
                        warn!(player = %response.player, id = response.id, "dropping stale decision response");
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let orphans = std::mem::take(&mut self.in_flight);
                    ready.extend(orphans.into_iter().map(|(player, id)| DecisionResponse {
                        id,
                        player,
                        result: Err(ProviderError::Disconnected),
                    }));
                    break;
                }
            }
        }
        ready.sort_by_key(|r| r.player);
        ready
    }
}
