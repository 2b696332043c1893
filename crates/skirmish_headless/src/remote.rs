//! In-process stand-in for an external decision service.
//!
//! The provider half of an [`ExternalDecisionBridge`] is served by a tokio
//! task. Every request is answered by its own task that waits out a
//! simulated network latency and then asks the heuristic planner. Answers
//! slower than the deadline become [`ProviderError::Timeout`].
//!
//! [`ExternalDecisionBridge`]: skirmish_core::ai::ExternalDecisionBridge

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use skirmish_core::ai::{DecisionRequest, DecisionResponse, HeuristicPlanner, ProviderEndpoint, ProviderError};
use skirmish_core::config::Personality;
use skirmish_core::player::PlayerId;

/// Deadline applied when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// How the simulated service behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Wall-clock delay before each answer.
    pub latency_ms: u64,
    /// Answers slower than this time out.
    pub timeout_ms: u64,
    /// Play style per player. Unlisted players get the default.
    pub personalities: BTreeMap<PlayerId, Personality>,
}

impl RemoteConfig {
    /// Service with the given latency and the default deadline.
    #[must_use]
    pub fn new(latency_ms: u64) -> Self {
        Self {
            latency_ms,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            personalities: BTreeMap::new(),
        }
    }

    /// Override the deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the play style for one player.
    #[must_use]
    pub fn with_personality(mut self, player: PlayerId, personality: Personality) -> Self {
        self.personalities.insert(player, personality);
        self
    }

    /// Longest a caller should wait for any single answer.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.latency_ms.min(self.timeout_ms) + 50)
    }
}

/// A running simulated service.
#[derive(Debug)]
pub struct RemoteProvider {
    arrivals: Arc<Notify>,
    task: JoinHandle<()>,
}

impl RemoteProvider {
    /// Start serving `endpoint`. Must be called from within a tokio runtime.
    pub fn spawn(endpoint: ProviderEndpoint, config: RemoteConfig) -> Self {
        let arrivals = Arc::new(Notify::new());
        let task = tokio::spawn(serve(endpoint, Arc::new(config), Arc::clone(&arrivals)));
        Self { arrivals, task }
    }

    /// Resolves once an answer has been sent since the last call.
    pub async fn arrival(&self) {
        self.arrivals.notified().await;
    }

    /// Stop accepting requests. Answers already being prepared are dropped
    /// when the bridge goes away.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn serve(endpoint: ProviderEndpoint, config: Arc<RemoteConfig>, arrivals: Arc<Notify>) {
    let ProviderEndpoint {
        mut requests,
        responses,
    } = endpoint;

    while let Some(request) = requests.recv().await {
        let responses = responses.clone();
        let config = Arc::clone(&config);
        let arrivals = Arc::clone(&arrivals);
        tokio::spawn(async move {
            let response = answer(request, &config).await;
            if responses.send(response).is_err() {
                debug!("bridge closed before the answer arrived");
                return;
            }
            arrivals.notify_one();
        });
    }
    debug!("decision request channel closed");
}

async fn answer(request: DecisionRequest, config: &RemoteConfig) -> DecisionResponse {
    let DecisionRequest { id, player, observation } = request;
    let personality = config.personalities.get(&player).copied().unwrap_or_default();
    let think = async {
        tokio::time::sleep(Duration::from_millis(config.latency_ms)).await;
        HeuristicPlanner::new(personality).plan(&observation)
    };

    let result = match tokio::time::timeout(Duration::from_millis(config.timeout_ms), think).await {
        Ok(action) => Ok(action),
        Err(_) => {
            warn!(player = %player, id, timeout_ms = config.timeout_ms, "remote decision timed out");
            Err(ProviderError::Timeout)
        }
    };
    DecisionResponse { id, player, result }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::ai::{AiActionKind, ExternalDecisionBridge, Observation};
    use skirmish_core::config::SimConfig;
    use skirmish_core::map_generation::{new_game, MatchSetup};
    use skirmish_core::rules::Rules;

    const AI: PlayerId = PlayerId(2);

    fn observation() -> Observation {
        let state = new_game(SimConfig::default(), Rules::stock(), &MatchSetup::default()).unwrap();
        Observation::capture(&state, AI).unwrap()
    }

    #[tokio::test]
    async fn test_answers_after_latency() {
        let (mut bridge, endpoint) = ExternalDecisionBridge::channel();
        let provider = RemoteProvider::spawn(endpoint, RemoteConfig::new(10));
        bridge.request(observation()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), provider.arrival()).await.unwrap();
        let responses = bridge.drain();
        assert_eq!(responses.len(), 1);
        let action = responses[0].result.as_ref().unwrap();
        assert_eq!(action.player, AI);
        assert_ne!(action.kind, AiActionKind::Idle);
        provider.shutdown();
    }

    #[tokio::test]
    async fn test_slow_answer_times_out() {
        let (mut bridge, endpoint) = ExternalDecisionBridge::channel();
        let provider = RemoteProvider::spawn(endpoint, RemoteConfig::new(500).with_timeout(20));
        bridge.request(observation()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), provider.arrival()).await.unwrap();
        let responses = bridge.drain();
        assert_eq!(responses[0].result, Err(ProviderError::Timeout));
        provider.shutdown();
    }

    #[test]
    fn test_wait_is_bounded_by_deadline() {
        let config = RemoteConfig::new(10_000).with_timeout(100);
        assert_eq!(config.max_wait(), Duration::from_millis(150));
    }
}
