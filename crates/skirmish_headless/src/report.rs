//! Match reports written to stdout as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use skirmish_core::player::{Controller, PlayerId, PlayerStats};
use skirmish_core::state::{GameState, GameStatus};

use crate::error::Result;
use crate::runner::MatchSettings;

/// Final standing of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerReport {
    /// Player id.
    pub id: PlayerId,
    /// Who was driving.
    pub controller: Controller,
    /// Whether the player was knocked out.
    pub defeated: bool,
    /// Whole credits left.
    pub credits: i64,
    /// Buildings standing at the end, finished or not.
    pub buildings: usize,
    /// Units alive at the end.
    pub units: usize,
    /// Lifetime counters.
    pub stats: PlayerStats,
}

/// Everything a batch analysis or CI check needs from one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Settings the match ran with.
    pub settings: MatchSettings,
    /// Final status from the first seat's point of view.
    pub status: GameStatus,
    /// The last player standing, if exactly one is.
    pub winner: Option<PlayerId>,
    /// Ticks simulated.
    pub ticks: u64,
    /// Game time elapsed.
    pub game_time_ms: u64,
    /// Hash of the final snapshot.
    pub state_hash: u64,
    /// Per-player results, ascending id.
    pub players: Vec<PlayerReport>,
    /// Event counts by name.
    pub events: BTreeMap<String, usize>,
}

impl MatchReport {
    /// Summarize a finished (or time-limited) match.
    #[must_use]
    pub fn from_state(settings: &MatchSettings, state: &GameState, events: BTreeMap<String, usize>) -> Self {
        let players: Vec<PlayerReport> = state
            .players()
            .values()
            .map(|p| {
                let owned = || state.entities().owned_by(p.id);
                PlayerReport {
                    id: p.id,
                    controller: p.controller,
                    defeated: state.is_defeated(p.id),
                    credits: p.whole_credits(),
                    buildings: owned().filter(|e| e.is_building()).count(),
                    units: owned().filter(|e| e.is_unit()).count(),
                    stats: p.stats,
                }
            })
            .collect();

        let mut standing = players.iter().filter(|p| !p.defeated);
        let winner = match (standing.next(), standing.next()) {
            (Some(only), None) => Some(only.id),
            _ => None,
        };

        Self {
            settings: settings.clone(),
            status: state.status(),
            winner,
            ticks: state.tick(),
            game_time_ms: state.now_ms(),
            state_hash: state.state_hash(),
            players,
            events,
        }
    }

    /// Count of one event kind.
    #[must_use]
    pub fn event_count(&self, name: &str) -> usize {
        self.events.get(name).copied().unwrap_or(0)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::combat::destroy;
    use skirmish_core::config::SimConfig;
    use skirmish_core::map_generation::{new_game, MatchSetup};
    use skirmish_core::rules::Rules;

    fn state() -> GameState {
        new_game(SimConfig::default(), Rules::stock(), &MatchSetup::default()).unwrap()
    }

    #[test]
    fn test_no_winner_while_both_stand() {
        let report = MatchReport::from_state(&MatchSettings::default(), &state(), BTreeMap::new());
        assert_eq!(report.winner, None);
        assert_eq!(report.players.len(), 2);
        assert!(report.players.iter().all(|p| p.buildings == 1 && !p.defeated));
    }

    #[test]
    fn test_last_player_standing_wins() {
        let mut state = state();
        let hq = state.player(PlayerId(2)).unwrap().base.unwrap();
        destroy(&mut state, hq, Some(PlayerId::HUMAN), &mut Vec::new());
        let report = MatchReport::from_state(&MatchSettings::default(), &state, BTreeMap::new());
        assert_eq!(report.winner, Some(PlayerId::HUMAN));
        assert!(report.players[1].defeated);
        assert_eq!(report.players[0].stats.enemies_destroyed, 1);
    }

    #[test]
    fn test_json_carries_status_and_stats() {
        let mut events = BTreeMap::new();
        events.insert("unit_ready".to_string(), 3);
        let report = MatchReport::from_state(&MatchSettings::default(), &state(), events);
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "Playing");
        assert_eq!(value["events"]["unit_ready"], 3);
        assert!(value["players"][0]["stats"]["credits_earned"].is_number());
        assert_eq!(report.event_count("unit_ready"), 3);
        assert_eq!(report.event_count("nuke_launched"), 0);
    }
}
