//! End-to-end runs of the headless runner.

use skirmish_core::config::{Difficulty, Personality, SimConfig};
use skirmish_headless::{MatchReport, MatchRunner, MatchSettings};

fn shipped_config() -> SimConfig {
    SimConfig::from_ron_str(include_str!("../../skirmish_core/data/skirmish.ron")).unwrap()
}

#[test]
fn test_four_seat_report_round_trips_through_json() {
    let settings = MatchSettings {
        seed: 99,
        max_ticks: 1_500,
        opponents: 3,
        personality: Personality::Aggressive,
        difficulty: Difficulty::Hard,
        ..Default::default()
    };
    let report = MatchRunner::new(shipped_config()).run(&settings).unwrap();
    let parsed: MatchReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(parsed, report);

    assert_eq!(report.players.len(), 4);
    let kills: u32 = report.players.iter().map(|p| p.stats.enemies_destroyed).sum();
    let losses: u32 = report.players.iter().map(|p| p.stats.units_lost + p.stats.buildings_lost).sum();
    assert!(kills <= losses);
    for player in &report.players {
        assert!(player.stats.buildings_built >= 1, "{} never finished a building", player.id);
    }
}

#[test]
fn test_same_settings_same_outcome() {
    let settings = MatchSettings {
        max_ticks: 800,
        personality: Personality::Economic,
        ..Default::default()
    };
    let runner = MatchRunner::default();
    let a = runner.run(&settings).unwrap();
    let b = runner.run(&settings).unwrap();
    assert_eq!(a.state_hash, b.state_hash);
    assert_eq!(a.events, b.events);
}

#[test]
fn test_remote_timeouts_leave_opponent_idle() {
    let settings = MatchSettings {
        max_ticks: 300,
        remote_latency_ms: Some(200),
        remote_timeout_ms: 5,
        ..Default::default()
    };
    let report = MatchRunner::default().run(&settings).unwrap();
    assert!(report.event_count("provider_failed") >= 1);
    assert_eq!(report.players[1].stats.credits_spent, 0);
    assert!(report.players[0].stats.credits_spent > 0);
}
