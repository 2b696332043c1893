//! Short-lived visual effects.
//!
//! Effects are part of the snapshot so a renderer can draw them, but they
//! never influence the simulation. Each kind has a fixed lifetime and is
//! pruned once it has expired.

use serde::{Deserialize, Serialize};

use crate::math::Vec2Fixed;

/// What to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Floating damage number.
    DamageText {
        /// Where.
        position: Vec2Fixed,
        /// Damage dealt.
        amount: i32,
    },
    /// Floating repair number.
    RepairText {
        /// Where.
        position: Vec2Fixed,
        /// Hit points restored.
        amount: i32,
    },
    /// Line from shooter to target.
    AttackLine {
        /// Shooter position.
        from: Vec2Fixed,
        /// Target position.
        to: Vec2Fixed,
    },
    /// Death explosion.
    Explosion {
        /// Where.
        position: Vec2Fixed,
        /// Buildings explode large.
        large: bool,
    },
    /// Chronoshift swirl at the origin or destination.
    ChronoVortex {
        /// Where.
        position: Vec2Fixed,
    },
    /// Nuclear blast.
    NukeImpact {
        /// Ground zero.
        position: Vec2Fixed,
    },
}

impl EffectKind {
    /// Lifetime in game milliseconds.
    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        match self {
            Self::AttackLine { .. } => 300,
            Self::Explosion { .. } => 400,
            Self::DamageText { .. } | Self::RepairText { .. } => 1000,
            Self::ChronoVortex { .. } => 1500,
            Self::NukeImpact { .. } => 5000,
        }
    }
}

/// An effect with its creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualEffect {
    /// What to draw.
    pub kind: EffectKind,
    /// Game time it was spawned.
    pub created_ms: u64,
}

impl VisualEffect {
    /// Whether the effect should still be shown at `now_ms`.
    #[must_use]
    pub const fn is_alive(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_ms) < self.kind.duration_ms()
    }
}

/// Drop expired effects. Returns `true` if anything was removed.
pub fn prune(effects: &mut Vec<VisualEffect>, now_ms: u64) -> bool {
    let before = effects.len();
    effects.retain(|e| e.is_alive(now_ms));
    effects.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_by_kind_lifetime() {
        let mut effects = vec![
            VisualEffect {
                kind: EffectKind::AttackLine {
                    from: Vec2Fixed::ZERO,
                    to: Vec2Fixed::ZERO,
                },
                created_ms: 0,
            },
            VisualEffect {
                kind: EffectKind::NukeImpact {
                    position: Vec2Fixed::ZERO,
                },
                created_ms: 0,
            },
        ];
        assert!(!prune(&mut effects, 200));
        assert!(prune(&mut effects, 300));
        assert_eq!(effects.len(), 1);
        assert!(prune(&mut effects, 5000));
        assert!(effects.is_empty());
    }
}
