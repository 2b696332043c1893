//! Per-player economy, power, superweapon and statistics state.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{Difficulty, Personality};
use crate::entity::EntityId;
use crate::error::CommandError;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::rules::SuperweaponKind;

/// Player identifier. Player 1 is the human by default.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// The default human slot.
    pub const HUMAN: Self = Self(1);
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PLAYER_{}", self.0)
    }
}

/// Who issues orders for a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Controller {
    /// Commands arrive from the input layer.
    Human,
    /// Commands come from a decision provider.
    Ai {
        /// Play style.
        personality: Personality,
        /// Difficulty.
        difficulty: Difficulty,
    },
}

impl Controller {
    /// Whether this is an AI controller.
    #[must_use]
    pub const fn is_ai(self) -> bool {
        matches!(self, Self::Ai { .. })
    }
}

/// Power totals over a player's completed buildings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PowerBalance {
    /// Sum of power produced.
    pub produced: i32,
    /// Sum of power consumed.
    pub consumed: i32,
}

impl PowerBalance {
    /// Produced minus consumed.
    #[must_use]
    pub const fn surplus(self) -> i32 {
        self.produced - self.consumed
    }

    /// Whether consumption exceeds production.
    #[must_use]
    pub const fn is_low(self) -> bool {
        self.consumed > self.produced
    }
}

/// Charge state of a superweapon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Readiness {
    /// Recharging.
    Charging {
        /// Game milliseconds left.
        remaining_ms: u64,
    },
    /// May be fired.
    Ready,
}

/// A superweapon granted by a completed building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuperweaponState {
    /// Which ability.
    pub kind: SuperweaponKind,
    /// Building granting it; the state is dropped when it dies.
    pub building: EntityId,
    /// Charge state.
    pub readiness: Readiness,
}

impl SuperweaponState {
    /// Whether it can fire now.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.readiness, Readiness::Ready)
    }
}

/// Running match statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Units produced (including free miners).
    pub units_built: u32,
    /// Buildings that finished construction.
    pub buildings_built: u32,
    /// Own units destroyed.
    pub units_lost: u32,
    /// Own buildings destroyed.
    pub buildings_lost: u32,
    /// Enemy entities destroyed.
    pub enemies_destroyed: u32,
    /// Credits deposited at refineries.
    pub credits_earned: i64,
    /// Credits spent on orders and repairs.
    pub credits_spent: i64,
}

/// Everything the simulation tracks per player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerState {
    /// Identifier.
    pub id: PlayerId,
    /// Human or AI.
    pub controller: Controller,
    /// Credits (fractional because repairs bill per hit point).
    #[serde(with = "fixed_serde")]
    pub credits: Fixed,
    /// Power totals, recomputed every tick.
    pub power: PowerBalance,
    /// Active superweapons, at most one per kind.
    pub superweapons: BTreeMap<SuperweaponKind, SuperweaponState>,
    /// Game milliseconds until the next AI decision.
    pub decision_cooldown_ms: i64,
    /// Headquarters entity.
    pub base: Option<EntityId>,
    /// Starting location. Start locations are public, so AI observations
    /// may list them for scouting.
    #[serde(default)]
    pub start_position: Option<Vec2Fixed>,
    /// Statistics.
    pub stats: PlayerStats,
}

impl PlayerState {
    /// New player with the given starting credits.
    #[must_use]
    pub fn new(id: PlayerId, controller: Controller, credits: i64) -> Self {
        Self {
            id,
            controller,
            credits: Fixed::from_num(credits),
            power: PowerBalance::default(),
            superweapons: BTreeMap::new(),
            decision_cooldown_ms: 0,
            base: None,
            start_position: None,
            stats: PlayerStats::default(),
        }
    }

    /// Whole credits available.
    #[must_use]
    pub fn whole_credits(&self) -> i64 {
        self.credits.floor().to_num::<i64>()
    }

    /// Whether `cost` whole credits are available.
    #[must_use]
    pub fn can_afford(&self, cost: i64) -> bool {
        self.credits >= Fixed::from_num(cost)
    }

    /// Deduct a whole-credit cost.
    pub fn spend(&mut self, cost: i64) -> Result<(), CommandError> {
        self.spend_exact(Fixed::from_num(cost))
    }

    /// Deduct a fractional cost.
    pub fn spend_exact(&mut self, cost: Fixed) -> Result<(), CommandError> {
        if self.credits < cost {
            return Err(CommandError::InsufficientFunds {
                required: cost.ceil().to_num::<i64>(),
                available: self.whole_credits(),
            });
        }
        self.credits -= cost;
        self.stats.credits_spent += cost.ceil().to_num::<i64>();
        Ok(())
    }

    /// Return credits for a cancelled or failed order.
    pub fn refund(&mut self, amount: i64) {
        self.credits += Fixed::from_num(amount);
        self.stats.credits_spent -= amount;
    }

    /// Add mined credits.
    pub fn earn(&mut self, amount: i64) {
        self.credits += Fixed::from_num(amount);
        self.stats.credits_earned += amount;
    }

    /// Superweapon of a kind, if any.
    #[must_use]
    pub fn superweapon(&self, kind: SuperweaponKind) -> Option<&SuperweaponState> {
        self.superweapons.get(&kind)
    }
}
