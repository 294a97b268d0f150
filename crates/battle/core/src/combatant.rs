//! Value types naming combatants, abilities and grid cells.
//!
//! The core never owns combatant data. It only passes these identifiers around
//! and re-reads liveness through the injected [`crate::env::Roster`].
use std::fmt;

/// Unique identifier for a combatant on the battlefield.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatantId(pub u32);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of an ability owned by some combatant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbilityId(pub u32);

impl fmt::Display for AbilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ability:{}", self.0)
    }
}

/// Grid coordinates of a battlefield cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellCoord {
    pub row: i32,
    pub col: i32,
}

impl CellCoord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Chebyshev distance, the number of king moves between two cells.
    pub fn distance(self, other: Self) -> u32 {
        let dr = (self.row - other.row).unsigned_abs();
        let dc = (self.col - other.col).unsigned_abs();
        dr.max(dc)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Side of the battle a combatant fights for.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TeamSide {
    /// The side that initiated the battle.
    #[default]
    Attacker,
    Defender,
}

impl TeamSide {
    pub const fn opponent(self) -> Self {
        match self {
            Self::Attacker => Self::Defender,
            Self::Defender => Self::Attacker,
        }
    }
}

/// Who resolves a combatant's turn.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Controller {
    /// Turn waits for clicks from the player.
    #[default]
    Player,
    /// Turn is resolved synchronously by the AI decision service.
    Ai,
}

/// Snapshot of what the core needs to know about one combatant.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatantInfo {
    pub id: CombatantId,
    pub team: TeamSide,
    pub controller: Controller,
    /// Base initiative stat (before the per-round roll).
    pub initiative: i32,
    pub alive: bool,
    pub fleeing: bool,
}

impl CombatantInfo {
    pub fn new(id: CombatantId, team: TeamSide, initiative: i32) -> Self {
        Self {
            id,
            team,
            controller: Controller::Player,
            initiative,
            alive: true,
            fleeing: false,
        }
    }

    #[must_use]
    pub fn with_controller(mut self, controller: Controller) -> Self {
        self.controller = controller;
        self
    }

    /// Living and still on the field.
    pub fn is_active(&self) -> bool {
        self.alive && !self.fleeing
    }

    pub fn is_ai(&self) -> bool {
        self.controller == Controller::Ai
    }
}
