use crate::combatant::{AbilityId, CellCoord, CombatantId};

use super::BattleContext;

/// Lifecycle phase of the battle.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum TurnPhase {
    BattleInitialization,
    RoundStart,
    TurnStart,
    ActionsProcessing,
    TurnEnd,
    RoundEnd,
    BattleEnd,
}

impl TurnPhase {
    pub const ALL: [TurnPhase; 7] = [
        TurnPhase::BattleInitialization,
        TurnPhase::RoundStart,
        TurnPhase::TurnStart,
        TurnPhase::ActionsProcessing,
        TurnPhase::TurnEnd,
        TurnPhase::RoundEnd,
        TurnPhase::BattleEnd,
    ];

    /// The absorbing phase; nothing leaves it.
    pub const fn is_terminal(self) -> bool {
        matches!(self, TurnPhase::BattleEnd)
    }
}

/// Gating rule deciding whether the driver may leave the current state.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum SubstatePolicy {
    /// Leave immediately.
    #[default]
    Free,
    /// Wait until the presentation barrier reports idle.
    AwaitingPresentation,
    /// Wait for a click or ability selection.
    AwaitingInput,
    /// Leave once the barrier is idle; effects spawned by the state's own work
    /// must finish first.
    ProcessingEnd,
}

/// One phase of the battle lifecycle.
///
/// States are built once when the machine is constructed and live for the
/// whole battle. Event handlers default to no-ops: an event the current state
/// does not expect is dropped silently.
pub trait TurnState {
    fn phase(&self) -> TurnPhase;

    fn enter(&mut self, _ctx: &mut BattleContext) {}

    fn exit(&mut self, _ctx: &mut BattleContext) {}

    fn policy(&self) -> SubstatePolicy {
        SubstatePolicy::Free
    }

    /// Where to go once the policy allows leaving.
    fn next_state(&self, ctx: &BattleContext) -> TurnPhase;

    fn unit_clicked(&mut self, _ctx: &mut BattleContext, _combatant: CombatantId) {}

    fn cell_clicked(&mut self, _ctx: &mut BattleContext, _cell: CellCoord) {}

    fn ability_clicked(&mut self, _ctx: &mut BattleContext, _ability: AbilityId) {}

    /// The barrier broadcast that every tracked operation finished.
    fn presentation_complete(&mut self, _ctx: &mut BattleContext) {}

    /// The turn owner was removed from the battle (death, flight).
    fn combatant_removed(&mut self, _ctx: &mut BattleContext, _combatant: CombatantId) {}
}
