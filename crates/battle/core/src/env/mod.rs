//! Collaborators the battle core consumes as black boxes.
//!
//! Damage resolution, grid queries, AI heuristics and presentation are owned by
//! the host. The core sees them only through the narrow traits below, bundled
//! in [`BattleEnv`] and injected when the machine is built.
mod rng;

pub use rng::{FixedRoller, InitiativeRoller, PcgRoller};

use crate::combatant::{AbilityId, CellCoord, CombatantId, CombatantInfo};

/// Live view of every combatant taking part in the battle.
///
/// The core never caches combatant data between calls; liveness is re-checked
/// here every time it matters.
pub trait Roster {
    /// Every combatant known to the battle, dead or alive.
    fn combatants(&self) -> Vec<CombatantInfo>;

    fn combatant(&self, id: CombatantId) -> Option<CombatantInfo> {
        self.combatants().into_iter().find(|info| info.id == id)
    }

    /// Living and not fleeing.
    fn is_active(&self, id: CombatantId) -> bool {
        self.combatant(id).is_some_and(|info| info.is_active())
    }

    /// One-shot stat preparation when the battle starts.
    fn prepare_for_battle(&mut self) {}

    /// Turn-start hook: clear per-turn flags.
    fn begin_turn(&mut self, _id: CombatantId) {}

    /// Turn-end hook: tick effects.
    fn end_turn(&mut self, _id: CombatantId) {}
}

/// An ability to fire and where to aim it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AiDecision {
    pub ability: AbilityId,
    pub target: CellCoord,
}

/// Chooses actions for AI-controlled combatants.
pub trait AiDecisionService {
    /// Pick one of `available` for `combatant`, or `None` to pass the turn.
    fn decide(&mut self, combatant: CombatantId, available: &[AbilityId]) -> Option<AiDecision>;
}

/// What the turn should do after an ability resolved.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum TurnAction {
    /// Free action: keep the turn while any ability is still usable.
    #[default]
    Continue,
    /// The turn is over regardless of remaining abilities.
    EndTurn,
    /// Push the combatant back in the queue, then end the turn.
    Wait,
}

/// Everything the executor needs to resolve one ability use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbilityContext {
    pub source: CombatantId,
    pub target: CellCoord,
    pub round: u32,
}

/// Result of asking the executor to fire an ability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AbilityOutcome {
    /// False when the target or ability was rejected; nothing happened.
    pub accepted: bool,
    /// The action decided the battle.
    pub battle_ended: bool,
    /// The action started presentation work tracked by the barrier.
    pub presentation_pending: bool,
    pub turn_action: TurnAction,
}

impl AbilityOutcome {
    pub const fn rejected() -> Self {
        Self {
            accepted: false,
            battle_ended: false,
            presentation_pending: false,
            turn_action: TurnAction::Continue,
        }
    }

    pub const fn completed(turn_action: TurnAction) -> Self {
        Self {
            accepted: true,
            battle_ended: false,
            presentation_pending: false,
            turn_action,
        }
    }

    #[must_use]
    pub const fn with_presentation(mut self) -> Self {
        self.presentation_pending = true;
        self
    }

    #[must_use]
    pub const fn ending_battle(mut self) -> Self {
        self.battle_ended = true;
        self
    }
}

/// Resolves abilities and reports which ones are currently usable.
pub trait AbilityExecutor {
    /// Abilities `combatant` may use right now, in display order.
    fn available_abilities(&self, combatant: CombatantId) -> Vec<AbilityId>;

    fn execute(&mut self, ability: AbilityId, context: &AbilityContext) -> AbilityOutcome;
}

/// Valid-target queries and highlight presentation.
pub trait TargetingService {
    fn valid_targets(&self, combatant: CombatantId, ability: AbilityId) -> Vec<CellCoord>;

    /// Cell currently occupied by `combatant`.
    fn locate(&self, combatant: CombatantId) -> Option<CellCoord>;

    fn show_highlights(&mut self, _ability: AbilityId, _cells: &[CellCoord]) {}

    fn clear_highlights(&mut self) {}
}

/// Bundle of injected collaborators.
pub struct BattleEnv {
    pub roster: Box<dyn Roster>,
    pub ai: Box<dyn AiDecisionService>,
    pub executor: Box<dyn AbilityExecutor>,
    pub targeting: Box<dyn TargetingService>,
}

impl BattleEnv {
    pub fn new(
        roster: impl Roster + 'static,
        ai: impl AiDecisionService + 'static,
        executor: impl AbilityExecutor + 'static,
        targeting: impl TargetingService + 'static,
    ) -> Self {
        Self {
            roster: Box::new(roster),
            ai: Box::new(ai),
            executor: Box::new(executor),
            targeting: Box::new(targeting),
        }
    }
}

/// AI service that always passes.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassingAi;

impl AiDecisionService for PassingAi {
    fn decide(&mut self, _combatant: CombatantId, _available: &[AbilityId]) -> Option<AiDecision> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::TeamSide;

    struct Fixed(Vec<CombatantInfo>);

    impl Roster for Fixed {
        fn combatants(&self) -> Vec<CombatantInfo> {
            self.0.clone()
        }
    }

    #[test]
    fn default_lookup_reads_through_combatants() {
        let mut dead = CombatantInfo::new(CombatantId(2), TeamSide::Defender, 5);
        dead.alive = false;
        let roster = Fixed(vec![
            CombatantInfo::new(CombatantId(1), TeamSide::Attacker, 7),
            dead,
        ]);

        assert!(roster.is_active(CombatantId(1)));
        assert!(!roster.is_active(CombatantId(2)));
        assert!(!roster.is_active(CombatantId(3)));
        assert_eq!(roster.combatant(CombatantId(1)).unwrap().initiative, 7);
    }

    #[test]
    fn outcome_builders_compose() {
        let outcome = AbilityOutcome::completed(TurnAction::EndTurn).with_presentation();
        assert!(outcome.accepted);
        assert!(outcome.presentation_pending);
        assert!(!outcome.battle_ended);
        assert!(!AbilityOutcome::rejected().accepted);
    }
}
