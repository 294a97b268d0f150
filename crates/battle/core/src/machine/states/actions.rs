//! The active combatant's turn.
//!
//! Player turns suspend in [`SubstatePolicy::AwaitingInput`] until a click
//! resolves against the equipped ability's valid targets. AI turns are played
//! synchronously on entry through the AI decision service. Either kind
//! suspends in [`SubstatePolicy::AwaitingPresentation`] while an ability's
//! presentation runs, and picks up again on `presentation_complete`.
use tracing::{debug, info, trace};

use crate::combatant::{AbilityId, CellCoord, CombatantId};
use crate::env::{AbilityContext, AbilityOutcome, AiDecision, TurnAction};
use crate::input::LockSource;
use crate::machine::{BattleContext, SubstatePolicy, TurnPhase, TurnState};

#[derive(Debug, Default)]
pub struct ActionsProcessing {
    policy: SubstatePolicy,
    combatant: Option<CombatantId>,
    ai_controlled: bool,
    ai_actions: u32,
    available: Vec<AbilityId>,
    equipped: Option<AbilityId>,
    valid_targets: Vec<CellCoord>,
    /// Turn action to apply once the running presentation finishes.
    pending: Option<TurnAction>,
    holds_presentation_lock: bool,
}

impl ActionsProcessing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abilities usable by the turn owner as of the last availability check.
    pub fn available(&self) -> &[AbilityId] {
        &self.available
    }

    pub fn equipped(&self) -> Option<AbilityId> {
        self.equipped
    }

    fn reset(&mut self) {
        self.policy = SubstatePolicy::Free;
        self.combatant = None;
        self.ai_controlled = false;
        self.ai_actions = 0;
        self.available.clear();
        self.equipped = None;
        self.valid_targets.clear();
        self.pending = None;
    }

    /// Re-derives usable abilities for a player turn and waits for input, or
    /// ends the turn when nothing is usable.
    fn refresh(&mut self, ctx: &mut BattleContext) {
        let Some(combatant) = self.combatant else {
            self.finish(ctx);
            return;
        };
        if !ctx.is_combatant_active(combatant) {
            debug!(%combatant, "turn owner left the battle");
            self.finish(ctx);
            return;
        }

        self.available = ctx.env.executor.available_abilities(combatant);
        let Some(&first) = self.available.first() else {
            debug!(%combatant, "no usable abilities left");
            self.finish(ctx);
            return;
        };

        let ability = self
            .equipped
            .filter(|ability| self.available.contains(ability))
            .unwrap_or(first);
        self.equipped = Some(ability);
        self.valid_targets = ctx.env.targeting.valid_targets(combatant, ability);
        ctx.env.targeting.show_highlights(ability, &self.valid_targets);
        self.policy = SubstatePolicy::AwaitingInput;
        trace!(
            %combatant,
            ability = ability.0,
            usable = self.available.len(),
            targets = self.valid_targets.len(),
            "awaiting input"
        );
    }

    /// Plays AI actions until the AI passes, the turn ends, or presentation
    /// has to run.
    fn run_ai(&mut self, ctx: &mut BattleContext) {
        let Some(combatant) = self.combatant else {
            self.finish(ctx);
            return;
        };
        ctx.input_lock.request(LockSource::AiThinking);

        loop {
            let Some(decision) = self.next_ai_decision(ctx, combatant) else {
                self.finish(ctx);
                break;
            };
            let outcome = self.execute(ctx, combatant, decision.ability, decision.target);
            self.ai_actions += 1;
            if !outcome.accepted {
                debug!(%combatant, ability = decision.ability.0, "AI action rejected, passing");
                self.finish(ctx);
                break;
            }
            if !self.settle(ctx, outcome) {
                break;
            }
        }

        ctx.input_lock.release(LockSource::AiThinking);
    }

    fn next_ai_decision(
        &mut self,
        ctx: &mut BattleContext,
        combatant: CombatantId,
    ) -> Option<AiDecision> {
        if self.ai_actions >= ctx.config.max_ai_actions_per_turn {
            debug!(%combatant, actions = self.ai_actions, "AI action budget spent");
            return None;
        }
        if !ctx.is_combatant_active(combatant) {
            return None;
        }
        self.available = ctx.env.executor.available_abilities(combatant);
        if self.available.is_empty() {
            return None;
        }
        let Some(decision) = ctx.env.ai.decide(combatant, &self.available) else {
            debug!(%combatant, "AI passes");
            return None;
        };
        if !self.available.contains(&decision.ability) {
            debug!(%combatant, ability = decision.ability.0, "AI chose an unusable ability, passing");
            return None;
        }
        self.equipped = Some(decision.ability);
        Some(decision)
    }

    fn execute(
        &mut self,
        ctx: &mut BattleContext,
        source: CombatantId,
        ability: AbilityId,
        target: CellCoord,
    ) -> AbilityOutcome {
        let context = AbilityContext {
            source,
            target,
            round: ctx.round,
        };
        ctx.input_lock.request(LockSource::AbilityExecution);
        let outcome = ctx.env.executor.execute(ability, &context);
        ctx.input_lock.release(LockSource::AbilityExecution);
        debug!(
            combatant = %source,
            ability = ability.0,
            row = target.row,
            col = target.col,
            ?outcome,
            "ability executed"
        );
        outcome
    }

    /// Applies an accepted outcome. Returns true when the turn should go
    /// straight back to the availability check.
    fn settle(&mut self, ctx: &mut BattleContext, outcome: AbilityOutcome) -> bool {
        if outcome.battle_ended {
            info!(round = ctx.round, "ability ended the battle");
            ctx.battle_end_requested = true;
            self.finish(ctx);
            return false;
        }
        if outcome.presentation_pending && !ctx.barrier.is_idle() {
            ctx.env.targeting.clear_highlights();
            self.pending = Some(outcome.turn_action);
            self.policy = SubstatePolicy::AwaitingPresentation;
            if !self.holds_presentation_lock {
                ctx.input_lock.request(LockSource::PresentationPlaying);
                self.holds_presentation_lock = true;
            }
            trace!(pending = ctx.barrier.pending_operations(), "awaiting presentation");
            return false;
        }
        self.apply_turn_action(ctx, outcome.turn_action)
    }

    fn apply_turn_action(&mut self, ctx: &mut BattleContext, action: TurnAction) -> bool {
        match action {
            TurnAction::Continue => true,
            TurnAction::EndTurn => {
                self.finish(ctx);
                false
            }
            TurnAction::Wait => {
                if !ctx.scheduler.wait() {
                    debug!("wait refused, ending turn instead");
                }
                self.finish(ctx);
                false
            }
        }
    }

    fn continue_turn(&mut self, ctx: &mut BattleContext) {
        if self.ai_controlled {
            self.run_ai(ctx);
        } else {
            self.refresh(ctx);
        }
    }

    fn finish(&mut self, ctx: &mut BattleContext) {
        ctx.env.targeting.clear_highlights();
        self.valid_targets.clear();
        self.policy = SubstatePolicy::Free;
    }

    fn release_presentation_lock(&mut self, ctx: &mut BattleContext) {
        if self.holds_presentation_lock {
            self.holds_presentation_lock = false;
            if ctx.input_lock.is_locked_by(LockSource::PresentationPlaying) {
                ctx.input_lock.release(LockSource::PresentationPlaying);
            }
        }
    }
}

impl TurnState for ActionsProcessing {
    fn phase(&self) -> TurnPhase {
        TurnPhase::ActionsProcessing
    }

    fn enter(&mut self, ctx: &mut BattleContext) {
        self.reset();
        ctx.env.targeting.clear_highlights();

        let Some(combatant) = ctx.turn_owner else {
            return;
        };
        self.combatant = Some(combatant);
        self.ai_controlled = ctx
            .env
            .roster
            .combatant(combatant)
            .is_some_and(|info| info.is_ai());
        self.continue_turn(ctx);
    }

    fn exit(&mut self, ctx: &mut BattleContext) {
        ctx.env.targeting.clear_highlights();
        self.release_presentation_lock(ctx);
        self.reset();
    }

    fn policy(&self) -> SubstatePolicy {
        self.policy
    }

    fn next_state(&self, ctx: &BattleContext) -> TurnPhase {
        if ctx.battle_end_requested {
            TurnPhase::BattleEnd
        } else {
            TurnPhase::TurnEnd
        }
    }

    fn unit_clicked(&mut self, ctx: &mut BattleContext, combatant: CombatantId) {
        if self.policy != SubstatePolicy::AwaitingInput {
            return;
        }
        let Some(cell) = ctx.env.targeting.locate(combatant) else {
            debug!(%combatant, "clicked combatant is not on the grid");
            return;
        };
        self.cell_clicked(ctx, cell);
    }

    fn cell_clicked(&mut self, ctx: &mut BattleContext, cell: CellCoord) {
        if self.policy != SubstatePolicy::AwaitingInput {
            return;
        }
        let (Some(combatant), Some(ability)) = (self.combatant, self.equipped) else {
            return;
        };
        if !self.valid_targets.contains(&cell) {
            debug!(row = cell.row, col = cell.col, ability = ability.0, "invalid target");
            return;
        }

        let outcome = self.execute(ctx, combatant, ability, cell);
        if !outcome.accepted {
            debug!(%combatant, ability = ability.0, "executor rejected the action");
            return;
        }
        if self.settle(ctx, outcome) {
            self.refresh(ctx);
        }
    }

    fn ability_clicked(&mut self, ctx: &mut BattleContext, ability: AbilityId) {
        if self.policy != SubstatePolicy::AwaitingInput {
            return;
        }
        if !self.available.contains(&ability) {
            debug!(ability = ability.0, "ability is not usable right now");
            return;
        }
        self.equipped = Some(ability);
        self.refresh(ctx);
    }

    fn presentation_complete(&mut self, ctx: &mut BattleContext) {
        if self.policy != SubstatePolicy::AwaitingPresentation {
            return;
        }
        if !ctx.barrier.is_idle() {
            trace!("presentation still running");
            return;
        }
        self.release_presentation_lock(ctx);
        let action = self.pending.take().unwrap_or_default();
        self.policy = SubstatePolicy::Free;
        if self.apply_turn_action(ctx, action) {
            self.continue_turn(ctx);
        }
    }

    fn combatant_removed(&mut self, ctx: &mut BattleContext, combatant: CombatantId) {
        if self.combatant != Some(combatant) {
            return;
        }
        debug!(%combatant, policy = %self.policy, "turn owner removed mid-turn");
        if self.policy == SubstatePolicy::AwaitingPresentation {
            // let the running presentation finish before the turn ends
            self.pending = Some(TurnAction::EndTurn);
        } else {
            self.finish(ctx);
        }
    }
}
