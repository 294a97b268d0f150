//! Round/turn bookkeeping states. All of them do their work on entry.
use tracing::{debug, info, warn};

use crate::events::BattleEvent;
use crate::machine::{BattleContext, SubstatePolicy, TurnPhase, TurnState};

/// One-shot preparation before the first round.
#[derive(Debug, Default)]
pub struct BattleInitialization;

impl TurnState for BattleInitialization {
    fn phase(&self) -> TurnPhase {
        TurnPhase::BattleInitialization
    }

    fn enter(&mut self, ctx: &mut BattleContext) {
        ctx.env.roster.prepare_for_battle();
        info!(
            combatants = ctx.env.roster.combatants().len(),
            "battle initialized"
        );
    }

    fn next_state(&self, _ctx: &BattleContext) -> TurnPhase {
        TurnPhase::RoundStart
    }
}

#[derive(Debug, Default)]
pub struct RoundStart;

impl TurnState for RoundStart {
    fn phase(&self) -> TurnPhase {
        TurnPhase::RoundStart
    }

    fn enter(&mut self, ctx: &mut BattleContext) {
        ctx.round += 1;
        ctx.reload_turn_order();
        info!(
            round = ctx.round,
            combatants = ctx.scheduler.len(),
            "round started"
        );
        ctx.broadcast(BattleEvent::RoundStarted { round: ctx.round });
    }

    fn next_state(&self, _ctx: &BattleContext) -> TurnPhase {
        TurnPhase::TurnStart
    }
}

/// Pops the next living combatant and hands it the turn.
#[derive(Debug, Default)]
pub struct TurnStart;

impl TurnState for TurnStart {
    fn phase(&self) -> TurnPhase {
        TurnPhase::TurnStart
    }

    fn enter(&mut self, ctx: &mut BattleContext) {
        ctx.turn_owner = None;
        loop {
            ctx.scheduler.advance();
            let Some(candidate) = ctx.scheduler.active() else {
                break;
            };
            if ctx.is_combatant_active(candidate) {
                ctx.turn_owner = Some(candidate);
                break;
            }
            debug!(combatant = %candidate, "skipping inactive combatant");
        }

        let Some(combatant) = ctx.turn_owner else {
            debug!(round = ctx.round, "no living combatant left this round");
            return;
        };
        info!(round = ctx.round, %combatant, "turn started");
        ctx.broadcast(BattleEvent::TurnStarted { combatant });
        ctx.env.roster.begin_turn(combatant);
    }

    fn next_state(&self, ctx: &BattleContext) -> TurnPhase {
        if ctx.turn_owner.is_some() {
            TurnPhase::ActionsProcessing
        } else {
            TurnPhase::RoundEnd
        }
    }
}

/// Runs turn-end effects, then waits for any presentation they started.
#[derive(Debug, Default)]
pub struct TurnEnd;

impl TurnState for TurnEnd {
    fn phase(&self) -> TurnPhase {
        TurnPhase::TurnEnd
    }

    fn enter(&mut self, ctx: &mut BattleContext) {
        let Some(combatant) = ctx.turn_owner else {
            return;
        };
        info!(round = ctx.round, %combatant, "turn ended");
        ctx.broadcast(BattleEvent::TurnEnded { combatant });
        if ctx.is_combatant_active(combatant) {
            ctx.env.roster.end_turn(combatant);
        }
    }

    fn exit(&mut self, ctx: &mut BattleContext) {
        ctx.turn_owner = None;
    }

    fn policy(&self) -> SubstatePolicy {
        SubstatePolicy::ProcessingEnd
    }

    fn next_state(&self, ctx: &BattleContext) -> TurnPhase {
        if ctx.scheduler.is_round_end() {
            TurnPhase::RoundEnd
        } else {
            TurnPhase::TurnStart
        }
    }
}

#[derive(Debug, Default)]
pub struct RoundEnd;

impl TurnState for RoundEnd {
    fn phase(&self) -> TurnPhase {
        TurnPhase::RoundEnd
    }

    fn enter(&mut self, ctx: &mut BattleContext) {
        info!(round = ctx.round, "round ended");
        ctx.broadcast(BattleEvent::RoundEnded { round: ctx.round });
        ctx.reload_turn_order();
    }

    fn next_state(&self, _ctx: &BattleContext) -> TurnPhase {
        TurnPhase::RoundStart
    }
}

/// Absorbing terminal state.
#[derive(Debug, Default)]
pub struct BattleEnd;

impl TurnState for BattleEnd {
    fn phase(&self) -> TurnPhase {
        TurnPhase::BattleEnd
    }

    fn enter(&mut self, ctx: &mut BattleContext) {
        let winner = ctx.winner();
        info!(round = ctx.round, ?winner, "battle ended");
        ctx.env.targeting.clear_highlights();
        if ctx.input_lock.is_locked() {
            debug!(locks = %ctx.input_lock.debug_summary(), "releasing input locks at battle end");
        }
        ctx.input_lock.force_unlock_all();
        ctx.turn_owner = None;
        ctx.broadcast(BattleEvent::BattleEnded { winner });
    }

    fn exit(&mut self, _ctx: &mut BattleContext) {
        warn!("leaving the terminal battle state");
    }

    fn next_state(&self, _ctx: &BattleContext) -> TurnPhase {
        TurnPhase::BattleEnd
    }
}
