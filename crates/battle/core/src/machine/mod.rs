//! Battle lifecycle state machine.
//!
//! [`TurnStateMachine`] owns one instance of every [`TurnState`] and a
//! [`BattleContext`] they share. External stimuli are forwarded to the current
//! state; after every stimulus the driver auto-advances through states whose
//! [`SubstatePolicy`] resolves to `Free` until one has to wait.
//!
//! # Driver
//!
//! Each drive is an iterative loop bounded by
//! [`BattleConfig::transition_cap`](crate::config::BattleConfig::transition_cap).
//! On every iteration the win condition is checked first and forces
//! `BattleEnd` regardless of the current substate. When
//! `yield_at_round_boundary` is set, a drive also stops right after a
//! completed round has started the next one.
mod context;
mod state;
pub mod states;

pub use context::BattleContext;
pub use state::{SubstatePolicy, TurnPhase, TurnState};

use std::collections::HashMap;

use tracing::{debug, error, info, trace, warn};

use crate::barrier::PresentationBarrier;
use crate::combatant::{AbilityId, CellCoord, CombatantId};
use crate::config::BattleConfig;
use crate::env::{BattleEnv, InitiativeRoller, PcgRoller};
use crate::error::MachineError;
use crate::events::{BattleEvent, EventBus, SubscriptionId, Topic};
use crate::input::{InputLock, LockSource};
use crate::scheduler::InitiativeScheduler;

/// Drives the battle from initialization to its end.
pub struct TurnStateMachine {
    states: HashMap<TurnPhase, Box<dyn TurnState>>,
    current: TurnPhase,
    ctx: BattleContext,
    started: bool,
    halted: bool,
}

impl TurnStateMachine {
    /// Create a builder with the seven built-in states installed.
    pub fn builder(config: BattleConfig, env: BattleEnv) -> MachineBuilder {
        MachineBuilder::new(config, env)
    }

    /// Machine with the built-in states and a seeded roller.
    pub fn new(config: BattleConfig, env: BattleEnv) -> Self {
        Self::builder(config, env).build()
    }

    /// Enters `BattleInitialization` and drives.
    pub fn start(&mut self) -> Result<TurnPhase, MachineError> {
        if self.halted {
            return Err(MachineError::Halted);
        }
        if self.started {
            warn!(phase = %self.current, "battle already started");
            return Ok(self.current);
        }

        let phase = TurnPhase::BattleInitialization;
        let Some(state) = self.states.get_mut(&phase) else {
            return Err(self.poison(MachineError::NoCurrentState { phase }));
        };
        info!("battle starting");
        self.started = true;
        self.current = phase;
        state.enter(&mut self.ctx);
        self.advance()
    }

    /// Auto-advances until the current state has to wait.
    ///
    /// Returns the phase the machine settled in. A drive may also stop at a
    /// round boundary with [`policy`](Self::policy) still `Free`; hosts keep
    /// calling `advance()` while the policy is `Free`.
    pub fn advance(&mut self) -> Result<TurnPhase, MachineError> {
        if self.halted {
            return Err(MachineError::Halted);
        }
        if !self.started {
            debug!("battle not started; nothing to advance");
            return Ok(self.current);
        }

        self.ctx.input_lock.request(LockSource::TurnTransition);
        let result = self.drive();
        if self.ctx.input_lock.is_locked_by(LockSource::TurnTransition) {
            self.ctx.input_lock.release(LockSource::TurnTransition);
        }

        match result {
            Err(err) if err.is_fatal() => Err(self.poison(err)),
            other => other,
        }
    }

    fn drive(&mut self) -> Result<TurnPhase, MachineError> {
        let cap = self.ctx.config.transition_cap;

        for _ in 0..cap {
            let from = self.current;
            let Some(state) = self.states.get(&from) else {
                return Err(MachineError::NoCurrentState { phase: from });
            };
            if from.is_terminal() {
                return Ok(from);
            }

            if self.ctx.battle_end_requested || self.ctx.is_battle_over() {
                info!(phase = %from, round = self.ctx.round, "win condition met");
                self.transition(TurnPhase::BattleEnd)?;
                return Ok(self.current);
            }

            let policy = state.policy();
            let free = match policy {
                SubstatePolicy::Free => true,
                SubstatePolicy::ProcessingEnd => self.ctx.barrier.is_idle(),
                SubstatePolicy::AwaitingInput | SubstatePolicy::AwaitingPresentation => false,
            };
            if !free {
                trace!(phase = %from, %policy, "waiting");
                return Ok(from);
            }

            let next = state.next_state(&self.ctx);
            self.transition(next)?;

            if from == TurnPhase::RoundEnd
                && next == TurnPhase::RoundStart
                && self.ctx.config.yield_at_round_boundary
            {
                debug!(round = self.ctx.round, "yielding at round boundary");
                return Ok(self.current);
            }
        }

        Err(MachineError::TransitionCapExceeded {
            cap,
            phase: self.current,
        })
    }

    /// Exits the current state and enters `next`. An unregistered target
    /// leaves the machine where it is.
    fn transition(&mut self, next: TurnPhase) -> Result<(), MachineError> {
        let from = self.current;
        if !self.states.contains_key(&next) {
            error!(%from, to = %next, "transition target is not registered");
            return Err(MachineError::UnregisteredState { from, to: next });
        }

        if let Some(state) = self.states.get_mut(&from) {
            state.exit(&mut self.ctx);
        }
        self.current = next;
        debug!(%from, to = %next, round = self.ctx.round, "state transition");
        if let Some(state) = self.states.get_mut(&next) {
            state.enter(&mut self.ctx);
        }
        Ok(())
    }

    fn poison(&mut self, err: MachineError) -> MachineError {
        error!(%err, phase = %self.current, severity = err.severity().as_str(), "state machine halted");
        self.halted = true;
        err
    }

    /// Forwards one event to the current state, then re-drives.
    fn dispatch(
        &mut self,
        event: &'static str,
        handler: impl FnOnce(&mut dyn TurnState, &mut BattleContext),
    ) -> Result<TurnPhase, MachineError> {
        if self.halted {
            return Err(MachineError::Halted);
        }
        if !self.started {
            debug!(event, "battle not started; event dropped");
            return Ok(self.current);
        }

        let phase = self.current;
        let Some(state) = self.states.get_mut(&phase) else {
            return Err(self.poison(MachineError::NoCurrentState { phase }));
        };
        trace!(event, %phase, "dispatching");
        handler(state.as_mut(), &mut self.ctx);
        self.advance()
    }

    fn input_rejected(&self, event: &'static str) -> bool {
        if !self.ctx.input_lock.is_locked() {
            return false;
        }
        debug!(
            event,
            locks = %self.ctx.input_lock.debug_summary(),
            "input rejected while locked"
        );
        true
    }

    // ===== input surface =====
    //
    // Clicks go to whatever state is current. Only ActionsProcessing waiting
    // for input acts on them; elsewhere they are dropped before the re-drive.

    /// Click on a combatant. Meaningful only while `policy()` is `AwaitingInput`.
    pub fn unit_clicked(&mut self, combatant: CombatantId) -> Result<TurnPhase, MachineError> {
        if self.input_rejected("unit_clicked") {
            return Ok(self.current);
        }
        self.dispatch("unit_clicked", |state, ctx| state.unit_clicked(ctx, combatant))
    }

    pub fn cell_clicked(&mut self, cell: CellCoord) -> Result<TurnPhase, MachineError> {
        if self.input_rejected("cell_clicked") {
            return Ok(self.current);
        }
        self.dispatch("cell_clicked", |state, ctx| state.cell_clicked(ctx, cell))
    }

    pub fn ability_clicked(&mut self, ability: AbilityId) -> Result<TurnPhase, MachineError> {
        if self.input_rejected("ability_clicked") {
            return Ok(self.current);
        }
        self.dispatch("ability_clicked", |state, ctx| {
            state.ability_clicked(ctx, ability)
        })
    }

    /// The barrier reported that all presentation work finished.
    pub fn presentation_complete(&mut self) -> Result<TurnPhase, MachineError> {
        self.dispatch("presentation_complete", |state, ctx| {
            state.presentation_complete(ctx)
        })
    }

    /// Advances the barrier by one scheduling step, forwarding its idle
    /// broadcast as [`presentation_complete`](Self::presentation_complete).
    pub fn tick(&mut self) -> Result<TurnPhase, MachineError> {
        if self.ctx.barrier.tick() {
            self.presentation_complete()
        } else if self.halted {
            Err(MachineError::Halted)
        } else {
            Ok(self.current)
        }
    }

    /// Removes a dead or fleeing combatant from the turn order. If it owned
    /// the turn, the turn ends.
    pub fn combatant_died(&mut self, combatant: CombatantId) -> Result<TurnPhase, MachineError> {
        if self.halted {
            return Err(MachineError::Halted);
        }
        let was_active = self.ctx.scheduler.remove_unit(combatant);
        info!(%combatant, was_active, "combatant removed from turn order");
        if was_active || self.ctx.turn_owner == Some(combatant) {
            return self.dispatch("combatant_removed", |state, ctx| {
                state.combatant_removed(ctx, combatant)
            });
        }
        self.advance()
    }

    /// Schedules a combatant that joined mid-round.
    pub fn combatant_summoned(
        &mut self,
        combatant: CombatantId,
    ) -> Result<TurnPhase, MachineError> {
        if self.halted {
            return Err(MachineError::Halted);
        }
        let Some(info) = self.ctx.env.roster.combatant(combatant) else {
            warn!(%combatant, "summoned combatant is not in the roster");
            return Ok(self.current);
        };
        if self.started && self.ctx.scheduler.insert_unit(&info) {
            info!(
                %combatant,
                initiative = self.ctx.scheduler.initiative_of(combatant),
                "combatant joined the turn order"
            );
        }
        self.advance()
    }

    // ===== queries =====

    pub fn phase(&self) -> TurnPhase {
        self.current
    }

    pub fn policy(&self) -> SubstatePolicy {
        self.states
            .get(&self.current)
            .map(|state| state.policy())
            .unwrap_or_default()
    }

    pub fn round(&self) -> u32 {
        self.ctx.round
    }

    /// Combatant whose turn is being played.
    pub fn active_combatant(&self) -> Option<CombatantId> {
        self.ctx.turn_owner
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_registered(&self, phase: TurnPhase) -> bool {
        self.states.contains_key(&phase)
    }

    pub fn scheduler(&self) -> &InitiativeScheduler {
        &self.ctx.scheduler
    }

    /// Shared barrier handle; clone it to register presentation work.
    pub fn barrier(&self) -> &PresentationBarrier {
        &self.ctx.barrier
    }

    pub fn input_lock(&self) -> &InputLock {
        &self.ctx.input_lock
    }

    pub fn input_lock_mut(&mut self) -> &mut InputLock {
        &mut self.ctx.input_lock
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.ctx.events
    }

    pub fn subscribe(
        &mut self,
        topic: Topic,
        listener: impl FnMut(&BattleEvent) + 'static,
    ) -> SubscriptionId {
        self.ctx.events.subscribe(topic, listener)
    }

    pub fn context(&self) -> &BattleContext {
        &self.ctx
    }
}

/// Builder for [`TurnStateMachine`].
pub struct MachineBuilder {
    config: BattleConfig,
    env: BattleEnv,
    roller: Option<Box<dyn InitiativeRoller>>,
    barrier: Option<PresentationBarrier>,
    states: HashMap<TurnPhase, Box<dyn TurnState>>,
}

impl MachineBuilder {
    fn new(config: BattleConfig, env: BattleEnv) -> Self {
        let states = states::default_states()
            .into_iter()
            .map(|state| (state.phase(), state))
            .collect();
        Self {
            config,
            env,
            roller: None,
            barrier: None,
            states,
        }
    }

    /// Replace the seeded default roller.
    pub fn with_roller(mut self, roller: impl InitiativeRoller + 'static) -> Self {
        self.roller = Some(Box::new(roller));
        self
    }

    /// Share an existing barrier instead of creating a fresh one.
    pub fn with_barrier(mut self, barrier: PresentationBarrier) -> Self {
        self.barrier = Some(barrier);
        self
    }

    /// Install `state` for its phase, replacing any built-in one.
    pub fn with_state(mut self, state: impl TurnState + 'static) -> Self {
        self.states.insert(state.phase(), Box::new(state));
        self
    }

    /// Leave `phase` without a state. Transitions into it are refused.
    pub fn without_state(mut self, phase: TurnPhase) -> Self {
        self.states.remove(&phase);
        self
    }

    pub fn build(self) -> TurnStateMachine {
        let roller: Box<dyn InitiativeRoller> = match self.roller {
            Some(roller) => roller,
            None => Box::new(PcgRoller::new(self.config.rng_seed)),
        };
        let scheduler = InitiativeScheduler::with_roller(&self.config, roller);
        let barrier = self.barrier.unwrap_or_default();
        debug!(
            states = self.states.len(),
            cap = self.config.transition_cap,
            "state machine built"
        );

        TurnStateMachine {
            states: self.states,
            current: TurnPhase::BattleInitialization,
            ctx: BattleContext::new(self.config, scheduler, barrier, self.env),
            started: false,
            halted: false,
        }
    }
}
