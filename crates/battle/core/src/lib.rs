//! Turn-based battle orchestration shared by every battle frontend.
//!
//! `battle-core` decides whose turn it is, drives the round/turn lifecycle and
//! keeps that lifecycle in step with asynchronous presentation work. It is
//! built from three pieces:
//!
//! - [`scheduler::InitiativeScheduler`] orders combatants by rolled initiative
//! - [`barrier::PresentationBarrier`] folds many "operation finished" callbacks
//!   into one debounced idle signal
//! - [`machine::TurnStateMachine`] composes both with the injected
//!   collaborators in [`env`] and is the single entry point for input
//!
//! Everything runs on one logical thread. Shared handles are `Rc`-based so the
//! compiler rejects any attempt to move them to another thread.
pub mod barrier;
pub mod combatant;
pub mod config;
pub mod env;
pub mod error;
pub mod events;
pub mod input;
pub mod machine;
pub mod scheduler;

pub use barrier::{BatchHandle, OperationHandle, PresentationBarrier, ScopedBatch, ScopedOperation};
pub use combatant::{AbilityId, CellCoord, CombatantId, CombatantInfo, Controller, TeamSide};
pub use config::BattleConfig;
pub use env::{
    AbilityContext, AbilityExecutor, AbilityOutcome, AiDecision, AiDecisionService, BattleEnv,
    FixedRoller, InitiativeRoller, PassingAi, PcgRoller, Roster, TargetingService, TurnAction,
};
pub use error::{BarrierError, ErrorSeverity, MachineError};
pub use events::{BattleEvent, EventBus, SubscriptionId, Topic};
pub use input::{InputLock, LockSource};
pub use machine::{
    BattleContext, MachineBuilder, SubstatePolicy, TurnPhase, TurnState, TurnStateMachine,
};
pub use scheduler::{InitiativeScheduler, QueueEntry, RolledInitiative};
