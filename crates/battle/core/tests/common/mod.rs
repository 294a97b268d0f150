//! In-memory collaborators for the integration tests.
//!
//! Every fake holds the same `Rc<RefCell<World>>`, so a test can inspect and
//! mutate the battlefield while the machine owns the collaborators.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use battle_core::{
    AbilityContext, AbilityExecutor, AbilityId, AbilityOutcome, AiDecision, AiDecisionService,
    BattleConfig, BattleEnv, BattleEvent, CellCoord, CombatantId, CombatantInfo, Controller,
    FixedRoller, OperationHandle, PresentationBarrier, Roster, TargetingService, TeamSide,
    TurnAction, TurnStateMachine,
};

pub const STRIKE: AbilityId = AbilityId(1);
pub const DASH: AbilityId = AbilityId(2);
pub const HOLD: AbilityId = AbilityId(3);

pub const A1: CombatantId = CombatantId(1);
pub const A2: CombatantId = CombatantId(2);
pub const D1: CombatantId = CombatantId(10);

pub struct World {
    pub combatants: Vec<CombatantInfo>,
    pub positions: HashMap<CombatantId, CellCoord>,
    pub abilities: HashMap<CombatantId, Vec<AbilityId>>,
    pub targets: HashMap<AbilityId, Vec<CellCoord>>,
    /// Remove an ability from the owner's list once used.
    pub consume_abilities: bool,
    /// Scripted executor results; `EndTurn` when exhausted.
    pub outcomes: VecDeque<AbilityOutcome>,
    pub executed: Vec<(AbilityId, AbilityContext)>,
    pub ai_script: VecDeque<Option<AiDecision>>,
    pub ai_fallback: Option<AiDecision>,
    pub highlights: Option<(AbilityId, Vec<CellCoord>)>,
    pub prepared: bool,
    pub turn_starts: Vec<CombatantId>,
    pub turn_ends: Vec<CombatantId>,
    /// Turn-end hooks start presentation work.
    pub end_turn_effects: bool,
    pub barrier: PresentationBarrier,
    pub in_flight: Vec<OperationHandle>,
}

pub type SharedWorld = Rc<RefCell<World>>;

impl World {
    pub fn new() -> Self {
        Self {
            combatants: Vec::new(),
            positions: HashMap::new(),
            abilities: HashMap::new(),
            targets: HashMap::new(),
            consume_abilities: false,
            outcomes: VecDeque::new(),
            executed: Vec::new(),
            ai_script: VecDeque::new(),
            ai_fallback: None,
            highlights: None,
            prepared: false,
            turn_starts: Vec::new(),
            turn_ends: Vec::new(),
            end_turn_effects: false,
            barrier: PresentationBarrier::new(),
            in_flight: Vec::new(),
        }
    }

    pub fn shared(self) -> SharedWorld {
        Rc::new(RefCell::new(self))
    }

    pub fn with(mut self, info: CombatantInfo, cell: CellCoord) -> Self {
        self.positions.insert(info.id, cell);
        self.combatants.push(info);
        self
    }

    pub fn with_abilities(mut self, id: CombatantId, abilities: &[AbilityId]) -> Self {
        self.abilities.insert(id, abilities.to_vec());
        self
    }

    pub fn with_targets(mut self, ability: AbilityId, cells: &[CellCoord]) -> Self {
        self.targets.insert(ability, cells.to_vec());
        self
    }

    pub fn with_outcomes(mut self, outcomes: impl IntoIterator<Item = AbilityOutcome>) -> Self {
        self.outcomes.extend(outcomes);
        self
    }

    pub fn kill(&mut self, id: CombatantId) {
        if let Some(info) = self.combatants.iter_mut().find(|info| info.id == id) {
            info.alive = false;
        }
    }

    fn start_presentation(&mut self, name: &str) {
        let batch = self.barrier.begin_batch(name);
        let op = self
            .barrier
            .register_operation(name, Some(batch))
            .expect("batch was just opened");
        self.barrier.end_batch(batch).expect("batch was just opened");
        self.in_flight.push(op);
    }
}

/// Two player combatants: `A1` (attacker, base 50) and `D1` (defender, base 10).
pub fn duel() -> World {
    World::new()
        .with(
            CombatantInfo::new(A1, TeamSide::Attacker, 50),
            CellCoord::new(0, 0),
        )
        .with(
            CombatantInfo::new(D1, TeamSide::Defender, 10),
            CellCoord::new(0, 1),
        )
}

pub fn ai(info: CombatantInfo) -> CombatantInfo {
    info.with_controller(Controller::Ai)
}

pub fn cell_of(world: &SharedWorld, id: CombatantId) -> CellCoord {
    world.borrow().positions[&id]
}

struct FakeRoster(SharedWorld);

impl Roster for FakeRoster {
    fn combatants(&self) -> Vec<CombatantInfo> {
        self.0.borrow().combatants.clone()
    }

    fn prepare_for_battle(&mut self) {
        self.0.borrow_mut().prepared = true;
    }

    fn begin_turn(&mut self, id: CombatantId) {
        self.0.borrow_mut().turn_starts.push(id);
    }

    fn end_turn(&mut self, id: CombatantId) {
        let mut world = self.0.borrow_mut();
        world.turn_ends.push(id);
        if world.end_turn_effects {
            world.start_presentation("burn tick");
        }
    }
}

struct FakeAi(SharedWorld);

impl AiDecisionService for FakeAi {
    fn decide(&mut self, _combatant: CombatantId, _available: &[AbilityId]) -> Option<AiDecision> {
        let mut world = self.0.borrow_mut();
        match world.ai_script.pop_front() {
            Some(decision) => decision,
            None => world.ai_fallback,
        }
    }
}

struct FakeExecutor(SharedWorld);

impl AbilityExecutor for FakeExecutor {
    fn available_abilities(&self, combatant: CombatantId) -> Vec<AbilityId> {
        self.0
            .borrow()
            .abilities
            .get(&combatant)
            .cloned()
            .unwrap_or_default()
    }

    fn execute(&mut self, ability: AbilityId, context: &AbilityContext) -> AbilityOutcome {
        let mut world = self.0.borrow_mut();
        let outcome = world
            .outcomes
            .pop_front()
            .unwrap_or(AbilityOutcome::completed(TurnAction::EndTurn));
        if !outcome.accepted {
            return outcome;
        }
        world.executed.push((ability, *context));
        if world.consume_abilities {
            if let Some(list) = world.abilities.get_mut(&context.source) {
                list.retain(|owned| *owned != ability);
            }
        }
        if outcome.presentation_pending {
            world.start_presentation("ability");
        }
        outcome
    }
}

struct FakeTargeting(SharedWorld);

impl TargetingService for FakeTargeting {
    fn valid_targets(&self, _combatant: CombatantId, ability: AbilityId) -> Vec<CellCoord> {
        self.0
            .borrow()
            .targets
            .get(&ability)
            .cloned()
            .unwrap_or_default()
    }

    fn locate(&self, combatant: CombatantId) -> Option<CellCoord> {
        self.0.borrow().positions.get(&combatant).copied()
    }

    fn show_highlights(&mut self, ability: AbilityId, cells: &[CellCoord]) {
        self.0.borrow_mut().highlights = Some((ability, cells.to_vec()));
    }

    fn clear_highlights(&mut self) {
        self.0.borrow_mut().highlights = None;
    }
}

pub fn env(world: &SharedWorld) -> BattleEnv {
    BattleEnv::new(
        FakeRoster(Rc::clone(world)),
        FakeAi(Rc::clone(world)),
        FakeExecutor(Rc::clone(world)),
        FakeTargeting(Rc::clone(world)),
    )
}

/// Machine over `world` with every initiative roll pinned to zero.
pub fn machine(world: &SharedWorld, config: BattleConfig) -> TurnStateMachine {
    let barrier = world.borrow().barrier.clone();
    TurnStateMachine::builder(config, env(world))
        .with_roller(FixedRoller(0))
        .with_barrier(barrier)
        .build()
}

/// Records every broadcast the machine makes.
pub fn record(machine: &mut TurnStateMachine) -> Rc<RefCell<Vec<BattleEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    machine
        .events()
        .subscribe_all(move |event| sink.borrow_mut().push(*event));
    log
}

/// Completes every operation the fakes started.
pub fn finish_presentation(world: &SharedWorld) {
    let (barrier, ops) = {
        let mut world = world.borrow_mut();
        let ops: Vec<_> = world.in_flight.drain(..).collect();
        (world.barrier.clone(), ops)
    };
    for op in ops {
        barrier
            .unregister_operation(op)
            .expect("operation registered by a fake");
    }
}
