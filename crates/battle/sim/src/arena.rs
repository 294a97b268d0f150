//! In-memory battlefield backing every collaborator of the simulation.
//!
//! Attackers line up on the top row, defenders on the bottom row. Each turn a
//! combatant may advance one cell (a free action) and strike once.
use std::cell::RefCell;
use std::rc::Rc;

use battle_core::{
    AbilityContext, AbilityExecutor, AbilityId, AbilityOutcome, AiDecision, AiDecisionService,
    BattleEnv, CellCoord, CombatantId, CombatantInfo, Controller, InitiativeRoller,
    OperationHandle, PcgRoller, PresentationBarrier, Roster, TargetingService, TeamSide,
    TurnAction,
};
use tracing::{debug, info, warn};

use crate::config::SimConfig;

pub const STRIKE: AbilityId = AbilityId(1);
pub const ADVANCE: AbilityId = AbilityId(2);
pub const HOLD: AbilityId = AbilityId(3);

const GRID_WIDTH: i32 = 8;
const GRID_HEIGHT: i32 = 6;

#[derive(Clone, Debug)]
struct Unit {
    info: CombatantInfo,
    cell: CellCoord,
    hp: i32,
    attack: i32,
    moved: bool,
    struck: bool,
}

/// Presentation work started by an ability, finishing after a few ticks.
struct Animation {
    operation: OperationHandle,
    remaining: u32,
}

pub struct Arena {
    units: Vec<Unit>,
    barrier: PresentationBarrier,
    animations: Vec<Animation>,
    presentation_steps: u32,
    fallen: Vec<CombatantId>,
}

pub type SharedArena = Rc<RefCell<Arena>>;

impl Arena {
    pub fn new(config: &SimConfig, barrier: PresentationBarrier) -> Self {
        let mut rng = PcgRoller::new(config.seed ^ 0x00a1_e2a0);
        let mut units = Vec::new();
        for (team, row) in [(TeamSide::Attacker, 0), (TeamSide::Defender, GRID_HEIGHT - 1)] {
            for slot in 0..config.roster_size {
                let id = CombatantId(units.len() as u32 + 1);
                let initiative = rng.roll(5, 15);
                units.push(Unit {
                    info: CombatantInfo::new(id, team, initiative).with_controller(Controller::Ai),
                    cell: CellCoord::new(row, slot as i32),
                    hp: rng.roll(10, 16),
                    attack: rng.roll(3, 6),
                    moved: false,
                    struck: false,
                });
            }
        }

        Self {
            units,
            barrier,
            animations: Vec::new(),
            presentation_steps: config.presentation_steps,
            fallen: Vec::new(),
        }
    }

    pub fn shared(self) -> SharedArena {
        Rc::new(RefCell::new(self))
    }

    /// Advances every running animation by one tick.
    pub fn step_presentation(&mut self) {
        let mut finished = Vec::new();
        self.animations.retain_mut(|animation| {
            animation.remaining = animation.remaining.saturating_sub(1);
            if animation.remaining == 0 {
                finished.push(animation.operation);
                false
            } else {
                true
            }
        });
        for operation in finished {
            if let Err(err) = self.barrier.unregister_operation(operation) {
                warn!(%err, "animation finished twice");
            }
        }
    }

    /// Combatants that died since the last call.
    pub fn take_fallen(&mut self) -> Vec<CombatantId> {
        std::mem::take(&mut self.fallen)
    }

    pub fn survivors(&self, team: TeamSide) -> usize {
        self.units
            .iter()
            .filter(|unit| unit.info.team == team && unit.info.alive)
            .count()
    }

    fn unit(&self, id: CombatantId) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.info.id == id)
    }

    fn unit_mut(&mut self, id: CombatantId) -> Option<&mut Unit> {
        self.units.iter_mut().find(|unit| unit.info.id == id)
    }

    fn occupant(&self, cell: CellCoord) -> Option<&Unit> {
        self.units
            .iter()
            .find(|unit| unit.info.alive && unit.cell == cell)
    }

    fn enemies_of(&self, id: CombatantId) -> impl Iterator<Item = &Unit> {
        let team = self.unit(id).map(|unit| unit.info.team);
        self.units
            .iter()
            .filter(move |unit| unit.info.alive && Some(unit.info.team.opponent()) == team)
    }

    fn abilities(&self, id: CombatantId) -> Vec<AbilityId> {
        let Some(unit) = self.unit(id).filter(|unit| unit.info.is_active()) else {
            return Vec::new();
        };
        let mut abilities = Vec::new();
        if !unit.struck && !self.targets(id, STRIKE).is_empty() {
            abilities.push(STRIKE);
        }
        if !unit.moved && !unit.struck && !self.targets(id, ADVANCE).is_empty() {
            abilities.push(ADVANCE);
        }
        if !unit.moved && !unit.struck {
            abilities.push(HOLD);
        }
        abilities
    }

    fn targets(&self, id: CombatantId, ability: AbilityId) -> Vec<CellCoord> {
        let Some(unit) = self.unit(id) else {
            return Vec::new();
        };
        match ability {
            STRIKE => self
                .enemies_of(id)
                .filter(|enemy| enemy.cell.distance(unit.cell) == 1)
                .map(|enemy| enemy.cell)
                .collect(),
            ADVANCE => neighbours(unit.cell)
                .filter(|cell| self.occupant(*cell).is_none())
                .collect(),
            HOLD => vec![unit.cell],
            _ => Vec::new(),
        }
    }

    fn animate(&mut self, label: &str) -> bool {
        if self.presentation_steps == 0 {
            return false;
        }
        let batch = self.barrier.begin_batch(label);
        let operation = match self.barrier.register_operation(label, Some(batch)) {
            Ok(operation) => operation,
            Err(err) => {
                warn!(%err, "could not track animation");
                return false;
            }
        };
        if let Err(err) = self.barrier.end_batch(batch) {
            warn!(%err, "could not seal animation batch");
        }
        self.animations.push(Animation {
            operation,
            remaining: self.presentation_steps,
        });
        true
    }

    fn strike(&mut self, source: CombatantId, target: CellCoord) -> AbilityOutcome {
        let Some(attack) = self.unit(source).map(|unit| unit.attack) else {
            return AbilityOutcome::rejected();
        };
        let Some(victim) = self.occupant(target).map(|unit| unit.info.id) else {
            return AbilityOutcome::rejected();
        };

        let mut killed = false;
        if let Some(unit) = self.unit_mut(victim) {
            unit.hp -= attack;
            info!(%source, %victim, damage = attack, hp = unit.hp, "strike");
            if unit.hp <= 0 {
                unit.info.alive = false;
                killed = true;
            }
        }
        if killed {
            info!(combatant = %victim, "combatant fell");
            self.fallen.push(victim);
        }
        if let Some(unit) = self.unit_mut(source) {
            unit.struck = true;
        }

        let outcome = AbilityOutcome::completed(TurnAction::EndTurn);
        if self.animate("strike") {
            outcome.with_presentation()
        } else {
            outcome
        }
    }

    fn advance(&mut self, source: CombatantId, target: CellCoord) -> AbilityOutcome {
        let Some(unit) = self.unit_mut(source) else {
            return AbilityOutcome::rejected();
        };
        debug!(combatant = %source, from = ?unit.cell, to = ?target, "advance");
        unit.cell = target;
        unit.moved = true;

        let outcome = AbilityOutcome::completed(TurnAction::Continue);
        if self.animate("advance") {
            outcome.with_presentation()
        } else {
            outcome
        }
    }
}

fn neighbours(cell: CellCoord) -> impl Iterator<Item = CellCoord> {
    (-1..=1)
        .flat_map(move |dr| (-1..=1).map(move |dc| CellCoord::new(cell.row + dr, cell.col + dc)))
        .filter(move |next| *next != cell)
        .filter(|next| (0..GRID_HEIGHT).contains(&next.row) && (0..GRID_WIDTH).contains(&next.col))
}

pub struct ArenaRoster(pub SharedArena);

impl Roster for ArenaRoster {
    fn combatants(&self) -> Vec<CombatantInfo> {
        self.0
            .borrow()
            .units
            .iter()
            .map(|unit| unit.info.clone())
            .collect()
    }

    fn prepare_for_battle(&mut self) {
        let mut arena = self.0.borrow_mut();
        for unit in &mut arena.units {
            unit.moved = false;
            unit.struck = false;
        }
    }

    fn begin_turn(&mut self, id: CombatantId) {
        if let Some(unit) = self.0.borrow_mut().unit_mut(id) {
            unit.moved = false;
            unit.struck = false;
        }
    }
}

/// Strikes the weakest adjacent enemy, otherwise closes in on the nearest.
pub struct GreedyAi(pub SharedArena);

impl AiDecisionService for GreedyAi {
    fn decide(&mut self, combatant: CombatantId, available: &[AbilityId]) -> Option<AiDecision> {
        let arena = self.0.borrow();
        let here = arena.unit(combatant)?.cell;

        if available.contains(&STRIKE) {
            let weakest = arena
                .enemies_of(combatant)
                .filter(|enemy| enemy.cell.distance(here) == 1)
                .min_by_key(|enemy| (enemy.hp, enemy.info.id))?;
            return Some(AiDecision {
                ability: STRIKE,
                target: weakest.cell,
            });
        }

        let nearest = arena
            .enemies_of(combatant)
            .min_by_key(|enemy| (enemy.cell.distance(here), enemy.info.id))?
            .cell;
        if available.contains(&ADVANCE) {
            let step = arena
                .targets(combatant, ADVANCE)
                .into_iter()
                .filter(|cell| cell.distance(nearest) < here.distance(nearest))
                .min_by_key(|cell| (cell.distance(nearest), *cell));
            if let Some(target) = step {
                return Some(AiDecision {
                    ability: ADVANCE,
                    target,
                });
            }
        }
        if available.contains(&HOLD) && here.distance(nearest) > 2 {
            return Some(AiDecision {
                ability: HOLD,
                target: here,
            });
        }
        None
    }
}

pub struct ArenaExecutor(pub SharedArena);

impl AbilityExecutor for ArenaExecutor {
    fn available_abilities(&self, combatant: CombatantId) -> Vec<AbilityId> {
        self.0.borrow().abilities(combatant)
    }

    fn execute(&mut self, ability: AbilityId, context: &AbilityContext) -> AbilityOutcome {
        let mut arena = self.0.borrow_mut();
        if !arena.targets(context.source, ability).contains(&context.target) {
            debug!(combatant = %context.source, %ability, "target out of reach");
            return AbilityOutcome::rejected();
        }
        match ability {
            STRIKE => arena.strike(context.source, context.target),
            ADVANCE => arena.advance(context.source, context.target),
            HOLD => {
                debug!(combatant = %context.source, "holds position");
                AbilityOutcome::completed(TurnAction::Wait)
            }
            _ => AbilityOutcome::rejected(),
        }
    }
}

pub struct ArenaTargeting(pub SharedArena);

impl TargetingService for ArenaTargeting {
    fn valid_targets(&self, combatant: CombatantId, ability: AbilityId) -> Vec<CellCoord> {
        self.0.borrow().targets(combatant, ability)
    }

    fn locate(&self, combatant: CombatantId) -> Option<CellCoord> {
        self.0.borrow().unit(combatant).map(|unit| unit.cell)
    }

    fn show_highlights(&mut self, ability: AbilityId, cells: &[CellCoord]) {
        debug!(%ability, cells = cells.len(), "highlighting targets");
    }
}

pub fn battle_env(arena: &SharedArena) -> BattleEnv {
    BattleEnv::new(
        ArenaRoster(Rc::clone(arena)),
        GreedyAi(Rc::clone(arena)),
        ArenaExecutor(Rc::clone(arena)),
        ArenaTargeting(Rc::clone(arena)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(presentation_steps: u32) -> Arena {
        let config = SimConfig {
            presentation_steps,
            roster_size: 2,
            ..SimConfig::default()
        };
        Arena::new(&config, PresentationBarrier::new())
    }

    #[test]
    fn teams_start_on_opposite_rows() {
        let arena = arena(0);
        assert_eq!(arena.survivors(TeamSide::Attacker), 2);
        assert_eq!(arena.survivors(TeamSide::Defender), 2);
        assert!(arena.enemies_of(CombatantId(1)).all(|enemy| enemy.cell.row == GRID_HEIGHT - 1));
    }

    #[test]
    fn far_apart_units_can_only_move_or_hold() {
        let arena = arena(0);
        assert_eq!(arena.abilities(CombatantId(1)), vec![ADVANCE, HOLD]);
    }

    #[test]
    fn animations_finish_after_configured_ticks() {
        let mut arena = arena(2);
        assert!(arena.animate("swing"));
        assert!(!arena.barrier.is_idle());
        arena.step_presentation();
        assert!(!arena.barrier.is_idle());
        arena.step_presentation();
        assert!(arena.barrier.is_idle());
    }
}
