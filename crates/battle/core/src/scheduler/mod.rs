//! Initiative-ordered turn queue.
//!
//! The scheduler only knows combatant identifiers. It is cleared and refilled
//! once per round by [`InitiativeScheduler::repopulate`] and hands out the
//! next combatant via [`InitiativeScheduler::advance`].
//!
//! # Ordering
//!
//! The queue is kept sorted by current initiative, highest first. Equal values
//! are broken deterministically: combatants of the primary team act first, and
//! if both belong to the same team the lower [`CombatantId`] acts first.
//! Insertion order never decides a tie.
mod initiative;

pub use initiative::RolledInitiative;

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::combatant::{CombatantId, CombatantInfo, TeamSide};
use crate::config::BattleConfig;
use crate::env::{InitiativeRoller, PcgRoller};

/// Scheduler membership of one combatant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueEntry {
    pub combatant: CombatantId,
    pub team: TeamSide,
    /// Cached current initiative at the time the entry was (re)sorted.
    pub initiative: i32,
}

/// Decides who acts next.
pub struct InitiativeScheduler {
    queue: Vec<QueueEntry>,
    active: Option<CombatantId>,
    rolled: HashMap<CombatantId, RolledInitiative>,
    teams: HashMap<CombatantId, TeamSide>,
    primary_team: TeamSide,
    roll_range: (i32, i32),
    roller: Box<dyn InitiativeRoller>,
}

impl InitiativeScheduler {
    /// Expected number of combatants in a typical battle.
    const EXPECTED_BATTLE_SIZE: usize = 30;

    pub fn new(config: &BattleConfig) -> Self {
        Self::with_roller(config, PcgRoller::new(config.rng_seed))
    }

    pub fn with_roller(config: &BattleConfig, roller: impl InitiativeRoller + 'static) -> Self {
        Self {
            queue: Vec::with_capacity(Self::EXPECTED_BATTLE_SIZE),
            active: None,
            rolled: HashMap::new(),
            teams: HashMap::new(),
            primary_team: config.primary_team,
            roll_range: config.roll_range(),
            roller: Box::new(roller),
        }
    }

    /// Clears all state and queues every roster member with a fresh roll.
    ///
    /// Does not advance: the active combatant is `None` afterwards.
    pub fn repopulate(&mut self, roster: &[CombatantInfo], primary_team: TeamSide) {
        self.erase();
        self.primary_team = primary_team;

        for info in roster {
            let entry = self.roll_entry(info);
            self.queue.push(entry);
        }
        self.sort_queue();

        debug!(
            combatants = self.queue.len(),
            primary_team = %primary_team,
            "turn order repopulated"
        );
    }

    /// Drops every queued combatant, the active slot and all rolls.
    pub fn erase(&mut self) {
        self.queue.clear();
        self.active = None;
        self.rolled.clear();
        self.teams.clear();
    }

    /// Pops the highest-ranked combatant into the active slot.
    ///
    /// Returns the previously active combatant (`None` at round start).
    pub fn advance(&mut self) -> Option<CombatantId> {
        let previous = self.active.take();
        if !self.queue.is_empty() {
            let entry = self.queue.remove(0);
            trace!(combatant = %entry.combatant, initiative = entry.initiative, "advanced");
            self.active = Some(entry.combatant);
        }
        previous
    }

    /// Re-queues the active combatant with its initiative inverted.
    ///
    /// Allowed once per round; returns whether the combatant was re-queued.
    pub fn wait(&mut self) -> bool {
        let Some(active) = self.active else {
            warn!("wait requested without an active combatant");
            return false;
        };
        let Some(initiative) = self.rolled.get_mut(&active) else {
            warn!(combatant = %active, "wait requested for combatant without initiative");
            return false;
        };
        if !initiative.wait() {
            debug!(combatant = %active, "combatant already waited this round");
            return false;
        }
        let current = initiative.current();

        let entry = QueueEntry {
            combatant: active,
            team: self.team_of(active),
            initiative: current,
        };
        self.insert_sorted(entry);
        debug!(combatant = %active, initiative = entry.initiative, "combatant waits");
        true
    }

    /// Whether the active combatant may still wait this round.
    pub fn can_wait(&self) -> bool {
        self.active
            .and_then(|id| self.rolled.get(&id))
            .is_some_and(RolledInitiative::can_wait)
    }

    /// Mid-round arrival: rolls fresh initiative for `info` and inserts it in
    /// sorted position without re-rolling anyone else.
    pub fn insert_unit(&mut self, info: &CombatantInfo) -> bool {
        if self.active == Some(info.id) || self.is_queued(info.id) {
            warn!(combatant = %info.id, "combatant already scheduled");
            return false;
        }
        let entry = self.roll_entry(info);
        self.insert_sorted(entry);
        debug!(combatant = %info.id, initiative = entry.initiative, "combatant inserted");
        true
    }

    /// Removes every occurrence of `id`. Returns true if it was the active
    /// combatant; the caller must then advance.
    pub fn remove_unit(&mut self, id: CombatantId) -> bool {
        self.queue.retain(|entry| entry.combatant != id);
        self.rolled.remove(&id);
        self.teams.remove(&id);

        if self.active == Some(id) {
            self.active = None;
            debug!(combatant = %id, "active combatant removed");
            return true;
        }
        false
    }

    /// Re-reads base initiative for every scheduled combatant and re-sorts.
    /// Rolls and wait state are kept.
    pub fn refresh_base(&mut self, roster: &[CombatantInfo]) {
        for info in roster {
            if let Some(initiative) = self.rolled.get_mut(&info.id) {
                initiative.set_base(info.initiative);
            }
        }
        for entry in &mut self.queue {
            if let Some(initiative) = self.rolled.get(&entry.combatant) {
                entry.initiative = initiative.current();
            }
        }
        self.sort_queue();
    }

    pub fn active(&self) -> Option<CombatantId> {
        self.active
    }

    /// Up to `limit` queued combatants (excluding the active one) in turn order.
    pub fn remaining(&self, limit: Option<usize>) -> Vec<CombatantId> {
        let limit = limit.unwrap_or(self.queue.len());
        self.queue
            .iter()
            .take(limit)
            .map(|entry| entry.combatant)
            .collect()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.queue
    }

    pub fn initiative_of(&self, id: CombatantId) -> Option<i32> {
        self.rolled.get(&id).map(RolledInitiative::current)
    }

    /// True when nobody is left in the queue (the active slot is not counted).
    pub fn is_round_end(&self) -> bool {
        self.queue.is_empty()
    }

    /// True when there is neither an active combatant nor a queued one.
    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn primary_team(&self) -> TeamSide {
        self.primary_team
    }

    fn is_queued(&self, id: CombatantId) -> bool {
        self.queue.iter().any(|entry| entry.combatant == id)
    }

    fn team_of(&self, id: CombatantId) -> TeamSide {
        self.teams
            .get(&id)
            .copied()
            .unwrap_or(self.primary_team.opponent())
    }

    fn roll_entry(&mut self, info: &CombatantInfo) -> QueueEntry {
        let (min, max) = self.roll_range;
        let mut initiative = RolledInitiative::new(info.initiative);
        initiative.roll(self.roller.as_mut(), min, max);
        self.rolled.insert(info.id, initiative);
        self.teams.insert(info.id, info.team);

        trace!(
            combatant = %info.id,
            base = initiative.base(),
            rolled = initiative.rolled(),
            "initiative rolled"
        );

        QueueEntry {
            combatant: info.id,
            team: info.team,
            initiative: initiative.current(),
        }
    }

    fn insert_sorted(&mut self, entry: QueueEntry) {
        let primary = self.primary_team;
        let index = self
            .queue
            .partition_point(|queued| turn_order(primary, queued, &entry) == Ordering::Less);
        self.queue.insert(index, entry);
    }

    fn sort_queue(&mut self) {
        let primary = self.primary_team;
        self.queue.sort_by(|a, b| turn_order(primary, a, b));
    }
}

/// `Less` means `a` acts before `b`.
fn turn_order(primary: TeamSide, a: &QueueEntry, b: &QueueEntry) -> Ordering {
    let rank = |team: TeamSide| u8::from(team != primary);
    b.initiative
        .cmp(&a.initiative)
        .then_with(|| rank(a.team).cmp(&rank(b.team)))
        .then_with(|| a.combatant.cmp(&b.combatant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::FixedRoller;

    fn scheduler() -> InitiativeScheduler {
        InitiativeScheduler::with_roller(&BattleConfig::default(), FixedRoller(0))
    }

    fn unit(id: u32, team: TeamSide, base: i32) -> CombatantInfo {
        CombatantInfo::new(CombatantId(id), team, base)
    }

    #[test]
    fn empty_roster_is_immediately_empty() {
        let mut scheduler = scheduler();
        scheduler.repopulate(&[], TeamSide::Attacker);

        assert_eq!(scheduler.advance(), None);
        assert_eq!(scheduler.active(), None);
        assert!(scheduler.is_empty());
        assert!(scheduler.is_round_end());
    }

    #[test]
    fn higher_base_acts_first() {
        let mut scheduler = scheduler();
        scheduler.repopulate(
            &[unit(1, TeamSide::Attacker, 10), unit(2, TeamSide::Defender, 50)],
            TeamSide::Attacker,
        );

        assert_eq!(scheduler.advance(), None);
        assert_eq!(scheduler.active(), Some(CombatantId(2)));
        assert_eq!(scheduler.advance(), Some(CombatantId(2)));
        assert_eq!(scheduler.active(), Some(CombatantId(1)));
    }

    #[test]
    fn ties_prefer_primary_team_then_lower_id() {
        let mut scheduler = scheduler();
        scheduler.repopulate(
            &[
                unit(4, TeamSide::Defender, 20),
                unit(9, TeamSide::Attacker, 20),
                unit(3, TeamSide::Attacker, 20),
                unit(1, TeamSide::Defender, 20),
            ],
            TeamSide::Attacker,
        );

        assert_eq!(
            scheduler.remaining(None),
            vec![CombatantId(3), CombatantId(9), CombatantId(1), CombatantId(4)]
        );
    }

    #[test]
    fn primary_team_flips_tie_break() {
        let mut scheduler = scheduler();
        scheduler.repopulate(
            &[unit(1, TeamSide::Attacker, 20), unit(2, TeamSide::Defender, 20)],
            TeamSide::Defender,
        );
        scheduler.advance();
        assert_eq!(scheduler.active(), Some(CombatantId(2)));
    }

    #[test]
    fn wait_pushes_active_behind_everyone_once() {
        let mut scheduler = scheduler();
        scheduler.repopulate(
            &[
                unit(1, TeamSide::Attacker, 30),
                unit(2, TeamSide::Defender, 20),
                unit(3, TeamSide::Defender, 10),
            ],
            TeamSide::Attacker,
        );
        scheduler.advance();
        assert!(scheduler.can_wait());
        assert!(scheduler.wait());
        assert!(!scheduler.can_wait());
        assert_eq!(scheduler.initiative_of(CombatantId(1)), Some(-30));
        assert_eq!(
            scheduler.remaining(None),
            vec![CombatantId(2), CombatantId(3), CombatantId(1)]
        );

        // the second wait is refused and does not duplicate the entry
        assert!(!scheduler.wait());
        assert_eq!(scheduler.len(), 3);

        scheduler.advance();
        scheduler.advance();
        scheduler.advance();
        assert_eq!(scheduler.active(), Some(CombatantId(1)));
        assert!(!scheduler.can_wait());
        assert!(!scheduler.wait());
    }

    #[test]
    fn repopulate_restores_wait() {
        let roster = [unit(1, TeamSide::Attacker, 5)];
        let mut scheduler = scheduler();
        scheduler.repopulate(&roster, TeamSide::Attacker);
        scheduler.advance();
        assert!(scheduler.wait());

        scheduler.repopulate(&roster, TeamSide::Attacker);
        scheduler.advance();
        assert!(scheduler.can_wait());
    }

    #[test]
    fn insert_keeps_order_without_rerolling() {
        let mut scheduler = scheduler();
        scheduler.repopulate(
            &[unit(1, TeamSide::Attacker, 30), unit(2, TeamSide::Defender, 10)],
            TeamSide::Attacker,
        );
        assert!(scheduler.insert_unit(&unit(3, TeamSide::Defender, 20)));
        assert!(!scheduler.insert_unit(&unit(3, TeamSide::Defender, 20)));

        assert_eq!(
            scheduler.remaining(None),
            vec![CombatantId(1), CombatantId(3), CombatantId(2)]
        );
    }

    #[test]
    fn removing_active_clears_slot() {
        let mut scheduler = scheduler();
        scheduler.repopulate(
            &[unit(1, TeamSide::Attacker, 30), unit(2, TeamSide::Defender, 10)],
            TeamSide::Attacker,
        );
        scheduler.advance();

        assert!(!scheduler.remove_unit(CombatantId(2)));
        assert!(scheduler.is_round_end());
        assert!(!scheduler.is_empty());

        assert!(scheduler.remove_unit(CombatantId(1)));
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.initiative_of(CombatantId(1)), None);
    }

    #[test]
    fn refresh_base_resorts_without_rerolling() {
        let mut scheduler = scheduler();
        scheduler.repopulate(
            &[unit(1, TeamSide::Attacker, 30), unit(2, TeamSide::Defender, 10)],
            TeamSide::Attacker,
        );
        scheduler.refresh_base(&[unit(2, TeamSide::Defender, 40)]);

        assert_eq!(scheduler.remaining(Some(1)), vec![CombatantId(2)]);
        assert_eq!(scheduler.initiative_of(CombatantId(2)), Some(40));
    }
}
