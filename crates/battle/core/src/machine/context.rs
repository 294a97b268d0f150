use tracing::info;

use crate::barrier::PresentationBarrier;
use crate::combatant::{CombatantId, CombatantInfo, TeamSide};
use crate::config::BattleConfig;
use crate::env::BattleEnv;
use crate::events::{BattleEvent, EventBus};
use crate::input::InputLock;
use crate::scheduler::InitiativeScheduler;

/// Everything a state may touch while it runs.
///
/// Owned by the machine and lent to the current state for the duration of one
/// handler call.
pub struct BattleContext {
    pub config: BattleConfig,
    pub scheduler: InitiativeScheduler,
    pub barrier: PresentationBarrier,
    pub env: BattleEnv,
    pub events: EventBus,
    pub input_lock: InputLock,
    /// 1-based; 0 before the first round starts.
    pub round: u32,
    /// Combatant whose turn is being played, set at turn start.
    pub turn_owner: Option<CombatantId>,
    /// Raised when an ability reports it decided the battle.
    pub battle_end_requested: bool,
}

impl BattleContext {
    pub fn new(
        config: BattleConfig,
        scheduler: InitiativeScheduler,
        barrier: PresentationBarrier,
        env: BattleEnv,
    ) -> Self {
        Self {
            config,
            scheduler,
            barrier,
            env,
            events: EventBus::new(),
            input_lock: InputLock::new(),
            round: 0,
            turn_owner: None,
            battle_end_requested: false,
        }
    }

    /// Living, non-fleeing combatants.
    pub fn living_roster(&self) -> Vec<CombatantInfo> {
        self.env
            .roster
            .combatants()
            .into_iter()
            .filter(CombatantInfo::is_active)
            .collect()
    }

    /// Repopulates the scheduler from the living roster.
    pub fn reload_turn_order(&mut self) {
        let roster = self.living_roster();
        self.scheduler.repopulate(&roster, self.config.primary_team);
    }

    pub fn broadcast(&mut self, event: BattleEvent) {
        info!(round = self.round, ?event, "broadcast");
        self.events.publish(event);
    }

    pub fn is_combatant_active(&self, id: CombatantId) -> bool {
        self.env.roster.is_active(id)
    }

    /// Over once either side has nobody left standing.
    pub fn is_battle_over(&self) -> bool {
        let (attackers, defenders) = self.teams_standing();
        !(attackers && defenders)
    }

    /// The only side still standing, if exactly one is.
    pub fn winner(&self) -> Option<TeamSide> {
        match self.teams_standing() {
            (true, false) => Some(TeamSide::Attacker),
            (false, true) => Some(TeamSide::Defender),
            _ => None,
        }
    }

    fn teams_standing(&self) -> (bool, bool) {
        let roster = self.living_roster();
        let standing = |team: TeamSide| roster.iter().any(|info| info.team == team);
        (standing(TeamSide::Attacker), standing(TeamSide::Defender))
    }
}
