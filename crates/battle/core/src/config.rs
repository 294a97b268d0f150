use crate::combatant::TeamSide;

/// Battle configuration constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BattleConfig {
    /// Lowest value of the per-round initiative roll (inclusive).
    pub initiative_roll_min: i32,
    /// Highest value of the per-round initiative roll (inclusive).
    pub initiative_roll_max: i32,
    /// Maximum number of state transitions a single drive may perform.
    /// Exceeding it means the state graph has a cycle of free states.
    pub transition_cap: usize,
    /// Stop driving after a full round has completed so the caller can react
    /// to the round boundary before the next round starts.
    pub yield_at_round_boundary: bool,
    /// Upper bound on abilities an AI combatant may fire in one turn.
    pub max_ai_actions_per_turn: u32,
    /// Team that wins initiative ties.
    pub primary_team: TeamSide,
    /// Seed for the default initiative roller.
    pub rng_seed: u64,
}

impl BattleConfig {
    // ===== runtime-tunable defaults =====
    pub const DEFAULT_ROLL_MIN: i32 = -4;
    pub const DEFAULT_ROLL_MAX: i32 = 4;
    pub const DEFAULT_TRANSITION_CAP: usize = 256;
    pub const DEFAULT_MAX_AI_ACTIONS: u32 = 8;
    pub const DEFAULT_RNG_SEED: u64 = 0x5eed_ba77_1e00_0001;

    pub fn new() -> Self {
        Self {
            initiative_roll_min: Self::DEFAULT_ROLL_MIN,
            initiative_roll_max: Self::DEFAULT_ROLL_MAX,
            transition_cap: Self::DEFAULT_TRANSITION_CAP,
            yield_at_round_boundary: true,
            max_ai_actions_per_turn: Self::DEFAULT_MAX_AI_ACTIONS,
            primary_team: TeamSide::Attacker,
            rng_seed: Self::DEFAULT_RNG_SEED,
        }
    }

    #[must_use]
    pub fn with_roll_range(mut self, min: i32, max: i32) -> Self {
        self.initiative_roll_min = min.min(max);
        self.initiative_roll_max = max.max(min);
        self
    }

    #[must_use]
    pub fn with_transition_cap(mut self, cap: usize) -> Self {
        self.transition_cap = cap.max(1);
        self
    }

    #[must_use]
    pub fn with_round_yield(mut self, enabled: bool) -> Self {
        self.yield_at_round_boundary = enabled;
        self
    }

    #[must_use]
    pub fn with_max_ai_actions(mut self, max: u32) -> Self {
        self.max_ai_actions_per_turn = max;
        self
    }

    #[must_use]
    pub fn with_primary_team(mut self, team: TeamSide) -> Self {
        self.primary_team = team;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Inclusive roll range as a tuple.
    pub fn roll_range(&self) -> (i32, i32) {
        (self.initiative_roll_min, self.initiative_roll_max)
    }
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self::new()
    }
}
