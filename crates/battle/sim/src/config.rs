//! Simulation configuration loaded from the environment.
use std::env;

use battle_core::BattleConfig;

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub seed: u64,
    /// Combatants per team.
    pub roster_size: u32,
    /// Rounds to play before calling the battle a draw.
    pub max_rounds: u32,
    /// Ticks each presentation operation takes to finish.
    pub presentation_steps: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: BattleConfig::DEFAULT_RNG_SEED,
            roster_size: 3,
            max_rounds: 50,
            presentation_steps: 2,
        }
    }
}

impl SimConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `BATTLE_SEED` - Seed for stats and initiative rolls (default: fixed)
    /// - `BATTLE_ROSTER_SIZE` - Combatants per team, 1..=8 (default: 3)
    /// - `BATTLE_MAX_ROUNDS` - Round limit before a draw (default: 50)
    /// - `BATTLE_PRESENTATION_STEPS` - Ticks per animation, 0 disables (default: 2)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(seed) = read_env::<u64>("BATTLE_SEED") {
            config.seed = seed;
        }
        if let Some(size) = read_env::<u32>("BATTLE_ROSTER_SIZE") {
            config.roster_size = size.clamp(1, 8);
        }
        if let Some(rounds) = read_env::<u32>("BATTLE_MAX_ROUNDS") {
            config.max_rounds = rounds.max(1);
        }
        if let Some(steps) = read_env::<u32>("BATTLE_PRESENTATION_STEPS") {
            config.presentation_steps = steps;
        }

        config
    }

    pub fn battle_config(&self) -> BattleConfig {
        BattleConfig::new().with_seed(self.seed)
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
