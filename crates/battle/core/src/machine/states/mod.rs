mod actions;
mod lifecycle;

pub use actions::ActionsProcessing;
pub use lifecycle::{BattleEnd, BattleInitialization, RoundEnd, RoundStart, TurnEnd, TurnStart};

use super::TurnState;

/// The seven built-in states, one per phase.
pub fn default_states() -> Vec<Box<dyn TurnState>> {
    vec![
        Box::new(BattleInitialization),
        Box::new(RoundStart),
        Box::new(TurnStart),
        Box::new(ActionsProcessing::new()),
        Box::new(TurnEnd),
        Box::new(RoundEnd),
        Box::new(BattleEnd),
    ]
}
