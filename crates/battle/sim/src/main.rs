//! Headless battle simulation.
//!
//! Composition root that wires an in-memory arena, a greedy AI and the battle
//! state machine, then plays a skirmish to the end while logging every
//! broadcast.
//!
//! ```bash
//! RUST_LOG=battle_core=debug BATTLE_SEED=7 cargo run -p battle-sim
//! ```
mod arena;
mod config;

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Result, bail};
use battle_core::{
    BattleEvent, PresentationBarrier, SubstatePolicy, TeamSide, Topic, TurnPhase,
    TurnStateMachine,
};
use tracing::{info, warn};

use arena::{Arena, SharedArena, battle_env};
use config::SimConfig;

/// Upper bound on driver calls per round before the run is considered stuck.
const MAX_STEPS_PER_ROUND: u32 = 10_000;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = SimConfig::from_env();
    info!(
        seed = config.seed,
        roster_size = config.roster_size,
        max_rounds = config.max_rounds,
        presentation_steps = config.presentation_steps,
        "starting battle simulation"
    );

    let barrier = PresentationBarrier::new();
    let arena = Arena::new(&config, barrier.clone()).shared();
    let mut machine = TurnStateMachine::builder(config.battle_config(), battle_env(&arena))
        .with_barrier(barrier)
        .build();

    let outcome = Rc::new(Cell::new(None));
    let sink = Rc::clone(&outcome);
    machine.subscribe(Topic::Battle, move |event| {
        if let BattleEvent::BattleEnded { winner } = event {
            sink.set(Some(*winner));
        }
    });

    run(&mut machine, &arena, &config)?;

    let arena = arena.borrow();
    match outcome.get() {
        Some(Some(winner)) => info!(
            %winner,
            rounds = machine.round(),
            survivors = arena.survivors(winner),
            "battle won"
        ),
        Some(None) => info!(rounds = machine.round(), "battle ended in mutual destruction"),
        None => warn!(
            rounds = machine.round(),
            attackers = arena.survivors(TeamSide::Attacker),
            defenders = arena.survivors(TeamSide::Defender),
            "round limit reached, calling a draw"
        ),
    }
    Ok(())
}

/// Drives the machine until the battle ends or the round limit is hit.
fn run(machine: &mut TurnStateMachine, arena: &SharedArena, config: &SimConfig) -> Result<()> {
    machine.start()?;
    let mut steps = 0;
    let mut round = machine.round();

    while !machine.is_finished() {
        if machine.round() > config.max_rounds {
            return Ok(());
        }
        if machine.round() != round {
            round = machine.round();
            steps = 0;
        }
        steps += 1;
        if steps > MAX_STEPS_PER_ROUND {
            bail!("round {round} made no progress in {MAX_STEPS_PER_ROUND} steps");
        }

        let fallen = arena.borrow_mut().take_fallen();
        for combatant in fallen {
            machine.combatant_died(combatant)?;
        }
        if machine.is_finished() {
            break;
        }

        match machine.policy() {
            SubstatePolicy::AwaitingPresentation | SubstatePolicy::ProcessingEnd => {
                arena.borrow_mut().step_presentation();
                machine.tick()?;
            }
            SubstatePolicy::AwaitingInput => {
                bail!(
                    "{:?} is waiting for player input in a headless battle",
                    machine.active_combatant()
                );
            }
            SubstatePolicy::Free => {
                machine.advance()?;
            }
        }
    }

    debug_assert_eq!(machine.phase(), TurnPhase::BattleEnd);
    Ok(())
}
