use std::collections::HashSet;

use battle_core::{
    BattleConfig, CombatantId, CombatantInfo, InitiativeScheduler, PcgRoller, QueueEntry, TeamSide,
};

fn roster(size: u32) -> Vec<CombatantInfo> {
    (0..size)
        .map(|i| {
            let team = if i % 2 == 0 {
                TeamSide::Attacker
            } else {
                TeamSide::Defender
            };
            // few distinct bases so ties are common
            CombatantInfo::new(CombatantId(i + 1), team, (i % 3) as i32 * 2)
        })
        .collect()
}

fn seeded(seed: u64) -> InitiativeScheduler {
    let config = BattleConfig::default().with_seed(seed);
    InitiativeScheduler::with_roller(&config, PcgRoller::new(seed))
}

fn assert_sorted(entries: &[QueueEntry], primary: TeamSide) {
    for pair in entries.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.initiative >= b.initiative, "{a:?} before {b:?}");
        if a.initiative == b.initiative {
            if a.team != b.team {
                assert_eq!(a.team, primary, "tie not broken by team: {a:?} {b:?}");
            } else {
                assert!(a.combatant < b.combatant, "tie not broken by id: {a:?} {b:?}");
            }
        }
    }
}

#[test]
fn every_combatant_acts_exactly_once_per_round() {
    for seed in 0..32 {
        for size in [0, 1, 2, 7, 16] {
            let mut scheduler = seeded(seed);
            scheduler.repopulate(&roster(size), TeamSide::Attacker);

            let mut seen = HashSet::new();
            while !scheduler.is_round_end() {
                scheduler.advance();
                let active = scheduler.active().expect("queue was not empty");
                assert!(seen.insert(active), "{active} acted twice");
            }
            scheduler.advance();
            assert!(scheduler.is_empty());
            assert_eq!(seen.len(), size as usize);
        }
    }
}

#[test]
fn queue_stays_sorted_through_waits_and_arrivals() {
    for seed in 0..32 {
        for primary in [TeamSide::Attacker, TeamSide::Defender] {
            let mut scheduler = seeded(seed);
            scheduler.repopulate(&roster(12), primary);
            assert_sorted(scheduler.entries(), primary);

            scheduler.advance();
            scheduler.wait();
            assert_sorted(scheduler.entries(), primary);

            scheduler.insert_unit(&CombatantInfo::new(CombatantId(99), TeamSide::Defender, 2));
            assert_sorted(scheduler.entries(), primary);

            scheduler.remove_unit(CombatantId(3));
            assert_sorted(scheduler.entries(), primary);
        }
    }
}

#[test]
fn wait_is_once_per_round() {
    let mut scheduler = seeded(5);
    let roster = roster(4);
    scheduler.repopulate(&roster, TeamSide::Attacker);
    scheduler.advance();
    let waiter = scheduler.active().unwrap();

    assert!(scheduler.can_wait());
    assert!(scheduler.wait());
    assert!(!scheduler.can_wait());

    // the waiter comes around again but may not wait a second time
    while scheduler.active() != Some(waiter) {
        scheduler.advance();
    }
    assert!(!scheduler.can_wait());
    assert!(!scheduler.wait());

    scheduler.repopulate(&roster, TeamSide::Attacker);
    scheduler.advance();
    assert!(scheduler.can_wait());
}

#[test]
fn removal_drops_every_occurrence() {
    let mut scheduler = seeded(9);
    scheduler.repopulate(&roster(3), TeamSide::Attacker);
    scheduler.advance();
    let waiter = scheduler.active().unwrap();
    scheduler.wait();

    assert!(scheduler.remove_unit(waiter));
    assert!(scheduler.active().is_none());
    assert!(!scheduler.remaining(None).contains(&waiter));
    assert_eq!(scheduler.initiative_of(waiter), None);
}

#[test]
fn remaining_respects_limit() {
    let mut scheduler = seeded(1);
    scheduler.repopulate(&roster(6), TeamSide::Attacker);
    assert_eq!(scheduler.remaining(Some(3)).len(), 3);
    assert_eq!(scheduler.remaining(Some(10)).len(), 6);
    assert_eq!(scheduler.remaining(None), scheduler.remaining(Some(6)));
}
