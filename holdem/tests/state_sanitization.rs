//! Sanitization and bookkeeping invariants under random play.
//!
//! Random action sequences run against the state machine; after every
//! accepted action the core invariants must hold for every viewer:
//! no deck, no foreign hole cards, conserved chips, monotone sequences.

use holdem::game::table::{Phase, PlayerAction, TableRules, TableState, TimerKind};
use holdem::game::view::{diff, snapshot_for, validate, HoleCardsView};
use holdem::game::Chips;
use holdem::{Deck, PlayerId};
use proptest::prelude::*;

fn pid(i: usize) -> PlayerId {
    PlayerId::from(&*format!("p{i}"))
}

fn dealt_table(seed: u64, stacks: &[Chips]) -> TableState {
    let mut table = TableState::new(1, TableRules::default(), Deck::seeded(seed));
    for (i, stack) in stacks.iter().enumerate() {
        table
            .seat(pid(i), format!("p{i}"), i, *stack)
            .expect("seating");
    }
    for i in 0..stacks.len() {
        table.ready(&pid(i)).expect("ready");
    }
    let timer = table.pending_timer().expect("countdown armed");
    table.timer_fired(TimerKind::Countdown, timer.generation);
    assert_eq!(table.phase(), Phase::PreFlop);
    table
}

fn random_action(choice: u8, amount: Chips) -> PlayerAction {
    match choice % 5 {
        0 => PlayerAction::Fold,
        1 => PlayerAction::Check,
        2 => PlayerAction::Call,
        3 => PlayerAction::Raise(amount),
        _ => PlayerAction::AllIn,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_invariants_hold_under_random_play(
        seed in 0u64..1000,
        plays in prop::collection::vec((0usize..3, 0u8..5, 1i64..400), 1..40),
    ) {
        let stacks = [1000, 1000, 1000];
        let mut table = dealt_table(seed, &stacks);
        let starting_total: Chips = stacks.iter().sum();
        let mut last_sequence = table.sequence();

        for (who, choice, amount) in plays {
            if !table.phase().is_betting() {
                break;
            }
            let player = pid(who);
            let accepted = table.act(&player, random_action(choice, amount)).is_ok();

            // Sequence counter moves only on accepted mutations and only
            // forwards.
            prop_assert!(table.sequence() >= last_sequence);
            if accepted {
                prop_assert!(table.sequence() > last_sequence);
            }
            last_sequence = table.sequence();

            // Chip conservation: stacks plus pooled wagers equal the
            // starting total while betting; stacks alone after payout.
            let stack_sum: Chips = table.seats().iter().flatten().map(|b| b.stack).sum();
            if table.phase().is_betting() {
                prop_assert_eq!(stack_sum + table.pot_total(), starting_total);
            } else {
                prop_assert_eq!(stack_sum, starting_total);
            }

            // Per-viewer sanitization, every viewer, every step.
            for i in 0..3 {
                let viewer = pid(i);
                let view = snapshot_for(&table, &viewer);
                prop_assert!(validate(&view, &viewer));
                if !view.phase.is_showdown() {
                    for p in &view.players {
                        if p.player != viewer {
                            prop_assert!(
                                !matches!(p.hole_cards, HoleCardsView::Shown(_)),
                                "foreign hole cards leaked to {viewer}"
                            );
                        }
                    }
                }
                let json = serde_json::to_value(&view).expect("serializable");
                prop_assert!(json.get("deck").is_none());
            }
        }
    }

    #[test]
    fn test_patches_replay_to_the_live_snapshot(
        seed in 0u64..1000,
        plays in prop::collection::vec((0usize..3, 0u8..5, 1i64..400), 1..25),
    ) {
        let mut table = dealt_table(seed, &[1000, 1000, 1000]);
        let viewer = pid(0);
        let mut mirror = snapshot_for(&table, &viewer);

        for (who, choice, amount) in plays {
            if !table.phase().is_betting() {
                break;
            }
            let _ = table.act(&pid(who), random_action(choice, amount));
            let fresh = snapshot_for(&table, &viewer);
            let patch = diff(&mirror, &fresh);
            patch.apply_to(&mut mirror);
            prop_assert_eq!(&mirror, &fresh, "patch stream reconstructs state");
        }
    }
}
