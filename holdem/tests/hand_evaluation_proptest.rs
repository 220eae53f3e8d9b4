//! Property-based coverage of the hand evaluator across random 7-card
//! inputs.

use holdem::game::cards::{Card, Suit};
use holdem::game::eval::{evaluate_seven, HandCategory};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn card_strategy() -> impl Strategy<Value = Card> {
    (2u8..=14, 0u8..=3).prop_map(|(value, suit_idx)| {
        let suit = match suit_idx {
            0 => Suit::Club,
            1 => Suit::Spade,
            2 => Suit::Diamond,
            _ => Suit::Heart,
        };
        Card(value, suit)
    })
}

fn seven_unique_cards() -> impl Strategy<Value = Vec<Card>> {
    prop::collection::vec(card_strategy(), 7).prop_filter("cards must be unique", |cards| {
        let set: BTreeSet<_> = cards.iter().collect();
        set.len() == cards.len()
    })
}

proptest! {
    #[test]
    fn test_evaluation_is_deterministic(cards in seven_unique_cards()) {
        let a = evaluate_seven(&cards);
        let b = evaluate_seven(&cards);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn test_order_of_input_does_not_matter(cards in seven_unique_cards()) {
        let forward = evaluate_seven(&cards);
        let mut reversed = cards.clone();
        reversed.reverse();
        let backward = evaluate_seven(&reversed);
        prop_assert_eq!(forward.score, backward.score);
        prop_assert_eq!(forward.category, backward.category);
    }

    #[test]
    fn test_best_five_is_a_subset_of_the_input(cards in seven_unique_cards()) {
        let rank = evaluate_seven(&cards);
        for card in rank.best_five {
            prop_assert!(cards.contains(&card));
        }
        let distinct: BTreeSet<_> = rank.best_five.iter().collect();
        prop_assert_eq!(distinct.len(), 5, "witness holds five distinct cards");
    }

    #[test]
    fn test_score_respects_category_order(
        a in seven_unique_cards(),
        b in seven_unique_cards(),
    ) {
        let ra = evaluate_seven(&a);
        let rb = evaluate_seven(&b);
        if ra.category > rb.category {
            prop_assert!(ra.score > rb.score);
        }
        if ra.score == rb.score {
            prop_assert_eq!(ra.category, rb.category);
        }
    }

    #[test]
    fn test_seven_cards_always_rank_at_least_high_card(cards in seven_unique_cards()) {
        let rank = evaluate_seven(&cards);
        prop_assert!(rank.category >= HandCategory::HighCard);
        prop_assert!(rank.score > 0 || rank.category == HandCategory::HighCard);
    }
}
