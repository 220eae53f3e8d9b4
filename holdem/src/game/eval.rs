//! Seven-card hand evaluation.
//!
//! [`evaluate_seven`] is a pure function: it sweeps all twenty-one 5-card
//! combinations of the input and keeps the best. The returned score is a
//! packed integer that totally orders hands; two hands score equal only on
//! a true split tie.

use super::cards::{Card, Value, VALUE_ACE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hand categories in ascending strength.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum HandCategory {
    HighCard,
    Pair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl HandCategory {
    /// Human label used in hand histories and the showdown broadcast.
    pub fn label(&self) -> &'static str {
        match self {
            Self::HighCard => "High Card",
            Self::Pair => "Pair",
            Self::TwoPair => "Two Pair",
            Self::ThreeOfAKind => "Three of a Kind",
            Self::Straight => "Straight",
            Self::Flush => "Flush",
            Self::FullHouse => "Full House",
            Self::FourOfAKind => "Four of a Kind",
            Self::StraightFlush => "Straight Flush",
            Self::RoyalFlush => "Royal Flush",
        }
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The result of ranking a hand: category, a score that totally orders any
/// two hands, and the five cards that realise it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandRank {
    pub category: HandCategory,
    pub score: u32,
    pub best_five: [Card; 5],
}

impl Ord for HandRank {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score.cmp(&other.score)
    }
}

impl PartialOrd for HandRank {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Pack the category ordinal above five 4-bit tie-break values (each a card
/// value <= 14, most significant first). Category dominates, then the
/// tie-break fields in order.
fn pack(category: HandCategory, tiebreak: &[Value]) -> u32 {
    debug_assert!(tiebreak.len() <= 5);
    let mut score = (category as u32) << 20;
    for (i, &v) in tiebreak.iter().enumerate() {
        score |= u32::from(v) << (16 - 4 * i);
    }
    score
}

/// Rank the best 5-card poker hand out of exactly seven cards.
///
/// # Panics
///
/// Panics if `cards.len() != 7`. The table state machine only ever calls
/// this with two hole cards plus the full board; anything else is a bug.
pub fn evaluate_seven(cards: &[Card]) -> HandRank {
    assert_eq!(cards.len(), 7, "hand evaluation requires exactly 7 cards");

    let n = cards.len();
    let mut best: Option<HandRank> = None;
    for a in 0..n - 4 {
        for b in a + 1..n - 3 {
            for c in b + 1..n - 2 {
                for d in c + 1..n - 1 {
                    for e in d + 1..n {
                        let five = [cards[a], cards[b], cards[c], cards[d], cards[e]];
                        let rank = evaluate_five(five);
                        if best.as_ref().map_or(true, |cur| rank.score > cur.score) {
                            best = Some(rank);
                        }
                    }
                }
            }
        }
    }
    best.expect("at least one 5-card combination exists")
}

/// Rank exactly five cards.
pub fn evaluate_five(cards: [Card; 5]) -> HandRank {
    let mut counts = [0u8; 15];
    for card in &cards {
        counts[card.value() as usize] += 1;
    }
    let is_flush = cards.iter().all(|c| c.suit() == cards[0].suit());
    let straight_high = straight_high(&counts);

    // Distinct values ordered by multiplicity, then by value, descending.
    let mut groups: Vec<(u8, Value)> = (2..=VALUE_ACE as usize)
        .rev()
        .filter(|&v| counts[v] > 0)
        .map(|v| (counts[v], v as Value))
        .collect();
    groups.sort_by(|a, b| b.cmp(a));
    let pattern: Vec<u8> = groups.iter().map(|(count, _)| *count).collect();

    let (category, tiebreak): (HandCategory, Vec<Value>) = if let (true, Some(high)) =
        (is_flush, straight_high)
    {
        if high == VALUE_ACE {
            (HandCategory::RoyalFlush, vec![])
        } else {
            (HandCategory::StraightFlush, vec![high])
        }
    } else if pattern == [4, 1] {
        (HandCategory::FourOfAKind, vec![groups[0].1, groups[1].1])
    } else if pattern == [3, 2] {
        (HandCategory::FullHouse, vec![groups[0].1, groups[1].1])
    } else if is_flush {
        let mut values: Vec<Value> = cards.iter().map(Card::value).collect();
        values.sort_unstable_by(|a, b| b.cmp(a));
        (HandCategory::Flush, values)
    } else if let Some(high) = straight_high {
        (HandCategory::Straight, vec![high])
    } else if pattern == [3, 1, 1] {
        (
            HandCategory::ThreeOfAKind,
            vec![groups[0].1, groups[1].1, groups[2].1],
        )
    } else if pattern == [2, 2, 1] {
        (
            HandCategory::TwoPair,
            vec![groups[0].1, groups[1].1, groups[2].1],
        )
    } else if pattern == [2, 1, 1, 1] {
        (
            HandCategory::Pair,
            vec![groups[0].1, groups[1].1, groups[2].1, groups[3].1],
        )
    } else {
        (
            HandCategory::HighCard,
            groups.iter().map(|(_, v)| *v).collect(),
        )
    };

    HandRank {
        category,
        score: pack(category, &tiebreak),
        best_five: cards,
    }
}

/// The high card of a straight formed by these value counts, if any. The
/// wheel A-2-3-4-5 is a straight whose high card is the five.
fn straight_high(counts: &[u8; 15]) -> Option<Value> {
    for high in (5..=VALUE_ACE as usize).rev() {
        let run = (high - 4..=high).all(|v| counts[v] > 0);
        if run {
            return Some(high as Value);
        }
    }
    // Wheel: the ace plays low.
    if counts[VALUE_ACE as usize] > 0 && (2..=5).all(|v| counts[v] > 0) {
        return Some(5);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::Suit::{Club, Diamond, Heart, Spade};

    fn seven(cards: [(Value, crate::game::cards::Suit); 7]) -> Vec<Card> {
        cards.into_iter().map(|(v, s)| Card(v, s)).collect()
    }

    #[test]
    fn test_royal_flush_detected() {
        let hand = seven([
            (14, Spade),
            (13, Spade),
            (12, Spade),
            (11, Spade),
            (10, Spade),
            (2, Heart),
            (3, Diamond),
        ]);
        let rank = evaluate_seven(&hand);
        assert_eq!(rank.category, HandCategory::RoyalFlush);
    }

    #[test]
    fn test_wheel_straight_is_five_high() {
        let wheel = seven([
            (14, Spade),
            (2, Heart),
            (3, Diamond),
            (4, Club),
            (5, Spade),
            (9, Heart),
            (12, Club),
        ]);
        let six_high = seven([
            (2, Heart),
            (3, Diamond),
            (4, Club),
            (5, Spade),
            (6, Spade),
            (9, Heart),
            (12, Club),
        ]);
        let wheel_rank = evaluate_seven(&wheel);
        let six_rank = evaluate_seven(&six_high);
        assert_eq!(wheel_rank.category, HandCategory::Straight);
        assert_eq!(six_rank.category, HandCategory::Straight);
        assert!(six_rank.score > wheel_rank.score, "6-high beats the wheel");
    }

    #[test]
    fn test_full_house_beats_flush() {
        let full_house = seven([
            (9, Spade),
            (9, Heart),
            (9, Diamond),
            (4, Club),
            (4, Spade),
            (2, Heart),
            (7, Club),
        ]);
        let flush = seven([
            (14, Spade),
            (12, Spade),
            (9, Spade),
            (6, Spade),
            (3, Spade),
            (2, Heart),
            (7, Club),
        ]);
        assert!(evaluate_seven(&full_house).score > evaluate_seven(&flush).score);
    }

    #[test]
    fn test_kickers_break_pair_ties() {
        let ace_kicker = seven([
            (8, Spade),
            (8, Heart),
            (14, Diamond),
            (10, Club),
            (6, Spade),
            (3, Heart),
            (2, Club),
        ]);
        let king_kicker = seven([
            (8, Diamond),
            (8, Club),
            (13, Diamond),
            (10, Heart),
            (6, Club),
            (3, Spade),
            (2, Diamond),
        ]);
        assert!(evaluate_seven(&ace_kicker).score > evaluate_seven(&king_kicker).score);
    }

    #[test]
    fn test_identical_boards_split() {
        // Board plays for both: broadway straight on the board.
        let board = [(10, Spade), (11, Heart), (12, Diamond), (13, Club), (14, Spade)];
        let mut p1: Vec<Card> = board.iter().map(|&(v, s)| Card(v, s)).collect();
        p1.extend([Card(2, Heart), Card(3, Club)]);
        let mut p2: Vec<Card> = board.iter().map(|&(v, s)| Card(v, s)).collect();
        p2.extend([Card(4, Diamond), Card(5, Spade)]);
        assert_eq!(evaluate_seven(&p1).score, evaluate_seven(&p2).score);
    }

    #[test]
    fn test_two_pair_uses_best_two() {
        let hand = seven([
            (9, Spade),
            (9, Heart),
            (5, Diamond),
            (5, Club),
            (3, Spade),
            (3, Heart),
            (14, Club),
        ]);
        let rank = evaluate_seven(&hand);
        assert_eq!(rank.category, HandCategory::TwoPair);
        // Nines and fives with the ace kicker; the threes play no part.
        assert_eq!(
            rank.score,
            pack(HandCategory::TwoPair, &[9, 5, 14])
        );
    }

    #[test]
    fn test_quads_with_kicker() {
        let hand = seven([
            (7, Spade),
            (7, Heart),
            (7, Diamond),
            (7, Club),
            (13, Spade),
            (2, Heart),
            (4, Club),
        ]);
        let rank = evaluate_seven(&hand);
        assert_eq!(rank.category, HandCategory::FourOfAKind);
        assert_eq!(rank.score, pack(HandCategory::FourOfAKind, &[7, 13]));
    }

    #[test]
    fn test_best_five_is_subset_of_input() {
        let hand = seven([
            (7, Spade),
            (8, Heart),
            (9, Diamond),
            (10, Club),
            (11, Spade),
            (2, Heart),
            (2, Club),
        ]);
        let rank = evaluate_seven(&hand);
        for card in rank.best_five {
            assert!(hand.contains(&card));
        }
        assert_eq!(rank.category, HandCategory::Straight);
    }

    #[test]
    #[should_panic(expected = "exactly 7 cards")]
    fn test_wrong_cardinality_panics() {
        evaluate_seven(&[Card(2, Club), Card(3, Club)]);
    }

    #[test]
    fn test_category_ordering_matches_scores() {
        let categories = [
            HandCategory::HighCard,
            HandCategory::Pair,
            HandCategory::TwoPair,
            HandCategory::ThreeOfAKind,
            HandCategory::Straight,
            HandCategory::Flush,
            HandCategory::FullHouse,
            HandCategory::FourOfAKind,
            HandCategory::StraightFlush,
            HandCategory::RoyalFlush,
        ];
        for pair in categories.windows(2) {
            assert!(pack(pair[1], &[]) > pack(pair[0], &[14, 14, 14, 14, 14]));
        }
    }
}
