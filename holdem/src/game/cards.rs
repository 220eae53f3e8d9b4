//! Card and deck primitives.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Spade, Suit::Diamond, Suit::Heart];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

/// Card values run deuce=2 through ace=14. The wheel straight treats the
/// ace as low; everywhere else it is high.
pub type Value = u8;

pub const VALUE_MIN: Value = 2;
pub const VALUE_ACE: Value = 14;

/// A card is a (value, suit) pair. Value types with structural equality.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl Card {
    pub fn value(&self) -> Value {
        self.0
    }

    pub fn suit(&self) -> Suit {
        self.1
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            14 => "A",
            13 => "K",
            12 => "Q",
            11 => "J",
            10 => "T",
            v => &v.to_string(),
        };
        write!(f, "{value}{}", self.1)
    }
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum DeckError {
    #[error("deck exhausted: wanted {wanted}, {remaining} left")]
    Exhausted { wanted: usize, remaining: usize },
}

/// One permutation of the 52-card universe with a pointer to the next
/// undealt index. Owned exclusively by its table and reset at hand start.
///
/// The randomness source is injected at construction: production decks draw
/// a seed from OS entropy, tests pass a fixed seed for reproducible deals.
/// `StdRng` is a cryptographically strong generator.
#[derive(Debug)]
pub struct Deck {
    cards: [Card; 52],
    next: usize,
    rng: StdRng,
}

impl Deck {
    /// A deck seeded from OS entropy. Use in production.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A deck with a fixed seed. Tests only; deals are fully deterministic.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut deck = Self {
            cards: Self::universe(),
            next: 0,
            rng,
        };
        deck.reset();
        deck
    }

    fn universe() -> [Card; 52] {
        let mut cards = [Card(VALUE_MIN, Suit::Club); 52];
        for (i, value) in (VALUE_MIN..=VALUE_ACE).enumerate() {
            for (j, suit) in Suit::ALL.into_iter().enumerate() {
                cards[4 * i + j] = Card(value, suit);
            }
        }
        cards
    }

    /// Reinitialise to the canonical sequence, then apply an in-place
    /// Fisher-Yates permutation and rewind the deal pointer.
    pub fn reset(&mut self) {
        self.cards = Self::universe();
        self.cards.shuffle(&mut self.rng);
        self.next = 0;
    }

    /// Deal the next `k` cards, advancing the pointer.
    pub fn deal(&mut self, k: usize) -> Result<Vec<Card>, DeckError> {
        if self.remaining() < k {
            return Err(DeckError::Exhausted {
                wanted: k,
                remaining: self.remaining(),
            });
        }
        let dealt = self.cards[self.next..self.next + k].to_vec();
        self.next += k;
        Ok(dealt)
    }

    /// Discard the next card face-down.
    pub fn burn(&mut self) -> Result<(), DeckError> {
        self.deal(1).map(|_| ())
    }

    pub fn remaining(&self) -> usize {
        52 - self.next
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}
