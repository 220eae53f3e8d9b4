//! Pot accounting: per-hand contributions, side-pot partition and ranked
//! distribution with a deterministic odd-chip rule.

use super::{Chips, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One pot: its chip amount and the players who can win it. The main pot
/// comes first in any pot list.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pot {
    pub amount: Chips,
    pub eligible: Vec<PlayerId>,
}

/// Accumulates every player's total committed chips across the current
/// hand (not per street) and partitions them at showdown.
#[derive(Clone, Debug, Default)]
pub struct PotManager {
    contributions: BTreeMap<PlayerId, Chips>,
}

impl PotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, player: &PlayerId, amount: Chips) {
        debug_assert!(amount >= 0, "contributions only grow");
        *self.contributions.entry(player.clone()).or_default() += amount;
    }

    pub fn total(&self) -> Chips {
        self.contributions.values().sum()
    }

    pub fn contribution(&self, player: &PlayerId) -> Chips {
        self.contributions.get(player).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.contributions.clear();
    }

    /// Partition the pooled chips into main and side pots.
    ///
    /// Levels are the distinct contribution totals of the still-in players.
    /// Every contributor (folded or not) funds `level - previous` for each
    /// level they reach; eligibility at a level is exactly the still-in
    /// players at or above it. A folded player's chips beyond the levels
    /// they fully fund join the main pot with no eligibility.
    ///
    /// The sum of the returned pot amounts always equals `total()`.
    pub fn pots(&self, still_in: &[PlayerId]) -> Vec<Pot> {
        let live: HashSet<&PlayerId> = still_in.iter().collect();
        let mut levels: Vec<Chips> = self
            .contributions
            .iter()
            .filter(|(player, amount)| live.contains(player) && **amount > 0)
            .map(|(_, amount)| *amount)
            .collect();
        levels.sort_unstable();
        levels.dedup();

        if levels.is_empty() {
            // Nobody live has chips in: everything pools into one dead pot.
            let total = self.total();
            if total == 0 {
                return Vec::new();
            }
            return vec![Pot {
                amount: total,
                eligible: still_in.to_vec(),
            }];
        }

        let mut pots: Vec<Pot> = Vec::with_capacity(levels.len());
        let mut previous = 0;
        for &level in &levels {
            let slice = level - previous;
            let mut amount = 0;
            for &contribution in self.contributions.values() {
                if contribution >= level {
                    amount += slice;
                }
            }
            let eligible: Vec<PlayerId> = still_in
                .iter()
                .filter(|p| self.contribution(p) >= level)
                .cloned()
                .collect();
            pots.push(Pot { amount, eligible });
            previous = level;
        }

        // Folded leftovers: the part of each contribution not consumed by
        // a full level above.
        let mut leftover = 0;
        for (player, &contribution) in &self.contributions {
            if live.contains(player) {
                continue;
            }
            let covered = levels
                .iter()
                .rev()
                .find(|&&l| l <= contribution)
                .copied()
                .unwrap_or(0);
            leftover += contribution - covered;
        }
        pots[0].amount += leftover;

        debug_assert_eq!(pots.iter().map(|p| p.amount).sum::<Chips>(), self.total());
        pots
    }

    /// Pay each pot to its best-scoring eligible players. Ties split the
    /// pot to the chip; a remainder of R chips is awarded one per winner
    /// walking `odd_chip_order`, which callers build starting from the
    /// first seat clockwise of the dealer. Never random.
    pub fn distribute(
        pots: &[Pot],
        scores: &HashMap<PlayerId, u32>,
        odd_chip_order: &[PlayerId],
    ) -> BTreeMap<PlayerId, Chips> {
        let mut payouts: BTreeMap<PlayerId, Chips> = BTreeMap::new();
        for pot in pots {
            let top = pot
                .eligible
                .iter()
                .filter_map(|p| scores.get(p))
                .max()
                .copied();
            let Some(top) = top else {
                debug_assert!(pot.amount == 0, "pot with chips but no ranked player");
                continue;
            };
            let winners: HashSet<&PlayerId> = pot
                .eligible
                .iter()
                .filter(|p| scores.get(*p) == Some(&top))
                .collect();

            let share = pot.amount / winners.len() as Chips;
            let mut remainder = pot.amount % winners.len() as Chips;
            for winner in &winners {
                *payouts.entry((*winner).clone()).or_default() += share;
            }
            for player in odd_chip_order {
                if remainder == 0 {
                    break;
                }
                if winners.contains(player) {
                    *payouts.entry(player.clone()).or_default() += 1;
                    remainder -= 1;
                }
            }
            debug_assert_eq!(remainder, 0, "odd chips must land on winners");
        }
        payouts
    }
}
