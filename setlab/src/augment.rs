//! Rebalancing of labeled tables before training.
//!
//! Most random tables contain either no SET or many, so the dataset is
//! reshaped: tables without a SET are thinned out, tables with exactly one SET
//! are multiplied by reordering their cards (the SET property does not depend
//! on card order) and all other tables are kept unchanged.

use itertools::Itertools;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::tables::{LabeledTables, Table};

/// Every `ZERO_SET_STRIDE`-th table without SETs is kept.
pub const ZERO_SET_STRIDE: usize = 10;

/// How tables with exactly one SET are expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermutationPolicy {
    /// All `k!` orderings of the cards, in lexicographic order of the row indices.
    #[default]
    All,
    /// A fixed number of random orderings drawn from a seeded generator.
    Random {
        /// Orderings drawn per table
        samples: usize,
        /// Seed of the generator
        seed: u64,
    },
}

/// Counters describing one augmentation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AugmentSummary {
    /// Tables without SETs in the input
    pub zero_seen: usize,
    /// Tables without SETs that were kept
    pub zero_kept: usize,
    /// Tables with exactly one SET in the input
    pub single_seen: usize,
    /// Examples generated from single-SET tables
    pub single_emitted: usize,
    /// Tables with more than one SET
    pub multiple: usize,
}

/// Apply the rebalancing to `input`.
pub fn augment(
    input: &LabeledTables,
    policy: PermutationPolicy,
) -> (LabeledTables, AugmentSummary) {
    let mut output = LabeledTables {
        num_cards: input.num_cards,
        num_attributes: input.num_attributes,
        ..Default::default()
    };
    let mut summary = AugmentSummary::default();
    let mut rng = match policy {
        PermutationPolicy::Random { seed, .. } => Some(StdRng::seed_from_u64(seed)),
        PermutationPolicy::All => None,
    };

    if input.num_cards > 8 && policy == PermutationPolicy::All {
        log::warn!(
            "Generating all permutations of {} cards per single-SET table",
            input.num_cards
        );
    }

    for (table, count) in input.iter() {
        match count {
            0 => {
                if summary.zero_seen % ZERO_SET_STRIDE == 0 {
                    output.tables.push(table.clone());
                    output.set_counts.push(0);
                    summary.zero_kept += 1;
                }
                summary.zero_seen += 1;
            }
            1 => {
                let before = output.tables.len();
                match (policy, rng.as_mut()) {
                    (PermutationPolicy::Random { samples, .. }, Some(rng)) => {
                        let mut order: Vec<usize> = (0..table.num_cards()).collect();
                        for _ in 0..samples {
                            order.shuffle(&mut *rng);
                            output.tables.push(table.permuted(&order));
                        }
                    }
                    _ => output.tables.extend(all_orderings(table)),
                }
                let emitted = output.tables.len() - before;
                output.set_counts.extend(std::iter::repeat(1).take(emitted));
                summary.single_seen += 1;
                summary.single_emitted += emitted;
            }
            _ => {
                output.tables.push(table.clone());
                output.set_counts.push(count);
                summary.multiple += 1;
            }
        }
    }

    log::info!(
        "Processed {} tables of {} cards with {} attributes into {} examples",
        input.len(),
        input.num_cards,
        input.num_attributes,
        output.len()
    );
    log::debug!("{summary:?}");

    (output, summary)
}

/// Orderings of a single table, as produced by [PermutationPolicy::All].
pub fn all_orderings(table: &Table) -> impl Iterator<Item = Table> + '_ {
    let cards = table.num_cards();
    (0..cards)
        .permutations(cards)
        .map(move |order| table.permuted(&order))
}
