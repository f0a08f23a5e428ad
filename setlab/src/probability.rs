//! Analytic model for the probability that a table contains at least one SET.
//!
//! The model starts from the exact value for three cards and adds one card at a
//! time: if the previous `n - 1` cards held no SET, the new card completes one with
//! some of the `C(n - 1, 2)` pairs with probability `p(3)` each. This is an
//! approximation that is only meant as a reference curve for simulated data.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Probability that three random cards form a SET.
pub const THREE_CARD_PROBABILITY: f64 = 1.0 / 79.0;

/// Invalid arguments for the probability model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The card count is negative
    #[error("n must be a non-negative integer, got {0}")]
    Negative(i64),
    /// The card count is not a whole number
    #[error("n must be an integer, got {0}")]
    NotAnInteger(String),
}

/// A validated, non-negative number of cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CardCount(usize);

impl CardCount {
    /// Wraps a card count that is already known to be valid.
    pub fn new(cards: usize) -> Self {
        Self(cards)
    }

    /// Returns the number of cards.
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for CardCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<i64> for CardCount {
    type Error = ModelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .map(Self)
            .map_err(|_| ModelError::Negative(value))
    }
}

impl TryFrom<f64> for CardCount {
    type Error = ModelError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(ModelError::NotAnInteger(value.to_string()));
        }
        if value < 0.0 {
            return Err(ModelError::Negative(value as i64));
        }

        Ok(Self(value as usize))
    }
}

impl FromStr for CardCount {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<i64>() {
            Ok(value) => Self::try_from(value),
            Err(_) => match trimmed.parse::<f64>() {
                Ok(value) => Self::try_from(value),
                Err(_) => Err(ModelError::NotAnInteger(trimmed.to_owned())),
            },
        }
    }
}

/// Binomial coefficient `C(n, k)` as a float.
pub(crate) fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Memoized evaluation of the recursive model.
///
/// Values are computed bottom-up and kept, so asking for `p(n)` costs
/// `O(n)` the first time and `O(1)` afterwards.
#[derive(Debug, Clone)]
pub struct SetProbabilityModel {
    cache: Vec<f64>,
}

impl Default for SetProbabilityModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SetProbabilityModel {
    /// Create a model with the base cases already filled in.
    pub fn new() -> Self {
        Self {
            cache: vec![0.0, 0.0, 0.0, THREE_CARD_PROBABILITY],
        }
    }

    /// Probability of at least one SET among `cards` cards.
    pub fn probability(&mut self, cards: CardCount) -> f64 {
        let n = cards.get();

        while self.cache.len() <= n {
            let next = self.cache.len();
            let previous = self.cache[next - 1];
            // Once certain, the model stays certain for every larger table.
            if previous >= 1.0 {
                return 1.0;
            }
            // The per-card term is itself a probability.
            let completes = (THREE_CARD_PROBABILITY * binomial(next - 1, 2)).min(1.0);
            self.cache
                .push((completes * (1.0 - previous) + previous).min(1.0));
        }

        self.cache[n]
    }

    /// Smallest number of cards for which the model predicts a SET with certainty.
    pub fn saturation(&mut self) -> usize {
        loop {
            let last = self.cache.len() - 1;
            if self.cache[last] >= 1.0 {
                return last;
            }
            self.probability(CardCount::new(last + 1));
        }
    }

    /// Probabilities for all card counts `1..=max_cards`.
    pub fn curve(&mut self, max_cards: usize) -> Vec<f64> {
        (1..=max_cards)
            .map(|n| self.probability(CardCount::new(n)))
            .collect()
    }
}

/// Checked entry point: `p(n)` for any integer, rejecting negative input.
pub fn p(n: i64) -> Result<f64, ModelError> {
    let cards = CardCount::try_from(n)?;
    Ok(SetProbabilityModel::new().probability(cards))
}
