//! Composite scoring
//!
//! A score is a weighted sum of eight terms: session volume, the five window
//! deltas, open interest and absolute price change. Weights come from
//! configuration; [`Normalization`] decides whether terms are divided by
//! their maximum across the cycle first.

use super::ContractMetrics;
use crate::config::{Normalization, ScoreWeights, ScoringConfig};
use crate::error::ScoreError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const TERMS: usize = 8;

/// Cycle-wide term maxima used for relative normalization
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreContext {
    maxima: [Decimal; TERMS],
}

impl ScoreContext {
    pub fn from_metrics<'a>(metrics: impl IntoIterator<Item = &'a ContractMetrics>) -> Self {
        let mut maxima = [Decimal::ZERO; TERMS];
        for m in metrics {
            for (max, term) in maxima.iter_mut().zip(terms(m)) {
                if term > *max {
                    *max = term;
                }
            }
        }
        Self { maxima }
    }
}

/// Raw score terms in [`ScoreWeights::all`] order
fn terms(m: &ContractMetrics) -> [Decimal; TERMS] {
    let w = m.windows.as_array();
    [
        Decimal::from(m.volume),
        Decimal::from(w[0]),
        Decimal::from(w[1]),
        Decimal::from(w[2]),
        Decimal::from(w[3]),
        Decimal::from(w[4]),
        Decimal::from(m.open_interest),
        m.change.abs(),
    ]
}

/// Scores one contract and scales scores to confidence
pub trait Scorer: Send + Sync {
    fn score(&self, metrics: &ContractMetrics, ctx: &ScoreContext) -> Result<Decimal, ScoreError>;

    /// Scale `score` to 0..=100 given the best score of the cycle
    fn confidence(&self, score: Decimal, top_score: Decimal) -> Decimal;
}

/// Weighted sum of normalized or raw terms
#[derive(Debug, Clone)]
pub struct CompositeScorer {
    weights: ScoreWeights,
    normalization: Normalization,
}

impl CompositeScorer {
    pub fn new(weights: ScoreWeights, normalization: Normalization) -> Self {
        Self {
            weights,
            normalization,
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.weights.clone(), config.normalization)
    }

    /// Volume / OI / change blend, each term relative to the cycle maximum
    pub fn relative_blend() -> Self {
        Self::new(ScoreWeights::relative_blend(), Normalization::Relative)
    }

    /// Raw weighted sum of the five window deltas
    pub fn window_sum() -> Self {
        Self::new(ScoreWeights::window_sum(), Normalization::Raw)
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }
}

impl Default for CompositeScorer {
    fn default() -> Self {
        Self::relative_blend()
    }
}

impl Scorer for CompositeScorer {
    fn score(&self, metrics: &ContractMetrics, ctx: &ScoreContext) -> Result<Decimal, ScoreError> {
        let mut score = Decimal::ZERO;

        for ((weight, term), max) in self.weights.all().into_iter().zip(terms(metrics)).zip(ctx.maxima) {
            if weight.is_zero() {
                continue;
            }
            let term = match self.normalization {
                Normalization::Raw => term,
                Normalization::Relative if max.is_zero() => Decimal::ZERO,
                Normalization::Relative => term
                    .checked_div(max)
                    .ok_or(ScoreError::Overflow("normalized term"))?,
            };
            let weighted = weight
                .checked_mul(term)
                .ok_or(ScoreError::Overflow("weighted term"))?;
            score = score
                .checked_add(weighted)
                .ok_or(ScoreError::Overflow("score sum"))?;
        }

        Ok(score.round_dp(6))
    }

    fn confidence(&self, score: Decimal, top_score: Decimal) -> Decimal {
        let ceiling = match self.normalization {
            Normalization::Relative => self.weights.sum(),
            Normalization::Raw => top_score,
        };
        if ceiling <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        score
            .checked_div(ceiling)
            .and_then(|ratio| ratio.checked_mul(dec!(100)))
            .map(|c| c.round_dp(2).clamp(Decimal::ZERO, dec!(100)))
            .unwrap_or(Decimal::ZERO)
    }
}
