//! Token and cost estimation for remote generation, plus the local soft
//! budget that gates it.
//!
//! Everything here is a heuristic computed on the client. It never reflects
//! what the completion service actually bills; the provider's dashboard is
//! the authority.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunker::collapse_whitespace;
use crate::error::{QuizError, Result};

/// Rough characters-per-token ratio for English prose.
pub const CHARS_PER_TOKEN: usize = 4;

/// Output tokens budgeted for one generated question.
pub const OUTPUT_TOKENS_PER_QUESTION: u64 = 120;

/// Per-1000-token prices for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_usd_per_1k: f64,
    pub output_usd_per_1k: f64,
}

/// gpt-4o-mini list prices: $0.15 / 1M input, $0.60 / 1M output.
pub const PRICING_4O_MINI: ModelPricing = ModelPricing {
    input_usd_per_1k: 0.00015,
    output_usd_per_1k: 0.00060,
};

impl Default for ModelPricing {
    fn default() -> Self {
        PRICING_4O_MINI
    }
}

/// Estimated size and price of one prospective remote call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub usd: f64,
}

/// Approximate input tokens: one per four characters of normalized text,
/// never less than one.
pub fn estimate_tokens_from_text(text: &str) -> u64 {
    let chars = collapse_whitespace(text).chars().count();
    chars.div_ceil(CHARS_PER_TOKEN).max(1) as u64
}

/// Price a call from its token counts, rounded to six decimal places.
pub fn estimate_usd(tokens_in: u64, tokens_out: u64, pricing: &ModelPricing) -> f64 {
    let in_cost = tokens_in as f64 / 1000.0 * pricing.input_usd_per_1k;
    let out_cost = tokens_out as f64 / 1000.0 * pricing.output_usd_per_1k;
    round6(in_cost + out_cost)
}

/// Estimate a remote generation of `requested_count` questions from
/// `input_text`.
pub fn estimate(input_text: &str, requested_count: usize, pricing: &ModelPricing) -> CostEstimate {
    let input_tokens = estimate_tokens_from_text(input_text);
    let output_tokens = OUTPUT_TOKENS_PER_QUESTION * requested_count as u64;
    CostEstimate {
        input_tokens,
        output_tokens,
        usd: estimate_usd(input_tokens, output_tokens, pricing),
    }
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

/// Anything negative, NaN or infinite collapses to zero.
fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// The user's soft spending cap and what has been spent against it.
///
/// Both values stay non-negative. `spent_usd` only grows, except through
/// [`BudgetState::reset_spent`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetState {
    budget_usd: f64,
    spent_usd: f64,
}

impl BudgetState {
    pub fn new(budget_usd: f64, spent_usd: f64) -> Self {
        Self {
            budget_usd: non_negative(budget_usd),
            spent_usd: round6(non_negative(spent_usd)),
        }
    }

    pub fn budget_usd(&self) -> f64 {
        self.budget_usd
    }

    pub fn spent_usd(&self) -> f64 {
        self.spent_usd
    }

    pub fn remaining_usd(&self) -> f64 {
        (self.budget_usd - self.spent_usd).max(0.0)
    }

    pub fn set_budget(&mut self, budget_usd: f64) {
        self.budget_usd = non_negative(budget_usd);
    }

    /// Adds the cost of an executed call. Negative deltas are ignored.
    pub fn record_spend(&mut self, delta_usd: f64) {
        self.spent_usd = round6(self.spent_usd + non_negative(delta_usd));
        info!(
            "Recorded ${:.6} of estimated spend (total ${:.6} of ${:.6})",
            delta_usd, self.spent_usd, self.budget_usd
        );
    }

    pub fn reset_spent(&mut self) {
        self.spent_usd = 0.0;
    }

    pub fn would_exceed(&self, estimate: &CostEstimate) -> bool {
        self.spent_usd + estimate.usd > self.budget_usd
    }

    /// Rejects a prospective call whose estimate would push spend past the
    /// budget.
    pub fn check(&self, estimate: &CostEstimate) -> Result<()> {
        if self.would_exceed(estimate) {
            warn!(
                "Budget gate rejected call: ${:.6} + ${:.6} > ${:.6}",
                self.spent_usd, estimate.usd, self.budget_usd
            );
            return Err(QuizError::BudgetExceeded {
                estimated_usd: estimate.usd,
                spent_usd: self.spent_usd,
                budget_usd: self.budget_usd,
            });
        }
        Ok(())
    }
}
