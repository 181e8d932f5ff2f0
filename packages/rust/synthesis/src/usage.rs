//! Token accounting for a single enrichment run.
//!
//! The accumulator is constructed per run and handed to every worker as
//! `Arc<UsageAccumulator>` rather than living in a global, so parallel
//! runs and tests each count in isolation.

use std::sync::atomic::{AtomicU64, Ordering};

use dealboard_shared::{PricingEntry, TokenUsage};

/// Per-million-token USD rates `(input, output)` for models we commonly
/// run. Config `[[pricing]]` entries take precedence over this table.
const BUILT_IN_RATES: &[(&str, f64, f64)] = &[
    ("moonshotai/kimi-k2.5", 0.6, 2.5),
    ("anthropic/claude-sonnet-4.5", 3.0, 15.0),
    ("openai/gpt-4o-mini", 0.15, 0.6),
    ("google/gemini-2.5-flash", 0.3, 2.5),
    ("meta-llama/llama-3.1-70b-instruct", 0.3, 0.4),
];

/// Fallback rates for models absent from both tables.
const DEFAULT_RATES: (f64, f64) = (1.0, 3.0);

/// Thread-safe prompt/completion token counter with cost estimation.
#[derive(Debug, Default)]
pub struct UsageAccumulator {
    prompt: AtomicU64,
    completion: AtomicU64,
    pricing: Vec<PricingEntry>,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An accumulator with config-supplied pricing overrides.
    pub fn with_pricing(pricing: Vec<PricingEntry>) -> Self {
        Self {
            pricing,
            ..Self::default()
        }
    }

    /// Add one call's token counts.
    pub fn record(&self, usage: TokenUsage) {
        self.prompt.fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion
            .fetch_add(usage.completion_tokens, Ordering::Relaxed);
    }

    /// Totals recorded so far.
    pub fn snapshot(&self) -> TokenUsage {
        TokenUsage::new(
            self.prompt.load(Ordering::Relaxed),
            self.completion.load(Ordering::Relaxed),
        )
    }

    /// Zero the counters.
    pub fn reset(&self) {
        self.prompt.store(0, Ordering::Relaxed);
        self.completion.store(0, Ordering::Relaxed);
    }

    /// Estimated USD cost of the recorded usage under the given model's
    /// rates. An estimate only; providers bill from their own meters.
    pub fn estimated_cost(&self, model: &str) -> f64 {
        let (input_rate, output_rate) = self.rates_for(model);
        let usage = self.snapshot();
        (usage.prompt_tokens as f64 * input_rate + usage.completion_tokens as f64 * output_rate)
            / 1_000_000.0
    }

    fn rates_for(&self, model: &str) -> (f64, f64) {
        if let Some(entry) = self.pricing.iter().find(|e| e.model == model) {
            return (entry.input_per_million, entry.output_per_million);
        }
        BUILT_IN_RATES
            .iter()
            .find(|(name, _, _)| *name == model)
            .map(|(_, input, output)| (*input, *output))
            .unwrap_or(DEFAULT_RATES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_and_resets() {
        let acc = UsageAccumulator::new();
        acc.record(TokenUsage::new(300, 120));
        acc.record(TokenUsage::new(200, 80));

        let snap = acc.snapshot();
        assert_eq!(snap.prompt_tokens, 500);
        assert_eq!(snap.completion_tokens, 200);
        assert_eq!(snap.total(), 700);

        acc.reset();
        assert_eq!(acc.snapshot().total(), 0);
    }

    #[tokio::test]
    async fn concurrent_recording_sums_exactly() {
        use std::sync::Arc;

        let acc = Arc::new(UsageAccumulator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let acc = Arc::clone(&acc);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    acc.record(TokenUsage::new(7, 3));
                }
            }));
        }
        for handle in handles {
            handle.await.expect("task");
        }

        let snap = acc.snapshot();
        assert_eq!(snap.prompt_tokens, 5600);
        assert_eq!(snap.completion_tokens, 2400);
    }

    #[test]
    fn estimated_cost_uses_built_in_rates() {
        let acc = UsageAccumulator::new();
        acc.record(TokenUsage::new(1_000_000, 1_000_000));
        let cost = acc.estimated_cost("moonshotai/kimi-k2.5");
        assert!((cost - 3.1).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_falls_back_to_default_rates() {
        let acc = UsageAccumulator::new();
        acc.record(TokenUsage::new(1_000_000, 1_000_000));
        let cost = acc.estimated_cost("someone/brand-new-model");
        assert!((cost - 4.0).abs() < 1e-9);
    }

    #[test]
    fn config_pricing_overrides_built_in() {
        let acc = UsageAccumulator::with_pricing(vec![PricingEntry {
            model: "moonshotai/kimi-k2.5".into(),
            input_per_million: 2.0,
            output_per_million: 4.0,
        }]);
        acc.record(TokenUsage::new(1_000_000, 1_000_000));
        let cost = acc.estimated_cost("moonshotai/kimi-k2.5");
        assert!((cost - 6.0).abs() < 1e-9);
    }
}
