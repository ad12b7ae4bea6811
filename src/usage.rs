/// Token usage, cost estimation, and the formatting used for metadata lines.
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token counts reported by a model call.
///
/// `input_tokens` counts every prompt token including cache hits, but not
/// tokens written to the cache. Transports normalise to this shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
}

impl Usage {
    /// Prompt tokens billed at the plain input rate.
    #[must_use]
    pub fn uncached_input_tokens(&self) -> u64 {
        self.input_tokens.saturating_sub(self.cache_read_tokens)
    }
}

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
    #[serde(default)]
    pub cache_read: f64,
    #[serde(default)]
    pub cache_write: f64,
}

impl ModelRates {
    #[must_use]
    pub const fn new(input: f64, output: f64, cache_read: f64, cache_write: f64) -> Self {
        Self {
            input,
            output,
            cache_read,
            cache_write,
        }
    }

    /// Estimated cost in USD for one call.
    #[must_use]
    pub fn cost(&self, usage: &Usage) -> f64 {
        const PER: f64 = 1_000_000.0;
        usage.uncached_input_tokens() as f64 * self.input / PER
            + usage.output_tokens as f64 * self.output / PER
            + usage.cache_read_tokens as f64 * self.cache_read / PER
            + usage.cache_write_tokens as f64 * self.cache_write / PER
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no pricing known for model {0:?}; add it under \"pricing\" in the config")]
pub struct UnknownModelError(pub String);

/// Built-in rates. Keys match model ids by prefix, longest first.
const BUILTIN_RATES: &[(&str, ModelRates)] = &[
    ("claude-3-5-haiku", ModelRates::new(0.8, 4.0, 0.08, 1.0)),
    ("claude-3-5-sonnet", ModelRates::new(3.0, 15.0, 0.3, 3.75)),
    ("claude-3-7-sonnet", ModelRates::new(3.0, 15.0, 0.3, 3.75)),
    ("claude-3-haiku", ModelRates::new(0.25, 1.25, 0.03, 0.3)),
    ("claude-3-opus", ModelRates::new(15.0, 75.0, 1.5, 18.75)),
    ("claude-sonnet-4", ModelRates::new(3.0, 15.0, 0.3, 3.75)),
    ("claude-opus-4", ModelRates::new(15.0, 75.0, 1.5, 18.75)),
    ("gpt-4o-mini", ModelRates::new(0.15, 0.6, 0.075, 0.0)),
    ("gpt-4o", ModelRates::new(2.5, 10.0, 1.25, 0.0)),
    ("gpt-4.1-mini", ModelRates::new(0.4, 1.6, 0.1, 0.0)),
    ("gpt-4.1", ModelRates::new(2.0, 8.0, 0.5, 0.0)),
];

/// Per-model price table: the built-in rates plus any configured overrides.
#[derive(Debug, Clone)]
pub struct PriceTable {
    rates: HashMap<String, ModelRates>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            rates: BUILTIN_RATES
                .iter()
                .map(|(id, rates)| ((*id).to_string(), *rates))
                .collect(),
        }
    }
}

impl PriceTable {
    /// Built-in table with `overrides` layered on top.
    #[must_use]
    pub fn with_overrides(overrides: &HashMap<String, ModelRates>) -> Self {
        let mut table = Self::default();
        for (id, rates) in overrides {
            table.rates.insert(id.clone(), *rates);
        }
        table
    }

    /// Rates for `model`: an exact entry, else the longest entry that prefixes it
    /// (so dated ids like `claude-3-5-sonnet-20241022` resolve).
    pub fn rates(&self, model: &str) -> Result<ModelRates, UnknownModelError> {
        if let Some(rates) = self.rates.get(model) {
            return Ok(*rates);
        }
        self.rates
            .iter()
            .filter(|(id, _)| model.starts_with(id.as_str()))
            .max_by_key(|(id, _)| id.len())
            .map(|(_, rates)| *rates)
            .ok_or_else(|| UnknownModelError(model.to_string()))
    }

    pub fn cost(&self, model: &str, usage: &Usage) -> Result<f64, UnknownModelError> {
        Ok(self.rates(model)?.cost(usage))
    }
}

/// Everything known about one finished model call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallReport {
    pub model: String,
    pub usage: Usage,
    pub elapsed: Duration,
    pub cost: f64,
}

impl fmt::Display for CallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} · {} · {} · {} in / {} out / {} cache read / {} cache write",
            self.model,
            format_cost(self.cost),
            format_elapsed(self.elapsed),
            format_count(self.usage.input_tokens),
            format_count(self.usage.output_tokens),
            format_count(self.usage.cache_read_tokens),
            format_count(self.usage.cache_write_tokens),
        )
    }
}

// ── Formatting ───────────────────────────────────────────────────────

/// `$0.0047`-style cost: four decimals under a dollar, two above.
#[must_use]
pub fn format_cost(usd: f64) -> String {
    if usd < 1.0 {
        format!("${usd:.4}")
    } else {
        format!("${usd:.2}")
    }
}

/// Seconds with one decimal, or milliseconds for sub-second calls.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Integer with thousands separators.
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
