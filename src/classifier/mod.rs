//! Variant classifier
//!
//! The storefront lists single chapters, split volumes and serialized
//! editions next to complete volumes. This module scores a record from its
//! title and price and rejects the likely variants. It is a heuristic: some
//! variants carry no marker in their title and will slip through.

mod price;

pub use price::parse_price;

use crate::config::{ClassifierConfig, PriceTier};
use crate::record::Record;
use crate::ConfigError;
use regex::Regex;

/// Scores records and decides whether they are unwanted variants
///
/// Built once from configuration; scoring is a pure function of the title
/// and price.
#[derive(Debug, Clone)]
pub struct Classifier {
    patterns: Vec<Regex>,
    pattern_score: i32,
    price_tiers: Vec<PriceTier>,
    currency_suffix: String,
    bundle_markers: Vec<String>,
    bundle_penalty: i32,
    threshold: i32,
}

impl Classifier {
    /// Compiles the configured patterns
    ///
    /// # Returns
    ///
    /// * `Ok(Classifier)` - All patterns compiled
    /// * `Err(ConfigError::InvalidPattern)` - A pattern is not a valid regex
    pub fn new(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        let patterns = config
            .patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            pattern_score: config.pattern_score,
            price_tiers: config.price_tiers.clone(),
            currency_suffix: config.currency_suffix.clone(),
            bundle_markers: config.bundle_markers.clone(),
            bundle_penalty: config.bundle_penalty,
            threshold: config.threshold,
        })
    }

    /// Computes the variant score of a title and price
    ///
    /// | Signal                             | Points               |
    /// |------------------------------------|----------------------|
    /// | each matching title pattern        | + pattern score      |
    /// | each price tier at or above price  | + tier score         |
    /// | any bundle marker in the title     | − bundle penalty     |
    pub fn score(&self, title: &str, price: &str) -> i32 {
        if title.is_empty() {
            return 0;
        }

        let mut score: i32 = self
            .patterns
            .iter()
            .filter(|p| p.is_match(title))
            .map(|_| self.pattern_score)
            .sum();

        if let Some(price) = parse_price(price, &self.currency_suffix) {
            score += self
                .price_tiers
                .iter()
                .filter(|tier| price <= tier.max_price)
                .map(|tier| tier.score)
                .sum::<i32>();
        }

        if self.bundle_markers.iter().any(|m| title.contains(m.as_str())) {
            score -= self.bundle_penalty;
        }

        score
    }

    /// True when the record should be dropped from the harvest
    ///
    /// Records without a title are always kept.
    pub fn is_excluded_variant(&self, record: &Record) -> bool {
        if record.title.is_empty() {
            return false;
        }
        self.score(&record.title, &record.price) >= self.threshold
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }
}
