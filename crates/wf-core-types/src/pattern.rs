//! [`LearnedPattern`] — per-(domain, target-keywords) learning (spec §3, §4.3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::locator::LocatorStrategy;

/// Per-domain map from the full lowercased target string to the exact
/// selector that last worked for it (spec §3 `ExactMatchCache`).
pub type ExactMatchCache = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedPattern {
    /// Stopword-filtered target keywords, e.g. `["login", "button"]`.
    pub keywords: Vec<String>,
    pub strategy: LocatorStrategy,
    pub success_count: u32,
    pub failure_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<chrono::DateTime<chrono::Utc>>,
}

impl LearnedPattern {
    pub fn new(keywords: Vec<String>, strategy: LocatorStrategy) -> Self {
        Self {
            keywords,
            strategy,
            success_count: 1,
            failure_count: 0,
            last_success: Some(chrono::Utc::now()),
        }
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.5
        } else {
            f64::from(self.success_count) / f64::from(total)
        }
    }

    /// `0.7 * successRate + 0.3 * min(successCount/10, 1)` (spec §3).
    pub fn confidence(&self) -> f64 {
        let rate = self.success_rate();
        let count_factor = (f64::from(self.success_count) / 10.0).min(1.0);
        rate * 0.7 + count_factor * 0.3
    }

    pub fn overlaps(&self, other_keywords: &[String]) -> bool {
        other_keywords.iter().any(|k| self.keywords.contains(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_blends_rate_and_count() {
        let mut pattern = LearnedPattern::new(vec!["login".into()], LocatorStrategy::Testid);
        pattern.success_count = 10;
        pattern.failure_count = 0;
        assert!((pattern.confidence() - 1.0).abs() < 1e-9);

        let mut low = LearnedPattern::new(vec!["login".into()], LocatorStrategy::Testid);
        low.success_count = 1;
        low.failure_count = 1;
        // rate 0.5 * 0.7 + count_factor(0.1) * 0.3 = 0.35 + 0.03 = 0.38
        assert!((low.confidence() - 0.38).abs() < 1e-9);
    }

    #[test]
    fn equal_success_rate_prefers_more_absolute_successes() {
        let mut a = LearnedPattern::new(vec!["go".into()], LocatorStrategy::Css);
        a.success_count = 8;
        a.failure_count = 8;
        let mut b = LearnedPattern::new(vec!["go".into()], LocatorStrategy::Role);
        b.success_count = 2;
        b.failure_count = 2;
        assert!((a.success_rate() - b.success_rate()).abs() < 1e-9);
        assert!(a.confidence() > b.confidence());
    }
}
