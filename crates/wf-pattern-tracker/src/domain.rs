//! [`DomainKnowledge`] — accumulated pattern learning for one domain.
//! Transcribed from `original_source/engine/selector_pattern_tracker.py`'s
//! `DomainKnowledge`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use wf_core_types::{ExactMatchCache, LearnedPattern, LocatorStrategy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainKnowledge {
    pub domain: String,
    pub patterns: Vec<LearnedPattern>,
    pub exact_matches: ExactMatchCache,
    pub type_success_counts: HashMap<LocatorStrategy, u32>,
    pub type_failure_counts: HashMap<LocatorStrategy, u32>,
    #[serde(default)]
    pub first_seen: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
    pub total_resolutions: u32,
}

impl DomainKnowledge {
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into(), first_seen: Some(chrono::Utc::now()), ..Default::default() }
    }

    /// Locator strategies ordered by observed success rate, best first.
    pub fn best_types(&self) -> Vec<LocatorStrategy> {
        let mut scored: Vec<(LocatorStrategy, f64)> = LocatorStrategy::all()
            .into_iter()
            .filter_map(|strategy| {
                let successes = *self.type_success_counts.get(&strategy).unwrap_or(&0);
                let failures = *self.type_failure_counts.get(&strategy).unwrap_or(&0);
                let total = successes + failures;
                if total == 0 {
                    None
                } else {
                    Some((strategy, f64::from(successes) / f64::from(total)))
                }
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored.into_iter().map(|(strategy, _)| strategy).collect()
    }

    pub fn update_pattern(&mut self, keywords: &[String], strategy: LocatorStrategy) {
        if keywords.is_empty() {
            return;
        }
        for pattern in &mut self.patterns {
            if pattern.strategy == strategy && pattern.overlaps(keywords) {
                pattern.success_count += 1;
                pattern.last_success = Some(chrono::Utc::now());
                for keyword in keywords {
                    if !pattern.keywords.contains(keyword) {
                        pattern.keywords.push(keyword.clone());
                    }
                }
                return;
            }
        }
        self.patterns.push(LearnedPattern::new(keywords.to_vec(), strategy));
    }

    pub fn record_pattern_failure(&mut self, keywords: &[String], strategy: LocatorStrategy) {
        for pattern in &mut self.patterns {
            if pattern.strategy == strategy && pattern.overlaps(keywords) {
                pattern.failure_count += 1;
            }
        }
    }
}
