//! Learned per-domain selector patterns (spec §4.3).
//!
//! Grounded on `original_source/engine/selector_pattern_tracker.py`'s
//! `SelectorPatternTracker`: record successes/failures per (domain, target
//! keywords, strategy), suggest ranked strategies for a new target, cache
//! exact matches, and batch-flush to disk every 5 successes.

mod domain;
mod keywords;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use wf_core_types::LocatorStrategy;

pub use domain::DomainKnowledge;
pub use keywords::extract_keywords;
use store::PatternStore;

pub struct PatternTracker {
    knowledge: RwLock<PatternStore>,
    cache_path: Option<PathBuf>,
}

impl PatternTracker {
    pub fn new(cache_path: Option<PathBuf>) -> Self {
        let store = cache_path.as_ref().map(|path| PatternStore::load(path)).unwrap_or_default();
        Self { knowledge: RwLock::new(store), cache_path }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn record_success(&self, domain: &str, target: &str, strategy: LocatorStrategy, selector: &str) {
        let keywords = extract_keywords(target);
        let should_flush = {
            let mut guard = self.knowledge.write();
            let knowledge = guard.get_or_create(domain);
            knowledge.exact_matches.insert(target.to_lowercase().trim().to_string(), selector.to_string());
            *knowledge.type_success_counts.entry(strategy).or_insert(0) += 1;
            knowledge.update_pattern(&keywords, strategy);
            knowledge.last_updated = Some(chrono::Utc::now());
            knowledge.total_resolutions += 1;
            knowledge.total_resolutions % 5 == 0
        };
        if should_flush {
            self.flush();
        }
    }

    pub fn record_failure(&self, domain: &str, target: &str, strategy: LocatorStrategy) {
        let keywords = extract_keywords(target);
        let mut guard = self.knowledge.write();
        let knowledge = guard.get_or_create(domain);
        *knowledge.type_failure_counts.entry(strategy).or_insert(0) += 1;
        knowledge.record_pattern_failure(&keywords, strategy);
    }

    /// Cached exact-match selector for this target string, if any
    /// (spec §4.3 "exact match short-circuits the resolver").
    pub fn exact_match(&self, domain: &str, target: &str) -> Option<String> {
        let guard = self.knowledge.read();
        let knowledge = guard.get(domain)?;
        knowledge.exact_matches.get(target.to_lowercase().trim()).cloned()
    }

    /// Ranked `(strategy, confidence)` suggestions for a new target:
    /// exact-match cache first (confidence 1.0), then pattern matches, then
    /// domain-wide stats, deduplicated keeping the highest confidence per
    /// strategy (spec §4.3).
    pub fn suggest(&self, domain: &str, target: &str) -> Vec<(LocatorStrategy, f64)> {
        let guard = self.knowledge.read();
        let Some(knowledge) = guard.get(domain) else { return Vec::new() };

        let keywords = extract_keywords(target);
        let mut suggestions: Vec<(LocatorStrategy, f64)> = Vec::new();

        if let Some(cached_selector) = knowledge.exact_matches.get(target.to_lowercase().trim()) {
            suggestions.push((LocatorStrategy::infer_from_selector(cached_selector), 1.0));
        }

        for pattern in &knowledge.patterns {
            if pattern.overlaps(&keywords) {
                suggestions.push((pattern.strategy, pattern.confidence()));
            }
        }

        for strategy in knowledge.best_types() {
            if suggestions.iter().any(|(s, _)| *s == strategy) {
                continue;
            }
            let successes = *knowledge.type_success_counts.get(&strategy).unwrap_or(&0);
            let failures = *knowledge.type_failure_counts.get(&strategy).unwrap_or(&0);
            let total = successes + failures;
            if total > 0 {
                let confidence = (f64::from(successes) / f64::from(total)) * 0.5;
                suggestions.push((strategy, confidence));
            }
        }

        let mut unique: Vec<(LocatorStrategy, f64)> = Vec::new();
        suggestions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        for (strategy, confidence) in suggestions {
            if !unique.iter().any(|(s, _)| *s == strategy) {
                unique.push((strategy, confidence));
            }
        }
        unique
    }

    pub fn flush(&self) {
        if let Some(path) = &self.cache_path {
            self.knowledge.read().save(path);
        }
    }

    /// Read-only learning summary for a domain, or `None` if nothing has
    /// been recorded yet (grounded on `selector_pattern_tracker.py`'s
    /// `get_domain_stats`).
    pub fn domain_stats(&self, domain: &str) -> Option<DomainStats> {
        let guard = self.knowledge.read();
        let knowledge = guard.get(domain)?;
        Some(DomainStats {
            total_resolutions: knowledge.total_resolutions,
            patterns_learned: knowledge.patterns.len(),
            exact_matches: knowledge.exact_matches.len(),
            best_types: knowledge.best_types().into_iter().take(3).collect(),
            first_seen: knowledge.first_seen,
            last_updated: knowledge.last_updated,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomainStats {
    pub total_resolutions: u32,
    pub patterns_learned: usize,
    pub exact_matches: usize,
    pub best_types: Vec<LocatorStrategy>,
    pub first_seen: Option<chrono::DateTime<chrono::Utc>>,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for PatternTracker {
    fn default() -> Self {
        Self::in_memory()
    }
}

pub fn shared() -> Arc<PatternTracker> {
    let path = dirs::home_dir().map(|home| home.join(".wayfinder/selector_patterns.json"));
    Arc::new(PatternTracker::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_short_circuits() {
        let tracker = PatternTracker::in_memory();
        tracker.record_success("example.com", "Login button", LocatorStrategy::Testid, "[data-testid='login-btn']");
        assert_eq!(
            tracker.exact_match("example.com", "  LOGIN BUTTON  "),
            Some("[data-testid='login-btn']".to_string())
        );
    }

    #[test]
    fn pattern_overlap_suggests_learned_strategy_for_new_target() {
        let tracker = PatternTracker::in_memory();
        tracker.record_success("example.com", "Login button", LocatorStrategy::Testid, "[data-testid='login-btn']");
        let suggestions = tracker.suggest("example.com", "Signup button");
        assert!(suggestions.iter().any(|(s, _)| *s == LocatorStrategy::Testid));
    }

    #[test]
    fn domain_stats_summarizes_learning_for_a_known_domain() {
        let tracker = PatternTracker::in_memory();
        assert!(tracker.domain_stats("example.com").is_none());

        tracker.record_success("example.com", "Login button", LocatorStrategy::Testid, "[data-testid='login-btn']");
        let stats = tracker.domain_stats("example.com").unwrap();
        assert_eq!(stats.total_resolutions, 1);
        assert_eq!(stats.exact_matches, 1);
        assert_eq!(stats.patterns_learned, 1);
        assert_eq!(stats.best_types.first(), Some(&LocatorStrategy::Testid));
    }

    #[test]
    fn failures_lower_future_confidence() {
        // A different target than the one `record_success` cached an exact
        // match for, so this exercises the domain-wide-stats tier rather
        // than being shadowed by the exact-match tier's fixed 1.0.
        let tracker = PatternTracker::in_memory();
        tracker.record_success("example.com", "Login button", LocatorStrategy::Css, "#login");
        for _ in 0..3 {
            tracker.record_failure("example.com", "Login button", LocatorStrategy::Css);
        }
        let suggestions = tracker.suggest("example.com", "Signup button");
        let (_, confidence) = suggestions.iter().find(|(s, _)| *s == LocatorStrategy::Css).unwrap();
        assert!(*confidence < 0.5);
    }

    #[test]
    fn suggest_ranks_exact_match_above_everything_else() {
        let tracker = PatternTracker::in_memory();
        tracker.record_success("example.com", "Login button", LocatorStrategy::Css, "#login-old");
        tracker.record_success("example.com", "Signup button", LocatorStrategy::Testid, "[data-testid='signup-btn']");

        let suggestions = tracker.suggest("example.com", "Login button");
        assert_eq!(suggestions.first(), Some(&(LocatorStrategy::Css, 1.0)));
    }
}
