//! On-disk cache of [`DomainKnowledge`], atomic write-then-rename, tolerant
//! of a missing or corrupt file (mirrors `wf-site-profiler`'s store).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::domain::DomainKnowledge;

#[derive(Default)]
pub struct PatternStore {
    domains: HashMap<String, DomainKnowledge>,
}

impl PatternStore {
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, DomainKnowledge>>(&raw) {
                Ok(domains) => Self { domains },
                Err(err) => {
                    warn!(?err, path = %path.display(), "selector pattern cache is corrupt, starting empty");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(?err, path = %path.display(), "failed to read selector pattern cache");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) {
        let Some(parent) = path.parent() else { return };
        if let Err(err) = fs::create_dir_all(parent) {
            warn!(?err, "failed to create selector pattern cache directory");
            return;
        }
        let json = match serde_json::to_string_pretty(&self.domains) {
            Ok(json) => json,
            Err(err) => {
                warn!(?err, "failed to serialize selector pattern cache");
                return;
            }
        };
        let tmp_path = path.with_extension("json.tmp");
        if let Err(err) = fs::write(&tmp_path, json) {
            warn!(?err, "failed to write selector pattern cache temp file");
            return;
        }
        if let Err(err) = fs::rename(&tmp_path, path) {
            warn!(?err, "failed to rename selector pattern cache into place");
        }
    }

    pub fn get(&self, domain: &str) -> Option<&DomainKnowledge> {
        self.domains.get(domain)
    }

    pub fn get_or_create(&mut self, domain: &str) -> &mut DomainKnowledge {
        self.domains.entry(domain.to_string()).or_insert_with(|| DomainKnowledge::new(domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("selector_patterns.json");

        let mut store = PatternStore::default();
        store.get_or_create("example.com").total_resolutions = 3;
        store.save(&path);

        let reloaded = PatternStore::load(&path);
        assert_eq!(reloaded.get("example.com").unwrap().total_resolutions, 3);
    }
}
