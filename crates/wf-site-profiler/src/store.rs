//! On-disk cache of [`SiteProfile`]s, keyed by domain. Atomic write-then-
//! rename mirrors the teacher's `self_heal.rs` persistence, tolerant of a
//! missing or corrupt file on load (spec §4.2, §9 ambient stack).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::warn;
use wf_core_types::SiteProfile;

#[derive(Default)]
pub struct ProfileStore {
    profiles: HashMap<String, SiteProfile>,
}

impl ProfileStore {
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, SiteProfile>>(&raw) {
                Ok(profiles) => Self { profiles },
                Err(err) => {
                    warn!(?err, path = %path.display(), "site profile cache is corrupt, starting empty");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(?err, path = %path.display(), "failed to read site profile cache");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) {
        let Some(parent) = path.parent() else { return };
        if let Err(err) = fs::create_dir_all(parent) {
            warn!(?err, "failed to create site profile cache directory");
            return;
        }
        let json = match serde_json::to_string_pretty(&self.profiles) {
            Ok(json) => json,
            Err(err) => {
                warn!(?err, "failed to serialize site profile cache");
                return;
            }
        };
        let tmp_path = path.with_extension("json.tmp");
        if let Err(err) = fs::write(&tmp_path, json) {
            warn!(?err, "failed to write site profile cache temp file");
            return;
        }
        if let Err(err) = fs::rename(&tmp_path, path) {
            warn!(?err, "failed to rename site profile cache into place");
        }
    }

    pub fn get(&self, domain: &str) -> Option<SiteProfile> {
        self.profiles.get(domain).cloned()
    }

    pub fn put(&mut self, profile: SiteProfile) {
        self.profiles.insert(profile.domain.clone(), profile);
    }

    pub fn remove(&mut self, domain: &str) {
        self.profiles.remove(domain);
    }

    pub fn clear(&mut self) {
        self.profiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("site_profiles.json");

        let mut store = ProfileStore::default();
        store.put(SiteProfile::new("example.com"));
        store.save(&path);

        let reloaded = ProfileStore::load(&path);
        assert!(reloaded.get("example.com").is_some());
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("site_profiles.json");
        fs::write(&path, "{ not json").unwrap();

        let store = ProfileStore::load(&path);
        assert!(store.get("example.com").is_none());
    }
}
