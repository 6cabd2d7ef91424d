//! The process-wide table of bundles.

use std::collections::HashMap;
use std::path::Path;

use crate::identity::BundleIdentity;
use crate::state::BundleState;

/// Maps each bundle identity to its state. Entries are created on first
/// request and live for the rest of the process.
#[derive(Debug, Default)]
pub struct BundleRegistry {
    bundles: HashMap<BundleIdentity, BundleState>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, identity: &BundleIdentity) -> &mut BundleState {
        self.bundles
            .entry(identity.clone())
            .or_insert_with(|| BundleState::new(identity.clone()))
    }

    pub fn get(&self, identity: &BundleIdentity) -> Option<&BundleState> {
        self.bundles.get(identity)
    }

    pub fn get_mut(&mut self, identity: &BundleIdentity) -> Option<&mut BundleState> {
        self.bundles.get_mut(identity)
    }

    /// Every identity loaded from `path`. With `only_watched`, just those
    /// whose configuration file is being watched.
    pub fn identities_for(&self, path: &Path, only_watched: bool) -> Vec<BundleIdentity> {
        self.bundles
            .values()
            .filter(|state| state.identity.config_path == path)
            .filter(|state| !only_watched || state.watching_config_file)
            .map(|state| state.identity.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_reuses_the_entry() {
        let mut registry = BundleRegistry::new();
        let identity = BundleIdentity::new("/a.json");

        registry.get_or_create(&identity).bundle_root = Some("/srv".into());
        assert_eq!(
            registry.get_or_create(&identity).bundle_root.as_deref(),
            Some("/srv")
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn identities_for_filters_by_path_and_watch_flag() {
        let mut registry = BundleRegistry::new();
        let plain = BundleIdentity::new("/a.json");
        let mut watched = BundleIdentity::new("/a.json");
        watched.watch_config = true;
        let other = BundleIdentity::new("/b.json");

        registry.get_or_create(&plain);
        registry.get_or_create(&watched).watching_config_file = true;
        registry.get_or_create(&other).watching_config_file = true;

        assert_eq!(
            registry.identities_for(Path::new("/a.json"), true),
            vec![watched]
        );
        assert_eq!(registry.identities_for(Path::new("/a.json"), false).len(), 2);
        assert!(registry.identities_for(Path::new("/c.json"), false).is_empty());
    }
}
