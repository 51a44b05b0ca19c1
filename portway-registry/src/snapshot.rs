//! The registry's immutable snapshot pointer (design note 9.2,
//! `spec.md` §4.C, §5 "Endpoint registry snapshot"): readers take an `Arc`
//! once per request, and a reload swaps the pointer without tearing a
//! snapshot that's still in use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::definition::EndpointDefinition;
use crate::error::DescriptorError;
use crate::loader::load_tree;

/// One consistent view of the endpoint tree.
pub struct RegistrySnapshot {
    by_full_path: HashMap<String, EndpointDefinition>,
    /// Case-insensitive index of top-level (no-namespace) endpoints, used
    /// only when the lookup key itself carries no namespace.
    top_level_ci: HashMap<String, Vec<String>>,
    pub load_errors: Vec<(PathBuf, String)>,
}

impl RegistrySnapshot {
    fn build(definitions: Vec<EndpointDefinition>, load_errors: Vec<(PathBuf, String)>) -> Self {
        let mut by_full_path = HashMap::new();
        let mut top_level_ci: HashMap<String, Vec<String>> = HashMap::new();

        for def in definitions {
            let full_path = def.full_path();
            if def.meta().namespace.is_none() {
                top_level_ci
                    .entry(full_path.to_ascii_lowercase())
                    .or_default()
                    .push(full_path.clone());
            }
            by_full_path.insert(full_path, def);
        }

        Self {
            by_full_path,
            top_level_ci,
            load_errors,
        }
    }

    /// `Find(name) -> EndpointDefinition?` (`spec.md` §4.C).
    ///
    /// Namespaced lookups (`name` contains `/`) are always case-sensitive.
    /// Top-level lookups first try an exact match, then fall back to a
    /// case-insensitive match; more than one case-insensitive candidate is
    /// ambiguous and resolves to `None` (the dispatcher maps that to 404,
    /// same as a missing endpoint).
    pub fn find(&self, name: &str) -> Option<&EndpointDefinition> {
        if let Some(def) = self.by_full_path.get(name) {
            return Some(def);
        }
        if name.contains('/') {
            return None;
        }
        let candidates = self.top_level_ci.get(&name.to_ascii_lowercase())?;
        match candidates.as_slice() {
            [only] => self.by_full_path.get(only),
            _ => None,
        }
    }

    pub fn public_endpoints(&self) -> impl Iterator<Item = &EndpointDefinition> {
        self.by_full_path.values().filter(|e| !e.is_private())
    }

    pub fn len(&self) -> usize {
        self.by_full_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_full_path.is_empty()
    }
}

/// The live, hot-swappable registry. Cloning is cheap (an `Arc` bump); every
/// request acquires the snapshot once via [`EndpointRegistry::current`] and
/// uses that reference for the rest of its lifetime, so a concurrent reload
/// never tears a snapshot mid-request.
pub struct EndpointRegistry {
    root: PathBuf,
    snapshot: ArcSwap<RegistrySnapshot>,
}

impl EndpointRegistry {
    pub fn load(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let snapshot = Self::scan(&root);
        Self {
            root,
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    fn scan(root: &Path) -> RegistrySnapshot {
        let outcome = load_tree(root);
        let errors = outcome
            .errors
            .into_iter()
            .map(|(path, err)| (path, describe(&err)))
            .collect();
        RegistrySnapshot::build(outcome.definitions, errors)
    }

    /// Triggered by the file-change notifier; publishes a new snapshot
    /// atomically. Handlers already holding the previous `Arc` keep using
    /// it until their request completes.
    pub fn rescan(&self) {
        let snapshot = Self::scan(&self.root);
        self.snapshot.store(Arc::new(snapshot));
    }

    pub fn current(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }
}

fn describe(err: &DescriptorError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_descriptor(dir: &Path, name: &str, namespace: Option<&str>) {
        let leaf = dir.join(name);
        fs::create_dir_all(&leaf).unwrap();
        let ns = namespace
            .map(|n| format!(r#""namespace": "{n}","#))
            .unwrap_or_default();
        fs::write(
            leaf.join("entity.json"),
            format!(
                r#"{{
                    "kind": "static",
                    "name": "{name}",
                    {ns}
                    "allowed_methods": ["GET"],
                    "content_type": "application/json",
                    "path": "payload.json"
                }}"#
            ),
        )
        .unwrap();
    }

    #[test]
    fn top_level_lookup_is_case_insensitive_when_unambiguous() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "Items", None);
        let registry = EndpointRegistry::load(dir.path());
        let snapshot = registry.current();

        assert!(snapshot.find("Items").is_some());
        assert!(snapshot.find("items").is_some());
        assert!(snapshot.find("ITEMS").is_some());
    }

    #[test]
    fn namespaced_lookup_is_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "Staff", Some("HR"));
        let registry = EndpointRegistry::load(dir.path());
        let snapshot = registry.current();

        assert!(snapshot.find("HR/Staff").is_some());
        assert!(snapshot.find("hr/staff").is_none());
    }

    #[test]
    fn rescan_replaces_snapshot_without_invalidating_old_reference() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "Items", None);
        let registry = EndpointRegistry::load(dir.path());
        let old = registry.current();

        write_descriptor(dir.path(), "Orders", None);
        registry.rescan();
        let new = registry.current();

        assert_eq!(old.len(), 1);
        assert_eq!(new.len(), 2);
    }
}
