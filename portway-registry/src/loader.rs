//! The startup (and rescan) walk of the descriptor tree (`spec.md` §4.C):
//! each leaf directory containing an `entity.json` file yields one
//! [`EndpointDefinition`]. A bad descriptor is skipped, not fatal.

use std::fs;
use std::path::{Path, PathBuf};

use crate::definition::EndpointDefinition;
use crate::error::DescriptorError;
use crate::validate::validate;

pub const DESCRIPTOR_FILE: &str = "entity.json";

pub struct LoadOutcome {
    pub definitions: Vec<EndpointDefinition>,
    /// Path -> error, for every descriptor that failed to load.
    pub errors: Vec<(PathBuf, DescriptorError)>,
}

/// Walks `root` recursively; a directory containing `entity.json` is a leaf
/// (its subdirectories, if any, are not walked further for descriptors —
/// the namespace is carried in the descriptor itself, not inferred from the
/// directory tree).
pub fn load_tree(root: &Path) -> LoadOutcome {
    let mut definitions = Vec::new();
    let mut errors = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let descriptor_path = dir.join(DESCRIPTOR_FILE);
        if descriptor_path.is_file() {
            match load_one(&descriptor_path) {
                Ok(def) => definitions.push(def),
                Err(e) => errors.push((descriptor_path, e)),
            }
            continue;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                errors.push((dir.clone(), DescriptorError::Io(e.to_string())));
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            }
        }
    }

    definitions.sort_by(|a, b| a.full_path().cmp(&b.full_path()));
    LoadOutcome { definitions, errors }
}

pub fn load_one(path: &Path) -> Result<EndpointDefinition, DescriptorError> {
    let raw = fs::read_to_string(path).map_err(|e| DescriptorError::Io(e.to_string()))?;
    let def: EndpointDefinition =
        serde_json::from_str(&raw).map_err(|e| DescriptorError::Parse(e.to_string()))?;
    validate(&def)?;
    Ok(def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walk_skips_invalid_descriptors_but_keeps_valid_ones() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("Items");
        fs::create_dir_all(&good).unwrap();
        fs::write(
            good.join(DESCRIPTOR_FILE),
            r#"{
                "kind": "sql",
                "name": "Items",
                "allowed_methods": ["GET"],
                "schema": "dbo",
                "object_name": "Items",
                "object_type": "Table",
                "allowed_columns_raw": ["Code:ItemCode"]
            }"#,
        )
        .unwrap();

        let bad = dir.path().join("Broken");
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join(DESCRIPTOR_FILE), "{not json").unwrap();

        let outcome = load_tree(dir.path());
        assert_eq!(outcome.definitions.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.definitions[0].name(), "Items");
    }
}
