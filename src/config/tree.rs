use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::pwd;
use crate::errors::{Error, Result};

/// Canonical configuration tree: one root mapping, read-only-shared with
/// every component downstream once frozen.
///
/// Lifecycle: built once per configuration load (mutable), optionally
/// decrypted, then frozen into an immutable snapshot. Mutation after
/// freezing fails fast with [`Error::ImmutabilityViolation`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTree {
    root: Value,
    frozen: bool,
}

impl ConfigTree {
    /// Wraps an assembled root mapping. Fails if the document is not an
    /// object.
    pub fn new(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(Error::config("config root must be a mapping"));
        }
        Ok(Self {
            root,
            frozen: false,
        })
    }

    pub(crate) fn from_root(root: Value) -> Self {
        Self {
            root,
            frozen: false,
        }
    }

    /// Loads a configuration file (JSON or YAML by extension), decrypts any
    /// encrypted leaf values with the provided passwords, and optionally
    /// freezes the result.
    pub fn load(path: &Path, pwds: &[String], freeze: bool) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let root: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => serde_yaml::from_str(&raw)?,
            _ => serde_json::from_str(&raw)?,
        };
        let mut tree = Self::new(root)?;

        // Passwords may also ship inside the tree's own pwd section.
        let mut all_pwds: Vec<String> = pwds.to_vec();
        if let Some(Value::Array(entries)) = tree.get("pwd") {
            all_pwds.extend(
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string),
            );
        }
        if !all_pwds.is_empty() {
            let n = pwd::decrypt_tree(&mut tree.root, &all_pwds);
            if n > 0 {
                debug!("decrypted {n} config entries");
            }
        }

        if freeze {
            tree.freeze();
        }
        info!("config loaded from {}", path.display());
        Ok(tree)
    }

    /// Looks up a dot-separated path, e.g. `process.t0.hu_random`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut node = &self.root;
        for seg in path.split('.') {
            node = node.as_object()?.get(seg)?;
        }
        Some(node)
    }

    /// Typed read of a path. `None` when the path is absent; an error when
    /// present but of the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path) {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| Error::config(format!("section '{path}' has unexpected shape: {e}"))),
        }
    }

    /// Looks up a path that must exist.
    pub fn require(&self, path: &str) -> Result<&Value> {
        self.get(path)
            .ok_or_else(|| Error::config(format!("missing config section '{path}'")))
    }

    /// Writes a value at a dot-separated path, creating intermediate
    /// objects. Forbidden once frozen.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        if self.frozen {
            return Err(Error::ImmutabilityViolation);
        }
        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = segments
            .pop()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| Error::config(format!("invalid config path '{path}'")))?;
        let mut node = self
            .root
            .as_object_mut()
            .ok_or_else(|| Error::config("config root must be a mapping"))?;
        for seg in segments {
            node = node
                .entry(seg.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .ok_or_else(|| {
                    Error::config(format!("path '{path}' crosses non-object entry '{seg}'"))
                })?;
        }
        node.insert(leaf.to_string(), value);
        Ok(())
    }

    /// Freezes the tree into an immutable snapshot. Idempotent.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn root(&self) -> &Value {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_get_dotted_path() {
        let tree = ConfigTree::new(json!({"a": {"b": {"c": 1}}})).unwrap();
        assert_eq!(tree.get("a.b.c"), Some(&json!(1)));
        assert_eq!(tree.get("a.b.missing"), None);
        assert!(tree.require("a.b").is_ok());
        assert!(tree.require("nope").is_err());
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut tree = ConfigTree::new(json!({})).unwrap();
        tree.set("resource.extcat.uri", json!("mongodb://x")).unwrap();
        assert_eq!(tree.get("resource.extcat.uri"), Some(&json!("mongodb://x")));
    }

    #[test]
    fn test_freeze_is_idempotent_and_blocks_writes() {
        let mut tree = ConfigTree::new(json!({"a": 1})).unwrap();
        tree.freeze();
        let snapshot = tree.clone();
        tree.freeze();
        assert_eq!(tree, snapshot);

        let err = tree.set("a", json!(2)).unwrap_err();
        assert!(matches!(err, Error::ImmutabilityViolation));
        assert_eq!(tree.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_rejects_non_mapping_root() {
        assert!(ConfigTree::new(json!([1, 2])).is_err());
    }

    #[test]
    fn test_load_yaml_and_json() {
        let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(f, "channel:\n  HU_RANDOM:\n    active: true").unwrap();
        let tree = ConfigTree::load(f.path(), &[], true).unwrap();
        assert!(tree.is_frozen());
        assert_eq!(
            tree.get("channel.HU_RANDOM.active"),
            Some(&Value::Bool(true))
        );

        let mut f = NamedTempFile::new().unwrap();
        write!(f, "{}", json!({"resource": {"x": 1}})).unwrap();
        let tree = ConfigTree::load(f.path(), &[], false).unwrap();
        assert!(!tree.is_frozen());
        assert_eq!(tree.get("resource.x"), Some(&json!(1)));
    }
}
