//! Nested-mapping helpers: dotted-path flatten/unflatten, override merging
//! and content fingerprinting of configuration documents.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Flattens a nested object into a single-level map with dot-joined keys.
///
/// Arrays and scalars are leaves; only objects are descended into. An empty
/// nested object is kept as a leaf so round-trips preserve it.
pub fn flatten(doc: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(doc, None, &mut out);
    out
}

fn flatten_into(doc: &Map<String, Value>, prefix: Option<&str>, out: &mut Map<String, Value>) {
    for (k, v) in doc {
        let key = match prefix {
            Some(p) => format!("{p}.{k}"),
            None => k.clone(),
        };
        match v {
            Value::Object(m) if !m.is_empty() => flatten_into(m, Some(&key), out),
            _ => {
                out.insert(key, v.clone());
            }
        }
    }
}

/// Rebuilds a nested object from a flattened map produced by [`flatten`].
pub fn unflatten(flat: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (path, v) in flat {
        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = segments.pop().unwrap_or(path.as_str());
        let mut node = &mut out;
        for seg in segments {
            let entry = node
                .entry(seg.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                // A shorter path already claimed this slot as a leaf;
                // the deeper path wins.
                *entry = Value::Object(Map::new());
            }
            node = entry.as_object_mut().unwrap();
        }
        node.insert(leaf.to_string(), v.clone());
    }
    out
}

/// Deep-merges a partial override document over a base document:
/// both sides are path-flattened, merged with the override winning on key
/// collision, then reconstituted into nested form. This lets an override
/// target one deeply nested field without restating the whole subtree.
pub fn merge_overrides(
    base: &Map<String, Value>,
    over: &Map<String, Value>,
) -> Map<String, Value> {
    let mut flat = flatten(base);
    for (k, v) in flatten(over) {
        flat.insert(k, v);
    }
    unflatten(&flat)
}

/// Deterministic content fingerprint of a configuration document.
///
/// Object keys are recursively sorted before serialization so documents with
/// equivalent-but-differently-ordered keys hash identically; array order is
/// meaningful and preserved. SHA-256 over the canonical JSON bytes, hex.
pub fn fingerprint(doc: &Value) -> String {
    let canonical = canonicalize(doc);
    // Canonical form is built from a valid Value, serialization cannot fail.
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

fn canonicalize(doc: &Value) -> Value {
    match doc {
        Value::Object(m) => {
            let mut keys: Vec<&String> = m.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize(&m[k]));
            }
            Value::Object(out)
        }
        Value::Array(a) => Value::Array(a.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
