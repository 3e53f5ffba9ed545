use log::{debug, error};
use serde_json::{Map, Value};

use crate::common::Tier;

/// Typed accumulator for one configuration section.
///
/// Tracks an internal validity flag so one bad fragment marks its section
/// without aborting the whole aggregation; the flag is the per-section
/// signal consumed by the aggregation tree's recursive error scan.
#[derive(Debug, Clone)]
pub struct SectionCollector {
    section: String,
    tier: Option<Tier>,
    entries: Map<String, Value>,
    has_error: bool,
    verbose: bool,
}

impl SectionCollector {
    pub fn new(section: &str, tier: Option<Tier>, verbose: bool) -> Self {
        Self {
            section: section.to_string(),
            tier,
            entries: Map::new(),
            has_error: false,
            verbose,
        }
    }

    /// Dotted path of this collector within the aggregation tree,
    /// e.g. `alias.t2` or `channel`.
    pub fn path(&self) -> String {
        match self.tier {
            Some(t) => format!("{}.{}", self.section, t),
            None => self.section.clone(),
        }
    }

    /// Inserts one top-level entry. A duplicate key is reported as an error
    /// and the first value is kept.
    pub fn add(&mut self, key: &str, value: Value) {
        if self.entries.contains_key(key) {
            self.report_error(format!("duplicate entry '{key}'"));
            return;
        }
        if self.verbose {
            debug!("{}: adding entry '{}'", self.path(), key);
        }
        self.entries.insert(key.to_string(), value);
    }

    /// Writes a value at a dot-separated nested path, creating intermediate
    /// objects. An intermediate non-object is reported as an error.
    pub fn set_nested(&mut self, path: &str, value: Value) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = match segments.pop() {
            Some(l) if !l.is_empty() => l,
            _ => {
                self.report_error(format!("invalid nested path '{path}'"));
                return;
            }
        };
        let mut node = &mut self.entries;
        for seg in &segments {
            let entry = node
                .entry(seg.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match entry.as_object_mut() {
                Some(m) => node = m,
                None => {
                    let msg = format!("path '{path}' crosses non-object entry '{seg}'");
                    // Cannot call report_error while borrowing entries.
                    error!("{}: {}", format_path(&self.section, self.tier), msg);
                    self.has_error = true;
                    return;
                }
            }
        }
        node.insert(leaf.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks this section invalid and logs the offense.
    pub fn report_error<S: AsRef<str>>(&mut self, msg: S) {
        error!("{}: {}", self.path(), msg.as_ref());
        self.has_error = true;
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn unset_error(&mut self) {
        self.has_error = false;
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}

fn format_path(section: &str, tier: Option<Tier>) -> String {
    match tier {
        Some(t) => format!("{section}.{t}"),
        None => section.to_string(),
    }
}
