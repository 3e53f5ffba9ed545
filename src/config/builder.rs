use log::{debug, info, warn};
use serde_json::{Map, Value};

use super::collector::SectionCollector;
use super::tree::ConfigTree;
use crate::common::{ChannelModel, Tier};
use crate::unit::contract::UnitCategory;

/// Standard top-level sections instantiated for every build.
const GENERAL_SECTIONS: [&str; 5] = ["db", "logging", "channel", "resource", "confid"];

/// Multi-source configuration aggregation tree.
///
/// Composes one [`SectionCollector`] per declared top-level key plus the
/// always-present derived sub-namespaces: tier-scoped `alias.t0..t3`,
/// tier-scoped `process.t0..t3` and `process.ops`, a `unit` group with one
/// collector per category, and a `pwd` list for encrypted-value handling.
/// Contributors feed sections independently; per-section validity flags let
/// one bad fragment mark its sub-tree without aborting the aggregation.
pub struct ConfigBuilder {
    general: Vec<SectionCollector>,
    unit: Vec<(UnitCategory, SectionCollector)>,
    alias: Vec<(Tier, SectionCollector)>,
    process: Vec<(Tier, SectionCollector)>,
    pwd: Vec<String>,
    verbose: bool,
}

impl ConfigBuilder {
    pub fn new(verbose: bool) -> Self {
        Self {
            general: GENERAL_SECTIONS
                .iter()
                .map(|k| SectionCollector::new(k, None, verbose))
                .collect(),
            unit: UnitCategory::LOOKUP_ORDER
                .iter()
                .map(|c| (*c, SectionCollector::new(&format!("unit.{c}"), None, verbose)))
                .collect(),
            alias: Tier::NUMERIC
                .iter()
                .map(|t| (*t, SectionCollector::new("alias", Some(*t), verbose)))
                .collect(),
            process: Tier::ALL
                .iter()
                .map(|t| (*t, SectionCollector::new("process", Some(*t), verbose)))
                .collect(),
            pwd: Vec::new(),
            verbose,
        }
    }

    /// Declares an additional custom top-level section.
    pub fn add_section(&mut self, key: &str) {
        if self.general_collector(key).is_none() {
            self.general
                .push(SectionCollector::new(key, None, self.verbose));
        }
    }

    pub fn general_collector(&self, key: &str) -> Option<&SectionCollector> {
        self.general.iter().find(|c| c.path() == key)
    }

    pub fn general_collector_mut(&mut self, key: &str) -> Option<&mut SectionCollector> {
        self.general.iter_mut().find(|c| c.path() == key)
    }

    /// Contributes one channel definition. A structurally invalid document
    /// marks the channel section instead of aborting the aggregation.
    pub fn add_channel(&mut self, doc: Value) {
        let collector = self
            .general_collector_mut("channel")
            .expect("channel section always present");
        match serde_json::from_value::<ChannelModel>(doc.clone()) {
            Ok(channel) => collector.add(&channel.name.clone(), doc),
            Err(e) => collector.report_error(format!("invalid channel definition ({e}): {doc}")),
        }
    }

    fn channel_active(&self, name: &str) -> Option<bool> {
        self.general_collector("channel")
            .and_then(|c| c.get(name))
            .and_then(|doc| serde_json::from_value::<ChannelModel>(doc.clone()).ok())
            .map(|c| c.active)
    }

    /// Contributes a tier-scoped alias. Aliases exist for numeric tiers only.
    pub fn add_alias(&mut self, tier: Tier, key: &str, value: Value) {
        match self.alias.iter_mut().find(|(t, _)| *t == tier) {
            Some((_, collector)) => collector.add(key, value),
            None => warn!("alias '{key}' declared for non-numeric tier {tier}, ignored"),
        }
    }

    /// Contributes a numeric config document under the `confid` namespace.
    pub fn add_confid(&mut self, id: i64, value: Value) {
        self.general_collector_mut("confid")
            .expect("confid section always present")
            .add(&id.to_string(), value);
    }

    /// Contributes a resource entry.
    pub fn add_resource(&mut self, key: &str, value: Value) {
        self.general_collector_mut("resource")
            .expect("resource section always present")
            .add(key, value);
    }

    /// Contributes one process definition to a tier namespace.
    ///
    /// If the document references a channel known to be inactive, the
    /// process is forced inactive here (propagated, never the reverse).
    pub fn add_process(&mut self, tier: Tier, mut doc: Value) {
        let name = match doc.get("name").and_then(Value::as_str) {
            Some(n) => n.to_string(),
            None => {
                if let Some((_, c)) = self.process.iter_mut().find(|(t, _)| *t == tier) {
                    c.report_error(format!("process definition without name: {doc}"));
                }
                return;
            }
        };

        if let Some(channel) = doc.get("channel").and_then(Value::as_str) {
            if self.channel_active(channel) == Some(false) {
                debug!("process '{name}': parent channel '{channel}' inactive, deactivating");
                if let Some(map) = doc.as_object_mut() {
                    map.insert("active".to_string(), Value::Bool(false));
                }
            }
        }

        let collector = &mut self
            .process
            .iter_mut()
            .find(|(t, _)| *t == tier)
            .expect("all tier namespaces present")
            .1;
        collector.add(&name, doc);
    }

    /// Contributes one unit declaration to a category table.
    pub fn add_unit(&mut self, category: UnitCategory, name: &str, require: Vec<String>) {
        let collector = &mut self
            .unit
            .iter_mut()
            .find(|(c, _)| *c == category)
            .expect("all category tables present")
            .1;
        collector.add(
            name,
            serde_json::json!({"category": category, "require": require}),
        );
    }

    /// Appends password material used to decrypt encrypted leaf values.
    pub fn add_passwords<I, S>(&mut self, pwds: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pwd.extend(pwds.into_iter().map(Into::into));
    }

    fn collectors(&self) -> impl Iterator<Item = &SectionCollector> {
        self.general
            .iter()
            .chain(self.unit.iter().map(|(_, c)| c))
            .chain(self.alias.iter().map(|(_, c)| c))
            .chain(self.process.iter().map(|(_, c)| c))
    }

    fn collectors_mut(&mut self) -> impl Iterator<Item = &mut SectionCollector> {
        self.general
            .iter_mut()
            .chain(self.unit.iter_mut().map(|(_, c)| c))
            .chain(self.alias.iter_mut().map(|(_, c)| c))
            .chain(self.process.iter_mut().map(|(_, c)| c))
    }

    /// Recursively clears every collector's error flag, so validation can be
    /// re-run after a fix without rebuilding the whole tree.
    pub fn unset_errors(&mut self) {
        for c in self.collectors_mut() {
            c.unset_error();
        }
    }

    /// Paths of every sub-section currently flagged invalid.
    pub fn error_paths(&self) -> Vec<String> {
        self.collectors()
            .filter(|c| c.has_error())
            .map(|c| c.path())
            .collect()
    }

    /// Recursive error scan over the whole tree. Logs a warning identifying
    /// each offending sub-section path. This is the sole signal used to gate
    /// "config load succeeded".
    pub fn has_nested_error(&self) -> bool {
        let paths = self.error_paths();
        for p in &paths {
            warn!("section '{p}' has errors");
        }
        !paths.is_empty()
    }

    /// Assembles the canonical nested mapping.
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        for c in &self.general {
            root.insert(c.path(), c.to_value());
        }

        let mut unit = Map::new();
        for (cat, c) in &self.unit {
            unit.insert(cat.to_string(), c.to_value());
        }
        root.insert("unit".to_string(), Value::Object(unit));

        let mut alias = Map::new();
        for (tier, c) in &self.alias {
            alias.insert(tier.to_string(), c.to_value());
        }
        root.insert("alias".to_string(), Value::Object(alias));

        let mut process = Map::new();
        for (tier, c) in &self.process {
            process.insert(tier.to_string(), c.to_value());
        }
        root.insert("process".to_string(), Value::Object(process));

        root.insert(
            "pwd".to_string(),
            Value::Array(self.pwd.iter().map(|p| Value::String(p.clone())).collect()),
        );
        Value::Object(root)
    }

    /// Serializes the tree for diagnostics, after the error scan. Not meant
    /// for machine consumption: per-section error markers may remain.
    pub fn print(&self) {
        if self.has_nested_error() {
            warn!("errors were reported while collecting configurations");
        }
        match serde_json::to_string_pretty(&self.to_value()) {
            Ok(s) => info!("{s}"),
            Err(e) => warn!("unable to serialize config tree: {e}"),
        }
    }

    /// Finishes aggregation into a mutable [`ConfigTree`]. Decryption of
    /// encrypted leaves and freezing are the caller's next steps.
    pub fn build(self) -> ConfigTree {
        ConfigTree::from_root(self.to_value())
    }
}
