use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Tier, UnitModel};
use crate::errors::{Error, Result};

fn default_active() -> bool {
    true
}

/// Declarative description of one schedulable job: a controller unit
/// reference paired with a processor unit reference.
///
/// `name` is unique within its tier namespace. An inactive parent channel
/// forces `active = false` on every process it contributed (propagated at
/// aggregation time, never the reverse).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessModel {
    pub name: String,
    pub tier: Tier,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Distribution that contributed this process, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distrib: Option<String>,
    /// Source file the definition was read from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Parent channel name, if channel-contributed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Optional cron expression overriding the controller's default cadence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    pub controller: UnitModel,
    pub processor: UnitModel,
}

impl ProcessModel {
    /// Parses a raw process document, injecting `tier` when the document
    /// omits it (tier-scoped sections already carry it in their path).
    pub fn from_doc(doc: &Value, tier: Tier) -> Result<ProcessModel> {
        let mut doc = doc.clone();
        match doc.as_object_mut() {
            Some(map) => {
                map.entry("tier".to_string())
                    .or_insert_with(|| serde_json::to_value(tier).unwrap_or(Value::Null));
            }
            None => {
                return Err(Error::config(format!(
                    "process document is not an object: {doc}"
                )))
            }
        }
        Ok(serde_json::from_value(doc)?)
    }
}
