use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference to a unit implementation together with its init parameters:
/// "which implementation, with which parameters", anywhere in the config
/// tree (process definitions, nested directives).
///
/// `None` fields are skipped at serialization so semantically-equal
/// references fingerprint equally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitModel {
    /// Symbolic unit name, resolved through the category tables.
    pub unit: String,
    /// Init parameters: inline document, tier-scoped alias key, or numeric
    /// config id resolved through the `confid` namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<UnitConfig>,
    /// Partial document deep-merged over the resolved base config,
    /// override winning on key conflicts.
    #[serde(default, rename = "override", skip_serializing_if = "Option::is_none")]
    pub override_: Option<Map<String, Value>>,
}

impl UnitModel {
    pub fn new<S: Into<String>>(unit: S) -> Self {
        Self {
            unit: unit.into(),
            config: None,
            override_: None,
        }
    }

    pub fn with_config<S: Into<String>>(unit: S, config: UnitConfig) -> Self {
        Self {
            unit: unit.into(),
            config: Some(config),
            override_: None,
        }
    }
}

/// The three spellings a unit's `config` field accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitConfig {
    /// Numeric config id, resolved through the `confid` namespace.
    Id(i64),
    /// Tier-scoped alias key, resolved through the alias tables.
    Alias(String),
    /// Inline document, used verbatim.
    Inline(Map<String, Value>),
}
