use std::sync::Arc;

use log::{error, info, warn};
use serde_json::Value;

use super::ConfigTree;
use crate::common::{ProcessModel, Tier};
use crate::errors::{Error, Result};
use crate::unit::{UnitCategory, UnitRegistry};

/// Tolerances applied during a validation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    /// Skip processes marked inactive instead of validating them.
    pub ignore_inactive: bool,
    /// Tolerate required resources missing from the tree.
    pub ignore_resource_not_available: bool,
}

/// Side-effect-free dry run over an assembled tree: every process document
/// must parse, every referenced processor must resolve, every declared
/// resource requirement must be satisfiable. Offenses are collected and
/// logged in one batch rather than failing on the first.
pub struct ConfigValidator {
    config: ConfigTree,
    registry: Arc<UnitRegistry>,
}

impl ConfigValidator {
    pub fn new(config: ConfigTree, registry: Arc<UnitRegistry>) -> Self {
        Self { config, registry }
    }

    /// Runs the full pass. On success the unmodified tree is handed back;
    /// otherwise every offense has been logged and a single
    /// [`Error::BadConfig`] carries the count.
    pub fn validate(self, opts: ValidateOptions) -> Result<ConfigTree> {
        let mut offenses = 0usize;

        for tier in Tier::ALL {
            let section = match self.config.get(&format!("process.{tier}")) {
                Some(Value::Object(m)) => m,
                Some(other) => {
                    error!("process section of tier {tier} is not a mapping: {other}");
                    offenses += 1;
                    continue;
                }
                None => continue,
            };

            for (name, doc) in section {
                offenses += self.check_process(tier, name, doc, opts);
            }
        }

        offenses += self.check_unit_section();

        if offenses > 0 {
            error!("validation failed with {offenses} offense(s)");
            return Err(Error::BadConfig { offenses });
        }
        info!("config validated");
        Ok(self.config)
    }

    /// Validates one process document, returning the number of offenses it
    /// contributed.
    fn check_process(&self, tier: Tier, name: &str, doc: &Value, opts: ValidateOptions) -> usize {
        if opts.ignore_inactive
            && doc.get("active").and_then(Value::as_bool) == Some(false)
        {
            return 0;
        }

        let model = match ProcessModel::from_doc(doc, tier) {
            Ok(m) => m,
            Err(e) => {
                error!("process {tier}/{name} does not parse: {e}; document: {doc}");
                return 1;
            }
        };

        let def = match self
            .registry
            .resolve_name(&model.processor.unit, Some(UnitCategory::Base))
        {
            Ok(def) => def,
            Err(e) => {
                error!("process {tier}/{name}: {e}; document: {doc}");
                return 1;
            }
        };

        if opts.ignore_resource_not_available {
            return 0;
        }

        let mut offenses = 0;
        for key in &def.require {
            let available = if key == "channel" {
                self.config.get("channel").is_some()
            } else {
                self.config.get(&format!("resource.{key}")).is_some()
            };
            if !available {
                error!("process {tier}/{name}: resource '{key}' unavailable");
                offenses += 1;
            }
        }
        offenses
    }

    /// Cross-checks unit names declared in the tree against the registry.
    fn check_unit_section(&self) -> usize {
        let section = match self.config.get("unit") {
            Some(Value::Object(m)) => m,
            _ => return 0,
        };
        let mut offenses = 0;
        for category in section.values() {
            let Some(names) = category.as_object() else {
                continue;
            };
            for name in names.keys() {
                if !self.registry.contains(name) {
                    warn!("declared unit '{name}' is not registered");
                    offenses += 1;
                }
            }
        }
        offenses
    }
}
