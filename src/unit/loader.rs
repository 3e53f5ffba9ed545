use std::sync::Arc;

use log::debug;
use serde_json::Value;

use super::contract::{
    AdminInit, AdminUnit, AuxUnit, BaseInit, BaseUnit, ControllerInit, ExecContext, Params,
    ProcessController, UnitCategory, UnitLogger,
};
use super::registry::{UnitDefinition, UnitFactory, UnitRegistry};
use crate::common::{ProcessModel, Tier, UnitConfig, UnitModel};
use crate::config::ConfigTree;
use crate::errors::{Error, Result};
use crate::utils::mappings::merge_overrides;

/// A freshly constructed unit instance, tagged by capability.
pub enum UnitInstance {
    Base(Box<dyn BaseUnit>),
    Admin(Box<dyn AdminUnit>),
    Aux(Box<dyn AuxUnit>),
}

/// Unit resolution & instantiation engine.
///
/// Owns no state beyond a reference to the config tree and the registry;
/// cheap to construct wherever a resolution is needed.
pub struct UnitLoader {
    config: Arc<ConfigTree>,
    registry: Arc<UnitRegistry>,
}

impl UnitLoader {
    pub fn new(config: Arc<ConfigTree>, registry: Arc<UnitRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &Arc<ConfigTree> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.registry
    }

    pub fn context(&self) -> ExecContext {
        ExecContext {
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Resolves a symbolic unit name across the category tables in the
    /// fixed order (base, admin, core, aux).
    pub fn resolve_name(
        &self,
        name: &str,
        expected: Option<UnitCategory>,
    ) -> Result<Arc<UnitDefinition>> {
        self.registry.resolve_name(name, expected).cloned()
    }

    /// Resolves a unit reference's init parameters.
    ///
    /// Empty config resolves to `{}`; an inline document is used verbatim;
    /// an integer is looked up in the `confid` namespace; a string is
    /// searched through the tier alias tables in the fixed order
    /// t0, t3, t1, t2 (first match wins). An `override`, if present, is
    /// deep-merged over the resolved base document, override winning.
    pub fn resolve_init_params(&self, model: &UnitModel) -> Result<Params> {
        let base: Params = match &model.config {
            None => Params::new(),
            Some(UnitConfig::Inline(m)) => m.clone(),
            Some(UnitConfig::Id(id)) => self.lookup_confid(*id)?,
            Some(UnitConfig::Alias(key)) => self.lookup_alias(key)?,
        };

        match &model.override_ {
            Some(over) => Ok(merge_overrides(&base, over)),
            None => Ok(base),
        }
    }

    fn lookup_confid(&self, id: i64) -> Result<Params> {
        match self.config.get(&format!("confid.{id}")) {
            Some(Value::Object(m)) => Ok(m.clone()),
            Some(other) => Err(Error::config(format!(
                "config id {id} is not a mapping: {other}"
            ))),
            None => Err(Error::config(format!("unknown config id: {id}"))),
        }
    }

    /// The first tier containing the key wins, whatever its value holds:
    /// an unusable entry there is an error, never a reason to keep
    /// searching later tiers.
    fn lookup_alias(&self, key: &str) -> Result<Params> {
        for tier in Tier::ALIAS_SEARCH_ORDER {
            match self.config.get(&format!("alias.{tier}.{key}")) {
                Some(Value::Object(m)) => {
                    debug!("alias '{key}' resolved from tier {tier}");
                    return Ok(m.clone());
                }
                Some(other) => {
                    return Err(Error::config(format!(
                        "alias '{key}' in tier {tier} is not a mapping: {other}"
                    )))
                }
                None => {}
            }
        }
        Err(Error::AliasNotFound(key.to_string()))
    }

    /// Fetches every resource the implementation declared required.
    ///
    /// A `channel` requirement is special-cased: it is satisfied from the
    /// channel section directly, not the resource section.
    pub fn resolve_resources(&self, def: &UnitDefinition) -> Result<Params> {
        let mut resources = Params::new();
        for key in &def.require {
            let value = if key == "channel" {
                self.config.get("channel")
            } else {
                self.config.get(&format!("resource.{key}"))
            };
            match value {
                Some(v) => {
                    resources.insert(key.clone(), v.clone());
                }
                None => return Err(Error::ResourceUnavailable(key.clone())),
            }
        }
        Ok(resources)
    }

    /// Single generic instantiation entry point.
    ///
    /// Resolves the name, checks the capability contract, merges resolved
    /// init parameters with `extra` (explicit parameters win over resolved
    /// config), and injects category-specific collaborators: base/core
    /// units receive a logger and their resolved resources, admin units a
    /// shared execution context, auxiliary units nothing further.
    pub fn instantiate(
        &self,
        model: &UnitModel,
        expected: UnitCategory,
        extra: Params,
    ) -> Result<UnitInstance> {
        let def = self.resolve_name(&model.unit, Some(expected))?;

        if expected == UnitCategory::Aux {
            // Aux instantiation goes through the aux registry so the inline
            // config constraint and recursive-resolution handle apply.
            return self
                .registry
                .aux()
                .new_aux_unit(model, extra)
                .map(UnitInstance::Aux);
        }

        let mut params = self.resolve_init_params(model)?;
        for (k, v) in extra {
            params.insert(k, v);
        }

        match (&def.factory, expected) {
            (UnitFactory::Base(f), UnitCategory::Base | UnitCategory::Core) => {
                let resources = self.resolve_resources(&def)?;
                let logger = UnitLogger::new(model.unit.clone(), 0);
                f(BaseInit {
                    params,
                    resources,
                    logger,
                })
                .map(UnitInstance::Base)
            }
            (UnitFactory::Admin(f), UnitCategory::Admin) => f(AdminInit {
                params,
                context: self.context(),
            })
            .map(UnitInstance::Admin),
            (factory, _) => Err(Error::CapabilityMismatch {
                name: model.unit.clone(),
                expected: expected.to_string(),
                actual: factory.kind().to_string(),
            }),
        }
    }

    pub fn new_base_unit(&self, model: &UnitModel, extra: Params) -> Result<Box<dyn BaseUnit>> {
        match self.instantiate(model, UnitCategory::Base, extra)? {
            UnitInstance::Base(u) => Ok(u),
            _ => unreachable!("base instantiation yields base instances"),
        }
    }

    pub fn new_admin_unit(&self, model: &UnitModel, extra: Params) -> Result<Box<dyn AdminUnit>> {
        match self.instantiate(model, UnitCategory::Admin, extra)? {
            UnitInstance::Admin(u) => Ok(u),
            _ => unreachable!("admin instantiation yields admin instances"),
        }
    }

    pub fn new_aux_unit(&self, model: &UnitModel, extra: Params) -> Result<Box<dyn AuxUnit>> {
        match self.instantiate(model, UnitCategory::Aux, extra)? {
            UnitInstance::Aux(u) => Ok(u),
            _ => unreachable!("aux instantiation yields aux instances"),
        }
    }

    /// Instantiates a process controller: an admin-category unit with the
    /// specialized constructor contract (config tree, assigned process
    /// list, verbosity).
    pub fn new_controller(
        &self,
        model: &UnitModel,
        processes: Vec<ProcessModel>,
        verbose: u8,
    ) -> Result<Box<dyn ProcessController>> {
        let def = self.resolve_name(&model.unit, Some(UnitCategory::Admin))?;
        let params = self.resolve_init_params(model)?;
        match &def.factory {
            UnitFactory::Controller(f) => f(ControllerInit {
                params,
                context: self.context(),
                processes,
                verbose,
            }),
            other => Err(Error::CapabilityMismatch {
                name: model.unit.clone(),
                expected: "controller".to_string(),
                actual: other.kind().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::registry::UnitRegistryBuilder;
    use serde_json::json;
    use std::sync::Mutex;

    struct Probe {
        name: String,
        params: Params,
        resources: Params,
    }

    impl BaseUnit for Probe {
        fn name(&self) -> &str {
            &self.name
        }
        fn run(&self) -> Result<()> {
            Ok(())
        }
    }

    fn loader_with(config: Value) -> UnitLoader {
        let mut b = UnitRegistryBuilder::new();
        b.register_base("Probe", vec![], |init: BaseInit| {
            Ok(Box::new(Probe {
                name: "Probe".into(),
                params: init.params,
                resources: init.resources,
            }) as Box<dyn BaseUnit>)
        })
        .unwrap();
        b.register_base(
            "NeedsCatalog",
            vec!["catalog".into(), "channel".into()],
            |init: BaseInit| {
                Ok(Box::new(Probe {
                    name: "NeedsCatalog".into(),
                    params: init.params,
                    resources: init.resources,
                }) as Box<dyn BaseUnit>)
            },
        )
        .unwrap();
        struct Nothing;
        impl AuxUnit for Nothing {
            fn name(&self) -> &str {
                "Nothing"
            }
        }
        b.register_aux("Nothing", |_| Ok(Box::new(Nothing) as Box<dyn AuxUnit>))
            .unwrap();

        let mut tree = ConfigTree::new(config).unwrap();
        tree.freeze();
        UnitLoader::new(Arc::new(tree), Arc::new(b.build()))
    }

    #[test]
    fn test_init_params_empty_and_inline() {
        let loader = loader_with(json!({}));
        assert!(loader
            .resolve_init_params(&UnitModel::new("Probe"))
            .unwrap()
            .is_empty());

        let model: UnitModel =
            serde_json::from_value(json!({"unit": "Probe", "config": {"a": 1}})).unwrap();
        assert_eq!(
            loader.resolve_init_params(&model).unwrap().get("a"),
            Some(&json!(1))
        );
    }

    #[test]
    fn test_alias_search_order_t0_t3_t1_t2() {
        let loader = loader_with(json!({
            "alias": {
                "t1": {"x": {"from": "t1"}},
                "t3": {"x": {"from": "t3"}},
                "t2": {"y": {"from": "t2"}}
            }
        }));
        // t3 beats t1 in the fixed search order.
        let model: UnitModel =
            serde_json::from_value(json!({"unit": "Probe", "config": "x"})).unwrap();
        assert_eq!(
            loader.resolve_init_params(&model).unwrap().get("from"),
            Some(&json!("t3"))
        );

        let model: UnitModel =
            serde_json::from_value(json!({"unit": "Probe", "config": "y"})).unwrap();
        assert_eq!(
            loader.resolve_init_params(&model).unwrap().get("from"),
            Some(&json!("t2"))
        );

        let model: UnitModel =
            serde_json::from_value(json!({"unit": "Probe", "config": "absent"})).unwrap();
        assert!(matches!(
            loader.resolve_init_params(&model).unwrap_err(),
            Error::AliasNotFound(_)
        ));
    }

    #[test]
    fn test_confid_lookup() {
        let loader = loader_with(json!({"confid": {"7": {"window": 30}}}));
        let model: UnitModel =
            serde_json::from_value(json!({"unit": "Probe", "config": 7})).unwrap();
        assert_eq!(
            loader.resolve_init_params(&model).unwrap().get("window"),
            Some(&json!(30))
        );

        // A missing id is a structural problem, not an alias miss.
        let model: UnitModel =
            serde_json::from_value(json!({"unit": "Probe", "config": 8})).unwrap();
        assert!(matches!(
            loader.resolve_init_params(&model).unwrap_err(),
            Error::ConfigStructure(_)
        ));
    }

    #[test]
    fn test_non_mapping_alias_in_earlier_tier_is_an_error() {
        // t0 holds the key but with an unusable value: the search must not
        // fall through to the t3 entry.
        let loader = loader_with(json!({
            "alias": {
                "t0": {"x": [1, 2]},
                "t3": {"x": {"from": "t3"}}
            }
        }));
        let model: UnitModel =
            serde_json::from_value(json!({"unit": "Probe", "config": "x"})).unwrap();
        let err = loader.resolve_init_params(&model).unwrap_err();
        assert!(matches!(err, Error::ConfigStructure(_)));
        assert!(err.to_string().contains("t0"));
    }

    #[test]
    fn test_alias_with_override_merge() {
        let loader = loader_with(json!({
            "alias": {"t0": {"default": {"threshold": 5, "window": 30}}}
        }));
        let model: UnitModel = serde_json::from_value(
            json!({"unit": "Probe", "config": "default", "override": {"threshold": 7}}),
        )
        .unwrap();
        let params = loader.resolve_init_params(&model).unwrap();
        assert_eq!(params.get("threshold"), Some(&json!(7)));
        assert_eq!(params.get("window"), Some(&json!(30)));
    }

    #[test]
    fn test_resources_with_channel_special_case() {
        let loader = loader_with(json!({
            "channel": {"HU_RANDOM": {"active": true}},
            "resource": {"catalog": {"uri": "mongodb://x"}}
        }));
        let def = loader.resolve_name("NeedsCatalog", None).unwrap();
        let resources = loader.resolve_resources(&def).unwrap();
        assert_eq!(resources.get("catalog"), Some(&json!({"uri": "mongodb://x"})));
        assert_eq!(
            resources.get("channel"),
            Some(&json!({"HU_RANDOM": {"active": true}}))
        );
    }

    #[test]
    fn test_missing_resource_is_fatal() {
        let loader = loader_with(json!({"channel": {}}));
        let def = loader.resolve_name("NeedsCatalog", None).unwrap();
        assert!(matches!(
            loader.resolve_resources(&def).unwrap_err(),
            Error::ResourceUnavailable(_)
        ));
    }

    #[test]
    fn test_extra_params_win_over_resolved_config() {
        let seen: Arc<Mutex<Params>> = Arc::new(Mutex::new(Params::new()));
        let sink = Arc::clone(&seen);
        let mut b = UnitRegistryBuilder::new();
        b.register_base("Witness", vec![], move |init: BaseInit| {
            *sink.lock().unwrap() = init.params.clone();
            Ok(Box::new(Probe {
                name: "Witness".into(),
                params: init.params,
                resources: Params::new(),
            }) as Box<dyn BaseUnit>)
        })
        .unwrap();
        let mut tree = ConfigTree::new(json!({
            "alias": {"t0": {"default": {"threshold": 5, "window": 30}}}
        }))
        .unwrap();
        tree.freeze();
        let loader = UnitLoader::new(Arc::new(tree), Arc::new(b.build()));

        let model: UnitModel =
            serde_json::from_value(json!({"unit": "Witness", "config": "default"})).unwrap();
        let mut extra = Params::new();
        extra.insert("threshold".into(), json!(9));
        loader.new_base_unit(&model, extra).unwrap();

        let params = seen.lock().unwrap();
        assert_eq!(params.get("threshold"), Some(&json!(9)));
        assert_eq!(params.get("window"), Some(&json!(30)));
    }

    #[test]
    fn test_aux_as_base_fails_category_isolation() {
        let loader = loader_with(json!({}));
        let err = loader
            .new_base_unit(&UnitModel::new("Nothing"), Params::new())
            .err()
            .unwrap();
        assert!(err.is_capability_mismatch());
    }

    #[test]
    fn test_unknown_unit() {
        let loader = loader_with(json!({}));
        assert!(loader
            .new_base_unit(&UnitModel::new("Ghost"), Params::new())
            .err()
            .unwrap()
            .is_unit_not_found());
    }
}
