use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::contract::{
    AdminInit, AdminUnit, AuxInit, AuxUnit, BaseInit, BaseUnit, ControllerInit, Params,
    ProcessController, UnitCategory,
};
use crate::common::{UnitConfig, UnitModel};
use crate::errors::{Error, Result};

pub type BaseFactory = Arc<dyn Fn(BaseInit) -> Result<Box<dyn BaseUnit>> + Send + Sync>;
pub type AdminFactory = Arc<dyn Fn(AdminInit) -> Result<Box<dyn AdminUnit>> + Send + Sync>;
pub type AuxFactory = Arc<dyn Fn(AuxInit) -> Result<Box<dyn AuxUnit>> + Send + Sync>;
pub type ControllerFactory =
    Arc<dyn Fn(ControllerInit) -> Result<Box<dyn ProcessController>> + Send + Sync>;

/// Constructor reference of a registered unit. The closed set of variants is
/// what makes the capability check a direct interface-satisfaction test.
#[derive(Clone)]
pub enum UnitFactory {
    Base(BaseFactory),
    Admin(AdminFactory),
    /// Admin-category units with the specialized controller constructor
    /// contract (config tree + process list + verbosity).
    Controller(ControllerFactory),
    Aux(AuxFactory),
}

impl UnitFactory {
    pub fn kind(&self) -> &'static str {
        match self {
            UnitFactory::Base(_) => "base",
            UnitFactory::Admin(_) => "admin",
            UnitFactory::Controller(_) => "controller",
            UnitFactory::Aux(_) => "aux",
        }
    }
}

/// One registered loadable implementation. Registered once at registry build
/// time; immutable thereafter.
#[derive(Clone)]
pub struct UnitDefinition {
    pub name: String,
    pub category: UnitCategory,
    /// Resource keys this implementation requires at instantiation.
    pub require: Vec<String>,
    pub factory: UnitFactory,
}

impl fmt::Debug for UnitDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("require", &self.require)
            .field("factory", &self.factory.kind())
            .finish()
    }
}

/// Process-wide auxiliary-unit registry.
///
/// Populated once during single-threaded bootstrap (append-only, write-once
/// per name) and read-only afterwards. Recursive resolution, where an
/// auxiliary unit constructs another auxiliary unit, therefore needs no
/// locking.
/// Auxiliary units can resolve each other through this handle but never
/// units from the other three categories.
pub struct AuxRegistry {
    defs: HashMap<String, Arc<UnitDefinition>>,
}

impl AuxRegistry {
    pub fn get(&self, name: &str) -> Option<&Arc<UnitDefinition>> {
        self.defs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Instantiates an auxiliary unit. Auxiliary configs must be inline
    /// documents; aliases and config ids are not available to them.
    pub fn new_aux_unit(
        self: &Arc<Self>,
        model: &UnitModel,
        extra: Params,
    ) -> Result<Box<dyn AuxUnit>> {
        let def = self
            .get(&model.unit)
            .ok_or_else(|| Error::UnitNotFound(model.unit.clone()))?;

        let mut params = match &model.config {
            None => Params::new(),
            Some(UnitConfig::Inline(m)) => m.clone(),
            Some(_) => {
                return Err(Error::config(format!(
                    "auxiliary unit '{}' cannot use config aliases",
                    model.unit
                )))
            }
        };
        for (k, v) in extra {
            params.insert(k, v);
        }

        match &def.factory {
            UnitFactory::Aux(f) => f(AuxInit {
                params,
                aux: Arc::clone(self),
            }),
            other => Err(Error::CapabilityMismatch {
                name: model.unit.clone(),
                expected: "aux".to_string(),
                actual: other.kind().to_string(),
            }),
        }
    }
}

/// Statically-populated registry builder. Explicit registration calls
/// replace any runtime reflection or symbol lookup by string.
#[derive(Default)]
pub struct UnitRegistryBuilder {
    base: HashMap<String, Arc<UnitDefinition>>,
    admin: HashMap<String, Arc<UnitDefinition>>,
    core: HashMap<String, Arc<UnitDefinition>>,
    aux: HashMap<String, Arc<UnitDefinition>>,
}

impl UnitRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(
        table: &mut HashMap<String, Arc<UnitDefinition>>,
        def: UnitDefinition,
    ) -> Result<()> {
        if table.contains_key(&def.name) {
            return Err(Error::config(format!(
                "unit '{}' already registered in category {}",
                def.name, def.category
            )));
        }
        table.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    pub fn register_base<F>(&mut self, name: &str, require: Vec<String>, f: F) -> Result<()>
    where
        F: Fn(BaseInit) -> Result<Box<dyn BaseUnit>> + Send + Sync + 'static,
    {
        Self::insert(
            &mut self.base,
            UnitDefinition {
                name: name.to_string(),
                category: UnitCategory::Base,
                require,
                factory: UnitFactory::Base(Arc::new(f)),
            },
        )
    }

    /// Core processing units share the base constructor contract.
    pub fn register_core<F>(&mut self, name: &str, require: Vec<String>, f: F) -> Result<()>
    where
        F: Fn(BaseInit) -> Result<Box<dyn BaseUnit>> + Send + Sync + 'static,
    {
        Self::insert(
            &mut self.core,
            UnitDefinition {
                name: name.to_string(),
                category: UnitCategory::Core,
                require,
                factory: UnitFactory::Base(Arc::new(f)),
            },
        )
    }

    pub fn register_admin<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn(AdminInit) -> Result<Box<dyn AdminUnit>> + Send + Sync + 'static,
    {
        Self::insert(
            &mut self.admin,
            UnitDefinition {
                name: name.to_string(),
                category: UnitCategory::Admin,
                require: Vec::new(),
                factory: UnitFactory::Admin(Arc::new(f)),
            },
        )
    }

    /// Controllers live in the admin category table with their specialized
    /// constructor contract.
    pub fn register_controller<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn(ControllerInit) -> Result<Box<dyn ProcessController>> + Send + Sync + 'static,
    {
        Self::insert(
            &mut self.admin,
            UnitDefinition {
                name: name.to_string(),
                category: UnitCategory::Admin,
                require: Vec::new(),
                factory: UnitFactory::Controller(Arc::new(f)),
            },
        )
    }

    pub fn register_aux<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn(AuxInit) -> Result<Box<dyn AuxUnit>> + Send + Sync + 'static,
    {
        Self::insert(
            &mut self.aux,
            UnitDefinition {
                name: name.to_string(),
                category: UnitCategory::Aux,
                require: Vec::new(),
                factory: UnitFactory::Aux(Arc::new(f)),
            },
        )
    }

    pub fn build(self) -> UnitRegistry {
        UnitRegistry {
            base: self.base,
            admin: self.admin,
            core: self.core,
            aux: Arc::new(AuxRegistry { defs: self.aux }),
        }
    }
}

/// The four category tables. Name lookup order is fixed:
/// base, admin, core, auxiliary; first match wins.
pub struct UnitRegistry {
    base: HashMap<String, Arc<UnitDefinition>>,
    admin: HashMap<String, Arc<UnitDefinition>>,
    core: HashMap<String, Arc<UnitDefinition>>,
    aux: Arc<AuxRegistry>,
}

impl UnitRegistry {
    /// Looks up `name` across the category tables. Fails with
    /// [`Error::UnitNotFound`] when absent everywhere, with
    /// [`Error::CapabilityMismatch`] when found but not satisfying
    /// `expected`.
    pub fn resolve_name(
        &self,
        name: &str,
        expected: Option<UnitCategory>,
    ) -> Result<&Arc<UnitDefinition>> {
        let tables = [&self.base, &self.admin, &self.core, &self.aux.defs];
        let def = tables
            .iter()
            .find_map(|t| t.get(name))
            .ok_or_else(|| Error::UnitNotFound(name.to_string()))?;

        if let Some(expected) = expected {
            if !def.category.satisfies(expected) {
                return Err(Error::CapabilityMismatch {
                    name: name.to_string(),
                    expected: expected.to_string(),
                    actual: def.category.to_string(),
                });
            }
        }
        Ok(def)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve_name(name, None).is_ok()
    }

    pub fn aux(&self) -> &Arc<AuxRegistry> {
        &self.aux
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(&'static str);
    impl BaseUnit for Dummy {
        fn name(&self) -> &str {
            self.0
        }
        fn run(&self) -> Result<()> {
            Ok(())
        }
    }
    impl AuxUnit for Dummy {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn registry() -> UnitRegistry {
        let mut b = UnitRegistryBuilder::new();
        b.register_base("Filter", vec![], |_| Ok(Box::new(Dummy("Filter")) as _))
            .unwrap();
        b.register_core("Worker", vec![], |_| Ok(Box::new(Dummy("Worker")) as _))
            .unwrap();
        b.register_aux("Helper", |_| Ok(Box::new(Dummy("Helper")) as _))
            .unwrap();
        b.build()
    }

    #[test]
    fn test_resolution_and_not_found() {
        let r = registry();
        assert_eq!(r.resolve_name("Filter", None).unwrap().category, UnitCategory::Base);
        assert!(matches!(
            r.resolve_name("Nope", None).unwrap_err(),
            Error::UnitNotFound(_)
        ));
    }

    #[test]
    fn test_core_satisfies_base_expectation() {
        let r = registry();
        assert!(r.resolve_name("Worker", Some(UnitCategory::Base)).is_ok());
    }

    #[test]
    fn test_aux_requested_as_base_is_capability_mismatch() {
        let r = registry();
        let err = r
            .resolve_name("Helper", Some(UnitCategory::Base))
            .unwrap_err();
        assert!(err.is_capability_mismatch());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut b = UnitRegistryBuilder::new();
        b.register_aux("Helper", |_| Ok(Box::new(Dummy("Helper")) as _))
            .unwrap();
        assert!(b
            .register_aux("Helper", |_| Ok(Box::new(Dummy("Helper")) as _))
            .is_err());
    }

    #[test]
    fn test_aux_registry_recursive_resolution() {
        let r = Arc::new({
            let mut b = UnitRegistryBuilder::new();
            b.register_aux("Inner", |_| Ok(Box::new(Dummy("Inner")) as _))
                .unwrap();
            b.register_aux("Outer", |init: AuxInit| {
                // An aux unit resolving another aux unit through its handle.
                let inner = init.aux.new_aux_unit(&UnitModel::new("Inner"), Params::new())?;
                assert_eq!(inner.name(), "Inner");
                Ok(Box::new(Dummy("Outer")) as _)
            })
            .unwrap();
            b.build()
        });
        let unit = r
            .aux()
            .new_aux_unit(&UnitModel::new("Outer"), Params::new())
            .unwrap();
        assert_eq!(unit.name(), "Outer");
    }

    #[test]
    fn test_aux_config_alias_forbidden() {
        let r = registry();
        let model = UnitModel::with_config("Helper", UnitConfig::Alias("a".into()));
        assert!(r.aux().new_aux_unit(&model, Params::new()).is_err());
    }
}
