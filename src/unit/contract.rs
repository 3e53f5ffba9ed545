use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::loader::UnitLoader;
use super::registry::{AuxRegistry, UnitRegistry};
use crate::common::ProcessModel;
use crate::config::ConfigTree;
use crate::errors::Result;

/// Init parameter document handed to unit constructors.
pub type Params = Map<String, Value>;

/// The four non-overlapping unit categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitCategory {
    Base,
    Admin,
    Core,
    Aux,
}

impl UnitCategory {
    /// Fixed name-resolution order across category tables; first match wins.
    pub const LOOKUP_ORDER: [UnitCategory; 4] = [
        UnitCategory::Base,
        UnitCategory::Admin,
        UnitCategory::Core,
        UnitCategory::Aux,
    ];

    /// Capability satisfaction: core processing units implement the
    /// base-unit contract; admin and auxiliary units satisfy only their own
    /// category.
    pub fn satisfies(self, expected: UnitCategory) -> bool {
        self == expected || (expected == UnitCategory::Base && self == UnitCategory::Core)
    }
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitCategory::Base => write!(f, "base"),
            UnitCategory::Admin => write!(f, "admin"),
            UnitCategory::Core => write!(f, "core"),
            UnitCategory::Aux => write!(f, "aux"),
        }
    }
}

/// Scoped logger handed to base units; writes through the process-wide
/// `log` facade with the unit name as scope.
#[derive(Debug, Clone)]
pub struct UnitLogger {
    scope: String,
    verbose: u8,
}

impl UnitLogger {
    pub fn new<S: Into<String>>(scope: S, verbose: u8) -> Self {
        Self {
            scope: scope.into(),
            verbose,
        }
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    pub fn info(&self, msg: &str) {
        log::info!(target: "unit", "[{}] {}", self.scope, msg);
    }

    pub fn debug(&self, msg: &str) {
        log::debug!(target: "unit", "[{}] {}", self.scope, msg);
    }

    pub fn warn(&self, msg: &str) {
        log::warn!(target: "unit", "[{}] {}", self.scope, msg);
    }

    pub fn error(&self, msg: &str) {
        log::error!(target: "unit", "[{}] {}", self.scope, msg);
    }
}

/// Shared execution context handed to admin units: read-only config tree
/// plus the unit registry, enough to spawn a loader on demand.
#[derive(Clone)]
pub struct ExecContext {
    pub config: Arc<ConfigTree>,
    pub registry: Arc<UnitRegistry>,
}

impl ExecContext {
    pub fn loader(&self) -> UnitLoader {
        UnitLoader::new(Arc::clone(&self.config), Arc::clone(&self.registry))
    }
}

/// Collaborators injected into base (and core) unit constructors.
pub struct BaseInit {
    pub params: Params,
    /// Resolved entries for every resource key the unit declared required.
    pub resources: Params,
    pub logger: UnitLogger,
}

/// Collaborators injected into admin unit constructors.
pub struct AdminInit {
    pub params: Params,
    pub context: ExecContext,
}

/// Auxiliary units receive no injected collaborators beyond their own
/// parameters and the auxiliary registry itself, so they can resolve other
/// auxiliary units (never units from the other categories).
pub struct AuxInit {
    pub params: Params,
    pub aux: Arc<AuxRegistry>,
}

/// Constructor payload of a process controller.
pub struct ControllerInit {
    pub params: Params,
    pub context: ExecContext,
    pub processes: Vec<ProcessModel>,
    pub verbose: u8,
}

/// Foundational processing capability: does the actual domain work when a
/// controller's schedule fires.
pub trait BaseUnit: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self) -> Result<()>;
}

/// Administrative capability: orchestration-side units operating on the
/// shared execution context rather than on data.
pub trait AdminUnit: Send + Sync {
    fn name(&self) -> &str;
}

/// Auxiliary capability: helper units outside the tiered pipeline.
pub trait AuxUnit: Send + Sync {
    fn name(&self) -> &str;
}

/// Contract consumed by the orchestrator: one instance per controller
/// group, owning the scheduling loop of its assigned processes.
pub trait ProcessController: Send + Sync {
    /// Enters the controller's own scheduling loop (implementations spawn
    /// their background work; the call itself must not block).
    fn schedule_processes(&self) -> Result<()>;

    /// Whether this controller exposes a stop capability. Controllers
    /// without one are tolerated and skipped at shutdown.
    fn can_stop(&self) -> bool {
        false
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }
}
