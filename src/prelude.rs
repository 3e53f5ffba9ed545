// Common Traits and Structs
pub use crate::common::{
    ChannelModel, ProcessModel, Tier, UnitConfig, UnitModel,
};

// Configuration
pub use crate::config::{
    ConfigBuilder, ConfigTree, ConfigValidator, SectionCollector, ValidateOptions,
};

// Units
pub use crate::unit::{
    AdminInit, AdminUnit, AuxInit, AuxRegistry, AuxUnit, BaseInit, BaseUnit, ControllerInit,
    ExecContext, ProcessController, UnitCategory, UnitInstance, UnitLoader, UnitLogger,
    UnitRegistry, UnitRegistryBuilder,
};
pub use crate::unit::builtin::register_builtins;

// Orchestration
pub use crate::controller::{ProcessOrchestrator, RunOptions, ScheduleController, StopOutcome};

// Errors
pub use crate::errors::{Error, Result};

pub mod mappings {
    pub use crate::utils::mappings::{fingerprint, flatten, merge_overrides, unflatten};
}
