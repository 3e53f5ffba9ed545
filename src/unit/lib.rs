//! Unit resolution & instantiation engine: the single source of truth
//! mapping symbolic unit names to statically-registered factories across
//! four capability categories.

pub mod builtin;
pub mod contract;
pub mod loader;
pub mod registry;

pub use contract::{
    AdminInit, AdminUnit, AuxInit, AuxUnit, BaseInit, BaseUnit, ControllerInit, ExecContext,
    ProcessController, UnitCategory, UnitLogger,
};
pub use loader::{UnitInstance, UnitLoader};
pub use registry::{AuxRegistry, UnitDefinition, UnitFactory, UnitRegistry, UnitRegistryBuilder};
