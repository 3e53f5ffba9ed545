//! Shared domain models of the control-plane.
//!
//! Centralizes the declarative value objects exchanged between the config
//! aggregation tree, the unit resolution engine, and the orchestrator.

pub mod model;

pub use model::{ChannelModel, ProcessModel, Tier, UnitConfig, UnitModel};
