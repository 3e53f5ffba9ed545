//! Configuration aggregation, canonical tree, secret handling and
//! side-effect-free validation.

pub mod builder;
pub mod collector;
pub mod pwd;
pub mod tree;
pub mod validator;

pub use builder::ConfigBuilder;
pub use collector::SectionCollector;
pub use tree::ConfigTree;
pub use validator::{ConfigValidator, ValidateOptions};
