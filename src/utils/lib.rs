pub mod logger;
pub mod mappings;

pub use mappings::{fingerprint, flatten, merge_overrides, unflatten};
