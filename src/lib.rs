//! stratum: single-package entry point.
//! Control-plane components are embedded as local modules under `src/`.

pub mod prelude;

#[path = "common/lib.rs"]
pub mod common;
#[path = "config/lib.rs"]
pub mod config;
#[path = "controller/lib.rs"]
pub mod controller;
#[path = "errors/lib.rs"]
pub mod errors;
#[path = "unit/lib.rs"]
pub mod unit;
#[path = "utils/lib.rs"]
pub mod utils;
