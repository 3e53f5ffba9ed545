pub mod channel;
pub mod process_model;
pub mod tier;
pub mod unit_model;

pub use channel::ChannelModel;
pub use process_model::ProcessModel;
pub use tier::Tier;
pub use unit_model::{UnitConfig, UnitModel};
