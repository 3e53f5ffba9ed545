use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

/// Named scope (a logical data stream) that processes and units may be
/// restricted to. An inactive channel propagates `active = false` to every
/// process it contributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelModel {
    #[serde(alias = "channel")]
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distrib: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}
