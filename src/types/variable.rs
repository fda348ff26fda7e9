use serde::{Deserialize, Serialize};

use super::node_id::NodeId;
use super::quality::VariableQuality;
use super::s7_type::S7DataType;
use super::wire_value::{HostValue, WireValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    ReadOnly,
    ReadWrite,
}

/// The fundamental tag. `full_path` is the canonical
/// identity key within one store snapshot and is compared
/// case-insensitively everywhere (`Variable::path_key`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub display_name: String,
    pub full_path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub node_id: Option<NodeId>,
    pub s7_type: S7DataType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub system_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw_wire_value: Option<WireValue>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<HostValue>,
    pub quality: VariableQuality,
    pub is_subscribed: bool,
    pub sampling_interval_ms: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub struct_members: Vec<Variable>,
    pub access_level: AccessLevel,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

impl Variable {
    pub fn new(display_name: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            full_path: full_path.into(),
            node_id: None,
            s7_type: S7DataType::Unknown,
            system_type: None,
            raw_wire_value: None,
            value: None,
            quality: VariableQuality::good(),
            is_subscribed: false,
            sampling_interval_ms: 1000,
            struct_members: Vec::new(),
            access_level: AccessLevel::ReadWrite,
            description: None,
        }
    }

    /// Case-insensitive cache key for this variable's `full_path`
    ///.
    pub fn path_key(&self) -> String {
        self.full_path.to_ascii_lowercase()
    }

    pub fn is_struct(&self) -> bool {
        self.s7_type == S7DataType::Struct
    }
}

pub fn path_key(path: &str) -> String {
    path.to_ascii_lowercase()
}
