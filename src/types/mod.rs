//! The address-space data model: `Variable`, the
//! structural containers it lives in, and the wire/host value shapes the
//! Type Codec Registry converts between.

mod node_id;
mod quality;
mod s7_type;
mod structure;
mod variable;
mod wire_value;

pub use node_id::NodeId;
pub use quality::{Quality, VariableQuality};
pub use s7_type::S7DataType;
pub use structure::{InstanceDataBlock, StoreRoot, StructureElement, AREA_NAMES};
pub use variable::{path_key, AccessLevel, Variable};
pub use wire_value::{HostValue, WireValue};
