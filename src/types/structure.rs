use serde::{Deserialize, Serialize};

use super::node_id::NodeId;
use super::variable::Variable;

pub const AREA_NAMES: [&str; 5] = ["Inputs", "Outputs", "Memory", "Timers", "Counters"];

/// A named container of Variables: a global data block, one of the five
/// area elements, or one section of an instance data block
///.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureElement {
    pub display_name: String,
    pub full_path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub node_id: Option<NodeId>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl StructureElement {
    pub fn empty(display_name: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            full_path: full_path.into(),
            node_id: None,
            variables: Vec::new(),
        }
    }

    /// Walks `segments` through nested struct members, returning the `Vec`
    /// that a variable named by the segment *after* these should be
    /// inserted into. An empty `segments` means "this element's own
    /// top-level variables".
    pub fn resolve_container_mut(&mut self, segments: &[&str]) -> Option<&mut Vec<Variable>> {
        descend_variables(&mut self.variables, segments)
    }

    pub fn resolve_container(&self, segments: &[&str]) -> Option<&Vec<Variable>> {
        descend_variables_ref(&self.variables, segments)
    }
}

pub(crate) fn descend_variables<'a>(
    vars: &'a mut Vec<Variable>,
    segments: &[&str],
) -> Option<&'a mut Vec<Variable>> {
    match segments.split_first() {
        None => Some(vars),
        Some((head, rest)) => {
            let var = vars.iter_mut().find(|v| v.display_name.eq_ignore_ascii_case(head))?;
            if !var.is_struct() {
                return None;
            }
            descend_variables(&mut var.struct_members, rest)
        }
    }
}

pub(crate) fn descend_variables_ref<'a>(
    vars: &'a Vec<Variable>,
    segments: &[&str],
) -> Option<&'a Vec<Variable>> {
    match segments.split_first() {
        None => Some(vars),
        Some((head, rest)) => {
            let var = vars.iter().find(|v| v.display_name.eq_ignore_ascii_case(head))?;
            if !var.is_struct() {
                return None;
            }
            descend_variables_ref(&var.struct_members, rest)
        }
    }
}

/// An instance data block's up-to-four named sections.
/// `r#static` is Rust's reserved-word escape for the `Static` section name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDataBlock {
    pub display_name: String,
    pub full_path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub node_id: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input: Option<StructureElement>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<StructureElement>,
    #[serde(rename = "inOut", skip_serializing_if = "Option::is_none", default)]
    pub in_out: Option<StructureElement>,
    #[serde(rename = "static", skip_serializing_if = "Option::is_none", default)]
    pub r#static: Option<StructureElement>,
}

impl InstanceDataBlock {
    pub fn section_mut(&mut self, name: &str) -> Option<&mut StructureElement> {
        match_section_name(name, self)
    }

    pub fn section(&self, name: &str) -> Option<&StructureElement> {
        match name.to_ascii_lowercase().as_str() {
            "input" => self.input.as_ref(),
            "output" => self.output.as_ref(),
            "inout" => self.in_out.as_ref(),
            "static" => self.r#static.as_ref(),
            _ => None,
        }
    }
}

fn match_section_name<'a>(name: &str, idb: &'a mut InstanceDataBlock) -> Option<&'a mut StructureElement> {
    match name.to_ascii_lowercase().as_str() {
        "input" => idb.input.as_mut(),
        "output" => idb.output.as_mut(),
        "inout" => idb.in_out.as_mut(),
        "static" => idb.r#static.as_mut(),
        _ => None,
    }
}

/// Root of the Data Store's address-space tree. Exactly
/// one exists per `DataStore` and is replaced atomically by `set_structure`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreRoot {
    #[serde(rename = "DataBlocksGlobal", default)]
    pub data_blocks_global: Vec<StructureElement>,
    #[serde(rename = "DataBlocksInstance", default)]
    pub data_blocks_instance: Vec<InstanceDataBlock>,
    #[serde(rename = "Inputs", default)]
    pub inputs: Option<StructureElement>,
    #[serde(rename = "Outputs", default)]
    pub outputs: Option<StructureElement>,
    #[serde(rename = "Memory", default)]
    pub memory: Option<StructureElement>,
    #[serde(rename = "Timers", default)]
    pub timers: Option<StructureElement>,
    #[serde(rename = "Counters", default)]
    pub counters: Option<StructureElement>,
}

impl StoreRoot {
    pub fn find_global_db_mut(&mut self, name: &str) -> Option<&mut StructureElement> {
        self.data_blocks_global
            .iter_mut()
            .find(|db| db.display_name.eq_ignore_ascii_case(name))
    }

    pub fn find_global_db(&self, name: &str) -> Option<&StructureElement> {
        self.data_blocks_global
            .iter()
            .find(|db| db.display_name.eq_ignore_ascii_case(name))
    }

    pub fn find_instance_db_mut(&mut self, name: &str) -> Option<&mut InstanceDataBlock> {
        self.data_blocks_instance
            .iter_mut()
            .find(|db| db.display_name.eq_ignore_ascii_case(name))
    }

    pub fn find_instance_db(&self, name: &str) -> Option<&InstanceDataBlock> {
        self.data_blocks_instance
            .iter()
            .find(|db| db.display_name.eq_ignore_ascii_case(name))
    }

    pub fn area_mut(&mut self, name: &str) -> Option<&mut StructureElement> {
        match name.to_ascii_lowercase().as_str() {
            "inputs" => self.inputs.as_mut(),
            "outputs" => self.outputs.as_mut(),
            "memory" => self.memory.as_mut(),
            "timers" => self.timers.as_mut(),
            "counters" => self.counters.as_mut(),
            _ => None,
        }
    }

    pub fn area(&self, name: &str) -> Option<&StructureElement> {
        match name.to_ascii_lowercase().as_str() {
            "inputs" => self.inputs.as_ref(),
            "outputs" => self.outputs.as_ref(),
            "memory" => self.memory.as_ref(),
            "timers" => self.timers.as_ref(),
            "counters" => self.counters.as_ref(),
            _ => None,
        }
    }

    pub fn is_area_name(name: &str) -> bool {
        AREA_NAMES.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Ensures every area slot is materialized: absent area elements
    /// become empty placeholders with their canonical display name.
    pub fn fill_area_placeholders(&mut self) {
        if self.inputs.is_none() {
            self.inputs = Some(StructureElement::empty("Inputs", "Inputs"));
        }
        if self.outputs.is_none() {
            self.outputs = Some(StructureElement::empty("Outputs", "Outputs"));
        }
        if self.memory.is_none() {
            self.memory = Some(StructureElement::empty("Memory", "Memory"));
        }
        if self.timers.is_none() {
            self.timers = Some(StructureElement::empty("Timers", "Timers"));
        }
        if self.counters.is_none() {
            self.counters = Some(StructureElement::empty("Counters", "Counters"));
        }
    }

    /// All populated top-level elements, for discovery/read fan-out.
    pub fn populated_elements(&self) -> Vec<&StructureElement> {
        let mut out: Vec<&StructureElement> = self.data_blocks_global.iter().collect();
        for opt in [&self.inputs, &self.outputs, &self.memory, &self.timers, &self.counters] {
            if let Some(el) = opt {
                out.push(el);
            }
        }
        out
    }
}
