use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque OPC UA node identifier, e.g. `ns=3;s=DB1.Temp` or `ns=2;i=1001`
/// (GLOSSARY). Stored and compared as its canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn symbolic(namespace: u16, path: impl AsRef<str>) -> Self {
        Self(format!("ns={};s={}", namespace, path.as_ref()))
    }

    pub fn numeric(namespace: u16, id: u32) -> Self {
        Self(format!("ns={};i={}", namespace, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
