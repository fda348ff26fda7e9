use serde::{Deserialize, Serialize};

/// Tri-state classification of a variable's last read/push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    Good,
    Bad,
    Uncertain,
}

/// Quality plus the raw OPC UA status code it was classified from, so
/// diagnostics keep the numeric detail the classification discards
///.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableQuality {
    pub quality: Quality,
    pub code: u32,
    pub symbol: String,
}

impl VariableQuality {
    pub fn good() -> Self {
        Self {
            quality: Quality::Good,
            code: 0,
            symbol: "Good".to_string(),
        }
    }

    pub fn from_status(code: u32, symbol: impl Into<String>) -> Self {
        let quality = if code == 0 {
            Quality::Good
        } else if code & 0x8000_0000 != 0 {
            Quality::Bad
        } else {
            Quality::Uncertain
        };
        Self {
            quality,
            code,
            symbol: symbol.into(),
        }
    }
}

impl Default for VariableQuality {
    fn default() -> Self {
        Self::good()
    }
}
