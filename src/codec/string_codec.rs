//! `STRING`/`WSTRING`: a small header of declared/actual length followed by
//! the character payload. Kept apart from `scalar.rs` because, unlike those
//! identity conversions, the header framing is S7-specific.
//!
//! The registry's default instances cap the payload at 254 elements (the
//! largest length an S7 `STRING`/`WSTRING` header byte can declare); a
//! variable discovered with a different declared max-length can be given
//! its own codec instance via `with_max_length`.

use super::{Codec, CodecError};
use crate::types::{HostValue, WireValue};

const DEFAULT_MAX_LENGTH: usize = 254;

pub struct StringCodec {
    max_length: usize,
}

impl StringCodec {
    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for StringCodec {
    fn default() -> Self {
        Self::with_max_length(DEFAULT_MAX_LENGTH)
    }
}

impl Codec for StringCodec {
    fn target_type(&self) -> &'static str {
        "String"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        let bytes = match wire {
            WireValue::Bytes(b) => b,
            other => {
                return Err(CodecError::type_mismatch(format!(
                    "expected Bytes, got {}",
                    other.shape_name()
                )))
            }
        };
        if bytes.len() < 2 {
            return Err(CodecError::type_mismatch("STRING payload needs a 2-byte header"));
        }
        let current_len = bytes[1] as usize;
        let payload = bytes.get(2..2 + current_len).ok_or_else(|| {
            CodecError::type_mismatch(format!(
                "declared length {current_len} exceeds the {} payload bytes available",
                bytes.len() - 2
            ))
        })?;
        let text: String = payload.iter().map(|&b| b as char).collect();
        Ok(HostValue::String(text))
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        let text = match host {
            HostValue::String(s) => s,
            other => return Err(CodecError::type_mismatch(format!("expected String, got {other:?}"))),
        };
        if text.chars().any(|c| c as u32 > 0xFF) {
            return Err(CodecError::type_mismatch("STRING cannot carry a code point above 0xFF"));
        }
        if text.chars().count() > self.max_length {
            return Err(CodecError::out_of_range(format!(
                "{} characters exceeds the declared max length {}",
                text.chars().count(),
                self.max_length
            )));
        }
        let mut bytes = vec![self.max_length as u8, text.chars().count() as u8];
        bytes.extend(text.chars().map(|c| c as u8));
        Ok(WireValue::Bytes(bytes))
    }
}

pub struct WStringCodec {
    max_length: usize,
}

impl WStringCodec {
    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for WStringCodec {
    fn default() -> Self {
        Self::with_max_length(DEFAULT_MAX_LENGTH)
    }
}

impl Codec for WStringCodec {
    fn target_type(&self) -> &'static str {
        "String"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        let bytes = match wire {
            WireValue::Bytes(b) => b,
            other => {
                return Err(CodecError::type_mismatch(format!(
                    "expected Bytes, got {}",
                    other.shape_name()
                )))
            }
        };
        if bytes.len() < 4 {
            return Err(CodecError::type_mismatch("WSTRING payload needs a 4-byte header"));
        }
        let current_len = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        let payload = bytes.get(4..4 + current_len * 2).ok_or_else(|| {
            CodecError::type_mismatch(format!("declared length {current_len} exceeds the payload available"))
        })?;
        let units: Vec<u16> = payload.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        let text = String::from_utf16(&units)
            .map_err(|e| CodecError::type_mismatch(format!("invalid UTF-16 payload: {e}")))?;
        Ok(HostValue::String(text))
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        let text = match host {
            HostValue::String(s) => s,
            other => return Err(CodecError::type_mismatch(format!("expected String, got {other:?}"))),
        };
        let units: Vec<u16> = text.encode_utf16().collect();
        if units.len() > self.max_length {
            return Err(CodecError::out_of_range(format!(
                "{} units exceeds the declared max length {}",
                units.len(),
                self.max_length
            )));
        }
        let mut bytes = Vec::with_capacity(4 + units.len() * 2);
        bytes.extend_from_slice(&(self.max_length as u16).to_le_bytes());
        bytes.extend_from_slice(&(units.len() as u16).to_le_bytes());
        for u in units {
            bytes.extend_from_slice(&u.to_le_bytes());
        }
        Ok(WireValue::Bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trips() {
        let codec = StringCodec::default();
        let wire = codec.encode(&HostValue::String("Hi".to_string())).unwrap();
        assert_eq!(codec.decode(&wire).unwrap(), HostValue::String("Hi".to_string()));
    }

    #[test]
    fn wstring_round_trips_non_ascii() {
        let codec = WStringCodec::default();
        let wire = codec.encode(&HostValue::String("caf\u{e9}".to_string())).unwrap();
        assert_eq!(codec.decode(&wire).unwrap(), HostValue::String("caf\u{e9}".to_string()));
    }

    #[test]
    fn string_rejects_over_max_length() {
        let codec = StringCodec::with_max_length(2);
        assert!(codec.encode(&HostValue::String("abc".to_string())).is_err());
    }
}
