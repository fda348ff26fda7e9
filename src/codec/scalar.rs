//! Identity scalar codecs: booleans, raw bytes/words, integers of every
//! width, floats, and the BCD-flavoured `COUNTER` — these have no
//! S7-specific transcoding quirk, unlike the time family in `time.rs`.

use super::bcd::{decode_bcd12, encode_bcd12};
use super::{Codec, CodecError};
use crate::types::{HostValue, WireValue};

macro_rules! identity_codec {
    ($name:ident, $wire_variant:ident, $wire_ty:ty, $host_variant:ident, $host_ty:ty, $label:literal) => {
        pub struct $name;

        impl Codec for $name {
            fn target_type(&self) -> &'static str {
                $label
            }

            fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
                match wire {
                    WireValue::$wire_variant(v) => Ok(HostValue::$host_variant(*v as $host_ty)),
                    other => Err(CodecError::type_mismatch(format!(
                        "expected {}, got {}",
                        stringify!($wire_variant),
                        other.shape_name()
                    ))),
                }
            }

            fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
                match host {
                    HostValue::$host_variant(v) => Ok(WireValue::$wire_variant(*v as $wire_ty)),
                    other => Err(CodecError::type_mismatch(format!(
                        "expected {}, got {:?}",
                        stringify!($host_variant),
                        other
                    ))),
                }
            }
        }
    };
}

pub struct BoolCodec;
impl Codec for BoolCodec {
    fn target_type(&self) -> &'static str {
        "bool"
    }
    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        match wire {
            WireValue::Bool(b) => Ok(HostValue::Bool(*b)),
            other => Err(CodecError::type_mismatch(format!(
                "expected Bool, got {}",
                other.shape_name()
            ))),
        }
    }
    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        match host {
            HostValue::Bool(b) => Ok(WireValue::Bool(*b)),
            other => Err(CodecError::type_mismatch(format!("expected Bool, got {other:?}"))),
        }
    }
}

/// `BYTE`/`USINT`: an unsigned byte with no further meaning attached.
pub struct RawU8Codec;
impl Codec for RawU8Codec {
    fn target_type(&self) -> &'static str {
        "u8"
    }
    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        match wire {
            WireValue::U8(v) => Ok(HostValue::U16(*v as u16)),
            other => Err(CodecError::type_mismatch(format!(
                "expected U8, got {}",
                other.shape_name()
            ))),
        }
    }
    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        match host {
            HostValue::U16(v) if *v <= u8::MAX as u16 => Ok(WireValue::U8(*v as u8)),
            other => Err(CodecError::type_mismatch(format!(
                "expected a byte-sized value, got {other:?}"
            ))),
        }
    }
}

/// `CHAR`: identity; encode also accepts a raw 8-bit code point
///.
pub struct CharCodec;
impl Codec for CharCodec {
    fn target_type(&self) -> &'static str {
        "char"
    }
    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        match wire {
            WireValue::U8(v) => Ok(HostValue::Char(*v as char)),
            other => Err(CodecError::type_mismatch(format!(
                "expected U8, got {}",
                other.shape_name()
            ))),
        }
    }
    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        match host {
            HostValue::Char(c) if (*c as u32) <= 0xFF => Ok(WireValue::U8(*c as u8)),
            HostValue::U16(v) if *v <= 0xFF => Ok(WireValue::U8(*v as u8)),
            other => Err(CodecError::type_mismatch(format!(
                "expected an 8-bit code point, got {other:?}"
            ))),
        }
    }
}

/// `WCHAR`: identity over a 16-bit code point.
pub struct WCharCodec;
impl Codec for WCharCodec {
    fn target_type(&self) -> &'static str {
        "char"
    }
    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        match wire {
            WireValue::U16(v) => char::from_u32(*v as u32)
                .map(HostValue::Char)
                .ok_or_else(|| CodecError::type_mismatch(format!("0x{v:04X} is not a valid code point"))),
            other => Err(CodecError::type_mismatch(format!(
                "expected U16, got {}",
                other.shape_name()
            ))),
        }
    }
    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        match host {
            HostValue::Char(c) => Ok(WireValue::U16(*c as u32 as u16)),
            other => Err(CodecError::type_mismatch(format!("expected Char, got {other:?}"))),
        }
    }
}

identity_codec!(I8Codec, I8, i8, I32, i32, "i32");
identity_codec!(I16Codec, I16, i16, I32, i32, "i32");
identity_codec!(I32Codec, I32, i32, I32, i32, "i32");
identity_codec!(I64Codec, I64, i64, I64, i64, "i64");
identity_codec!(U16Codec, U16, u16, U16, u16, "u16");
identity_codec!(U32Codec, U32, u32, I64, i64, "i64");
identity_codec!(U64Codec, U64, u64, I64, i64, "i64");
identity_codec!(F32Codec, F32, f32, F32, f32, "f32");
identity_codec!(F64Codec, F64, f64, F64, f64, "f64");

/// `COUNTER`: upper 4 bits ignored on decode; lower 12 bits are a
/// three-digit BCD magnitude 0-999.
pub struct CounterCodec;
impl Codec for CounterCodec {
    fn target_type(&self) -> &'static str {
        "u16"
    }
    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        match wire {
            WireValue::U16(v) => decode_bcd12(v & 0x0FFF).map(HostValue::U16),
            other => Err(CodecError::type_mismatch(format!(
                "expected U16, got {}",
                other.shape_name()
            ))),
        }
    }
    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        match host {
            HostValue::U16(v) => encode_bcd12(*v).map(WireValue::U16),
            other => Err(CodecError::type_mismatch(format!("expected U16, got {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_encodes_concrete_scenarios() {
        let c = CounterCodec;
        assert_eq!(c.encode(&HostValue::U16(999)).unwrap(), WireValue::U16(0x0999));
        assert!(c.encode(&HostValue::U16(1000)).is_err());
    }

    #[test]
    fn counter_ignores_upper_nibble_on_decode() {
        let c = CounterCodec;
        let decoded = c.decode(&WireValue::U16(0xF456)).unwrap();
        assert_eq!(decoded, HostValue::U16(456));
    }

    #[test]
    fn char_encode_accepts_code_point_or_raw_byte() {
        let c = CharCodec;
        assert_eq!(c.encode(&HostValue::Char('A')).unwrap(), WireValue::U8(65));
        assert_eq!(c.encode(&HostValue::U16(65)).unwrap(), WireValue::U8(65));
    }
}
