//! The Type Codec Registry: bidirectional converters
//! between S7 wire representations and host values, selected by
//! `S7DataType`, plus the array/matrix lifting meta-converter.

mod array;
mod bcd;
mod scalar;
mod string_codec;
mod time;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{HostValue, S7DataType, WireValue};

pub use array::ArrayCodec;

/// Codec failures are returned, never panicked. The
/// caller (store/service layer) attaches the path before logging or
/// surfacing an `S7ClientError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    TypeMismatch(String),
    OutOfRange(String),
}

impl CodecError {
    pub fn type_mismatch(detail: impl Into<String>) -> Self {
        CodecError::TypeMismatch(detail.into())
    }

    pub fn out_of_range(detail: impl Into<String>) -> Self {
        CodecError::OutOfRange(detail.into())
    }

    pub fn detail(&self) -> &str {
        match self {
            CodecError::TypeMismatch(d) | CodecError::OutOfRange(d) => d,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::TypeMismatch(d) => write!(f, "type mismatch: {d}"),
            CodecError::OutOfRange(d) => write!(f, "out of range: {d}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// A bidirectional converter for one S7 data type.
pub trait Codec: Send + Sync {
    fn target_type(&self) -> &'static str;
    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError>;
    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError>;
}

struct PassthroughCodec;

impl Codec for PassthroughCodec {
    fn target_type(&self) -> &'static str {
        "Raw"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        Ok(HostValue::Raw(wire.clone()))
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        match host {
            HostValue::Raw(w) => Ok(w.clone()),
            other => Err(CodecError::type_mismatch(format!(
                "expected a raw pass-through value, got {other:?}"
            ))),
        }
    }
}

/// A mapping from `S7DataType` to codec, with a pass-through default for
/// `Unknown`. Cheaply cloneable; intended to be built
/// once and shared.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<S7DataType, Arc<dyn Codec>>,
    passthrough: Arc<dyn Codec>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("registered_types", &self.codecs.len())
            .finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        let mut codecs: HashMap<S7DataType, Arc<dyn Codec>> = HashMap::new();

        codecs.insert(S7DataType::Bool, Arc::new(scalar::BoolCodec));
        codecs.insert(S7DataType::Byte, Arc::new(scalar::RawU8Codec));
        codecs.insert(S7DataType::Char, Arc::new(scalar::CharCodec));
        codecs.insert(S7DataType::WChar, Arc::new(scalar::WCharCodec));
        codecs.insert(S7DataType::Word, Arc::new(scalar::U16Codec));
        codecs.insert(S7DataType::DWord, Arc::new(scalar::U32Codec));
        codecs.insert(S7DataType::LWord, Arc::new(scalar::U64Codec));
        codecs.insert(S7DataType::SInt, Arc::new(scalar::I8Codec));
        codecs.insert(S7DataType::USInt, Arc::new(scalar::RawU8Codec));
        codecs.insert(S7DataType::Int, Arc::new(scalar::I16Codec));
        codecs.insert(S7DataType::UInt, Arc::new(scalar::U16Codec));
        codecs.insert(S7DataType::DInt, Arc::new(scalar::I32Codec));
        codecs.insert(S7DataType::UDInt, Arc::new(scalar::U32Codec));
        codecs.insert(S7DataType::LInt, Arc::new(scalar::I64Codec));
        codecs.insert(S7DataType::ULInt, Arc::new(scalar::U64Codec));
        codecs.insert(S7DataType::Real, Arc::new(scalar::F32Codec));
        codecs.insert(S7DataType::LReal, Arc::new(scalar::F64Codec));
        codecs.insert(S7DataType::Counter, Arc::new(scalar::CounterCodec));
        codecs.insert(S7DataType::S5Time, Arc::new(time::S5TimeCodec));
        codecs.insert(S7DataType::Time, Arc::new(time::TimeCodec));
        codecs.insert(S7DataType::LTime, Arc::new(time::LTimeCodec));
        codecs.insert(S7DataType::TimeOfDay, Arc::new(time::TimeOfDayCodec));
        codecs.insert(S7DataType::LTimeOfDay, Arc::new(time::LTimeOfDayCodec));
        codecs.insert(S7DataType::Date, Arc::new(time::DateCodec));
        codecs.insert(S7DataType::DateAndTime, Arc::new(time::DateAndTimeCodec));
        codecs.insert(S7DataType::Dtl, Arc::new(time::DtlCodec));
        codecs.insert(S7DataType::String, Arc::new(string_codec::StringCodec::default()));
        codecs.insert(S7DataType::WString, Arc::new(string_codec::WStringCodec::default()));

        Self {
            codecs,
            passthrough: Arc::new(PassthroughCodec),
        }
    }

    /// Selector: returns the pass-through codec for `Unknown` (and for any
    /// type with no registered converter) so values keep flowing until
    /// the variable is re-typed.
    pub fn get(&self, s7_type: S7DataType) -> Arc<dyn Codec> {
        if s7_type == S7DataType::Unknown {
            return self.passthrough.clone();
        }
        self.codecs
            .get(&s7_type)
            .cloned()
            .unwrap_or_else(|| self.passthrough.clone())
    }

    /// Wraps the element codec for `s7_type` as an array/matrix codec
    ///.
    pub fn array_of(&self, s7_type: S7DataType) -> ArrayCodec {
        ArrayCodec::new(self.get(s7_type))
    }

    pub fn decode(&self, s7_type: S7DataType, wire: Option<&WireValue>) -> Result<Option<HostValue>, CodecError> {
        match wire {
            None => Ok(None),
            Some(w) => self.get(s7_type).decode(w).map(Some),
        }
    }

    pub fn encode(&self, s7_type: S7DataType, host: Option<&HostValue>) -> Result<Option<WireValue>, CodecError> {
        match host {
            None => Ok(None),
            Some(h) => self.get(s7_type).encode(h).map(Some),
        }
    }
}
