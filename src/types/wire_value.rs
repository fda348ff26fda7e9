use serde::{Deserialize, Serialize};

/// The untyped value shapes the OPC UA stack can hand back: signed/unsigned
/// integers of every width the S7 scalar table needs, a raw byte sequence
/// (BCD/DTL payloads), an extension object, and one/two-dimensional
/// collections of any of the above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum WireValue {
    /// An explicit wire-level null, distinct from "no value was read at
    /// all" (which is modelled as `Option::None` one layer up). Produced
    /// when the array codec encodes an empty sequence.
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
    ExtensionObject { type_id: String, body: Vec<u8> },
    Array(Vec<WireValue>),
    Matrix(Vec<Vec<WireValue>>),
}

impl WireValue {
    pub fn shape_name(&self) -> &'static str {
        match self {
            WireValue::Null => "Null",
            WireValue::Bool(_) => "Bool",
            WireValue::I8(_) => "I8",
            WireValue::U8(_) => "U8",
            WireValue::I16(_) => "I16",
            WireValue::U16(_) => "U16",
            WireValue::I32(_) => "I32",
            WireValue::U32(_) => "U32",
            WireValue::I64(_) => "I64",
            WireValue::U64(_) => "U64",
            WireValue::F32(_) => "F32",
            WireValue::F64(_) => "F64",
            WireValue::Bytes(_) => "Bytes",
            WireValue::ExtensionObject { .. } => "ExtensionObject",
            WireValue::Array(_) => "Array",
            WireValue::Matrix(_) => "Matrix",
        }
    }
}

/// The host-language value a codec produces. Durations are
/// carried as signed nanoseconds rather than a `chrono::Duration` so the
/// whole enum derives `Serialize`/`Deserialize` without a hand-rolled impl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum HostValue {
    Bool(bool),
    Char(char),
    U16(u16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Date(chrono::NaiveDate),
    DurationNanos(i64),
    DateTime(chrono::NaiveDateTime),
    Array(Vec<HostValue>),
    Matrix(Vec<Vec<HostValue>>),
    /// The value as received, unconverted. Produced by the pass-through
    /// codec used while a variable's `s7_type` is still `Unknown`
    ///.
    Raw(WireValue),
}

impl HostValue {
    /// Structural equality used by the read-cycle diff:
    /// sequences compare element-wise, everything else by value equality.
    pub fn changed_from(&self, other: &HostValue) -> bool {
        match (self, other) {
            (HostValue::Array(a), HostValue::Array(b)) => {
                a.len() != b.len() || a.iter().zip(b).any(|(x, y)| x.changed_from(y))
            }
            (HostValue::Matrix(a), HostValue::Matrix(b)) => {
                a.len() != b.len()
                    || a.iter().zip(b).any(|(ra, rb)| {
                        ra.len() != rb.len() || ra.iter().zip(rb).any(|(x, y)| x.changed_from(y))
                    })
            }
            _ => self != other,
        }
    }
}
