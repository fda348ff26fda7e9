use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of S7 data types this crate understands (GLOSSARY).
/// `Unknown` is the pass-through marker used before a variable's real type
/// has been established by `update_variable_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum S7DataType {
    Bool,
    Byte,
    Char,
    Word,
    DWord,
    LWord,
    WChar,
    SInt,
    USInt,
    Int,
    UInt,
    DInt,
    UDInt,
    LInt,
    ULInt,
    Real,
    LReal,
    String,
    WString,
    S5Time,
    Time,
    LTime,
    TimeOfDay,
    LTimeOfDay,
    Date,
    DateAndTime,
    Dtl,
    Counter,
    Struct,
    Unknown,
}

impl fmt::Display for S7DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            S7DataType::Bool => "BOOL",
            S7DataType::Byte => "BYTE",
            S7DataType::Char => "CHAR",
            S7DataType::Word => "WORD",
            S7DataType::DWord => "DWORD",
            S7DataType::LWord => "LWORD",
            S7DataType::WChar => "WCHAR",
            S7DataType::SInt => "SINT",
            S7DataType::USInt => "USINT",
            S7DataType::Int => "INT",
            S7DataType::UInt => "UINT",
            S7DataType::DInt => "DINT",
            S7DataType::UDInt => "UDINT",
            S7DataType::LInt => "LINT",
            S7DataType::ULInt => "ULINT",
            S7DataType::Real => "REAL",
            S7DataType::LReal => "LREAL",
            S7DataType::String => "STRING",
            S7DataType::WString => "WSTRING",
            S7DataType::S5Time => "S5TIME",
            S7DataType::Time => "TIME",
            S7DataType::LTime => "LTIME",
            S7DataType::TimeOfDay => "TIME_OF_DAY",
            S7DataType::LTimeOfDay => "LTIME_OF_DAY",
            S7DataType::Date => "DATE",
            S7DataType::DateAndTime => "DATE_AND_TIME",
            S7DataType::Dtl => "DTL",
            S7DataType::Counter => "COUNTER",
            S7DataType::Struct => "STRUCT",
            S7DataType::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}
