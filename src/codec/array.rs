//! The element-wise array/matrix lifting meta-converter. Wraps an inner
//! element codec so any scalar S7 type also has an "ordered sequence of T"
//! and "2-D matrix of T" codec.
//!
//! The wire side already distinguishes `WireValue::Array` (one dimension)
//! from `WireValue::Matrix` (rows already sliced) rather than handing this
//! codec one flattened buffer to chunk itself — the OPC UA seam
//! (`src/opcua.rs`) is responsible for that slicing when it builds the
//! `WireValue` from the raw protocol payload.

use std::sync::Arc;

use super::{Codec, CodecError};
use crate::types::{HostValue, WireValue};

pub struct ArrayCodec {
    inner: Arc<dyn Codec>,
}

impl ArrayCodec {
    pub fn new(inner: Arc<dyn Codec>) -> Self {
        Self { inner }
    }
}

impl Codec for ArrayCodec {
    fn target_type(&self) -> &'static str {
        "Array"
    }

    fn decode(&self, wire: &WireValue) -> Result<HostValue, CodecError> {
        match wire {
            WireValue::Null => Ok(HostValue::Array(Vec::new())),
            WireValue::Array(items) => items
                .iter()
                .map(|w| self.inner.decode(w))
                .collect::<Result<Vec<_>, _>>()
                .map(HostValue::Array),
            WireValue::Matrix(rows) => rows
                .iter()
                .map(|row| row.iter().map(|w| self.inner.decode(w)).collect::<Result<Vec<_>, _>>())
                .collect::<Result<Vec<_>, _>>()
                .map(HostValue::Matrix),
            other => Err(CodecError::type_mismatch(format!(
                "expected Array or Matrix, got {}",
                other.shape_name()
            ))),
        }
    }

    fn encode(&self, host: &HostValue) -> Result<WireValue, CodecError> {
        match host {
            HostValue::Array(items) => {
                if items.is_empty() {
                    return Ok(WireValue::Null);
                }
                let encoded = items
                    .iter()
                    .map(|h| self.inner.encode(h))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(WireValue::Array(encoded))
            }
            HostValue::Matrix(rows) => {
                if rows.is_empty() {
                    return Ok(WireValue::Null);
                }
                let row_len = rows[0].len();
                if rows.iter().any(|r| r.len() != row_len) {
                    return Err(CodecError::type_mismatch("matrix rows have inconsistent length"));
                }
                let out = rows
                    .iter()
                    .map(|row| row.iter().map(|h| self.inner.encode(h)).collect::<Result<Vec<_>, _>>())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(WireValue::Matrix(out))
            }
            other => Err(CodecError::type_mismatch(format!(
                "expected an Array or Matrix host value, got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::scalar::I16Codec;

    #[test]
    fn one_dimensional_round_trip() {
        let codec = ArrayCodec::new(Arc::new(I16Codec));
        let host = HostValue::Array(vec![HostValue::I32(1), HostValue::I32(2), HostValue::I32(3)]);
        let wire = codec.encode(&host).unwrap();
        assert_eq!(wire, WireValue::Array(vec![WireValue::I16(1), WireValue::I16(2), WireValue::I16(3)]));
        assert_eq!(codec.decode(&wire).unwrap(), host);
    }

    #[test]
    fn matrix_round_trip() {
        let codec = ArrayCodec::new(Arc::new(I16Codec));
        let host = HostValue::Matrix(vec![
            vec![HostValue::I32(1), HostValue::I32(2)],
            vec![HostValue::I32(3), HostValue::I32(4)],
        ]);
        let wire = codec.encode(&host).unwrap();
        assert_eq!(
            wire,
            WireValue::Matrix(vec![
                vec![WireValue::I16(1), WireValue::I16(2)],
                vec![WireValue::I16(3), WireValue::I16(4)],
            ])
        );
        assert_eq!(codec.decode(&wire).unwrap(), host);
    }

    #[test]
    fn empty_sequence_encodes_to_null() {
        let codec = ArrayCodec::new(Arc::new(I16Codec));
        assert_eq!(codec.encode(&HostValue::Array(vec![])).unwrap(), WireValue::Null);
    }

    #[test]
    fn ragged_matrix_is_rejected() {
        let codec = ArrayCodec::new(Arc::new(I16Codec));
        let host = HostValue::Matrix(vec![
            vec![HostValue::I32(1), HostValue::I32(2)],
            vec![HostValue::I32(3)],
        ]);
        assert!(codec.encode(&host).is_err());
    }
}
