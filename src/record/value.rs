use std::cmp::Ordering;

use super::error::{RecordError, RecordResult};

/// Column data type with a fixed on-disk size
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Int,         // 4 bytes
    Float,       // 8 bytes
    Char(usize), // n bytes, fixed length
}

impl DataType {
    /// Size in bytes of a serialized value of this type
    pub fn size(&self) -> usize {
        match self {
            DataType::Int => 4,
            DataType::Float => 8,
            DataType::Char(n) => *n,
        }
    }
}

/// A single column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f64),
    String(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compare two values of the same type. NULL and mixed types are
    /// incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Serialize to the fixed width of `data_type`; strings are zero-padded
    pub fn serialize(&self, data_type: &DataType) -> RecordResult<Vec<u8>> {
        match (self, data_type) {
            (Value::Int(i), DataType::Int) => Ok(i.to_le_bytes().to_vec()),
            (Value::Float(f), DataType::Float) => Ok(f.to_le_bytes().to_vec()),
            (Value::String(s), DataType::Char(max_len)) => {
                let bytes = s.as_bytes();
                if bytes.len() > *max_len {
                    return Err(RecordError::Serialization(format!(
                        "String length {} exceeds max length {}",
                        bytes.len(),
                        max_len
                    )));
                }
                let mut result = vec![0u8; *max_len];
                result[..bytes.len()].copy_from_slice(bytes);
                Ok(result)
            }
            (Value::Null, _) => Ok(vec![0u8; data_type.size()]),
            _ => Err(RecordError::TypeMismatch {
                expected: format!("{:?}", data_type),
                actual: format!("{:?}", self),
            }),
        }
    }

    pub fn deserialize(bytes: &[u8], data_type: &DataType, is_null: bool) -> RecordResult<Self> {
        if is_null {
            return Ok(Value::Null);
        }

        match data_type {
            DataType::Int => {
                let buf: [u8; 4] = bytes.try_into().map_err(|_| {
                    RecordError::Deserialization(format!(
                        "Expected 4 bytes for INT, got {}",
                        bytes.len()
                    ))
                })?;
                Ok(Value::Int(i32::from_le_bytes(buf)))
            }
            DataType::Float => {
                let buf: [u8; 8] = bytes.try_into().map_err(|_| {
                    RecordError::Deserialization(format!(
                        "Expected 8 bytes for FLOAT, got {}",
                        bytes.len()
                    ))
                })?;
                Ok(Value::Float(f64::from_le_bytes(buf)))
            }
            DataType::Char(max_len) => {
                if bytes.len() != *max_len {
                    return Err(RecordError::Deserialization(format!(
                        "Expected {} bytes for CHAR({}), got {}",
                        max_len,
                        max_len,
                        bytes.len()
                    )));
                }
                // Stored strings are zero-terminated within the fixed field.
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let s = String::from_utf8(bytes[..end].to_vec())
                    .map_err(|e| RecordError::Deserialization(format!("Invalid UTF-8: {}", e)))?;
                Ok(Value::String(s))
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Null => write!(f, "NULL"),
        }
    }
}
