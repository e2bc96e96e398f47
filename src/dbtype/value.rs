use std::cmp::Ordering;

use crate::catalog::column::DataType;

/// A single column value. `Null` never reaches disk: it only exists at
/// runtime as the identity of Min/Max aggregates and as their result over
/// empty groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
}

impl Value {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::TinyInt(_) => Some(DataType::TinyInt),
            Value::SmallInt(_) => Some(DataType::SmallInt),
            Value::Integer(_) => Some(DataType::Integer),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn from_bytes(bytes: &[u8], data_type: DataType) -> Self {
        assert_eq!(bytes.len(), data_type.size());
        match data_type {
            DataType::Boolean => Value::Boolean(bytes[0] != 0),
            DataType::TinyInt => Value::TinyInt(i8::from_ne_bytes(bytes.try_into().unwrap())),
            DataType::SmallInt => Value::SmallInt(i16::from_ne_bytes(bytes.try_into().unwrap())),
            DataType::Integer => Value::Integer(i32::from_ne_bytes(bytes.try_into().unwrap())),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Value::Null => panic!("null values have no storage representation"),
            Value::Boolean(v) => vec![*v as u8],
            Value::TinyInt(v) => v.to_ne_bytes().to_vec(),
            Value::SmallInt(v) => v.to_ne_bytes().to_vec(),
            Value::Integer(v) => v.to_ne_bytes().to_vec(),
        }
    }

    /// Numeric view used by comparisons, arithmetic and index keys.
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Null => panic!("null has no numeric value"),
            Value::Boolean(v) => *v as i64,
            Value::TinyInt(v) => *v as i64,
            Value::SmallInt(v) => *v as i64,
            Value::Integer(v) => *v as i64,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Boolean(v) => *v,
            other => panic!("{:?} is not a boolean", other),
        }
    }

    /// Order two non-null values numerically (booleans as 0/1).
    pub fn compare(&self, other: &Value) -> Ordering {
        self.as_i64().cmp(&other.as_i64())
    }

    /// Integer addition, widening to the left operand's type.
    pub fn add(&self, other: &Value) -> Value {
        let sum = self.as_i64() + other.as_i64();
        match self {
            Value::TinyInt(_) => Value::TinyInt(sum as i8),
            Value::SmallInt(_) => Value::SmallInt(sum as i16),
            Value::Integer(_) => Value::Integer(sum as i32),
            other => panic!("cannot add to {:?}", other),
        }
    }
}
