use crate::catalog::schema::Schema;
use crate::common::rid::Rid;
use crate::dbtype::value::Value;

/// A serialized row. The byte layout is the schema's fixed-length columns
/// back to back; the rid is only meaningful for tuples that live in (or
/// came out of) a table heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    rid: Rid,
    data: Vec<u8>,
}

impl Tuple {
    pub fn from_values(values: &[Value], schema: &Schema) -> Tuple {
        assert_eq!(values.len(), schema.column_count());
        let mut data = Vec::with_capacity(schema.fixed_length());
        for (value, column) in values.iter().zip(schema.columns()) {
            assert_eq!(
                Some(column.data_type),
                value.data_type(),
                "value type mismatch in column {}",
                column.name
            );
            data.extend_from_slice(&value.to_bytes());
        }
        Tuple {
            rid: Rid::invalid(),
            data,
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Tuple {
        Tuple {
            rid: Rid::invalid(),
            data,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn rid(&self) -> Rid {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Rid) {
        self.rid = rid;
    }

    /// Deserialize one column.
    pub fn value(&self, schema: &Schema, column_idx: usize) -> Value {
        let column = schema.column(column_idx);
        let bytes = &self.data[column.offset..column.offset + column.data_type.size()];
        Value::from_bytes(bytes, column.data_type)
    }

    /// Deserialize every column.
    pub fn values(&self, schema: &Schema) -> Vec<Value> {
        (0..schema.column_count())
            .map(|i| self.value(schema, i))
            .collect()
    }

    /// Project this tuple onto an index's key columns.
    pub fn key_from_tuple(&self, schema: &Schema, key_schema: &Schema, key_attrs: &[usize]) -> Tuple {
        let values: Vec<Value> = key_attrs.iter().map(|&i| self.value(schema, i)).collect();
        Tuple::from_values(&values, key_schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::column::{Column, DataType};

    fn sample_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("flag", DataType::Boolean),
            Column::new("score", DataType::SmallInt),
        ])
    }

    #[test]
    fn test_values_round_trip() {
        let schema = sample_schema();
        let values = vec![
            Value::Integer(42),
            Value::Boolean(true),
            Value::SmallInt(-3),
        ];
        let tuple = Tuple::from_values(&values, &schema);
        assert_eq!(schema.fixed_length(), tuple.data().len());
        assert_eq!(values, tuple.values(&schema));
    }

    #[test]
    fn test_key_projection() {
        let schema = sample_schema();
        let tuple = Tuple::from_values(
            &[Value::Integer(7), Value::Boolean(false), Value::SmallInt(9)],
            &schema,
        );
        let key_attrs = [0usize];
        let key_schema = schema.project(&key_attrs);
        let key = tuple.key_from_tuple(&schema, &key_schema, &key_attrs);
        assert_eq!(vec![Value::Integer(7)], key.values(&key_schema));
    }
}
