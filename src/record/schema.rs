use super::column::{Column, Cursor};
use super::error::{RecordError, RecordResult};
use super::value::Field;

const SCHEMA_MAGIC: u32 = 200715;

/// An ordered sequence of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Schema over a subset of this schema's columns, in `key_map` order.
    /// The projected columns keep their original `table_index`.
    pub fn project(&self, key_map: &[u32]) -> RecordResult<Schema> {
        let mut columns = Vec::with_capacity(key_map.len());
        for &index in key_map {
            let column = self.columns.get(index as usize).ok_or_else(|| {
                RecordError::SchemaMismatch(format!("column index {index} out of range"))
            })?;
            columns.push(column.clone());
        }
        Ok(Schema::new(columns))
    }

    /// Check a field list against this schema: arity, NOT NULL, type
    /// compatibility, and CHAR length bounds.
    pub fn validate_row(&self, fields: &[Field]) -> RecordResult<()> {
        if fields.len() != self.columns.len() {
            return Err(RecordError::SchemaMismatch(format!(
                "expected {} columns, got {}",
                self.columns.len(),
                fields.len()
            )));
        }
        for (field, column) in fields.iter().zip(&self.columns) {
            if field.is_null() {
                if !column.nullable {
                    return Err(RecordError::NullConstraintViolation(column.name.clone()));
                }
                continue;
            }
            if !field.matches(&column.data_type) {
                return Err(RecordError::TypeMismatch {
                    expected: format!("{:?}", column.data_type),
                    actual: format!("{:?}", field),
                });
            }
            if let (Field::Char(s), max) = (field, column.length() as usize) {
                if s.len() > max {
                    return Err(RecordError::Serialization(format!(
                        "string of {} bytes exceeds CHAR({max}) in column '{}'",
                        s.len(),
                        column.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn serialized_size(&self) -> usize {
        8 + self.columns.iter().map(|c| c.serialized_size()).sum::<usize>()
    }

    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&SCHEMA_MAGIC.to_le_bytes());
        out.extend_from_slice(&(self.columns.len() as u32).to_le_bytes());
        for column in &self.columns {
            column.serialize_into(out);
        }
    }

    /// Read a schema from `buf`, returning it and the bytes consumed.
    pub fn deserialize_from(buf: &[u8]) -> RecordResult<(Self, usize)> {
        let mut cursor = Cursor::new(buf);
        let magic = cursor.read_u32()?;
        if magic != SCHEMA_MAGIC {
            return Err(RecordError::Corrupted(format!("bad schema magic {magic:#x}")));
        }
        let column_count = cursor.read_u32()? as usize;
        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let (column, consumed) = Column::deserialize_from(cursor.remaining())?;
            cursor.advance(consumed);
            columns.push(column);
        }
        Ok((Schema::new(columns), cursor.position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataType;

    fn sample_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Int, 0, false, true),
            Column::new("name", DataType::Char(20), 1, true, false),
            Column::new("score", DataType::Float, 2, true, false),
        ])
    }

    #[test]
    fn test_column_lookup() {
        let schema = sample_schema();
        assert_eq!(schema.column_index("id"), Some(0));
        assert_eq!(schema.column_index("score"), Some(2));
        assert_eq!(schema.column_index("missing"), None);
    }

    #[test]
    fn test_round_trip() {
        let schema = sample_schema();
        let mut buf = Vec::new();
        schema.serialize_into(&mut buf);
        assert_eq!(buf.len(), schema.serialized_size());

        let (back, consumed) = Schema::deserialize_from(&buf).unwrap();
        assert_eq!(back, schema);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn test_project_keeps_table_index() {
        let schema = sample_schema();
        let key_schema = schema.project(&[2, 0]).unwrap();
        assert_eq!(key_schema.column_count(), 2);
        assert_eq!(key_schema.column(0).unwrap().name, "score");
        assert_eq!(key_schema.column(0).unwrap().table_index, 2);
        assert_eq!(key_schema.column(1).unwrap().table_index, 0);

        assert!(schema.project(&[5]).is_err());
    }

    #[test]
    fn test_validate_row() {
        let schema = sample_schema();

        schema
            .validate_row(&[
                Field::Int(1),
                Field::Char("ann".into()),
                Field::Float(9.5),
            ])
            .unwrap();

        // NULL allowed only where the column is nullable.
        schema
            .validate_row(&[Field::Int(1), Field::Null, Field::Null])
            .unwrap();
        assert!(matches!(
            schema.validate_row(&[Field::Null, Field::Null, Field::Null]),
            Err(RecordError::NullConstraintViolation(_))
        ));

        assert!(matches!(
            schema.validate_row(&[Field::Int(1), Field::Char("x".into())]),
            Err(RecordError::SchemaMismatch(_))
        ));
        assert!(matches!(
            schema.validate_row(&[
                Field::Char("oops".into()),
                Field::Null,
                Field::Null
            ]),
            Err(RecordError::TypeMismatch { .. })
        ));
        assert!(matches!(
            schema.validate_row(&[
                Field::Int(1),
                Field::Char("a".repeat(21)),
                Field::Null
            ]),
            Err(RecordError::Serialization(_))
        ));
    }
}
