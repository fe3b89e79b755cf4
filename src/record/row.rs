use super::column::Cursor;
use super::error::{RecordError, RecordResult};
use super::schema::Schema;
use super::value::Field;
use super::{INVALID_ROWID, RowId};

/// A materialized tuple: its location (if stored) and its field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub rid: RowId,
    pub fields: Vec<Field>,
}

impl Row {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            rid: INVALID_ROWID,
            fields,
        }
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Serialized form: `{u32 field_count, null_bitmap, non-null bodies}`.
    pub fn to_bytes(&self, schema: &Schema) -> RecordResult<Vec<u8>> {
        schema.validate_row(&self.fields)?;

        let mut out = Vec::with_capacity(self.serialized_size(schema));
        out.extend_from_slice(&(self.fields.len() as u32).to_le_bytes());

        let bitmap_len = self.fields.len().div_ceil(8);
        let bitmap_start = out.len();
        out.resize(bitmap_start + bitmap_len, 0);
        for (i, field) in self.fields.iter().enumerate() {
            if field.is_null() {
                out[bitmap_start + i / 8] |= 1 << (i % 8);
            }
        }

        for field in &self.fields {
            field.serialize_into(&mut out)?;
        }
        Ok(out)
    }

    /// Read a row from `buf`, returning it and the bytes consumed.
    pub fn from_bytes(buf: &[u8], schema: &Schema) -> RecordResult<(Self, usize)> {
        let mut cursor = Cursor::new(buf);
        let field_count = cursor.read_u32()? as usize;
        if field_count != schema.column_count() {
            return Err(RecordError::SchemaMismatch(format!(
                "row has {field_count} fields, schema has {}",
                schema.column_count()
            )));
        }

        let bitmap = cursor.read_bytes(field_count.div_ceil(8))?.to_vec();
        let mut fields = Vec::with_capacity(field_count);
        for i in 0..field_count {
            let is_null = (bitmap[i / 8] & (1 << (i % 8))) != 0;
            let column = schema.column(i).unwrap();
            let (field, consumed) = Field::deserialize(cursor.remaining(), &column.data_type, is_null)?;
            cursor.advance(consumed);
            fields.push(field);
        }
        Ok((Row::new(fields), cursor.position()))
    }

    pub fn serialized_size(&self, _schema: &Schema) -> usize {
        4 + self.fields.len().div_ceil(8)
            + self.fields.iter().map(|f| f.serialized_size()).sum::<usize>()
    }

    /// Project the fields of the key columns out of this row, in key-schema
    /// order. Each key column's `table_index` addresses this row's fields.
    pub fn key_from_row(&self, key_schema: &Schema) -> RecordResult<Row> {
        let mut fields = Vec::with_capacity(key_schema.column_count());
        for column in key_schema.columns() {
            let field = self.fields.get(column.table_index as usize).ok_or_else(|| {
                RecordError::SchemaMismatch(format!(
                    "key column '{}' addresses field {} of a {}-field row",
                    column.name,
                    column.table_index,
                    self.fields.len()
                ))
            })?;
            fields.push(field.clone());
        }
        Ok(Row::new(fields))
    }
}
