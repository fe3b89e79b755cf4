use std::cmp::Ordering;

use super::error::{IndexError, IndexResult};
use crate::record::{DataType, Field, Row, Schema};

/// Knows the byte layout and total order of one index's keys.
///
/// Keys are fixed-width blobs: INT and FLOAT fields occupy 4 bytes
/// little-endian, CHAR(k) fields occupy k bytes zero-padded. Comparison
/// decodes column by column, so the blob layout never needs to be
/// order-preserving on its own.
#[derive(Debug, Clone)]
pub struct KeyManager {
    key_schema: Schema,
    key_size: usize,
}

impl KeyManager {
    pub fn new(key_schema: Schema) -> Self {
        let key_size = key_schema
            .columns()
            .iter()
            .map(|c| c.length() as usize)
            .sum();
        Self { key_schema, key_size }
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn key_schema(&self) -> &Schema {
        &self.key_schema
    }

    /// Serialize a key row into its fixed-width blob. Index keys may not
    /// contain NULL.
    pub fn serialize(&self, key_row: &Row) -> IndexResult<Vec<u8>> {
        if key_row.fields.len() != self.key_schema.column_count() {
            return Err(IndexError::InvalidKey(format!(
                "key has {} fields, expected {}",
                key_row.fields.len(),
                self.key_schema.column_count()
            )));
        }

        let mut out = vec![0u8; self.key_size];
        let mut at = 0;
        for (field, column) in key_row.fields.iter().zip(self.key_schema.columns()) {
            let width = column.length() as usize;
            match (field, &column.data_type) {
                (Field::Int(i), DataType::Int) => {
                    out[at..at + 4].copy_from_slice(&i.to_le_bytes());
                }
                (Field::Float(f), DataType::Float) => {
                    out[at..at + 4].copy_from_slice(&f.to_le_bytes());
                }
                (Field::Char(s), DataType::Char(_)) => {
                    if s.len() > width {
                        return Err(IndexError::InvalidKey(format!(
                            "string key of {} bytes exceeds CHAR({width})",
                            s.len()
                        )));
                    }
                    out[at..at + s.len()].copy_from_slice(s.as_bytes());
                }
                (Field::Null, _) => {
                    return Err(IndexError::InvalidKey(format!(
                        "NULL in key column '{}'",
                        column.name
                    )));
                }
                _ => {
                    return Err(IndexError::InvalidKey(format!(
                        "value {:?} does not match key column '{}'",
                        field, column.name
                    )));
                }
            }
            at += width;
        }
        Ok(out)
    }

    /// Total order over serialized keys, column by column.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        debug_assert_eq!(a.len(), self.key_size);
        debug_assert_eq!(b.len(), self.key_size);

        let mut at = 0;
        for column in self.key_schema.columns() {
            let width = column.length() as usize;
            let lhs = &a[at..at + width];
            let rhs = &b[at..at + width];
            let ordering = match column.data_type {
                DataType::Int => {
                    let l = i32::from_le_bytes(lhs.try_into().unwrap());
                    let r = i32::from_le_bytes(rhs.try_into().unwrap());
                    l.cmp(&r)
                }
                DataType::Float => {
                    let l = f32::from_le_bytes(lhs.try_into().unwrap());
                    let r = f32::from_le_bytes(rhs.try_into().unwrap());
                    l.total_cmp(&r)
                }
                DataType::Char(_) => lhs.cmp(rhs),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
            at += width;
        }
        Ordering::Equal
    }
}
