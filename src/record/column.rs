use super::error::{RecordError, RecordResult};
use super::value::DataType;

const COLUMN_MAGIC: u32 = 210928;

/// A column definition within a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    /// Position of this column in its table's schema
    pub table_index: u32,
    pub nullable: bool,
    pub unique: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, table_index: u32, nullable: bool, unique: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            table_index,
            nullable,
            unique,
        }
    }

    /// Declared width of the column's values.
    pub fn length(&self) -> u32 {
        self.data_type.length()
    }

    pub fn serialized_size(&self) -> usize {
        // magic + name_len + name + type_id + length + table_index + 2 flags
        4 + 4 + self.name.len() + 4 + 4 + 4 + 1 + 1
    }

    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&COLUMN_MAGIC.to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u32).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&self.data_type.type_id().to_le_bytes());
        out.extend_from_slice(&self.length().to_le_bytes());
        out.extend_from_slice(&self.table_index.to_le_bytes());
        out.push(self.nullable as u8);
        out.push(self.unique as u8);
    }

    /// Read a column from `buf`, returning it and the bytes consumed.
    pub fn deserialize_from(buf: &[u8]) -> RecordResult<(Self, usize)> {
        let mut cursor = Cursor::new(buf);
        let magic = cursor.read_u32()?;
        if magic != COLUMN_MAGIC {
            return Err(RecordError::Corrupted(format!(
                "bad column magic {magic:#x}"
            )));
        }
        let name_len = cursor.read_u32()? as usize;
        let name_bytes = cursor.read_bytes(name_len)?;
        let name = String::from_utf8(name_bytes.to_vec())
            .map_err(|e| RecordError::Corrupted(format!("column name not UTF-8: {e}")))?;
        let type_id = cursor.read_u32()?;
        let length = cursor.read_u32()?;
        let table_index = cursor.read_u32()?;
        let nullable = cursor.read_u8()? != 0;
        let unique = cursor.read_u8()? != 0;

        let data_type = DataType::from_type_id(type_id, length)?;
        Ok((
            Self {
                name,
                data_type,
                table_index,
                nullable,
                unique,
            },
            cursor.position(),
        ))
    }
}

/// Little-endian read cursor over a byte slice.
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    at: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, at: 0 }
    }

    pub fn position(&self) -> usize {
        self.at
    }

    pub fn read_u8(&mut self) -> RecordResult<u8> {
        let b = *self
            .buf
            .get(self.at)
            .ok_or_else(|| RecordError::Corrupted("unexpected end of buffer".into()))?;
        self.at += 1;
        Ok(b)
    }

    pub fn read_u32(&mut self) -> RecordResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_bytes(&mut self, len: usize) -> RecordResult<&'a [u8]> {
        let end = self
            .at
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| RecordError::Corrupted("unexpected end of buffer".into()))?;
        let bytes = &self.buf[self.at..end];
        self.at = end;
        Ok(bytes)
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.at..]
    }

    pub fn advance(&mut self, by: usize) {
        self.at += by;
    }
}
