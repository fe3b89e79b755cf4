use super::error::{RecordError, RecordResult};

/// Column data type. `Char(n)` is a bounded variable-length string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,
    Float,
    Char(u32),
}

impl DataType {
    /// Numeric tag used on disk.
    pub fn type_id(&self) -> u32 {
        match self {
            DataType::Int => 1,
            DataType::Float => 2,
            DataType::Char(_) => 3,
        }
    }

    pub fn from_type_id(type_id: u32, length: u32) -> RecordResult<Self> {
        match type_id {
            1 => Ok(DataType::Int),
            2 => Ok(DataType::Float),
            3 => Ok(DataType::Char(length)),
            other => Err(RecordError::Corrupted(format!(
                "unknown column type id {other}"
            ))),
        }
    }

    /// Declared column width: fixed sizes for INT/FLOAT, the bound for CHAR.
    pub fn length(&self) -> u32 {
        match self {
            DataType::Int => 4,
            DataType::Float => 4,
            DataType::Char(n) => *n,
        }
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(i32),
    Float(f32),
    Char(String),
    Null,
}

impl Field {
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Whether this value can be stored in a column of `data_type`.
    pub fn matches(&self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (Field::Int(_), DataType::Int)
                | (Field::Float(_), DataType::Float)
                | (Field::Char(_), DataType::Char(_))
                | (Field::Null, _)
        )
    }

    /// Bytes this field occupies in a serialized row. Null fields have no body.
    pub fn serialized_size(&self) -> usize {
        match self {
            Field::Int(_) => 4,
            Field::Float(_) => 4,
            Field::Char(s) => 4 + s.len(),
            Field::Null => 0,
        }
    }

    /// Append this field's body to `out`.
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> RecordResult<()> {
        match self {
            Field::Int(i) => out.extend_from_slice(&i.to_le_bytes()),
            Field::Float(f) => out.extend_from_slice(&f.to_le_bytes()),
            Field::Char(s) => {
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Field::Null => {}
        }
        Ok(())
    }

    /// Read a field body of `data_type` from `buf`, returning the field and
    /// the bytes consumed. Null fields consume nothing.
    pub fn deserialize(buf: &[u8], data_type: &DataType, is_null: bool) -> RecordResult<(Self, usize)> {
        if is_null {
            return Ok((Field::Null, 0));
        }
        match data_type {
            DataType::Int => {
                let bytes = read_exact(buf, 4)?;
                Ok((Field::Int(i32::from_le_bytes(bytes.try_into().unwrap())), 4))
            }
            DataType::Float => {
                let bytes = read_exact(buf, 4)?;
                Ok((Field::Float(f32::from_le_bytes(bytes.try_into().unwrap())), 4))
            }
            DataType::Char(_) => {
                let len_bytes = read_exact(buf, 4)?;
                let len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
                let body = read_exact(&buf[4..], len)?;
                let s = String::from_utf8(body.to_vec())
                    .map_err(|e| RecordError::Corrupted(format!("invalid UTF-8: {e}")))?;
                Ok((Field::Char(s), 4 + len))
            }
        }
    }
}

fn read_exact(buf: &[u8], len: usize) -> RecordResult<&[u8]> {
    buf.get(..len)
        .ok_or_else(|| RecordError::Corrupted(format!("need {len} bytes, have {}", buf.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_lengths() {
        assert_eq!(DataType::Int.length(), 4);
        assert_eq!(DataType::Float.length(), 4);
        assert_eq!(DataType::Char(20).length(), 20);
    }

    #[test]
    fn test_type_id_round_trip() {
        for dt in [DataType::Int, DataType::Float, DataType::Char(16)] {
            let back = DataType::from_type_id(dt.type_id(), dt.length()).unwrap();
            assert_eq!(back, dt);
        }
        assert!(DataType::from_type_id(9, 0).is_err());
    }

    #[test]
    fn test_int_round_trip() {
        let field = Field::Int(-42);
        let mut buf = Vec::new();
        field.serialize_into(&mut buf).unwrap();
        assert_eq!(buf.len(), 4);

        let (back, consumed) = Field::deserialize(&buf, &DataType::Int, false).unwrap();
        assert_eq!(back, field);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_float_round_trip() {
        let field = Field::Float(3.25);
        let mut buf = Vec::new();
        field.serialize_into(&mut buf).unwrap();

        let (back, _) = Field::deserialize(&buf, &DataType::Float, false).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn test_char_round_trip() {
        let field = Field::Char("hello".to_string());
        let mut buf = Vec::new();
        field.serialize_into(&mut buf).unwrap();
        assert_eq!(buf.len(), 9);

        let (back, consumed) = Field::deserialize(&buf, &DataType::Char(8), false).unwrap();
        assert_eq!(back, field);
        assert_eq!(consumed, 9);
    }

    #[test]
    fn test_null_has_no_body() {
        let field = Field::Null;
        assert_eq!(field.serialized_size(), 0);

        let (back, consumed) = Field::deserialize(&[], &DataType::Int, true).unwrap();
        assert_eq!(back, Field::Null);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn test_truncated_buffer_is_error() {
        assert!(Field::deserialize(&[1, 2], &DataType::Int, false).is_err());
    }
}
