use super::error::{RecordError, RecordResult};
use super::schema::TableSchema;
use super::value::Value;
use crate::file::PageId;

/// Slot identifier within a page
pub type SlotId = usize;

/// Physical identifier for a stored tuple (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

/// A row of typed values. `rid` is set once the tuple is stored (or read
/// back) and identifies its slot for deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    values: Vec<Value>,
    rid: Option<RecordId>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, rid: None }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: RecordId) {
        self.rid = Some(rid);
    }

    /// Serialize to the schema's fixed tuple layout:
    /// [NULL bitmap][col0 bytes][col1 bytes]...
    pub fn serialize(&self, schema: &TableSchema) -> RecordResult<Vec<u8>> {
        schema.validate_tuple(&self.values)?;

        let mut result = Vec::with_capacity(schema.tuple_size());

        let mut bitmap = vec![0u8; schema.null_bitmap_size()];
        for (i, value) in self.values.iter().enumerate() {
            if value.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        result.extend_from_slice(&bitmap);

        for (value, col) in self.values.iter().zip(schema.columns()) {
            let bytes = value.serialize(&col.data_type)?;
            result.extend_from_slice(&bytes);
        }

        Ok(result)
    }

    pub fn deserialize(data: &[u8], schema: &TableSchema) -> RecordResult<Self> {
        if data.len() != schema.tuple_size() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes, got {}",
                schema.tuple_size(),
                data.len()
            )));
        }

        let bitmap = &data[..schema.null_bitmap_size()];
        let mut offset = schema.null_bitmap_size();

        let mut values = Vec::with_capacity(schema.column_count());
        for (i, col) in schema.columns().iter().enumerate() {
            let is_null = (bitmap[i / 8] & (1 << (i % 8))) != 0;
            let col_size = col.size();
            let value = Value::deserialize(&data[offset..offset + col_size], &col.data_type, is_null)?;
            values.push(value);
            offset += col_size;
        }

        Ok(Tuple { values, rid: None })
    }
}
