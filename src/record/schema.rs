use super::error::{RecordError, RecordResult};
use super::value::{DataType, Value};

/// Column definition with metadata
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub not_null: bool,
}

impl ColumnDef {
    pub fn new(name: String, data_type: DataType, not_null: bool) -> Self {
        Self {
            name,
            data_type,
            not_null,
        }
    }

    /// Size of this column's serialized value in bytes
    pub fn size(&self) -> usize {
        self.data_type.size()
    }
}

/// Table schema: ordered column definitions plus derived tuple sizing
#[derive(Debug, Clone)]
pub struct TableSchema {
    table_name: String,
    columns: Vec<ColumnDef>,
    null_bitmap_size: usize,
    tuple_size: usize,
}

impl TableSchema {
    pub fn new(table_name: String, columns: Vec<ColumnDef>) -> Self {
        let null_bitmap_size = columns.len().div_ceil(8);
        let tuple_size = null_bitmap_size + columns.iter().map(|c| c.size()).sum::<usize>();

        Self {
            table_name,
            columns,
            null_bitmap_size,
            tuple_size,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> Option<&ColumnDef> {
        self.columns.get(idx)
    }

    /// Find column index by name
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn null_bitmap_size(&self) -> usize {
        self.null_bitmap_size
    }

    /// Total serialized tuple size in bytes (including the NULL bitmap)
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Check `values` against column count, NOT NULL constraints and types
    pub fn validate_tuple(&self, values: &[Value]) -> RecordResult<()> {
        if values.len() != self.columns.len() {
            return Err(RecordError::SchemaMismatch(format!(
                "Expected {} columns, got {}",
                self.columns.len(),
                values.len()
            )));
        }

        for (value, col) in values.iter().zip(&self.columns) {
            if col.not_null && value.is_null() {
                return Err(RecordError::NullConstraintViolation(format!(
                    "Column '{}' cannot be NULL",
                    col.name
                )));
            }

            if !value.is_null() {
                match (&col.data_type, value) {
                    (DataType::Int, Value::Int(_)) => {}
                    (DataType::Float, Value::Float(_)) => {}
                    (DataType::Char(_), Value::String(_)) => {}
                    (dt, val) => {
                        return Err(RecordError::TypeMismatch {
                            expected: format!("{:?}", dt),
                            actual: format!("{:?}", val),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
