use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

use crate::file::{BufferManager, FileError, FileHandle};
use crate::record::{ColumnDef, DataType, HeapFile, TableSchema};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),

    #[error("Unknown column type: {0}")]
    UnknownColumnType(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String, // Stored as string for JSON: "INT", "FLOAT", "CHAR(n)"
    pub not_null: bool,
}

impl ColumnMetadata {
    fn from_column_def(col: &ColumnDef) -> Self {
        let column_type = match &col.data_type {
            DataType::Int => "INT".to_string(),
            DataType::Float => "FLOAT".to_string(),
            DataType::Char(n) => format!("CHAR({})", n),
        };
        Self {
            name: col.name.clone(),
            column_type,
            not_null: col.not_null,
        }
    }

    fn to_column_def(&self) -> CatalogResult<ColumnDef> {
        let data_type = if self.column_type == "INT" {
            DataType::Int
        } else if self.column_type == "FLOAT" {
            DataType::Float
        } else if let Some(inner) = self
            .column_type
            .strip_prefix("CHAR(")
            .and_then(|s| s.strip_suffix(")"))
        {
            let size: usize = inner
                .parse()
                .map_err(|_| CatalogError::UnknownColumnType(self.column_type.clone()))?;
            DataType::Char(size)
        } else {
            return Err(CatalogError::UnknownColumnType(self.column_type.clone()));
        };

        Ok(ColumnDef::new(self.name.clone(), data_type, self.not_null))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub file: String,
    pub columns: Vec<ColumnMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogMetadata {
    tables: Vec<TableMetadata>,
}

struct TableEntry {
    name: String,
    file_name: String,
    heap: HeapFile,
}

/// Registry of tables: name and schema to heap file. The file handle doubles
/// as the table id in every `PageId`.
pub struct Catalog {
    base_dir: PathBuf,
    tables: RwLock<HashMap<FileHandle, TableEntry>>,
}

impl Catalog {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Load a previously saved catalog, opening every table's backing file
    /// in the pool's page store.
    pub fn load<P: AsRef<Path>>(pool: &BufferManager, base_dir: P) -> CatalogResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let content = fs::read_to_string(base_dir.join("metadata.json"))?;
        let metadata: CatalogMetadata = serde_json::from_str(&content)?;

        let catalog = Self::new(&base_dir);
        for table in metadata.tables {
            let columns = table
                .columns
                .iter()
                .map(|c| c.to_column_def())
                .collect::<CatalogResult<Vec<_>>>()?;
            let schema = TableSchema::new(table.name.clone(), columns);
            let handle = pool.open_file(base_dir.join(&table.file))?;
            catalog.tables.write().unwrap().insert(
                handle,
                TableEntry {
                    name: table.name,
                    file_name: table.file,
                    heap: HeapFile::attach(handle, schema),
                },
            );
        }
        Ok(catalog)
    }

    /// Persist the table registry as metadata.json under the base directory
    pub fn save(&self) -> CatalogResult<()> {
        let tables = self.tables.read().unwrap();
        let mut metadata = CatalogMetadata::default();
        for entry in tables.values() {
            metadata.tables.push(TableMetadata {
                name: entry.name.clone(),
                file: entry.file_name.clone(),
                columns: entry
                    .heap
                    .schema()
                    .columns()
                    .iter()
                    .map(ColumnMetadata::from_column_def)
                    .collect(),
            });
        }
        metadata.tables.sort_by(|a, b| a.name.cmp(&b.name));

        fs::create_dir_all(&self.base_dir)?;
        let content = serde_json::to_string_pretty(&metadata)?;
        fs::write(self.base_dir.join("metadata.json"), content)?;
        Ok(())
    }

    /// Create a table and its backing file, returning the table's handle
    pub fn create_table(
        &self,
        pool: &BufferManager,
        schema: TableSchema,
    ) -> CatalogResult<FileHandle> {
        let name = schema.table_name().to_string();
        {
            let tables = self.tables.read().unwrap();
            if tables.values().any(|entry| entry.name == name) {
                return Err(CatalogError::TableAlreadyExists(name));
            }
        }

        let file_name = format!("{}.tbl", name);
        let path = self.base_dir.join(&file_name);
        fs::create_dir_all(&self.base_dir)?;
        pool.create_file(&path)?;
        let handle = pool.open_file(&path)?;

        self.tables.write().unwrap().insert(
            handle,
            TableEntry {
                name,
                file_name,
                heap: HeapFile::attach(handle, schema),
            },
        );
        Ok(handle)
    }

    /// Heap file for a table id; cheap clone
    pub fn heap_file(&self, table: FileHandle) -> CatalogResult<HeapFile> {
        let tables = self.tables.read().unwrap();
        tables
            .get(&table)
            .map(|entry| entry.heap.clone())
            .ok_or_else(|| CatalogError::TableNotFound(format!("#{}", table.as_usize())))
    }

    /// Schema for a table id
    pub fn schema_for_table(&self, table: FileHandle) -> CatalogResult<TableSchema> {
        Ok(self.heap_file(table)?.schema().clone())
    }

    /// Look up a table id by name
    pub fn table_by_name(&self, name: &str) -> CatalogResult<FileHandle> {
        let tables = self.tables.read().unwrap();
        tables
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(&handle, _)| handle)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    pub fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read().unwrap();
        let mut names: Vec<String> = tables.values().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }
}
