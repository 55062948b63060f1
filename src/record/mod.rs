mod error;
mod heap_file;
mod heap_page;
mod schema;
mod tuple;
mod value;

pub use error::{RecordError, RecordResult};
pub use heap_file::{HeapFile, HeapFileIterator};
pub use heap_page::{HeapPage, PageHeader};
pub use schema::{ColumnDef, TableSchema};
pub use tuple::{RecordId, SlotId, Tuple};
pub use value::{DataType, Value};
