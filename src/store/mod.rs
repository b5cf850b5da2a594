//! The tabular backing store: ids, cell values and the attribute table.
pub mod table;
pub mod types;

pub use table::{AttributeTable, MemoryTable, MAX_FIELD_NAME_LEN};
pub use types::{CellValue, FieldId, RowId};
