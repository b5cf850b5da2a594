//! table.rs
//! The tabular backing store the calculator reads from and writes into.
//! Columnar layout with tombstoned columns so field ids stay stable.

use super::types::{CellValue, FieldId, RowId};
use log::debug;

/// Identifier limit of the legacy shapefile driver.
pub const MAX_FIELD_NAME_LEN: usize = 10;

/// Capability interface of a zonal attribute table.
///
/// A host backed by a real GIS provider implements this; the crate ships
/// [`MemoryTable`] for standalone use and for tests. Writes performed
/// between `begin_edit` and `commit_edit` are buffered and can be thrown
/// away with `rollback_edit`, mirroring the host's layer editing session.
pub trait AttributeTable {
    /// Adds a numeric column, sanitizing and de-duplicating the proposed
    /// name to the backend's identifier constraints. Returns the id and the
    /// actually assigned name.
    fn add_numeric_field(&mut self, proposed_name: &str) -> (FieldId, String);

    fn delete_fields(&mut self, field_ids: &[FieldId]);

    fn field_index(&self, name: &str) -> Option<FieldId>;

    fn field_name(&self, id: FieldId) -> Option<&str>;

    fn row_ids(&self) -> Vec<RowId>;

    /// Reads one committed cell. Unknown rows or deleted fields read as
    /// `Null`.
    fn value(&self, row: RowId, field: FieldId) -> CellValue;

    fn begin_edit(&mut self, description: &str);

    /// Writes one cell. Buffered while an edit session is open, immediate
    /// otherwise.
    fn set_value(&mut self, row: RowId, field: FieldId, value: CellValue);

    fn commit_edit(&mut self);

    fn rollback_edit(&mut self);
}

/// Truncate, uppercase and underscore a proposed field name, the way the
/// shapefile driver would.
fn sanitize_field_name(proposed: &str, max_len: usize) -> String {
    proposed
        .chars()
        .take(max_len)
        .collect::<String>()
        .to_uppercase()
        .replace(' ', "_")
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    values: Vec<CellValue>,
}

#[derive(Debug, Clone, Default)]
struct EditBuffer {
    description: String,
    writes: Vec<(RowId, FieldId, CellValue)>,
}

/// In-memory [`AttributeTable`] with a columnar layout.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    row_ids: Vec<RowId>,
    // A deleted column leaves a tombstone behind: ids of the surviving
    // columns must not shift.
    columns: Vec<Option<Column>>,
    pending: Option<EditBuffer>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row; every live column gains a `Null` cell for it.
    pub fn add_row(&mut self, id: RowId) {
        self.row_ids.push(id);
        for column in self.columns.iter_mut().flatten() {
            column.values.push(CellValue::Null);
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_ids.len()
    }

    /// Adds a textual column (zone names and the like), with the same
    /// naming discipline as numeric ones.
    pub fn add_text_field(&mut self, proposed_name: &str) -> (FieldId, String) {
        self.push_column(proposed_name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flatten()
            .map(|c| c.name.clone())
            .collect()
    }

    fn row_index(&self, row: RowId) -> Option<usize> {
        self.row_ids.iter().position(|&r| r == row)
    }

    fn push_column(&mut self, proposed_name: &str) -> (FieldId, String) {
        let mut assigned = sanitize_field_name(proposed_name, MAX_FIELD_NAME_LEN);
        let mut i = 1;
        while self.field_index(&assigned).is_some() {
            // Room for the underscore and the numeric suffix must come out
            // of the 10-character cap.
            let digits = i.to_string().len();
            let max_name_len = MAX_FIELD_NAME_LEN - digits - 1;
            assigned = format!("{}_{}", sanitize_field_name(proposed_name, max_name_len), i);
            i += 1;
        }
        let id = FieldId::new(self.columns.len());
        self.columns.push(Some(Column {
            name: assigned.clone(),
            values: vec![CellValue::Null; self.row_ids.len()],
        }));
        (id, assigned)
    }

    fn write_cell(&mut self, row: RowId, field: FieldId, value: CellValue) {
        let Some(row_idx) = self.row_index(row) else {
            debug!("ignoring write to unknown row {:?}", row);
            return;
        };
        if let Some(Some(column)) = self.columns.get_mut(field.index()) {
            column.values[row_idx] = value;
        }
    }
}

impl AttributeTable for MemoryTable {
    fn add_numeric_field(&mut self, proposed_name: &str) -> (FieldId, String) {
        self.push_column(proposed_name)
    }

    fn delete_fields(&mut self, field_ids: &[FieldId]) {
        for id in field_ids {
            if let Some(slot) = self.columns.get_mut(id.index()) {
                *slot = None;
            }
        }
    }

    fn field_index(&self, name: &str) -> Option<FieldId> {
        self.columns
            .iter()
            .position(|c| c.as_ref().is_some_and(|c| c.name == name))
            .map(FieldId::new)
    }

    fn field_name(&self, id: FieldId) -> Option<&str> {
        self.columns
            .get(id.index())?
            .as_ref()
            .map(|c| c.name.as_str())
    }

    fn row_ids(&self) -> Vec<RowId> {
        self.row_ids.clone()
    }

    fn value(&self, row: RowId, field: FieldId) -> CellValue {
        let Some(row_idx) = self.row_index(row) else {
            return CellValue::Null;
        };
        match self.columns.get(field.index()) {
            Some(Some(column)) => column.values[row_idx].clone(),
            _ => CellValue::Null,
        }
    }

    fn begin_edit(&mut self, description: &str) {
        debug!("begin edit: {}", description);
        self.pending = Some(EditBuffer {
            description: description.to_string(),
            writes: Vec::new(),
        });
    }

    fn set_value(&mut self, row: RowId, field: FieldId, value: CellValue) {
        if let Some(buffer) = self.pending.as_mut() {
            buffer.writes.push((row, field, value));
        } else {
            self.write_cell(row, field, value);
        }
    }

    fn commit_edit(&mut self) {
        if let Some(buffer) = self.pending.take() {
            debug!(
                "commit edit: {} ({} writes)",
                buffer.description,
                buffer.writes.len()
            );
            for (row, field, value) in buffer.writes {
                self.write_cell(row, field, value);
            }
        }
    }

    fn rollback_edit(&mut self) {
        if let Some(buffer) = self.pending.take() {
            debug!(
                "rollback edit: {} ({} writes discarded)",
                buffer.description,
                buffer.writes.len()
            );
        }
    }
}
