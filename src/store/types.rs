use serde::{Deserialize, Serialize};

/// Stable identifier of one feature row (a zone or a point).
///
/// Mirrors the host's 64-bit feature ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct RowId(pub u64);

/// Stable identifier of one attribute column.
///
/// Ids stay valid across deletions of other columns (deleted slots become
/// tombstones), so a rollback can delete exactly the fields it recorded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct FieldId(pub u32);

impl FieldId {
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
    pub fn new(idx: usize) -> Self {
        Self(idx as u32)
    }
}

/// A single attribute cell.
///
/// `Null` is the explicit missing marker, distinct from `Number(0.0)`.
/// `Text` exists because real zonal layers carry name columns; reading one
/// during an aggregation is a data-type error, not a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(v) => CellValue::Number(v),
            None => CellValue::Null,
        }
    }
}
