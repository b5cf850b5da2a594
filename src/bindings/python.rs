use crate::calc::{self, CalcError, DiscardReason, DiscardedRow, Evaluation, IndexResult};
use crate::store::{AttributeTable, CellValue, MemoryTable, RowId};
use crate::tree::TreeNode;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::BTreeSet;

fn to_py_err(e: CalcError) -> PyErr {
    match e {
        // bad data is a runtime condition; the rest is bad configuration
        CalcError::DataType(_) => PyRuntimeError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn parse_definition(text: &str) -> PyResult<TreeNode> {
    TreeNode::from_json(text).map_err(|e| PyValueError::new_err(e.to_string()))
}

fn dump_definition(node: &TreeNode) -> PyResult<String> {
    node.to_json().map_err(|e| PyValueError::new_err(e.to_string()))
}

fn discarded_out(discarded: BTreeSet<DiscardedRow>) -> Vec<(u64, String)> {
    discarded
        .into_iter()
        .map(|d| {
            let reason = match d.reason {
                DiscardReason::MissingValue => "Missing value",
                DiscardReason::InvalidValue => "Invalid value",
            };
            (d.row.0, reason.to_string())
        })
        .collect()
}

#[pyclass(name = "_ZonalTable")]
#[derive(Debug, Clone, Default)]
pub struct PyZonalTable {
    pub inner: MemoryTable,
}

#[pymethods]
impl PyZonalTable {
    #[new]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, row_id: u64) {
        self.inner.add_row(RowId(row_id));
    }

    pub fn row_count(&self) -> usize {
        self.inner.row_count()
    }

    /// Returns the actually assigned (sanitized, de-duplicated) field name.
    pub fn add_numeric_field(&mut self, proposed_name: &str) -> String {
        self.inner.add_numeric_field(proposed_name).1
    }

    pub fn add_text_field(&mut self, proposed_name: &str) -> String {
        self.inner.add_text_field(proposed_name).1
    }

    pub fn field_names(&self) -> Vec<String> {
        self.inner.field_names()
    }

    pub fn set_value(&mut self, row_id: u64, field: &str, value: Option<f64>) -> PyResult<()> {
        let id = self
            .inner
            .field_index(field)
            .ok_or_else(|| PyValueError::new_err(format!("no field named '{}'", field)))?;
        self.inner.set_value(RowId(row_id), id, CellValue::from(value));
        Ok(())
    }

    pub fn set_text(&mut self, row_id: u64, field: &str, value: &str) -> PyResult<()> {
        let id = self
            .inner
            .field_index(field)
            .ok_or_else(|| PyValueError::new_err(format!("no field named '{}'", field)))?;
        self.inner
            .set_value(RowId(row_id), id, CellValue::Text(value.to_string()));
        Ok(())
    }

    /// Reads one cell; NULL and textual cells come back as None.
    pub fn get_value(&self, row_id: u64, field: &str) -> PyResult<Option<f64>> {
        let id = self
            .inner
            .field_index(field)
            .ok_or_else(|| PyValueError::new_err(format!("no field named '{}'", field)))?;
        Ok(self.inner.value(RowId(row_id), id).as_number())
    }
}

fn evaluation_out(eval: Evaluation) -> PyResult<(Vec<u32>, Vec<(u64, String)>, String, bool)> {
    let added = eval.added_fields.iter().map(|f| f.0).collect();
    let node_json = dump_definition(&eval.node)?;
    Ok((added, discarded_out(eval.discarded), node_json, eval.changed))
}

fn index_out(res: IndexResult) -> PyResult<(String, Vec<(u64, String)>, String, bool)> {
    let root_json = dump_definition(&res.project_definition)?;
    Ok((
        res.field,
        discarded_out(res.discarded),
        root_json,
        res.changed,
    ))
}

/// Evaluates a (sub)tree of the project definition, given as JSON text.
/// Returns (added field ids, discarded rows, resolved subtree JSON, changed).
#[pyfunction]
pub fn calculate_composite_variable(
    table: &mut PyZonalTable,
    project_definition: &str,
) -> PyResult<(Vec<u32>, Vec<(u64, String)>, String, bool)> {
    let node = parse_definition(project_definition)?;
    let eval = calc::calculate_composite_variable(&mut table.inner, &node).map_err(to_py_err)?;
    evaluation_out(eval)
}

/// Returns (index field name, discarded rows, updated definition JSON, changed).
#[pyfunction]
pub fn calculate_svi(
    table: &mut PyZonalTable,
    project_definition: &str,
) -> PyResult<(String, Vec<(u64, String)>, String, bool)> {
    let node = parse_definition(project_definition)?;
    index_out(calc::calculate_svi(&mut table.inner, &node).map_err(to_py_err)?)
}

#[pyfunction]
pub fn calculate_ri(
    table: &mut PyZonalTable,
    project_definition: &str,
) -> PyResult<(String, Vec<(u64, String)>, String, bool)> {
    let node = parse_definition(project_definition)?;
    index_out(calc::calculate_ri(&mut table.inner, &node).map_err(to_py_err)?)
}

#[pyfunction]
pub fn calculate_iri(
    table: &mut PyZonalTable,
    project_definition: &str,
) -> PyResult<(String, Vec<(u64, String)>, String, bool)> {
    let node = parse_definition(project_definition)?;
    index_out(calc::calculate_iri(&mut table.inner, &node).map_err(to_py_err)?)
}
