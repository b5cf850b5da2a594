// FFI Facade: The main entry point for Python.
// This file uses `pyo3` to define the `_core` Python
// module and expose Rust structs and functions as Python objects.

pub mod calc;
pub mod store;
pub mod tree;

#[cfg(feature = "python")]
pub mod bindings;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A simple function to confirm the Rust core is callable from Python.
#[cfg(feature = "python")]
#[pyfunction]
fn rust_core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// This function defines the `irmt._core` Python module.
/// The name `_core` is chosen to indicate it's an internal, compiled component.
#[cfg(feature = "python")]
#[pymodule]
fn _core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<bindings::python::PyZonalTable>()?;
    m.add_function(wrap_pyfunction!(rust_core_version, m)?)?;
    m.add_function(wrap_pyfunction!(
        bindings::python::calculate_composite_variable,
        m
    )?)?;
    m.add_function(wrap_pyfunction!(bindings::python::calculate_svi, m)?)?;
    m.add_function(wrap_pyfunction!(bindings::python::calculate_ri, m)?)?;
    m.add_function(wrap_pyfunction!(bindings::python::calculate_iri, m)?)?;
    Ok(())
}
