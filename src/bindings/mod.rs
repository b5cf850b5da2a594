//! The Python-facing surface of the crate.
pub mod python;
