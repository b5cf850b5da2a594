//! Error taxonomy of the calculation engine.
use thiserror::Error;

/// Everything that can make a composite-variable calculation fail.
///
/// All variants are recoverable: by the time a caller sees one, every field
/// the failed calculation had added has been deleted again and the project
/// definition it was given is untouched. Per-row missing values are not
/// errors; they come back as discarded rows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalcError {
    /// The node has neither a resolvable field reference nor a name to
    /// derive one from.
    #[error("this node has no name and it does not correspond to any field")]
    InvalidNode,

    /// The operator string is not one of the six recognized names.
    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    /// A childless child has no usable field, so a prerequisite value the
    /// user expected to already exist is absent.
    #[error("node '{parent}' has a child ('{child}') with no usable field")]
    InvalidChild { parent: String, child: String },

    /// The backing store produced a value arithmetic cannot consume.
    #[error("could not calculate the composite variable due to data problems: {0}")]
    DataType(String),
}
