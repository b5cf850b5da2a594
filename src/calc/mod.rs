//! The composite-index calculation engine.
pub mod error;
pub mod evaluator;
pub mod indices;

pub use error::CalcError;
pub use evaluator::{
    calculate_composite_variable, DiscardReason, DiscardedRow, Evaluation,
};
pub use indices::{calculate_iri, calculate_ri, calculate_svi, IndexResult};
