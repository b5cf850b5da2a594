//! The project-definition tree and its combination operators.
pub mod node;
pub mod operator;

pub use node::{NodeType, TreeNode};
pub use operator::{Operator, OperatorFamily, DEFAULT_OPERATOR};
