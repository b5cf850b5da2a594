//! indices.rs
//! Entry points for the three composite indices of a project definition:
//! the Social Vulnerability Index (SVI), the Risk Index (RI) and the
//! Integrated Risk Index (IRI) that combines them.
//!
//! Each one is a thin wrapper around the recursive evaluator: it locates
//! the relevant subtree inside the project definition, evaluates it, and
//! splices the resolved subtree back into a fresh copy of the root. Rows
//! missing at the SVI or RI stage stay missing at the IRI stage, because
//! the IRI reads the indices' own output fields.

use super::error::CalcError;
use super::evaluator::{calculate_composite_variable, DiscardedRow};
use crate::store::{AttributeTable, FieldId};
use crate::tree::{NodeType, TreeNode};
use std::collections::BTreeSet;

/// Outcome of computing one composite index over a project definition.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexResult {
    /// Name of the table field holding the index values.
    pub field: String,
    pub added_fields: BTreeSet<FieldId>,
    pub discarded: BTreeSet<DiscardedRow>,
    /// The project definition with the resolved subtree spliced back in.
    pub project_definition: TreeNode,
    pub changed: bool,
}

/// Computes the Social Vulnerability Index subtree of the given project
/// definition.
pub fn calculate_svi<T: AttributeTable>(
    table: &mut T,
    project_definition: &TreeNode,
) -> Result<IndexResult, CalcError> {
    calculate_index_subtree(table, project_definition, NodeType::SocialVulnerabilityIndex)
}

/// Computes the Risk Index subtree of the given project definition.
pub fn calculate_ri<T: AttributeTable>(
    table: &mut T,
    project_definition: &TreeNode,
) -> Result<IndexResult, CalcError> {
    calculate_index_subtree(table, project_definition, NodeType::RiskIndex)
}

/// Computes the Integrated Risk Index: the root of the project definition,
/// combining the RI and SVI children with the root's operator and their
/// weights. The subtrees are evaluated on the way, so a bare project
/// definition can be computed in one call.
pub fn calculate_iri<T: AttributeTable>(
    table: &mut T,
    project_definition: &TreeNode,
) -> Result<IndexResult, CalcError> {
    let eval = calculate_composite_variable(table, project_definition)?;
    let field = index_field(&eval.node)?;
    Ok(IndexResult {
        field,
        added_fields: eval.added_fields,
        discarded: eval.discarded,
        project_definition: eval.node,
        changed: eval.changed,
    })
}

fn calculate_index_subtree<T: AttributeTable>(
    table: &mut T,
    project_definition: &TreeNode,
    node_type: NodeType,
) -> Result<IndexResult, CalcError> {
    let idx = project_definition
        .child_of_type(node_type)
        .ok_or(CalcError::InvalidNode)?;
    let subtree = &project_definition.children()[idx];

    let eval = calculate_composite_variable(table, subtree)?;
    let field = index_field(&eval.node)?;

    let mut root = project_definition.clone();
    if let Some(children) = root.children.as_mut() {
        children[idx] = eval.node;
    }
    Ok(IndexResult {
        field,
        added_fields: eval.added_fields,
        discarded: eval.discarded,
        project_definition: root,
        changed: eval.changed,
    })
}

/// The index must end up bound to a field: either the evaluator bound one,
/// or the node was a leaf already pointing at a precomputed column.
fn index_field(node: &TreeNode) -> Result<String, CalcError> {
    node.field.clone().ok_or_else(|| CalcError::InvalidChild {
        parent: node.label(),
        child: node.label(),
    })
}
