//! evaluator.rs
//! Recursive bottom-up calculation of composite variables over the
//! indicator tree.
//!
//! Children are evaluated before their parent, each composite node is bound
//! to an output field in the attribute table, and every row gets either a
//! numeric value or an explicit NULL. The input tree is never mutated; a
//! resolved copy is rebuilt bottom-up and returned, so a failed calculation
//! leaves the caller's project definition exactly as it was.

use super::error::CalcError;
use crate::store::{AttributeTable, CellValue, FieldId, RowId};
use crate::tree::{Operator, TreeNode, DEFAULT_OPERATOR};
use log::debug;
use std::collections::BTreeSet;

/// Why a row could not contribute to a node's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiscardReason {
    /// A NULL among the inputs.
    MissingValue,
    /// The arithmetic has no real result (geometric mean of a negative
    /// product).
    InvalidValue,
}

/// One row excluded from a calculation, with the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiscardedRow {
    pub row: RowId,
    pub reason: DiscardReason,
}

/// Outcome of a successful composite-variable calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Fields added to the table anywhere in the evaluated subtree.
    pub added_fields: BTreeSet<FieldId>,
    /// Rows whose value is NULL somewhere in the evaluated subtree.
    pub discarded: BTreeSet<DiscardedRow>,
    /// The resolved subtree, with field bindings filled in.
    pub node: TreeNode,
    /// True if any field binding changed anywhere in the subtree. A rerun
    /// over an unchanged tree and table reports `false`.
    pub changed: bool,
}

/// Calculates a composite variable: the values of a tree node that has
/// children, computed from the children's values, weights and inversion
/// flags with the node's operator.
///
/// Leaves are a no-op, since their values are assumed to already exist in
/// the table. On error, every field this call added is deleted before the
/// error is returned, so the table keeps the exact field set it had before.
pub fn calculate_composite_variable<T: AttributeTable>(
    table: &mut T,
    node: &TreeNode,
) -> Result<Evaluation, CalcError> {
    let mut added = BTreeSet::new();
    match evaluate_subtree(table, node, &mut added) {
        Ok((resolved, discarded, changed)) => Ok(Evaluation {
            added_fields: added,
            discarded,
            node: resolved,
            changed,
        }),
        Err(e) => {
            if !added.is_empty() {
                debug!("calculation failed, deleting {} added fields", added.len());
                let ids: Vec<FieldId> = added.into_iter().collect();
                table.delete_fields(&ids);
            }
            Err(e)
        }
    }
}

fn evaluate_subtree<T: AttributeTable>(
    table: &mut T,
    node: &TreeNode,
    added: &mut BTreeSet<FieldId>,
) -> Result<(TreeNode, BTreeSet<DiscardedRow>, bool), CalcError> {
    if node.is_leaf() {
        // Nothing to calculate: a leaf's values already live in the table.
        return Ok((node.clone(), BTreeSet::new(), false));
    }

    let mut resolved = node.clone();
    let mut discarded = BTreeSet::new();
    let mut changed = false;

    {
        let out_children = resolved
            .children
            .as_mut()
            .expect("composite node has children");
        for (idx, child) in node.children().iter().enumerate() {
            let (child_node, child_discarded, child_changed) =
                evaluate_subtree(table, child, added)?;
            discarded.extend(child_discarded);
            if child_changed {
                out_children[idx] = child_node;
                changed = true;
            }
        }
    }

    let (field_id, field_name, field_was_added) = resolve_output_field(&resolved, table)?;
    if field_was_added {
        added.insert(field_id);
        changed = true;
    }
    if resolved.field.as_deref() != Some(field_name.as_str()) {
        resolved.field = Some(field_name.clone());
        changed = true;
    }

    let node_discarded = calculate_node(table, &resolved, field_id, &field_name)?;
    discarded.extend(node_discarded);

    Ok((resolved, discarded, changed))
}

/// Binds a composite node to its output field.
///
/// An existing `field` is reused if the column is still there; if the user
/// deleted the column, or the node only has a `name`, a fresh numeric field
/// is added. A node with neither is unusable.
fn resolve_output_field<T: AttributeTable>(
    node: &TreeNode,
    table: &mut T,
) -> Result<(FieldId, String, bool), CalcError> {
    if let Some(existing) = node.field.as_deref() {
        if let Some(id) = table.field_index(existing) {
            debug!("reusing field {} for node '{}'", existing, node.label());
            return Ok((id, existing.to_string(), false));
        }
        // the column went away since the project definition was saved
        let (id, assigned) = table.add_numeric_field(existing);
        return Ok((id, assigned, true));
    }
    if let Some(name) = node.name.as_deref() {
        let (id, assigned) = table.add_numeric_field(name);
        debug!("assigned field {} to node '{}'", assigned, name);
        return Ok((id, assigned, true));
    }
    Err(CalcError::InvalidNode)
}

struct ChildInput {
    field: FieldId,
    weight: f64,
    inverted: bool,
}

enum RowOutcome {
    Value(f64),
    Discard(DiscardReason),
}

/// Computes one node's value for every row and writes the results into
/// `out_field`, inside a scoped edit session. A data-type failure rolls the
/// session back before the error propagates, so no partial column survives.
pub(crate) fn calculate_node<T: AttributeTable>(
    table: &mut T,
    node: &TreeNode,
    out_field: FieldId,
    out_name: &str,
) -> Result<BTreeSet<DiscardedRow>, CalcError> {
    let operator = match node.operator.as_deref() {
        Some(name) => {
            Operator::parse(name).ok_or_else(|| CalcError::InvalidOperator(name.to_string()))?
        }
        None => DEFAULT_OPERATOR,
    };

    let mut inputs = Vec::with_capacity(node.children().len());
    for child in node.children() {
        let invalid_child = || CalcError::InvalidChild {
            parent: node.label(),
            child: child.label(),
        };
        let child_field = child.field.as_deref().ok_or_else(invalid_child)?;
        let field = table.field_index(child_field).ok_or_else(invalid_child)?;
        inputs.push(ChildInput {
            field,
            weight: child.weight_or_default(),
            inverted: child.is_inverted(),
        });
    }

    let mut discarded = BTreeSet::new();
    table.begin_edit(&format!("Calculating {}", out_name));
    for row in table.row_ids() {
        match aggregate_row(table, operator, &inputs, row) {
            Ok(RowOutcome::Value(value)) => {
                table.set_value(row, out_field, CellValue::Number(value));
            }
            Ok(RowOutcome::Discard(reason)) => {
                discarded.insert(DiscardedRow { row, reason });
                table.set_value(row, out_field, CellValue::Null);
            }
            Err(e) => {
                table.rollback_edit();
                return Err(e);
            }
        }
    }
    table.commit_edit();
    Ok(discarded)
}

/// Folds the children's values for one row into the node's scalar output.
///
/// The first NULL input short-circuits the row to a discard; remaining
/// children are not read.
fn aggregate_row<T: AttributeTable>(
    table: &T,
    operator: Operator,
    inputs: &[ChildInput],
    row: RowId,
) -> Result<RowOutcome, CalcError> {
    let mut acc = operator.identity();
    for input in inputs {
        match table.value(row, input.field) {
            CellValue::Null => return Ok(RowOutcome::Discard(DiscardReason::MissingValue)),
            CellValue::Number(value) => {
                acc = operator.fold(acc, value, input.weight, input.inverted);
            }
            CellValue::Text(text) => {
                return Err(CalcError::DataType(format!(
                    "cannot combine textual value '{}'",
                    text
                )));
            }
        }
    }
    match operator.finalize(acc, inputs.len()) {
        Some(value) => Ok(RowOutcome::Value(value)),
        None => Ok(RowOutcome::Discard(DiscardReason::InvalidValue)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTable;
    use crate::tree::Operator;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Table with one row per entry of the first column; `None` cells are
    /// NULL. Row ids start at 1.
    fn table_with(fields: &[(&str, &[Option<f64>])]) -> MemoryTable {
        let mut table = MemoryTable::new();
        for i in 0..fields[0].1.len() {
            table.add_row(RowId(i as u64 + 1));
        }
        for (name, values) in fields {
            let (id, assigned) = table.add_numeric_field(name);
            assert_eq!(&assigned, name, "test fields must survive sanitizing");
            for (i, value) in values.iter().enumerate() {
                table.set_value(RowId(i as u64 + 1), id, CellValue::from(*value));
            }
        }
        table
    }

    fn leaf(field: &str, weight: f64, inverted: bool) -> TreeNode {
        TreeNode {
            name: Some(field.to_string()),
            field: Some(field.to_string()),
            weight: Some(weight),
            is_inverted: inverted.then_some(true),
            children: Some(vec![]),
            ..Default::default()
        }
    }

    fn composite(name: &str, operator: Operator, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            name: Some(name.to_string()),
            operator: Some(operator.name().to_string()),
            weight: Some(1.0),
            children: Some(children),
            ..Default::default()
        }
    }

    fn number_at(table: &MemoryTable, row: u64, field: &str) -> Option<f64> {
        let id = table.field_index(field).expect("field exists");
        table.value(RowId(row), id).as_number()
    }

    #[test]
    fn test_leaf_is_a_no_op() {
        init_logging();
        let mut table = table_with(&[("FA", &[Some(1.0)])]);
        let fields_before = table.field_names();
        let node = leaf("FA", 0.5, false);

        let eval = calculate_composite_variable(&mut table, &node).unwrap();
        assert!(eval.added_fields.is_empty());
        assert!(eval.discarded.is_empty());
        assert_eq!(eval.node, node);
        assert!(!eval.changed);
        assert_eq!(table.field_names(), fields_before);
    }

    #[test]
    fn test_weighted_sum_with_inversion_and_missing_row() {
        init_logging();
        let mut table = table_with(&[
            ("FA", &[Some(2.0), Some(1.0)]),
            ("FB", &[Some(4.0), None]),
        ]);
        let node = composite(
            "Theme",
            Operator::WeightedSum,
            vec![leaf("FA", 0.5, true), leaf("FB", 0.5, false)],
        );

        let eval = calculate_composite_variable(&mut table, &node).unwrap();
        assert_eq!(eval.added_fields.len(), 1);
        assert!(eval.changed);
        assert_eq!(eval.node.field.as_deref(), Some("THEME"));
        // 0.5 * (-2.0) + 0.5 * 4.0
        assert_eq!(number_at(&table, 1, "THEME"), Some(1.0));
        // FB is NULL in row 2, so the theme is NULL there no matter what FA holds
        assert_eq!(number_at(&table, 2, "THEME"), None);
        assert_eq!(
            eval.discarded.into_iter().collect::<Vec<_>>(),
            vec![DiscardedRow {
                row: RowId(2),
                reason: DiscardReason::MissingValue
            }]
        );
    }

    #[rstest::rstest]
    #[case(Operator::SimpleSum, 10.0)]
    #[case(Operator::WeightedSum, 5.0)]
    #[case(Operator::Average, 5.0)]
    #[case(Operator::SimpleMultiplication, 16.0)]
    #[case(Operator::WeightedMultiplication, 4.0)]
    #[case(Operator::GeometricMean, 4.0)]
    fn test_every_operator_over_two_children(#[case] operator: Operator, #[case] expected: f64) {
        init_logging();
        let mut table = table_with(&[("FA", &[Some(2.0)]), ("FB", &[Some(8.0)])]);
        let node = composite(
            "Theme",
            operator,
            vec![leaf("FA", 0.5, false), leaf("FB", 0.5, false)],
        );
        calculate_composite_variable(&mut table, &node).unwrap();
        assert_eq!(number_at(&table, 1, "THEME"), Some(expected));
    }

    #[test]
    fn test_two_level_tree_binds_every_composite_node() {
        init_logging();
        let mut table = table_with(&[
            ("EDUF", &[Some(1.0), Some(3.0)]),
            ("EDUM", &[Some(2.0), Some(5.0)]),
            ("ENVA", &[Some(4.0), Some(7.0)]),
        ]);
        let svi = composite(
            "SVI",
            Operator::Average,
            vec![
                composite(
                    "Education",
                    Operator::Average,
                    vec![leaf("EDUF", 0.5, false), leaf("EDUM", 0.5, false)],
                ),
                composite("Environment", Operator::Average, vec![leaf("ENVA", 1.0, false)]),
            ],
        );

        let eval = calculate_composite_variable(&mut table, &svi).unwrap();
        assert_eq!(eval.added_fields.len(), 3);
        assert!(eval.changed);
        assert_eq!(eval.node.children()[0].field.as_deref(), Some("EDUCATION"));
        assert_eq!(eval.node.children()[1].field.as_deref(), Some("ENVIRONMEN"));
        assert_eq!(number_at(&table, 1, "EDUCATION"), Some(1.5));
        assert_eq!(number_at(&table, 2, "EDUCATION"), Some(4.0));
        // SVI row 1: avg(1.5, 4.0)
        assert_eq!(number_at(&table, 1, "SVI"), Some(2.75));
        assert_eq!(number_at(&table, 2, "SVI"), Some(5.5));
    }

    #[test]
    fn test_second_run_is_idempotent() {
        init_logging();
        let mut table = table_with(&[
            ("FA", &[Some(2.0)]),
            ("FB", &[Some(4.0)]),
        ]);
        let node = composite(
            "Theme",
            Operator::WeightedSum,
            vec![leaf("FA", 0.5, false), leaf("FB", 0.5, false)],
        );

        let first = calculate_composite_variable(&mut table, &node).unwrap();
        assert!(first.changed);
        let fields_after_first = table.field_names();
        let value_after_first = number_at(&table, 1, "THEME");

        let second = calculate_composite_variable(&mut table, &first.node).unwrap();
        assert!(second.added_fields.is_empty());
        assert!(!second.changed);
        assert_eq!(second.node, first.node);
        assert_eq!(table.field_names(), fields_after_first);
        assert_eq!(number_at(&table, 1, "THEME"), value_after_first);
    }

    #[test]
    fn test_deleted_output_column_is_added_back() {
        init_logging();
        let mut table = table_with(&[("FA", &[Some(2.0)])]);
        let node = composite("Theme", Operator::SimpleSum, vec![leaf("FA", 1.0, false)]);

        let first = calculate_composite_variable(&mut table, &node).unwrap();
        let theme_id = table.field_index("THEME").unwrap();
        table.delete_fields(&[theme_id]);

        let second = calculate_composite_variable(&mut table, &first.node).unwrap();
        assert_eq!(second.added_fields.len(), 1);
        assert!(second.changed);
        assert_eq!(number_at(&table, 1, "THEME"), Some(2.0));
    }

    #[test]
    fn test_invalid_operator_rolls_back_added_fields() {
        init_logging();
        let mut table = table_with(&[("FA", &[Some(2.0)])]);
        let fields_before = table.field_names();
        let mut node = composite("Theme", Operator::SimpleSum, vec![leaf("FA", 1.0, false)]);
        node.operator = Some("Sum (weighted)".to_string());

        let err = calculate_composite_variable(&mut table, &node).unwrap_err();
        assert_eq!(err, CalcError::InvalidOperator("Sum (weighted)".to_string()));
        assert_eq!(table.field_names(), fields_before);
    }

    #[test]
    fn test_invalid_child_rolls_back_sibling_additions_too() {
        init_logging();
        let mut table = table_with(&[("FA", &[Some(2.0)])]);
        let fields_before = table.field_names();
        let fieldless_leaf = TreeNode {
            name: Some("RI".to_string()),
            children: Some(vec![]),
            ..Default::default()
        };
        // the first child gets its own field added before the second child
        // fails; both additions must be gone afterwards
        let root = composite(
            "IRI",
            Operator::WeightedSum,
            vec![
                composite("Theme", Operator::SimpleSum, vec![leaf("FA", 1.0, false)]),
                fieldless_leaf,
            ],
        );

        let err = calculate_composite_variable(&mut table, &root).unwrap_err();
        assert!(matches!(err, CalcError::InvalidChild { .. }));
        assert_eq!(table.field_names(), fields_before);
    }

    #[test]
    fn test_nameless_fieldless_node_is_invalid() {
        init_logging();
        let mut table = table_with(&[("FA", &[Some(2.0)])]);
        let mut node = composite("Theme", Operator::SimpleSum, vec![leaf("FA", 1.0, false)]);
        node.name = None;

        let err = calculate_composite_variable(&mut table, &node).unwrap_err();
        assert_eq!(err, CalcError::InvalidNode);
    }

    #[test]
    fn test_textual_input_is_a_data_type_error() {
        init_logging();
        let mut table = table_with(&[("FA", &[Some(2.0)])]);
        let (zone_id, zone_name) = table.add_text_field("ZONE_NAME");
        table.set_value(RowId(1), zone_id, CellValue::Text("Lima".to_string()));
        let fields_before = table.field_names();

        let node = composite(
            "Theme",
            Operator::SimpleSum,
            vec![leaf("FA", 1.0, false), leaf(&zone_name, 1.0, false)],
        );
        let err = calculate_composite_variable(&mut table, &node).unwrap_err();
        assert!(matches!(err, CalcError::DataType(_)));
        assert_eq!(table.field_names(), fields_before);
    }

    #[test]
    fn test_missing_leaf_propagates_to_every_ancestor() {
        init_logging();
        let mut table = table_with(&[
            ("FA", &[Some(1.0), None]),
            ("FB", &[Some(2.0), Some(3.0)]),
        ]);
        let root = composite(
            "SVI",
            Operator::WeightedSum,
            vec![
                composite("Theme", Operator::WeightedSum, vec![leaf("FA", 1.0, false)]),
                leaf("FB", 1.0, false),
            ],
        );

        let eval = calculate_composite_variable(&mut table, &root).unwrap();
        assert_eq!(number_at(&table, 2, "THEME"), None);
        assert_eq!(number_at(&table, 2, "SVI"), None);
        assert!(eval.discarded.contains(&DiscardedRow {
            row: RowId(2),
            reason: DiscardReason::MissingValue
        }));
        // the valid row is unaffected
        assert_eq!(number_at(&table, 1, "SVI"), Some(3.0));
    }

    #[test]
    fn test_geometric_mean_discards_negative_product_as_invalid() {
        init_logging();
        let mut table = table_with(&[
            ("FA", &[Some(2.0), Some(2.0)]),
            ("FB", &[Some(8.0), Some(8.0)]),
        ]);
        // row semantics identical, but FA inverted makes the product negative
        let node = composite(
            "Theme",
            Operator::GeometricMean,
            vec![leaf("FA", 1.0, true), leaf("FB", 1.0, false)],
        );

        let eval = calculate_composite_variable(&mut table, &node).unwrap();
        assert_eq!(number_at(&table, 1, "THEME"), None);
        assert_eq!(
            eval.discarded.first(),
            Some(&DiscardedRow {
                row: RowId(1),
                reason: DiscardReason::InvalidValue
            })
        );

        let positive = composite(
            "Theme2",
            Operator::GeometricMean,
            vec![leaf("FA", 1.0, false), leaf("FB", 1.0, false)],
        );
        let eval = calculate_composite_variable(&mut table, &positive).unwrap();
        assert!(eval.discarded.is_empty());
        assert_eq!(number_at(&table, 1, "THEME2"), Some(4.0));
    }
}
