//! node.rs
//! The project-definition tree: a nested description of how composite
//! indices are assembled from zonal indicators.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a node inside the project definition.
///
/// Serialized with the display names the surrounding tooling stores in its
/// project files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "Integrated Risk Index")]
    IntegratedRiskIndex,
    #[serde(rename = "Risk Index")]
    RiskIndex,
    #[serde(rename = "Risk Indicator")]
    RiskIndicator,
    #[serde(rename = "Social Vulnerability Index")]
    SocialVulnerabilityIndex,
    #[serde(rename = "Social Vulnerability Theme")]
    SocialVulnerabilityTheme,
    #[serde(rename = "Social Vulnerability Indicator")]
    SocialVulnerabilityIndicator,
}

/// One node of the indicator tree.
///
/// A node without children is a leaf: its values are expected to already
/// exist in the attribute table under `field`. A node with children gets
/// its values calculated from them and acquires a `field` in the process.
///
/// The `operator` is kept as the raw string found in the project
/// definition, so an unrecognized name survives a load/save round trip and
/// is only reported when a calculation actually needs it. Keys this crate
/// does not interpret (`description` and whatever else the host stores)
/// pass through `extra` untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Display-only; the host writes both strings ("2.0") and numbers (4.1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(
        rename = "isInverted",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_inverted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TreeNode {
    pub fn from_json(text: &str) -> serde_json::Result<TreeNode> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn children(&self) -> &[TreeNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// Weight of this node when folded into its parent.
    pub fn weight_or_default(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }

    pub fn is_inverted(&self) -> bool {
        self.is_inverted.unwrap_or(false)
    }

    /// Human-readable label for log and error messages.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.field.clone())
            .unwrap_or_else(|| "<unnamed node>".to_string())
    }

    /// Depth-first lookup of a node by name, this node included.
    pub fn get_node(&self, name: &str) -> Option<&TreeNode> {
        if self.name.as_deref() == Some(name) {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.get_node(name))
    }

    /// Index of the direct child with the given type.
    pub fn child_of_type(&self, node_type: NodeType) -> Option<usize> {
        self.children()
            .iter()
            .position(|c| c.node_type == Some(node_type))
    }

    /// Sets the operator on this node and every composite descendant.
    /// Leaves are skipped: they have nothing to combine.
    pub fn set_operator(&mut self, operator: &str) {
        if !self.is_leaf() {
            self.operator = Some(operator.to_string());
        }
        if let Some(children) = self.children.as_mut() {
            for child in children {
                child.set_operator(operator);
            }
        }
    }
}
