//! operator.rs
//! The closed set of combination operators a node can use to merge the
//! values of its children.

/// One of the six recognized combination operators.
///
/// The canonical names are the ones stored in project definitions; an
/// unrecognized name stays a plain string in the tree and only fails when a
/// calculation actually needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    SimpleSum,
    WeightedSum,
    Average,
    SimpleMultiplication,
    WeightedMultiplication,
    GeometricMean,
}

/// Operators either fold children by addition or by multiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    Sum,
    Multiplication,
}

/// Used when a node does not name an operator.
pub const DEFAULT_OPERATOR: Operator = Operator::WeightedSum;

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::SimpleSum,
        Operator::WeightedSum,
        Operator::Average,
        Operator::SimpleMultiplication,
        Operator::WeightedMultiplication,
        Operator::GeometricMean,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operator::SimpleSum => "Simple sum (ignore weights)",
            Operator::WeightedSum => "Weighted sum",
            Operator::Average => "Average (ignore weights)",
            Operator::SimpleMultiplication => "Simple multiplication (ignore weights)",
            Operator::WeightedMultiplication => "Weighted multiplication",
            Operator::GeometricMean => "Geometric mean (ignore weights)",
        }
    }

    pub fn parse(name: &str) -> Option<Operator> {
        Operator::ALL.iter().copied().find(|op| op.name() == name)
    }

    pub fn family(&self) -> OperatorFamily {
        match self {
            Operator::SimpleSum | Operator::WeightedSum | Operator::Average => OperatorFamily::Sum,
            Operator::SimpleMultiplication
            | Operator::WeightedMultiplication
            | Operator::GeometricMean => OperatorFamily::Multiplication,
        }
    }

    /// The ignoring-weight operators still honor inversion.
    pub fn ignores_weights(&self) -> bool {
        !matches!(self, Operator::WeightedSum | Operator::WeightedMultiplication)
    }

    /// Initial accumulator value: 0 for the sum family, 1 for the
    /// multiplication family.
    pub fn identity(&self) -> f64 {
        match self.family() {
            OperatorFamily::Sum => 0.0,
            OperatorFamily::Multiplication => 1.0,
        }
    }

    /// Folds one child's value into the accumulator.
    pub fn fold(&self, acc: f64, value: f64, weight: f64, inverted: bool) -> f64 {
        let inversion_factor = if inverted { -1.0 } else { 1.0 };
        let contribution = if self.ignores_weights() {
            value * inversion_factor
        } else {
            weight * value * inversion_factor
        };
        match self.family() {
            OperatorFamily::Sum => acc + contribution,
            OperatorFamily::Multiplication => acc * contribution,
        }
    }

    /// Applies the post-fold step, if any.
    ///
    /// Average divides by the child count. Geometric mean raises the
    /// product to the 1/n-th power; a negative product under a fractional
    /// exponent has no real root, which `None` reports so the caller can
    /// discard the row.
    pub fn finalize(&self, acc: f64, n_children: usize) -> Option<f64> {
        match self {
            Operator::Average => Some(acc / n_children as f64),
            Operator::GeometricMean => {
                let exponent = 1.0 / n_children as f64;
                if acc < 0.0 && exponent.fract() != 0.0 {
                    None
                } else {
                    Some(acc.powf(exponent))
                }
            }
            _ => Some(acc),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
