//! Squared-error cost with a hand-written result node.

use super::CostFunc;
use crate::backprop::{Gradient, Node, NodeRef, RNodeRef, RVariable, RVector};
use crate::ops::{add_r, squared_norm_r};
use crate::vector;
use crate::vector::Vector;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Computes the cost as `||a - x||²`, where `a` is the actual output and `x`
/// the expected output.
///
/// # Formula
/// $$ C = \\sum_i (a_i - x_i)^2, \\quad \\frac{\\partial C}{\\partial a_i} = 2 (a_i - x_i) $$
///
/// # Example
/// ```rust
/// use autocost::backprop::Variable;
/// use autocost::cost::{CostFunc, MeanSquaredCost};
/// use autocost::vector;
///
/// let actual = Variable::shared(vector![1.0, 2.0]);
/// let cost = MeanSquaredCost.cost(&vector![0.0, 4.0], actual);
/// assert_eq!(cost.output()[0], 5.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeanSquaredCost;

impl CostFunc for MeanSquaredCost {
    fn cost(&self, expected: &Vector, actual: NodeRef) -> NodeRef {
        Arc::new(MeanSquaredResult::new(expected.clone(), actual))
    }

    fn cost_r(&self, _v: &RVector, expected: &Vector, actual: RNodeRef) -> RNodeRef {
        let neg_expected = RVariable::constant_of(expected.scaled(-1.0));
        squared_norm_r(add_r(neg_expected, actual))
    }
}

/// Result node of [`MeanSquaredCost::cost`].
///
/// Uses the closed-form gradient `2·(a - x)` rather than differentiating a
/// generic norm-of-difference expression.
///
/// # Panics
/// Evaluating or back-propagating panics if the actual and expected outputs
/// differ in length.
pub struct MeanSquaredResult {
    output: OnceCell<Vector>,
    actual: NodeRef,
    expected: Vector,
}

impl MeanSquaredResult {
    /// Creates an unevaluated result node.
    #[must_use]
    pub fn new(expected: Vector, actual: NodeRef) -> Self {
        Self { output: OnceCell::new(), actual, expected }
    }
}

impl Node for MeanSquaredResult {
    fn output(&self) -> &Vector {
        self.output.get_or_init(|| {
            let actual = self.actual.output();
            assert_eq!(actual.len(), self.expected.len(), "cost dimension mismatch");
            let sum = actual
                .iter()
                .zip(self.expected.iter())
                .map(|(a, x)| (a - x) * (a - x))
                .sum::<f64>();
            vector![sum]
        })
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.actual.constant(grad)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        if self.actual.constant(grad) {
            return;
        }
        let scale = 2.0 * upstream[0];
        let down = self
            .actual
            .output()
            .zip_map(&self.expected, |a, x| scale * (a - x));
        self.actual.propagate_gradient(down, grad);
    }
}
