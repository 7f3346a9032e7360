//! L2 weight penalty layered over another cost.

use super::CostFunc;
use crate::backprop::{NodeRef, RNodeRef, RVariable, RVector, Variable};
use crate::ops::{add, add_r, scale, scale_r, squared_norm, squared_norm_r};
use crate::vector::Vector;
use std::sync::Arc;

/// Adds `penalty · ||v||²` for every listed variable to a wrapped cost.
///
/// # Formula
/// $$ C' = C(x, a) + \\lambda \\sum_{v} \\lVert v \\rVert^2 $$
///
/// The penalty terms are joined to the wrapped cost with graph addition, so a
/// single backward pass reaches the cost's inputs and every listed variable.
/// With no variables the result is the wrapped cost unchanged.
///
/// # Example
/// ```rust
/// use autocost::backprop::{Gradient, Variable};
/// use autocost::cost::{CostFunc, DotCost, RegularizingCost};
/// use autocost::vector;
///
/// let weights = Variable::shared(vector![1.0, -2.0]);
/// let cost = RegularizingCost::new(vec![weights.clone()], 0.5, DotCost);
/// let actual = Variable::shared(vector![3.0]);
/// // -(1 * 3) + 0.5 * 5
/// assert_eq!(cost.cost(&vector![1.0], actual).output()[0], -0.5);
/// ```
pub struct RegularizingCost<C = Box<dyn CostFunc>> {
    /// Variables whose squared norms are penalized.
    pub variables: Vec<Arc<Variable>>,
    /// Coefficient on each squared norm.
    pub penalty: f64,
    /// Cost the penalty is added to.
    pub cost: C,
}

impl<C: CostFunc> RegularizingCost<C> {
    /// Wraps `cost`.
    #[must_use]
    pub const fn new(variables: Vec<Arc<Variable>>, penalty: f64, cost: C) -> Self {
        Self { variables, penalty, cost }
    }
}

impl<C: CostFunc> CostFunc for RegularizingCost<C> {
    fn cost(&self, expected: &Vector, actual: NodeRef) -> NodeRef {
        self.variables
            .iter()
            .fold(self.cost.cost(expected, actual), |total, var| {
                add(total, scale(squared_norm(var.clone()), self.penalty))
            })
    }

    fn cost_r(&self, v: &RVector, expected: &Vector, actual: RNodeRef) -> RNodeRef {
        self.variables
            .iter()
            .fold(self.cost.cost_r(v, expected, actual), |total, var| {
                let leaf = RVariable::shared(var.clone(), v);
                add_r(total, scale_r(squared_norm_r(leaf), self.penalty))
            })
    }
}
