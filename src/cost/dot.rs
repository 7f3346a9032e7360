//! Negative dot product cost.

use super::CostFunc;
use crate::backprop::{NodeRef, RNodeRef, RVariable, RVector, Variable};
use crate::ops::{mul, mul_r, scale, scale_r, sum_all, sum_all_r};
use crate::vector::Vector;

/// Computes `-(x · a)`.
///
/// Paired with a log-softmax output layer this is the cross-entropy of the
/// softmax, since `a` already holds log-probabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DotCost;

impl CostFunc for DotCost {
    fn cost(&self, expected: &Vector, actual: NodeRef) -> NodeRef {
        let expected = Variable::shared(expected.clone());
        scale(sum_all(mul(expected, actual)), -1.0)
    }

    fn cost_r(&self, _v: &RVector, expected: &Vector, actual: RNodeRef) -> RNodeRef {
        let expected = RVariable::constant_of(expected.clone());
        scale_r(sum_all_r(mul_r(expected, actual)), -1.0)
    }
}
