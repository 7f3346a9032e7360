//! L1 cost.

use super::CostFunc;
use crate::backprop::{NodeRef, RNodeRef, RVariable, RVector, Variable};
use crate::ops::{add, add_r, mul, mul_r, sum_all, sum_all_r};
use crate::vector::Vector;

/// Sum of absolute differences between actual and expected values.
///
/// The gradient multiplies the difference by a sign mask taken from the
/// current output. The mask is a constant leaf, so `|a - x|` has gradient
/// `+1` wherever `a >= x` (including the kink at `a == x`) and `-1` elsewhere.
///
/// Building the node reads `actual.output()` once to compute the mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsCost;

fn sign_mask(diff: &Vector) -> Vector {
    diff.iter()
        .map(|&d| if d < 0.0 { -1.0 } else { 1.0 })
        .collect()
}

impl CostFunc for AbsCost {
    fn cost(&self, expected: &Vector, actual: NodeRef) -> NodeRef {
        let neg_expected = Variable::shared(expected.scaled(-1.0));
        let diff = add(neg_expected, actual);
        let mask = Variable::shared(sign_mask(diff.output()));
        sum_all(mul(mask, diff))
    }

    fn cost_r(&self, _v: &RVector, expected: &Vector, actual: RNodeRef) -> RNodeRef {
        let neg_expected = RVariable::constant_of(expected.scaled(-1.0));
        let diff = add_r(neg_expected, actual);
        let mask = RVariable::constant_of(sign_mask(diff.output()));
        sum_all_r(mul_r(mask, diff))
    }
}
