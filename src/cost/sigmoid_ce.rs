//! Cross-entropy with a fused sigmoid.

use super::CostFunc;
use crate::backprop::{NodeRef, RNodeRef, RVariable, RVector, Variable};
use crate::ops::{
    add, add_r, add_scaler, add_scaler_r, log_sigmoid, log_sigmoid_r, mul, mul_r, pool, pool_r,
    scale, scale_r, sum_all, sum_all_r,
};
use crate::vector::Vector;

/// Applies a sigmoid to the actual values, then measures cross-entropy.
///
/// Uses `ln σ(a)` and `ln σ(-a) = ln(1 - σ(a))` directly, which stays finite
/// for large `|a|` where composing `log` with `sigmoid` would not.
///
/// # Formula
/// $$ C = -\\sum_i \\left[ x_i \\ln \\sigma(a_i) + (1 - x_i) \\ln \\sigma(-a_i) \\right] $$
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigmoidCrossEntropyCost;

impl CostFunc for SigmoidCrossEntropyCost {
    fn cost(&self, expected: &Vector, actual: NodeRef) -> NodeRef {
        let expected = expected.clone();
        pool(actual, move |a| {
            let x: NodeRef = Variable::shared(expected);
            let log = log_sigmoid(a.clone());
            let inv_log = log_sigmoid(scale(a, -1.0));
            let one_minus_x = add_scaler(scale(x.clone(), -1.0), 1.0);

            let sums = add(mul(x, log), mul(one_minus_x, inv_log));
            scale(sum_all(sums), -1.0)
        })
    }

    fn cost_r(&self, _v: &RVector, expected: &Vector, actual: RNodeRef) -> RNodeRef {
        let expected = expected.clone();
        pool_r(actual, move |a| {
            let x: RNodeRef = RVariable::constant_of(expected);
            let log = log_sigmoid_r(a.clone());
            let inv_log = log_sigmoid_r(scale_r(a, -1.0));
            let one_minus_x = add_scaler_r(scale_r(x.clone(), -1.0), 1.0);

            let sums = add_r(mul_r(x, log), mul_r(one_minus_x, inv_log));
            scale_r(sum_all_r(sums), -1.0)
        })
    }
}
