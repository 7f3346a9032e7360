//! Binary cross-entropy cost over probabilities.

use super::CostFunc;
use crate::backprop::{NodeRef, RNodeRef, RVariable, RVector, Variable};
use crate::ops::{
    add, add_r, add_scaler, add_scaler_r, log, log_r, mul, mul_r, pool, pool_r, scale, scale_r,
    sum_all, sum_all_r,
};
use crate::vector::Vector;

/// Cross-entropy between expected and actual probabilities.
///
/// # Formula
/// $$ C = -\\sum_i \\left[ x_i \\ln a_i + (1 - x_i) \\ln (1 - a_i) \\right] $$
///
/// Every `a_i` must lie in `(0, 1)`. The actual node is pooled since it feeds
/// both logarithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrossEntropyCost;

impl CostFunc for CrossEntropyCost {
    fn cost(&self, expected: &Vector, actual: NodeRef) -> NodeRef {
        let expected = expected.clone();
        pool(actual, move |a| {
            let x: NodeRef = Variable::shared(expected);
            let log_a = log(a.clone());
            let one_minus_a = add_scaler(scale(a, -1.0), 1.0);
            let one_minus_x = add_scaler(scale(x.clone(), -1.0), 1.0);
            let log_1a = log(one_minus_a);

            let error = add(mul(x, log_a), mul(one_minus_x, log_1a));
            scale(sum_all(error), -1.0)
        })
    }

    fn cost_r(&self, _v: &RVector, expected: &Vector, actual: RNodeRef) -> RNodeRef {
        let expected = expected.clone();
        pool_r(actual, move |a| {
            let x: RNodeRef = RVariable::constant_of(expected);
            let log_a = log_r(a.clone());
            let one_minus_a = add_scaler_r(scale_r(a, -1.0), 1.0);
            let one_minus_x = add_scaler_r(scale_r(x.clone(), -1.0), 1.0);
            let log_1a = log_r(one_minus_a);

            let error = add_r(mul_r(x, log_a), mul_r(one_minus_x, log_1a));
            scale_r(sum_all_r(error), -1.0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backprop::Gradient;
    use crate::vector;

    #[test]
    fn test_cross_entropy_value() {
        let actual = Variable::shared(vector![0.7, 0.2]);
        let cost = CrossEntropyCost.cost(&vector![1.0, 0.0], actual);
        let want = -(0.7f64.ln() + 0.8f64.ln());
        assert!((cost.output()[0] - want).abs() < 1e-12);
    }

    #[test]
    fn test_cross_entropy_gradient() {
        let actual = Variable::shared(vector![0.25]);
        let cost = CrossEntropyCost.cost(&vector![1.0], actual.clone());
        let mut grad = Gradient::zeros(&[actual.clone()]);
        cost.propagate_gradient(vector![1.0], &mut grad);
        // -x/a + (1-x)/(1-a)
        assert!((grad.get(&actual).unwrap()[0] + 4.0).abs() < 1e-12);
    }
}
