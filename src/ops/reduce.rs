//! Reductions to a single-element vector.

use crate::backprop::{Func, Gradient, Node, NodeRef, RFunc, RGradient, RNode, RNodeRef, RVector};
use crate::vector;
use crate::vector::Vector;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// `[Σ a_i]`
#[must_use]
pub fn sum_all(a: NodeRef) -> NodeRef {
    Arc::new(SumAllNode { a, output: OnceCell::new() })
}

/// Forward-mode [`sum_all`].
#[must_use]
pub fn sum_all_r(a: RNodeRef) -> RNodeRef {
    Arc::new(SumAllRNode {
        a,
        output: OnceCell::new(),
        r_output: OnceCell::new(),
    })
}

/// `[Σ a_i²]`
#[must_use]
pub fn squared_norm(a: NodeRef) -> NodeRef {
    Arc::new(SquaredNormNode { a, output: OnceCell::new() })
}

/// Forward-mode [`squared_norm`].
#[must_use]
pub fn squared_norm_r(a: RNodeRef) -> RNodeRef {
    Arc::new(SquaredNormRNode {
        a,
        output: OnceCell::new(),
        r_output: OnceCell::new(),
    })
}

/// Squared Euclidean norm as a [`Func`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredNorm;

impl Func for SquaredNorm {
    fn apply(&self, input: NodeRef) -> NodeRef {
        squared_norm(input)
    }
}

impl RFunc for SquaredNorm {
    fn apply_r(&self, _v: &RVector, input: RNodeRef) -> RNodeRef {
        squared_norm_r(input)
    }
}

struct SumAllNode {
    a: NodeRef,
    output: OnceCell<Vector>,
}

impl Node for SumAllNode {
    fn output(&self) -> &Vector {
        self.output.get_or_init(|| vector![self.a.output().sum()])
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.a.constant(grad)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        if !self.a.constant(grad) {
            let n = self.a.output().len();
            self.a.propagate_gradient(Vector::new(vec![upstream[0]; n]), grad);
        }
    }
}

struct SumAllRNode {
    a: RNodeRef,
    output: OnceCell<Vector>,
    r_output: OnceCell<Vector>,
}

impl RNode for SumAllRNode {
    fn output(&self) -> &Vector {
        self.output.get_or_init(|| vector![self.a.output().sum()])
    }

    fn r_output(&self) -> &Vector {
        self.r_output.get_or_init(|| vector![self.a.r_output().sum()])
    }

    fn constant(&self, rgrad: &RGradient, grad: Option<&Gradient>) -> bool {
        self.a.constant(rgrad, grad)
    }

    fn propagate_r_gradient(
        &self,
        upstream: Vector,
        upstream_r: Vector,
        rgrad: &mut RGradient,
        grad: Option<&mut Gradient>,
    ) {
        if !self.a.constant(rgrad, grad.as_deref()) {
            let n = self.a.output().len();
            self.a.propagate_r_gradient(
                Vector::new(vec![upstream[0]; n]),
                Vector::new(vec![upstream_r[0]; n]),
                rgrad,
                grad,
            );
        }
    }
}

struct SquaredNormNode {
    a: NodeRef,
    output: OnceCell<Vector>,
}

impl Node for SquaredNormNode {
    fn output(&self) -> &Vector {
        self.output
            .get_or_init(|| vector![self.a.output().squared_norm()])
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.a.constant(grad)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        if !self.a.constant(grad) {
            let down = self.a.output().scaled(2.0 * upstream[0]);
            self.a.propagate_gradient(down, grad);
        }
    }
}

struct SquaredNormRNode {
    a: RNodeRef,
    output: OnceCell<Vector>,
    r_output: OnceCell<Vector>,
}

impl RNode for SquaredNormRNode {
    fn output(&self) -> &Vector {
        self.output
            .get_or_init(|| vector![self.a.output().squared_norm()])
    }

    fn r_output(&self) -> &Vector {
        self.r_output
            .get_or_init(|| vector![2.0 * self.a.output().dot(self.a.r_output())])
    }

    fn constant(&self, rgrad: &RGradient, grad: Option<&Gradient>) -> bool {
        self.a.constant(rgrad, grad)
    }

    fn propagate_r_gradient(
        &self,
        upstream: Vector,
        upstream_r: Vector,
        rgrad: &mut RGradient,
        grad: Option<&mut Gradient>,
    ) {
        if self.a.constant(rgrad, grad.as_deref()) {
            return;
        }
        let (u, ur) = (upstream[0], upstream_r[0]);
        let x = self.a.output();
        let down = x.scaled(2.0 * u);
        let down_r = x.scaled(2.0 * ur).add(&self.a.r_output().scaled(2.0 * u));
        self.a.propagate_r_gradient(down, down_r, rgrad, grad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backprop::{RVariable, Variable};

    #[test]
    fn test_sum_all_broadcasts_upstream() {
        let a = Variable::shared(vector![1.0, 2.0, 3.0]);
        let s = sum_all(a.clone());
        assert_eq!(s.output(), &vector![6.0]);
        let mut grad = Gradient::zeros(&[a.clone()]);
        s.propagate_gradient(vector![2.0], &mut grad);
        assert_eq!(grad.get(&a), Some(&vector![2.0, 2.0, 2.0]));
    }

    #[test]
    fn test_squared_norm_r_gradient() {
        let a = Variable::shared(vector![1.0, 2.0]);
        let mut v = RVector::new();
        v.insert(&a, vector![1.0, 0.0]);
        let n = squared_norm_r(RVariable::shared(a.clone(), &v));
        assert_eq!(n.output(), &vector![5.0]);
        assert_eq!(n.r_output(), &vector![2.0]);

        let mut grad = Gradient::zeros(&[a.clone()]);
        let mut rgrad = RGradient::zeros(&[a.clone()]);
        n.propagate_r_gradient(vector![1.0], vector![0.0], &mut rgrad, Some(&mut grad));
        assert_eq!(grad.get(&a), Some(&vector![2.0, 4.0]));
        // Hessian is 2I, so H·v = 2v.
        assert_eq!(rgrad.get(&a), Some(&vector![2.0, 0.0]));
    }
}
