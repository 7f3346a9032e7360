//! Elementwise arithmetic nodes: sums, scalar offsets, scaling and products.

use crate::backprop::{Gradient, Node, NodeRef, RGradient, RNode, RNodeRef};
use crate::vector::Vector;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Elementwise `a + b`.
///
/// # Panics
/// Evaluating the node panics if the operands differ in length.
#[must_use]
pub fn add(a: NodeRef, b: NodeRef) -> NodeRef {
    Arc::new(AddNode { a, b, output: OnceCell::new() })
}

/// Forward-mode [`add`].
#[must_use]
pub fn add_r(a: RNodeRef, b: RNodeRef) -> RNodeRef {
    Arc::new(AddRNode {
        a,
        b,
        output: OnceCell::new(),
        r_output: OnceCell::new(),
    })
}

/// Adds the scalar `s` to every element of `a`.
#[must_use]
pub fn add_scaler(a: NodeRef, s: f64) -> NodeRef {
    Arc::new(AddScalerNode { a, s, output: OnceCell::new() })
}

/// Forward-mode [`add_scaler`].
#[must_use]
pub fn add_scaler_r(a: RNodeRef, s: f64) -> RNodeRef {
    Arc::new(AddScalerRNode { a, s, output: OnceCell::new() })
}

/// Multiplies every element of `a` by `s`.
#[must_use]
pub fn scale(a: NodeRef, s: f64) -> NodeRef {
    Arc::new(ScaleNode { a, s, output: OnceCell::new() })
}

/// Forward-mode [`scale`].
#[must_use]
pub fn scale_r(a: RNodeRef, s: f64) -> RNodeRef {
    Arc::new(ScaleRNode {
        a,
        s,
        output: OnceCell::new(),
        r_output: OnceCell::new(),
    })
}

/// Elementwise (Hadamard) product `a ∘ b`.
///
/// # Panics
/// Evaluating the node panics if the operands differ in length.
#[must_use]
pub fn mul(a: NodeRef, b: NodeRef) -> NodeRef {
    Arc::new(MulNode { a, b, output: OnceCell::new() })
}

/// Forward-mode [`mul`].
#[must_use]
pub fn mul_r(a: RNodeRef, b: RNodeRef) -> RNodeRef {
    Arc::new(MulRNode {
        a,
        b,
        output: OnceCell::new(),
        r_output: OnceCell::new(),
    })
}

struct AddNode {
    a: NodeRef,
    b: NodeRef,
    output: OnceCell<Vector>,
}

impl Node for AddNode {
    fn output(&self) -> &Vector {
        self.output
            .get_or_init(|| self.a.output().add(self.b.output()))
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.a.constant(grad) && self.b.constant(grad)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        let a_live = !self.a.constant(grad);
        let b_live = !self.b.constant(grad);
        match (a_live, b_live) {
            (true, true) => {
                self.a.propagate_gradient(upstream.clone(), grad);
                self.b.propagate_gradient(upstream, grad);
            }
            (true, false) => self.a.propagate_gradient(upstream, grad),
            (false, true) => self.b.propagate_gradient(upstream, grad),
            (false, false) => {}
        }
    }
}

struct AddRNode {
    a: RNodeRef,
    b: RNodeRef,
    output: OnceCell<Vector>,
    r_output: OnceCell<Vector>,
}

impl RNode for AddRNode {
    fn output(&self) -> &Vector {
        self.output
            .get_or_init(|| self.a.output().add(self.b.output()))
    }

    fn r_output(&self) -> &Vector {
        self.r_output
            .get_or_init(|| self.a.r_output().add(self.b.r_output()))
    }

    fn constant(&self, rgrad: &RGradient, grad: Option<&Gradient>) -> bool {
        self.a.constant(rgrad, grad) && self.b.constant(rgrad, grad)
    }

    fn propagate_r_gradient(
        &self,
        upstream: Vector,
        upstream_r: Vector,
        rgrad: &mut RGradient,
        mut grad: Option<&mut Gradient>,
    ) {
        let a_live = !self.a.constant(rgrad, grad.as_deref());
        let b_live = !self.b.constant(rgrad, grad.as_deref());
        match (a_live, b_live) {
            (true, true) => {
                self.a.propagate_r_gradient(
                    upstream.clone(),
                    upstream_r.clone(),
                    rgrad,
                    grad.as_deref_mut(),
                );
                self.b.propagate_r_gradient(upstream, upstream_r, rgrad, grad);
            }
            (true, false) => self.a.propagate_r_gradient(upstream, upstream_r, rgrad, grad),
            (false, true) => self.b.propagate_r_gradient(upstream, upstream_r, rgrad, grad),
            (false, false) => {}
        }
    }
}

struct AddScalerNode {
    a: NodeRef,
    s: f64,
    output: OnceCell<Vector>,
}

impl Node for AddScalerNode {
    fn output(&self) -> &Vector {
        let s = self.s;
        self.output.get_or_init(|| self.a.output().map(|x| x + s))
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.a.constant(grad)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        if !self.a.constant(grad) {
            self.a.propagate_gradient(upstream, grad);
        }
    }
}

struct AddScalerRNode {
    a: RNodeRef,
    s: f64,
    output: OnceCell<Vector>,
}

impl RNode for AddScalerRNode {
    fn output(&self) -> &Vector {
        let s = self.s;
        self.output.get_or_init(|| self.a.output().map(|x| x + s))
    }

    // Offsets do not change directions.
    fn r_output(&self) -> &Vector {
        self.a.r_output()
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
            self.a.propagate_r_gradient(upstream, upstream_r, rgrad, grad);
        }
    }
}

struct ScaleNode {
    a: NodeRef,
    s: f64,
    output: OnceCell<Vector>,
}

impl Node for ScaleNode {
    fn output(&self) -> &Vector {
        self.output.get_or_init(|| self.a.output().scaled(self.s))
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.a.constant(grad)
    }

    fn propagate_gradient(&self, mut upstream: Vector, grad: &mut Gradient) {
        if !self.a.constant(grad) {
            upstream.scale_assign(self.s);
            self.a.propagate_gradient(upstream, grad);
        }
    }
}

struct ScaleRNode {
    a: RNodeRef,
    s: f64,
    output: OnceCell<Vector>,
    r_output: OnceCell<Vector>,
}

impl RNode for ScaleRNode {
    fn output(&self) -> &Vector {
        self.output.get_or_init(|| self.a.output().scaled(self.s))
    }

    fn r_output(&self) -> &Vector {
        self.r_output
            .get_or_init(|| self.a.r_output().scaled(self.s))
    }

    fn constant(&self, rgrad: &RGradient, grad: Option<&Gradient>) -> bool {
        self.a.constant(rgrad, grad)
    }

    fn propagate_r_gradient(
        &self,
        mut upstream: Vector,
        mut upstream_r: Vector,
        rgrad: &mut RGradient,
        grad: Option<&mut Gradient>,
    ) {
        if !self.a.constant(rgrad, grad.as_deref()) {
            upstream.scale_assign(self.s);
            upstream_r.scale_assign(self.s);
            self.a.propagate_r_gradient(upstream, upstream_r, rgrad, grad);
        }
    }
}

struct MulNode {
    a: NodeRef,
    b: NodeRef,
    output: OnceCell<Vector>,
}

impl Node for MulNode {
    fn output(&self) -> &Vector {
        self.output
            .get_or_init(|| self.a.output().mul(self.b.output()))
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.a.constant(grad) && self.b.constant(grad)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        if !self.a.constant(grad) {
            let da = upstream.mul(self.b.output());
            self.a.propagate_gradient(da, grad);
        }
        if !self.b.constant(grad) {
            let db = upstream.mul(self.a.output());
            self.b.propagate_gradient(db, grad);
        }
    }
}

struct MulRNode {
    a: RNodeRef,
    b: RNodeRef,
    output: OnceCell<Vector>,
    r_output: OnceCell<Vector>,
}

impl RNode for MulRNode {
    fn output(&self) -> &Vector {
        self.output
            .get_or_init(|| self.a.output().mul(self.b.output()))
    }

    fn r_output(&self) -> &Vector {
        self.r_output.get_or_init(|| {
            let left = self.a.r_output().mul(self.b.output());
            let right = self.a.output().mul(self.b.r_output());
            left.add(&right)
        })
    }

    fn constant(&self, rgrad: &RGradient, grad: Option<&Gradient>) -> bool {
        self.a.constant(rgrad, grad) && self.b.constant(rgrad, grad)
    }

    fn propagate_r_gradient(
        &self,
        upstream: Vector,
        upstream_r: Vector,
        rgrad: &mut RGradient,
        mut grad: Option<&mut Gradient>,
    ) {
        let (a, b) = (&self.a, &self.b);
        if !a.constant(rgrad, grad.as_deref()) {
            let da = upstream.mul(b.output());
            let da_r = upstream_r.mul(b.output()).add(&upstream.mul(b.r_output()));
            a.propagate_r_gradient(da, da_r, rgrad, grad.as_deref_mut());
        }
        if !b.constant(rgrad, grad.as_deref()) {
            let db = upstream.mul(a.output());
            let db_r = upstream_r.mul(a.output()).add(&upstream.mul(a.r_output()));
            b.propagate_r_gradient(db, db_r, rgrad, grad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backprop::{RVariable, RVector, Variable};
    use crate::vector;

    #[test]
    fn test_add_skips_constant_operand() {
        let a = Variable::shared(vector![1.0, 2.0]);
        let b = Variable::shared(vector![3.0, 4.0]);
        let sum = add(a.clone(), b.clone());
        assert_eq!(sum.output(), &vector![4.0, 6.0]);

        let mut grad = Gradient::zeros(&[a.clone()]);
        sum.propagate_gradient(vector![1.0, -1.0], &mut grad);
        assert_eq!(grad.get(&a), Some(&vector![1.0, -1.0]));
        assert!(grad.get(&b).is_none());
    }

    #[test]
    fn test_mul_gradients() {
        let a = Variable::shared(vector![2.0, 3.0]);
        let b = Variable::shared(vector![5.0, 7.0]);
        let prod = mul(a.clone(), b.clone());
        assert_eq!(prod.output(), &vector![10.0, 21.0]);

        let mut grad = Gradient::zeros(&[a.clone(), b.clone()]);
        prod.propagate_gradient(vector![1.0, 1.0], &mut grad);
        assert_eq!(grad.get(&a), Some(&vector![5.0, 7.0]));
        assert_eq!(grad.get(&b), Some(&vector![2.0, 3.0]));
    }

    #[test]
    fn test_scale_and_offset() {
        let a = Variable::shared(vector![1.0, -1.0]);
        let out = add_scaler(scale(a.clone(), -2.0), 1.0);
        assert_eq!(out.output(), &vector![-1.0, 3.0]);

        let mut grad = Gradient::zeros(&[a.clone()]);
        out.propagate_gradient(vector![1.0, 2.0], &mut grad);
        assert_eq!(grad.get(&a), Some(&vector![-2.0, -4.0]));
    }

    #[test]
    fn test_mul_r_output_is_product_rule() {
        let a = Variable::shared(vector![2.0]);
        let b = Variable::shared(vector![3.0]);
        let mut v = RVector::new();
        v.insert(&a, vector![1.0]);
        v.insert(&b, vector![10.0]);
        let prod = mul_r(RVariable::shared(a, &v), RVariable::shared(b, &v));
        assert_eq!(prod.output(), &vector![6.0]);
        // 1 * 3 + 2 * 10
        assert_eq!(prod.r_output(), &vector![23.0]);
    }

    #[test]
    fn test_scale_r() {
        let a = Variable::shared(vector![1.0, 2.0]);
        let mut v = RVector::new();
        v.insert(&a, vector![1.0, 1.0]);
        let out = add_scaler_r(scale_r(RVariable::shared(a, &v), 3.0), -1.0);
        assert_eq!(out.output(), &vector![2.0, 5.0]);
        assert_eq!(out.r_output(), &vector![3.0, 3.0]);
    }
}
