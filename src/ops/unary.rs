//! Elementwise nonlinearities: `log`, `sigmoid` and `log_sigmoid`.
//!
//! All three share one node implementation parameterized by an [`Elementwise`]
//! function, which supplies the value and the first two derivatives needed by
//! reverse mode and by R-gradients.

use crate::backprop::{Func, Gradient, Node, NodeRef, RFunc, RGradient, RNode, RNodeRef, RVector};
use crate::vector::Vector;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// A scalar function applied to every element.
pub trait Elementwise: Send + Sync + 'static {
    /// `f(x)`
    fn value(x: f64) -> f64;
    /// `f'(x)`
    fn deriv(x: f64) -> f64;
    /// `f''(x)`
    fn second_deriv(x: f64) -> f64;
}

/// Natural logarithm. Inputs must be positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct Log;

/// Logistic sigmoid `1 / (1 + e^-x)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

/// `ln(sigmoid(x))`, evaluated without forming `sigmoid(x)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSigmoid;

fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl Elementwise for Log {
    fn value(x: f64) -> f64 {
        x.ln()
    }

    fn deriv(x: f64) -> f64 {
        1.0 / x
    }

    fn second_deriv(x: f64) -> f64 {
        -1.0 / (x * x)
    }
}

impl Elementwise for Sigmoid {
    fn value(x: f64) -> f64 {
        logistic(x)
    }

    fn deriv(x: f64) -> f64 {
        let s = logistic(x);
        s * (1.0 - s)
    }

    fn second_deriv(x: f64) -> f64 {
        let s = logistic(x);
        s * (1.0 - s) * (1.0 - 2.0 * s)
    }
}

impl Elementwise for LogSigmoid {
    fn value(x: f64) -> f64 {
        if x < 0.0 {
            x - x.exp().ln_1p()
        } else {
            -(-x).exp().ln_1p()
        }
    }

    // d/dx ln(sigmoid(x)) = sigmoid(-x)
    fn deriv(x: f64) -> f64 {
        logistic(-x)
    }

    fn second_deriv(x: f64) -> f64 {
        -logistic(x) * logistic(-x)
    }
}

/// Elementwise natural logarithm.
#[must_use]
pub fn log(a: NodeRef) -> NodeRef {
    unary::<Log>(a)
}

/// Forward-mode [`log`].
#[must_use]
pub fn log_r(a: RNodeRef) -> RNodeRef {
    unary_r::<Log>(a)
}

/// Elementwise logistic sigmoid.
#[must_use]
pub fn sigmoid(a: NodeRef) -> NodeRef {
    unary::<Sigmoid>(a)
}

/// Forward-mode [`sigmoid`].
#[must_use]
pub fn sigmoid_r(a: RNodeRef) -> RNodeRef {
    unary_r::<Sigmoid>(a)
}

/// Elementwise `ln(sigmoid(x))`.
#[must_use]
pub fn log_sigmoid(a: NodeRef) -> NodeRef {
    unary::<LogSigmoid>(a)
}

/// Forward-mode [`log_sigmoid`].
#[must_use]
pub fn log_sigmoid_r(a: RNodeRef) -> RNodeRef {
    unary_r::<LogSigmoid>(a)
}

/// Builds a node applying `F` to every element of `a`.
#[must_use]
pub fn unary<F: Elementwise>(a: NodeRef) -> NodeRef {
    Arc::new(UnaryNode::<F> {
        a,
        output: OnceCell::new(),
        _f: core::marker::PhantomData,
    })
}

/// Forward-mode [`unary`].
#[must_use]
pub fn unary_r<F: Elementwise>(a: RNodeRef) -> RNodeRef {
    Arc::new(UnaryRNode::<F> {
        a,
        output: OnceCell::new(),
        r_output: OnceCell::new(),
        _f: core::marker::PhantomData,
    })
}

macro_rules! elementwise_funcs {
    ($($ty:ty),+) => {$(
        impl Func for $ty {
            fn apply(&self, input: NodeRef) -> NodeRef {
                unary::<$ty>(input)
            }
        }

        impl RFunc for $ty {
            fn apply_r(&self, _v: &RVector, input: RNodeRef) -> RNodeRef {
                unary_r::<$ty>(input)
            }
        }
    )+};
}

elementwise_funcs!(Log, Sigmoid, LogSigmoid);

struct UnaryNode<F> {
    a: NodeRef,
    output: OnceCell<Vector>,
    _f: core::marker::PhantomData<fn() -> F>,
}

impl<F: Elementwise> Node for UnaryNode<F> {
    fn output(&self) -> &Vector {
        self.output.get_or_init(|| self.a.output().map(F::value))
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.a.constant(grad)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        if !self.a.constant(grad) {
            let down = upstream.zip_map(self.a.output(), |u, x| u * F::deriv(x));
            self.a.propagate_gradient(down, grad);
        }
    }
}

struct UnaryRNode<F> {
    a: RNodeRef,
    output: OnceCell<Vector>,
    r_output: OnceCell<Vector>,
    _f: core::marker::PhantomData<fn() -> F>,
}

impl<F: Elementwise> RNode for UnaryRNode<F> {
    fn output(&self) -> &Vector {
        self.output.get_or_init(|| self.a.output().map(F::value))
    }

    fn r_output(&self) -> &Vector {
        self.r_output.get_or_init(|| {
            self.a
                .r_output()
                .zip_map(self.a.output(), |r, x| r * F::deriv(x))
        })
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
        let x = self.a.output();
        let rx = self.a.r_output();
        let down = upstream.zip_map(x, |u, x| u * F::deriv(x));
        let second = upstream
            .zip_map(x, |u, x| u * F::second_deriv(x))
            .mul(rx);
        let down_r = upstream_r
            .zip_map(x, |ur, x| ur * F::deriv(x))
            .add(&second);
        self.a.propagate_r_gradient(down, down_r, rgrad, grad);
    }
}
