//! Concatenation, slicing and a per-sample [`Batcher`].

use crate::backprop::{
    Batcher, Func, Gradient, Node, NodeRef, RBatcher, RFunc, RGradient, RNode, RNodeRef, RVector,
};
use crate::ops::pool::{pool, pool_r};
use crate::vector::Vector;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Joins the outputs of `parts` end to end.
#[must_use]
pub fn concat(parts: Vec<NodeRef>) -> NodeRef {
    Arc::new(ConcatNode { parts, output: OnceCell::new() })
}

/// Forward-mode [`concat`].
#[must_use]
pub fn concat_r(parts: Vec<RNodeRef>) -> RNodeRef {
    Arc::new(ConcatRNode {
        parts,
        output: OnceCell::new(),
        r_output: OnceCell::new(),
    })
}

/// Elements `start..end` of `a`.
///
/// # Panics
/// Evaluating the node panics if the range exceeds `a`'s length.
#[must_use]
pub fn slice(a: NodeRef, start: usize, end: usize) -> NodeRef {
    Arc::new(SliceNode { a, start, end, output: OnceCell::new() })
}

/// Forward-mode [`slice`].
#[must_use]
pub fn slice_r(a: RNodeRef, start: usize, end: usize) -> RNodeRef {
    Arc::new(SliceRNode {
        a,
        start,
        end,
        output: OnceCell::new(),
        r_output: OnceCell::new(),
    })
}

/// Applies a per-sample function to each slice of a batched input.
///
/// The input is pooled, so it receives one gradient call per backward pass
/// no matter how many samples the batch holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuncBatcher<F> {
    /// Function applied to every sample.
    pub func: F,
}

impl<F> FuncBatcher<F> {
    /// Wraps `func`.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

fn sample_len(total: usize, n: usize) -> usize {
    assert!(n > 0, "batch must hold at least one sample");
    assert_eq!(total % n, 0, "batch input does not split into {n} samples");
    total / n
}

impl<F: Func> Batcher for FuncBatcher<F> {
    fn batch(&self, input: NodeRef, n: usize) -> NodeRef {
        let len = sample_len(input.output().len(), n);
        pool(input, |input| {
            let outputs = (0..n)
                .map(|i| self.func.apply(slice(input.clone(), i * len, (i + 1) * len)))
                .collect();
            concat(outputs)
        })
    }
}

impl<F: RFunc> RBatcher for FuncBatcher<F> {
    fn batch_r(&self, v: &RVector, input: RNodeRef, n: usize) -> RNodeRef {
        let len = sample_len(input.output().len(), n);
        pool_r(input, |input| {
            let outputs = (0..n)
                .map(|i| self.func.apply_r(v, slice_r(input.clone(), i * len, (i + 1) * len)))
                .collect();
            concat_r(outputs)
        })
    }
}

struct ConcatNode {
    parts: Vec<NodeRef>,
    output: OnceCell<Vector>,
}

impl Node for ConcatNode {
    fn output(&self) -> &Vector {
        self.output
            .get_or_init(|| Vector::concat(self.parts.iter().map(|p| p.output())))
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.parts.iter().all(|p| p.constant(grad))
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        let mut offset = 0;
        for part in &self.parts {
            let len = part.output().len();
            if !part.constant(grad) {
                part.propagate_gradient(upstream.slice(offset, offset + len), grad);
            }
            offset += len;
        }
    }
}

struct ConcatRNode {
    parts: Vec<RNodeRef>,
    output: OnceCell<Vector>,
    r_output: OnceCell<Vector>,
}

impl RNode for ConcatRNode {
    fn output(&self) -> &Vector {
        self.output
            .get_or_init(|| Vector::concat(self.parts.iter().map(|p| p.output())))
    }

    fn r_output(&self) -> &Vector {
        self.r_output
            .get_or_init(|| Vector::concat(self.parts.iter().map(|p| p.r_output())))
    }

    fn constant(&self, rgrad: &RGradient, grad: Option<&Gradient>) -> bool {
        self.parts.iter().all(|p| p.constant(rgrad, grad))
    }

    fn propagate_r_gradient(
        &self,
        upstream: Vector,
        upstream_r: Vector,
        rgrad: &mut RGradient,
        mut grad: Option<&mut Gradient>,
    ) {
        let mut offset = 0;
        for part in &self.parts {
            let len = part.output().len();
            if !part.constant(rgrad, grad.as_deref()) {
                part.propagate_r_gradient(
                    upstream.slice(offset, offset + len),
                    upstream_r.slice(offset, offset + len),
                    rgrad,
                    grad.as_deref_mut(),
                );
            }
            offset += len;
        }
    }
}

struct SliceNode {
    a: NodeRef,
    start: usize,
    end: usize,
    output: OnceCell<Vector>,
}

fn embed(upstream: &Vector, start: usize, len: usize) -> Vector {
    let mut down = Vector::zeros(len);
    down[start..start + upstream.len()].copy_from_slice(upstream);
    down
}

impl Node for SliceNode {
    fn output(&self) -> &Vector {
        self.output
            .get_or_init(|| self.a.output().slice(self.start, self.end))
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.a.constant(grad)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        if !self.a.constant(grad) {
            let down = embed(&upstream, self.start, self.a.output().len());
            self.a.propagate_gradient(down, grad);
        }
    }
}

struct SliceRNode {
    a: RNodeRef,
    start: usize,
    end: usize,
    output: OnceCell<Vector>,
    r_output: OnceCell<Vector>,
}

impl RNode for SliceRNode {
    fn output(&self) -> &Vector {
        self.output
            .get_or_init(|| self.a.output().slice(self.start, self.end))
    }

    fn r_output(&self) -> &Vector {
        self.r_output
            .get_or_init(|| self.a.r_output().slice(self.start, self.end))
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
            let len = self.a.output().len();
            let down = embed(&upstream, self.start, len);
            let down_r = embed(&upstream_r, self.start, len);
            self.a.propagate_r_gradient(down, down_r, rgrad, grad);
        }
    }
}
