//! Sharing one subexpression between several consumers.
//!
//! [`pool`] hands a proxy of its input to a graph-building closure. Gradients
//! that reach the proxy from every place it is used are summed, and the sum
//! is forwarded into the real input with a single call once the pooled
//! expression has finished propagating. The input's output is computed once
//! and shared through its own cache.
//!
//! The running sum is a scratch entry in the caller's [`Gradient`], keyed by
//! the proxy's own [`VarId`]. It lives only for the duration of one
//! `propagate_gradient` call, so concurrent backward passes through the same
//! pooled node never see each other's partial sums.

use crate::backprop::{Gradient, Node, NodeRef, RGradient, RNode, RNodeRef, VarId};
use crate::vector::Vector;
use std::sync::Arc;

/// Builds `f(a)` so that `a` receives one accumulated gradient per pass.
pub fn pool<F>(a: NodeRef, f: F) -> NodeRef
where
    F: FnOnce(NodeRef) -> NodeRef,
{
    let proxy = Arc::new(PoolProxy { inner: a, id: VarId::next() });
    let shared: NodeRef = proxy.clone();
    let result = f(shared);
    Arc::new(Pooled { proxy, result })
}

/// Forward-mode [`pool`].
pub fn pool_r<F>(a: RNodeRef, f: F) -> RNodeRef
where
    F: FnOnce(RNodeRef) -> RNodeRef,
{
    let proxy = Arc::new(PoolRProxy {
        inner: a,
        id: VarId::next(),
        r_id: VarId::next(),
    });
    let shared: RNodeRef = proxy.clone();
    let result = f(shared);
    Arc::new(PooledR { proxy, result })
}

struct PoolProxy {
    inner: NodeRef,
    id: VarId,
}

impl Node for PoolProxy {
    fn output(&self) -> &Vector {
        self.inner.output()
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.inner.constant(grad)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        grad.accumulate(self.id, &upstream);
    }
}

struct Pooled {
    proxy: Arc<PoolProxy>,
    result: NodeRef,
}

impl Node for Pooled {
    fn output(&self) -> &Vector {
        self.result.output()
    }

    fn constant(&self, grad: &Gradient) -> bool {
        self.result.constant(grad)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        if self.result.constant(grad) {
            return;
        }
        let id = self.proxy.id;
        grad.insert_zeros(id, self.proxy.output().len());
        self.result.propagate_gradient(upstream, grad);
        if let Some(down) = grad.remove(id) {
            if !self.proxy.inner.constant(grad) {
                self.proxy.inner.propagate_gradient(down, grad);
            }
        }
    }
}

/// Upstream sums go to `id` and their R-derivatives to `r_id`, both in the
/// R-gradient, so the scratch space exists even when no plain gradient is
/// being collected.
struct PoolRProxy {
    inner: RNodeRef,
    id: VarId,
    r_id: VarId,
}

impl RNode for PoolRProxy {
    fn output(&self) -> &Vector {
        self.inner.output()
    }

    fn r_output(&self) -> &Vector {
        self.inner.r_output()
    }

    fn constant(&self, rgrad: &RGradient, grad: Option<&Gradient>) -> bool {
        self.inner.constant(rgrad, grad)
    }

    fn propagate_r_gradient(
        &self,
        upstream: Vector,
        upstream_r: Vector,
        rgrad: &mut RGradient,
        _grad: Option<&mut Gradient>,
    ) {
        rgrad.accumulate(self.id, &upstream);
        rgrad.accumulate(self.r_id, &upstream_r);
    }
}

struct PooledR {
    proxy: Arc<PoolRProxy>,
    result: RNodeRef,
}

impl RNode for PooledR {
    fn output(&self) -> &Vector {
        self.result.output()
    }

    fn r_output(&self) -> &Vector {
        self.result.r_output()
    }

    fn constant(&self, rgrad: &RGradient, grad: Option<&Gradient>) -> bool {
        self.result.constant(rgrad, grad)
    }

    fn propagate_r_gradient(
        &self,
        upstream: Vector,
        upstream_r: Vector,
        rgrad: &mut RGradient,
        mut grad: Option<&mut Gradient>,
    ) {
        if self.result.constant(rgrad, grad.as_deref()) {
            return;
        }
        let (id, r_id) = (self.proxy.id, self.proxy.r_id);
        let len = self.proxy.output().len();
        rgrad.insert_zeros(id, len);
        rgrad.insert_zeros(r_id, len);
        self.result
            .propagate_r_gradient(upstream, upstream_r, rgrad, grad.as_deref_mut());
        let pooled = rgrad.remove(id).zip(rgrad.remove(r_id));
        if let Some((down, down_r)) = pooled {
            if !self.proxy.inner.constant(rgrad, grad.as_deref()) {
                self.proxy.inner.propagate_r_gradient(down, down_r, rgrad, grad);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backprop::{RVariable, RVector, Variable};
    use crate::ops::{add, add_r, mul, mul_r, sum_all, sum_all_r};
    use crate::vector;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Passes values through and counts backward calls.
    struct CountingNode {
        inner: NodeRef,
        calls: AtomicUsize,
    }

    impl Node for CountingNode {
        fn output(&self) -> &Vector {
            self.inner.output()
        }

        fn constant(&self, grad: &Gradient) -> bool {
            self.inner.constant(grad)
        }

        fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.propagate_gradient(upstream, grad);
        }
    }

    #[test]
    fn test_pool_forwards_one_summed_gradient() {
        let var = Variable::shared(vector![2.0, 3.0]);
        let counting = Arc::new(CountingNode { inner: var.clone(), calls: AtomicUsize::new(0) });

        // sum(a * a + a)
        let out = pool(counting.clone(), |a| sum_all(add(mul(a.clone(), a.clone()), a)));
        assert_eq!(out.output(), &vector![2.0 * 2.0 + 2.0 + 3.0 * 3.0 + 3.0]);

        let mut grad = Gradient::zeros(&[var.clone()]);
        out.propagate_gradient(vector![1.0], &mut grad);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        assert_eq!(grad.get(&var), Some(&vector![5.0, 7.0]));
    }

    #[test]
    fn test_pool_of_constant_is_constant() {
        let var = Variable::shared(vector![1.0]);
        let out = pool(var, sum_all);
        let grad = Gradient::default();
        assert!(out.constant(&grad));
    }

    /// Hands the gradient down, then waits for the other backward pass.
    struct Rendezvous {
        inner: NodeRef,
        barrier: Arc<Barrier>,
    }

    impl Node for Rendezvous {
        fn output(&self) -> &Vector {
            self.inner.output()
        }

        fn constant(&self, grad: &Gradient) -> bool {
            self.inner.constant(grad)
        }

        fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
            self.inner.propagate_gradient(upstream, grad);
            self.barrier.wait();
        }
    }

    #[test]
    fn test_concurrent_passes_keep_separate_sums() {
        let var = Variable::shared(vector![1.0, 2.0]);
        let barrier = Arc::new(Barrier::new(2));
        let out = pool(var.clone(), |a| {
            sum_all(Arc::new(Rendezvous { inner: a, barrier: barrier.clone() }))
        });

        let grads: Vec<Vector> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(|| {
                        let mut grad = Gradient::zeros(&[var.clone()]);
                        out.propagate_gradient(vector![1.0], &mut grad);
                        grad.get(&var).cloned().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(grads, vec![vector![1.0, 1.0], vector![1.0, 1.0]]);
    }

    #[test]
    fn test_scratch_entry_does_not_outlive_pass() {
        let var = Variable::shared(vector![3.0]);
        let out = pool(var.clone(), |a| sum_all(mul(a.clone(), a)));
        let mut grad = Gradient::zeros(&[var.clone()]);
        out.propagate_gradient(vector![1.0], &mut grad);
        assert_eq!(grad, {
            let mut want = Gradient::zeros(&[var.clone()]);
            want.accumulate(var.id(), &vector![6.0]);
            want
        });
    }

    #[test]
    fn test_pool_r_repeated_passes() {
        let var = Variable::shared(vector![1.0, -2.0]);
        let mut v = RVector::new();
        v.insert(&var, vector![1.0, 1.0]);
        // sum(a * a + a)
        let out = pool_r(RVariable::shared(var.clone(), &v), |a| {
            sum_all_r(add_r(mul_r(a.clone(), a.clone()), a))
        });
        assert_eq!(out.r_output(), &vector![(2.0 + 1.0) + (-4.0 + 1.0)]);

        for _ in 0..2 {
            let mut rgrad = RGradient::zeros(&[var.clone()]);
            let mut grad = Gradient::zeros(&[var.clone()]);
            out.propagate_r_gradient(vector![1.0], vector![0.0], &mut rgrad, Some(&mut grad));
            assert_eq!(grad.get(&var), Some(&vector![3.0, -3.0]));
            // H = 2I
            assert_eq!(rgrad.get(&var), Some(&vector![2.0, 2.0]));
        }
    }
}
