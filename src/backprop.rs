//! Graph node contract and autograd bookkeeping.
//!
//! # Reverse and Forward Mode
//!
//! A computation graph is built from shared [`Node`]s. Each node:
//! 1. **Lazily computes** its output vector the first time [`Node::output`] is
//!    called and caches it for the node's lifetime.
//! 2. Reports whether it is **constant** with respect to a [`Gradient`], i.e.
//!    whether any variable tracked by that gradient lies upstream of it.
//! 3. **Propagates** an upstream gradient `dL/d(output)` into its inputs,
//!    eventually accumulating into the [`Gradient`] entries of [`Variable`]s.
//!
//! [`RNode`] is the forward-mode twin: besides the primal output it carries
//! the directional derivative ("R output") of that output along an
//! [`RVector`], and its backward pass also propagates the R-derivative of the
//! gradient, which yields Hessian-vector products.
//!
//! ## Usage Guidelines
//!
//! - A gradient is scoped to one backward pass; create it with
//!   [`Gradient::zeros`] for the variables you want derivatives for.
//! - Call `propagate_gradient` at most once per node per backward pass.
//! - Length mismatches between connected nodes are contract violations and
//!   **panic**.

use crate::vector::Vector;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared handle to a reverse-mode node.
pub type NodeRef = Arc<dyn Node>;

/// Shared handle to a forward-mode node.
pub type RNodeRef = Arc<dyn RNode>;

/// A differentiable graph node.
pub trait Node: Send + Sync {
    /// The node's value. Computed at most once.
    fn output(&self) -> &Vector;

    /// Returns `true` if no variable tracked by `grad` affects this node.
    fn constant(&self, grad: &Gradient) -> bool;

    /// Back-propagates `upstream = dL/d(output)` into the node's inputs.
    ///
    /// Implementations may consume `upstream` as scratch space.
    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient);
}

/// A differentiable graph node carrying a directional derivative.
pub trait RNode: Send + Sync {
    /// The node's value. Computed at most once.
    fn output(&self) -> &Vector;

    /// Directional derivative of [`RNode::output`] along the node's `RVector`.
    fn r_output(&self) -> &Vector;

    /// Returns `true` if no variable tracked by `rgrad` (or `grad`) affects this node.
    fn constant(&self, rgrad: &RGradient, grad: Option<&Gradient>) -> bool;

    /// Back-propagates `upstream` and its R-derivative `upstream_r`.
    ///
    /// Gradients accumulate into `grad` (if given), R-gradients into `rgrad`.
    fn propagate_r_gradient(
        &self,
        upstream: Vector,
        upstream_r: Vector,
        rgrad: &mut RGradient,
        grad: Option<&mut Gradient>,
    );
}

/// Identifies a [`Variable`] inside gradients and direction maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u64);

impl VarId {
    /// A fresh identity, distinct from every other in the process.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Accumulated partial derivatives, keyed by variable.
///
/// Only variables present in the map are treated as differentiable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gradient {
    entries: HashMap<VarId, Vector>,
}

/// R-derivatives of a gradient share the gradient's representation.
pub type RGradient = Gradient;

impl Gradient {
    /// Creates a gradient with a zero entry for each variable.
    #[must_use]
    pub fn zeros(vars: &[Arc<Variable>]) -> Self {
        let entries = vars
            .iter()
            .map(|v| (v.id(), Vector::zeros(v.vector.len())))
            .collect();
        Self { entries }
    }

    /// Returns `true` if `id` is tracked.
    #[must_use]
    pub fn contains(&self, id: VarId) -> bool {
        self.entries.contains_key(&id)
    }

    /// The accumulated derivative for `var`, if tracked.
    #[must_use]
    pub fn get(&self, var: &Variable) -> Option<&Vector> {
        self.entries.get(&var.id())
    }

    /// Adds `delta` into the entry for `id`; untracked ids are ignored.
    ///
    /// # Panics
    /// Panics if `delta` has a different length than the entry.
    pub fn accumulate(&mut self, id: VarId, delta: &Vector) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.add_assign(delta);
        }
    }

    /// Starts tracking `id` with a zero entry of length `len`.
    ///
    /// Graph nodes use this for per-pass scratch entries; see
    /// [`crate::ops::pool`].
    pub fn insert_zeros(&mut self, id: VarId, len: usize) {
        self.entries.insert(id, Vector::zeros(len));
    }

    /// Stops tracking `id`, returning its accumulated entry.
    pub fn remove(&mut self, id: VarId) -> Option<Vector> {
        self.entries.remove(&id)
    }

    /// Resets every entry to zero, keeping the tracked set.
    pub fn clear(&mut self) {
        for entry in self.entries.values_mut() {
            entry.fill(0.0);
        }
    }
}

/// Directions for forward-mode differentiation, keyed by variable.
///
/// Variables without an entry have a zero direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RVector {
    entries: HashMap<VarId, Vector>,
}

impl RVector {
    /// Creates an empty direction map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the direction for `var`.
    ///
    /// # Panics
    /// Panics if `direction` does not match the variable's length.
    pub fn insert(&mut self, var: &Variable, direction: Vector) {
        assert_eq!(var.vector.len(), direction.len(), "direction length mismatch");
        self.entries.insert(var.id(), direction);
    }

    /// The direction for `var`, if any.
    #[must_use]
    pub fn get(&self, var: &Variable) -> Option<&Vector> {
        self.entries.get(&var.id())
    }
}

/// A leaf node holding a value.
///
/// Its identity (not its contents) decides which gradient entry it feeds.
#[derive(Debug)]
pub struct Variable {
    id: VarId,
    /// Current value.
    pub vector: Vector,
}

impl Variable {
    /// Creates a variable with a fresh identity.
    #[must_use]
    pub fn new(vector: Vector) -> Self {
        Self { id: VarId::next(), vector }
    }

    /// Creates a shared variable, ready to be used as a [`NodeRef`].
    #[must_use]
    pub fn shared(vector: Vector) -> Arc<Self> {
        Arc::new(Self::new(vector))
    }

    /// This variable's identity.
    #[must_use]
    pub const fn id(&self) -> VarId {
        self.id
    }
}

impl Node for Variable {
    fn output(&self) -> &Vector {
        &self.vector
    }

    fn constant(&self, grad: &Gradient) -> bool {
        !grad.contains(self.id)
    }

    fn propagate_gradient(&self, upstream: Vector, grad: &mut Gradient) {
        grad.accumulate(self.id, &upstream);
    }
}

/// A [`Variable`] paired with its direction from an [`RVector`].
pub struct RVariable {
    variable: Arc<Variable>,
    r: Vector,
}

impl RVariable {
    /// Looks up the direction of `variable` in `v` (zero if absent).
    #[must_use]
    pub fn new(variable: Arc<Variable>, v: &RVector) -> Self {
        let r = v
            .get(&variable)
            .cloned()
            .unwrap_or_else(|| Vector::zeros(variable.vector.len()));
        Self { variable, r }
    }

    /// Shared form of [`RVariable::new`].
    #[must_use]
    pub fn shared(variable: Arc<Variable>, v: &RVector) -> Arc<Self> {
        Arc::new(Self::new(variable, v))
    }

    /// A leaf with a fresh identity and a zero direction.
    #[must_use]
    pub fn constant_of(vector: Vector) -> Arc<Self> {
        let r = Vector::zeros(vector.len());
        Arc::new(Self { variable: Variable::shared(vector), r })
    }

    /// The wrapped variable.
    #[must_use]
    pub const fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }
}

impl RNode for RVariable {
    fn output(&self) -> &Vector {
        &self.variable.vector
    }

    fn r_output(&self) -> &Vector {
        &self.r
    }

    fn constant(&self, rgrad: &RGradient, grad: Option<&Gradient>) -> bool {
        let id = self.variable.id;
        !rgrad.contains(id) && grad.is_none_or(|g| !g.contains(id))
    }

    fn propagate_r_gradient(
        &self,
        upstream: Vector,
        upstream_r: Vector,
        rgrad: &mut RGradient,
        grad: Option<&mut Gradient>,
    ) {
        let id = self.variable.id;
        if let Some(grad) = grad {
            grad.accumulate(id, &upstream);
        }
        rgrad.accumulate(id, &upstream_r);
    }
}

/// A differentiable function from one node to another.
pub trait Func: Send + Sync {
    /// Builds the function's graph on top of `input`.
    fn apply(&self, input: NodeRef) -> NodeRef;
}

impl<F> Func for F
where
    F: Fn(NodeRef) -> NodeRef + Send + Sync,
{
    fn apply(&self, input: NodeRef) -> NodeRef {
        self(input)
    }
}

/// Forward-mode counterpart of [`Func`].
pub trait RFunc: Send + Sync {
    /// Builds the function's R-graph on top of `input`.
    fn apply_r(&self, v: &RVector, input: RNodeRef) -> RNodeRef;
}

/// Evaluates a function on several concatenated inputs at once.
pub trait Batcher: Send + Sync {
    /// `input` holds `n` equally sized inputs back to back; the result holds
    /// the `n` outputs back to back.
    fn batch(&self, input: NodeRef, n: usize) -> NodeRef;
}

/// Forward-mode counterpart of [`Batcher`].
pub trait RBatcher: Send + Sync {
    /// See [`Batcher::batch`].
    fn batch_r(&self, v: &RVector, input: RNodeRef, n: usize) -> RNodeRef;
}
