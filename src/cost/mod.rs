//! # Cost Functions
//!
//! A cost function turns a network's actual output node and the expected
//! output vector into a single-element node whose gradient flows back into
//! the actual output. Every cost has a reverse-mode form ([`CostFunc::cost`])
//! and a forward-mode form ([`CostFunc::cost_r`]) for Hessian-vector
//! products.
//!
//! ## Built-in costs
//!
//! | Type | Value |
//! |---|---|
//! | [`MeanSquaredCost`] | `Σ (a - x)²` |
//! | [`AbsCost`] | `Σ \|a - x\|` |
//! | [`CrossEntropyCost`] | `-Σ [x ln a + (1 - x) ln(1 - a)]` |
//! | [`DotCost`] | `-Σ x a` |
//! | [`SigmoidCrossEntropyCost`] | `-Σ [x ln σ(a) + (1 - x) ln σ(-a)]` |
//!
//! [`RegularizingCost`] adds an L2 penalty on chosen variables to any of
//! them, and [`CostKind`] / [`CostConfig`] select one by name.
//!
//! ## Usage Guidelines
//!
//! - Build a fresh cost node per evaluation; nodes are immutable once built
//! - Expected and actual outputs must have the same length
//! - [`total_cost`] and [`total_cost_batcher`] measure a whole sample set
//!   without tracking any gradient
//!
//! Example:
//! ```rust
//! use autocost::backprop::{Gradient, Variable};
//! use autocost::cost::{CostFunc, SigmoidCrossEntropyCost};
//! use autocost::vector;
//!
//! let logits = Variable::shared(vector![2.0, -1.0]);
//! let cost = SigmoidCrossEntropyCost.cost(&vector![1.0, 0.0], logits.clone());
//!
//! let mut grad = Gradient::zeros(&[logits.clone()]);
//! cost.propagate_gradient(vector![1.0], &mut grad);
//! assert!(grad.get(&logits).unwrap()[0] < 0.0);
//! ```

pub mod abs;
pub mod config;
pub mod cross_entropy;
pub mod dot;
pub mod mean_squared;
pub mod regularizing;
pub mod sigmoid_ce;

pub use abs::AbsCost;
pub use config::{CostConfig, CostError, CostKind, CostResult};
pub use cross_entropy::CrossEntropyCost;
pub use dot::DotCost;
pub use mean_squared::{MeanSquaredCost, MeanSquaredResult};
pub use regularizing::RegularizingCost;
pub use sigmoid_ce::SigmoidCrossEntropyCost;

use crate::backprop::{Batcher, Func, NodeRef, RNodeRef, RVector, Variable};
use crate::samples::{SampleSet, VectorSample};
use crate::vector::Vector;
use tracing::{debug, trace};

/// A differentiable cost function.
pub trait CostFunc: Send + Sync {
    /// Builds a node whose single output is the cost of `actual` given
    /// `expected`. Gradients of that node flow into `actual`.
    fn cost(&self, expected: &Vector, actual: NodeRef) -> NodeRef;

    /// Forward-mode [`CostFunc::cost`]: the node's output equals the plain
    /// cost and its R-output is the derivative along `v`.
    fn cost_r(&self, v: &RVector, expected: &Vector, actual: RNodeRef) -> RNodeRef;
}

impl<C: CostFunc + ?Sized> CostFunc for Box<C> {
    fn cost(&self, expected: &Vector, actual: NodeRef) -> NodeRef {
        (**self).cost(expected, actual)
    }

    fn cost_r(&self, v: &RVector, expected: &Vector, actual: RNodeRef) -> RNodeRef {
        (**self).cost_r(v, expected, actual)
    }
}

/// Sums the cost of running `layer` on every sample.
///
/// Each input is wrapped in its own [`Variable`]; nothing is tracked for
/// gradients.
///
/// # Returns
/// `0.0` for an empty sample set.
pub fn total_cost<S>(cost: &dyn CostFunc, layer: &dyn Func, samples: &S) -> f64
where
    S: SampleSet<Sample = VectorSample> + ?Sized,
{
    let total = (0..samples.len())
        .map(|i| {
            let sample = samples.get_sample(i);
            let output = layer.apply(Variable::shared(sample.input.clone()));
            cost.cost(&sample.output, output).output()[0]
        })
        .sum();
    debug!(samples = samples.len(), total, "total cost");
    total
}

/// Like [`total_cost`], but evaluates samples `batch_size` at a time through
/// `batcher`.
///
/// A `batch_size` of `0` puts every sample in one batch. The final batch
/// holds whatever is left and may be smaller.
///
/// # Panics
/// Panics if the samples' inputs differ in length (the batcher cannot split
/// the concatenated input).
pub fn total_cost_batcher<S>(
    cost: &dyn CostFunc,
    batcher: &dyn Batcher,
    samples: &S,
    batch_size: usize,
) -> f64
where
    S: SampleSet<Sample = VectorSample> + ?Sized,
{
    let mut total = 0.0;
    let mut batches = 0;
    let mut start = 0;
    while start < samples.len() {
        let remaining = samples.len() - start;
        let size = if batch_size == 0 || batch_size > remaining {
            remaining
        } else {
            batch_size
        };

        let batch = (start..start + size).map(|i| samples.get_sample(i));
        let inputs = Vector::concat(batch.clone().map(|s| &s.input));
        let expected = Vector::concat(batch.map(|s| &s.output));

        let output = batcher.batch(Variable::shared(inputs), size);
        let value = cost.cost(&expected, output).output()[0];
        trace!(start, size, value, "batch cost");

        total += value;
        batches += 1;
        start += size;
    }
    debug!(samples = samples.len(), batches, total, "total batched cost");
    total
}
