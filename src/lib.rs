//! autocost: differentiable cost functions on a lazy, memoized autodiff graph.
//!
//! Cost functions compare what a network produced with what it should have
//! produced, and hand back a graph node whose gradient trains the network.
//! Every cost is available in reverse mode, for gradients, and in forward
//! ("R-operator") mode, for Hessian-vector products.
//!
//! # Features
//!
//! - Five cost functions plus an L2 regularizing wrapper.
//! - Lazy graph nodes that compute their output at most once, safely shared across threads.
//! - Forward-mode variants of every operator for second-order training methods.
//! - Whole-dataset cost evaluation, one sample or one batch at a time.
//!
//! # Modules
//!
//! - [`vector`]: The dense `f64` vector every node produces.
//! - [`backprop`]: Node traits, variables and gradient accumulators.
//! - [`ops`]: Graph operators costs are built from.
//! - [`cost`]: Cost functions, configuration and dataset totals.
//! - [`samples`]: Labeled samples and sample sets.
//!
//! # Example
//!
//! ```rust
//! use autocost::backprop::{Gradient, Variable};
//! use autocost::cost::{CostFunc, MeanSquaredCost};
//! use autocost::vector;
//!
//! let prediction = Variable::shared(vector![0.5, 2.0]);
//! let cost = MeanSquaredCost.cost(&vector![1.0, 2.0], prediction.clone());
//! assert_eq!(cost.output()[0], 0.25);
//!
//! let mut grad = Gradient::zeros(&[prediction.clone()]);
//! cost.propagate_gradient(vector![1.0], &mut grad);
//! assert_eq!(grad.get(&prediction), Some(&vector![-1.0, 0.0]));
//! ```
//!
pub mod vector;
pub mod backprop;
pub mod ops;
pub mod cost;
pub mod samples;
