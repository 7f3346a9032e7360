//! # Graph Operators
//!
//! This module builds the nodes cost functions are composed from. Every
//! operator comes in two flavors: a reverse-mode builder returning a
//! [`NodeRef`](crate::backprop::NodeRef) and a forward-mode `*_r` builder
//! returning an [`RNodeRef`](crate::backprop::RNodeRef).
//!
//! ## Submodules
//!
//! - [`arith`]: `add`, `add_scaler`, `scale`, elementwise `mul`
//! - [`unary`]: `log`, `sigmoid`, `log_sigmoid`
//! - [`reduce`]: `sum_all`, `squared_norm`
//! - [`pool`]: reuse of one subexpression with a single gradient hand-off
//! - [`batch`]: `concat`, `slice` and [`FuncBatcher`]
//!
//! Example:
//! ```rust
//! use autocost::backprop::{Gradient, Node, Variable};
//! use autocost::ops::{mul, sum_all};
//! use autocost::vector;
//!
//! let a = Variable::shared(vector![1.0, 2.0]);
//! let b = Variable::shared(vector![3.0, 4.0]);
//! let dot = sum_all(mul(a.clone(), b.clone()));
//! assert_eq!(dot.output()[0], 11.0);
//!
//! let mut grad = Gradient::zeros(&[a.clone()]);
//! dot.propagate_gradient(vector![1.0], &mut grad);
//! assert_eq!(grad.get(&a), Some(&vector![3.0, 4.0]));
//! ```
//!
//! ## Notes
//!
//! - Builders never evaluate their inputs; outputs are computed on first
//!   access and cached in a compute-once cell
//! - Operations **panic** when connected vectors differ in length

pub mod arith;
pub mod batch;
pub mod pool;
pub mod reduce;
pub mod unary;

pub use arith::{add, add_r, add_scaler, add_scaler_r, mul, mul_r, scale, scale_r};
pub use batch::{FuncBatcher, concat, concat_r, slice, slice_r};
pub use pool::{pool, pool_r};
pub use reduce::{SquaredNorm, squared_norm, squared_norm_r, sum_all, sum_all_r};
pub use unary::{
    Elementwise, Log, LogSigmoid, Sigmoid, log, log_r, log_sigmoid, log_sigmoid_r, sigmoid,
    sigmoid_r,
};
