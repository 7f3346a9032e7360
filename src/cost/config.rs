//! Selecting and building cost functions from configuration.
//!
//! A [`CostConfig`] is usually embedded in a larger training configuration
//! and read from JSON:
//!
//! ```rust
//! use autocost::cost::{CostConfig, CostKind};
//!
//! let config = CostConfig::from_json(r#"{ "kind": "sigmoid_cross_entropy", "penalty": 1e-4 }"#)?;
//! assert_eq!(config.kind, CostKind::SigmoidCrossEntropy);
//! # Ok::<(), autocost::cost::CostError>(())
//! ```

use super::{
    AbsCost, CostFunc, CrossEntropyCost, DotCost, MeanSquaredCost, RegularizingCost,
    SigmoidCrossEntropyCost,
};
use crate::backprop::{NodeRef, RNodeRef, RVector, Variable};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Result alias for configuration handling.
pub type CostResult<T> = Result<T, CostError>;

/// Errors raised while reading a cost configuration.
#[derive(Error, Debug)]
pub enum CostError {
    #[error("unknown cost function: {0:?}")]
    UnknownCost(String),
    #[error("penalty must be finite and non-negative, got {0}")]
    InvalidPenalty(f64),
    #[error("malformed cost configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Selects one of the built-in cost functions.
///
/// - `MeanSquared`:         squared error; pair with a linear output.
/// - `Abs`:                 absolute error; pair with a linear output.
/// - `CrossEntropy`:        binary cross-entropy on probabilities.
/// - `Dot`:                 negative dot product; pair with log-softmax.
/// - `SigmoidCrossEntropy`: cross-entropy with a fused sigmoid; pair with a
///   linear output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    #[default]
    MeanSquared,
    Abs,
    CrossEntropy,
    Dot,
    SigmoidCrossEntropy,
}

impl CostKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::MeanSquared,
        Self::Abs,
        Self::CrossEntropy,
        Self::Dot,
        Self::SigmoidCrossEntropy,
    ];

    /// The configuration name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MeanSquared => "mean_squared",
            Self::Abs => "abs",
            Self::CrossEntropy => "cross_entropy",
            Self::Dot => "dot",
            Self::SigmoidCrossEntropy => "sigmoid_cross_entropy",
        }
    }

    fn strategy(self) -> &'static dyn CostFunc {
        match self {
            Self::MeanSquared => &MeanSquaredCost,
            Self::Abs => &AbsCost,
            Self::CrossEntropy => &CrossEntropyCost,
            Self::Dot => &DotCost,
            Self::SigmoidCrossEntropy => &SigmoidCrossEntropyCost,
        }
    }
}

impl fmt::Display for CostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CostKind {
    type Err = CostError;

    fn from_str(s: &str) -> CostResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| CostError::UnknownCost(s.to_owned()))
    }
}

impl CostFunc for CostKind {
    fn cost(&self, expected: &Vector, actual: NodeRef) -> NodeRef {
        self.strategy().cost(expected, actual)
    }

    fn cost_r(&self, v: &RVector, expected: &Vector, actual: RNodeRef) -> RNodeRef {
        self.strategy().cost_r(v, expected, actual)
    }
}

/// Which cost to train with, and how strongly to penalize weights.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostConfig {
    /// Cost function.
    pub kind: CostKind,
    /// L2 coefficient applied to the variables passed to [`CostConfig::build`].
    #[serde(default)]
    pub penalty: f64,
}

impl CostConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    /// [`CostError::Json`] for malformed JSON or an unknown kind, and
    /// [`CostError::InvalidPenalty`] for a negative or non-finite penalty.
    pub fn from_json(json: &str) -> CostResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the penalty is usable.
    ///
    /// # Errors
    /// [`CostError::InvalidPenalty`] if the penalty is negative or not finite.
    pub fn validate(&self) -> CostResult<()> {
        if self.penalty.is_finite() && self.penalty >= 0.0 {
            Ok(())
        } else {
            Err(CostError::InvalidPenalty(self.penalty))
        }
    }

    /// Builds the configured cost, regularizing `variables` if the penalty is
    /// non-zero.
    ///
    /// # Errors
    /// See [`CostConfig::validate`].
    pub fn build(&self, variables: Vec<Arc<Variable>>) -> CostResult<Box<dyn CostFunc>> {
        self.validate()?;
        if self.penalty == 0.0 || variables.is_empty() {
            return Ok(Box::new(self.kind));
        }
        debug!(
            kind = %self.kind,
            penalty = self.penalty,
            variables = variables.len(),
            "building regularized cost"
        );
        Ok(Box::new(RegularizingCost::new(variables, self.penalty, self.kind)))
    }
}
