//! Dense `f64` vectors used as node values.
//!
//! # Vector Primitive
//!
//! Every value flowing through the graph (node outputs, gradients, directions)
//! is a flat, fixed-length [`Vector`].
//!
//! It supports:
//! - Construction from `Vec<f64>`, iterators and the [`vector!`](crate::vector!) macro
//! - Elementwise kernels (`add`, `mul`, `scale`, `map`, `zip_map`)
//! - Reductions (`sum`, `dot`, `squared_norm`)
//! - Concatenation and slicing for batched evaluation
//!
//! ## Design Highlights
//! - Derefs to `[f64]`, so indexing and iteration work as on slices
//! - Elementwise kernels switch to `rayon` once a vector is long enough to
//!   amortize the fork/join overhead
//! - Reductions stay sequential so results do not depend on scheduling
//!
//! ## Limitations
//! - No shapes: a vector is one-dimensional
//! - Operations **panic** on length mismatches
//!
//! ## Example
//!
//! ```rust
//! use autocost::vector;
//! let v = vector![1.0, 2.0, 3.0];
//! assert_eq!(v.len(), 3);
//! assert_eq!(v.sum(), 6.0);
//! ```

use core::ops::{Deref, DerefMut};
use rayon::prelude::*;

/// Minimum length at which elementwise kernels run on the `rayon` pool.
pub const PAR_THRESHOLD: usize = 1 << 14;

/// A dense, one-dimensional vector of `f64` values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vector {
    data: Vec<f64>,
}

impl Vector {
    /// Wraps existing data without copying.
    #[must_use]
    pub const fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    /// Creates a vector of `len` zeros.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self { data: vec![0.0; len] }
    }

    /// Returns the underlying storage.
    #[must_use]
    pub fn into_inner(self) -> Vec<f64> {
        self.data
    }

    /// Applies `f` to every element.
    #[must_use]
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        if self.data.len() >= PAR_THRESHOLD {
            Self::new(self.data.par_iter().map(|&x| f(x)).collect())
        } else {
            Self::new(self.data.iter().map(|&x| f(x)).collect())
        }
    }

    /// Combines two vectors elementwise with `f`.
    ///
    /// # Panics
    /// Panics if the lengths differ.
    #[must_use]
    pub fn zip_map<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        assert_eq!(self.len(), other.len(), "vector length mismatch");
        if self.data.len() >= PAR_THRESHOLD {
            Self::new(
                self.data
                    .par_iter()
                    .zip(other.data.par_iter())
                    .map(|(&a, &b)| f(a, b))
                    .collect(),
            )
        } else {
            Self::new(
                self.data
                    .iter()
                    .zip(&other.data)
                    .map(|(&a, &b)| f(a, b))
                    .collect(),
            )
        }
    }

    /// Elementwise sum.
    ///
    /// # Panics
    /// Panics if the lengths differ.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a + b)
    }

    /// Elementwise (Hadamard) product.
    ///
    /// # Panics
    /// Panics if the lengths differ.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a * b)
    }

    /// Returns a copy multiplied by `s`.
    #[must_use]
    pub fn scaled(&self, s: f64) -> Self {
        self.map(|x| x * s)
    }

    /// Adds `other` into `self` in place.
    ///
    /// # Panics
    /// Panics if the lengths differ.
    pub fn add_assign(&mut self, other: &Self) {
        assert_eq!(self.len(), other.len(), "vector length mismatch");
        if self.data.len() >= PAR_THRESHOLD {
            self.data
                .par_iter_mut()
                .zip(other.data.par_iter())
                .for_each(|(a, &b)| *a += b);
        } else {
            for (a, &b) in self.data.iter_mut().zip(&other.data) {
                *a += b;
            }
        }
    }

    /// Multiplies every element by `s` in place.
    pub fn scale_assign(&mut self, s: f64) {
        if self.data.len() >= PAR_THRESHOLD {
            self.data.par_iter_mut().for_each(|x| *x *= s);
        } else {
            for x in &mut self.data {
                *x *= s;
            }
        }
    }

    /// Sum of all elements.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Inner product.
    ///
    /// # Panics
    /// Panics if the lengths differ.
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        assert_eq!(self.len(), other.len(), "vector length mismatch");
        self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum()
    }

    /// Sum of squared elements.
    #[must_use]
    pub fn squared_norm(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum()
    }

    /// Copies `self[start..end]` into a new vector.
    ///
    /// # Panics
    /// Panics if the range is out of bounds.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Self {
        Self::new(self.data[start..end].to_vec())
    }

    /// Joins vectors end to end.
    #[must_use]
    pub fn concat<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut data = Vec::new();
        for part in parts {
            data.extend_from_slice(&part.data);
        }
        Self::new(data)
    }
}

impl Deref for Vector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.data
    }
}

impl DerefMut for Vector {
    fn deref_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

impl From<Vec<f64>> for Vector {
    fn from(data: Vec<f64>) -> Self {
        Self::new(data)
    }
}

impl From<&[f64]> for Vector {
    fn from(data: &[f64]) -> Self {
        Self::new(data.to_vec())
    }
}

impl FromIterator<f64> for Vector {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Defines a vector from a literal list.
///
/// # Example
/// ```
/// use autocost::vector;
/// let v = vector![1.0, -2.0];
/// assert_eq!(&v[..], &[1.0, -2.0]);
/// ```
#[macro_export]
macro_rules! vector {
    () => {
        $crate::vector::Vector::new(::std::vec::Vec::new())
    };
    ($($x:expr),+ $(,)?) => {
        $crate::vector::Vector::new(::std::vec![$($x as f64),+])
    };
}
