//! Labeled samples driven through the batch cost helpers.

use crate::vector::Vector;

/// An input vector and the output a network should produce for it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorSample {
    /// Network input.
    pub input: Vector,
    /// Expected network output.
    pub output: Vector,
}

impl VectorSample {
    /// Pairs an input with its expected output.
    #[must_use]
    pub const fn new(input: Vector, output: Vector) -> Self {
        Self { input, output }
    }
}

/// An indexable collection of samples.
pub trait SampleSet {
    /// Element type.
    type Sample;

    /// Number of samples.
    fn len(&self) -> usize;

    /// Returns `true` if there are no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sample at `index`.
    ///
    /// # Panics
    /// Panics if `index >= self.len()`.
    fn get_sample(&self, index: usize) -> &Self::Sample;
}

impl<T> SampleSet for [T] {
    type Sample = T;

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get_sample(&self, index: usize) -> &T {
        &self[index]
    }
}

impl<T> SampleSet for Vec<T> {
    type Sample = T;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get_sample(&self, index: usize) -> &T {
        &self[index]
    }
}
