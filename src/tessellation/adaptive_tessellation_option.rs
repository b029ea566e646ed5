use crate::misc::FloatingPoint;

/// Options for adaptive tessellation of a surface
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdaptiveTessellationOptions<T: FloatingPoint> {
    /// Curvature threshold: a quad whose sampled `max(|K|, |H|)` exceeds this value is divided
    pub max_error: T,
    /// Cap on the linear subdivision count, the mesh holds at most `max_segments^2` quads
    /// when the merge pass succeeds
    pub max_segments: usize,
    /// Minimum quad extent in normalized parameter space
    pub min_size: T,
}

impl<T: FloatingPoint> Default for AdaptiveTessellationOptions<T> {
    fn default() -> Self {
        Self {
            max_error: T::from_f64(0.5).unwrap(),
            max_segments: 32,
            min_size: T::from_f64(1e-3).unwrap(),
        }
    }
}

impl<T: FloatingPoint> AdaptiveTessellationOptions<T> {
    pub fn with_max_error(mut self, max_error: T) -> Self {
        self.max_error = max_error;
        self
    }

    pub fn with_max_segments(mut self, max_segments: usize) -> Self {
        self.max_segments = max_segments.max(1);
        self
    }

    pub fn with_min_size(mut self, min_size: T) -> Self {
        self.min_size = min_size;
        self
    }
}
