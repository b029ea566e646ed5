use thiserror::Error;

/// Failures reported by surface construction, evaluation and serialization.
///
/// Public operations return `anyhow::Result`, wrapping one of these variants,
/// so the kind of failure can be recovered with `downcast_ref::<SurfaceError>()`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    #[error("Control grid is not rectangular: row {row} has {found} points, expected {expected}")]
    NonRectangularGrid {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Too few control points in {direction} direction: got {count}, degree {degree} needs at least {}", degree + 1)]
    TooFewControlPoints {
        direction: &'static str,
        count: usize,
        degree: usize,
    },

    #[error("Invalid number of knots in {direction} direction, got {found}, expected {expected}")]
    InvalidKnotCount {
        direction: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("Knot vector is decreasing at index {index}")]
    DecreasingKnots { index: usize },

    #[error("Knot {index} is not finite")]
    NonFiniteKnot { index: usize },

    #[error("Weight grid does not match the control grid")]
    WeightGridMismatch,

    #[error("Weights must be positive, got {weight} at ({row}, {column})")]
    NonPositiveWeight {
        row: usize,
        column: usize,
        weight: f64,
    },

    #[error("Parameter ({u}, {v}) is outside of the domain [{u_min}, {u_max}] x [{v_min}, {v_max}]")]
    OutOfDomain {
        u: f64,
        v: f64,
        u_min: f64,
        u_max: f64,
        v_min: f64,
        v_max: f64,
    },

    #[error("Invalid parameter domain [{min}, {max}]")]
    InvalidDomain { min: f64, max: f64 },

    #[error("Surface normal is degenerate at ({u}, {v})")]
    DegenerateNormal { u: f64, v: f64 },

    #[error("Cannot insert knot {knot}: {reason}")]
    InvalidKnotInsertion { knot: f64, reason: String },

    #[error("{0} cannot be serialized")]
    Unserializable(&'static str),

    #[error("Surface function failed at ({u}, {v})")]
    FunctionEvaluation { u: f64, v: f64 },
}
