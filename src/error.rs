use thiserror::Error;

/// Errors surfaced to the caller before or instead of a routing result.
///
/// Running out of the visit budget is NOT an error: the search returns
/// whatever Pareto-optimal solutions it found plus an exhaustion hint.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    /// Bad request: wrong point count, unparsable instant, unknown stop id.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A coordinate endpoint could not be snapped to the walk network.
    /// Carries the 0-based index of the offending point.
    #[error("cannot snap point {index} to the walk network")]
    PointNotFound { index: usize },

    /// A graph invariant was violated. Should be impossible; logged where raised.
    #[error("internal error: {0}")]
    Internal(String),
}
