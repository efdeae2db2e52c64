//! Top-level error type unifying the per-area failures.

use thiserror::Error;

use crate::descriptor::ConfigurationError;
use crate::populate::PopulationError;
use crate::provider::ProviderError;
use crate::stitch::RelationshipError;

/// Result type for whole-pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure of the materialization/stitching/aggregation pipeline.
///
/// All variants are local, synchronous, and non-retried; a failed call never
/// surfaces a partial object graph. Retry policy, if any, belongs to the
/// execution layer behind the providers.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Population(#[from] PopulationError),

    #[error(transparent)]
    Relationship(#[from] RelationshipError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The assembler was handed a different number of raw sets than target
    /// types.
    #[error("expected {expected} result sets, got {actual}")]
    SetCountMismatch { expected: usize, actual: usize },
}
