//! Population plans and row materialization.
//!
//! A [`PopulationPlan`] is the compiled alignment between one query shape's
//! columns and a type descriptor; [`materialize`] drives rows through a plan
//! to produce a [`MaterializedSet`]. Plans are ephemeral — recomputed per
//! distinct query shape and never cached across shapes.

mod materialize;
mod plan;

pub use materialize::{materialize, materialize_dyn, MaterializedSet};
pub(crate) use materialize::materialize_dyn_erased;
pub use plan::{NestedPlan, PlanSlot, PopulationPlan};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for materialization.
pub type PopulationResult<T> = Result<T, PopulationError>;

/// Errors raised while assigning row values into instances.
///
/// Any of these aborts the whole materialize call; partial lists are never
/// returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PopulationError {
    /// A null column value met a non-nullable field.
    #[error("null value for non-nullable field '{field}'")]
    NotNullable { field: String },

    /// A column value's type cannot convert into its target field.
    #[error("value of type {actual} is incompatible with field '{field}' ({expected})")]
    ColumnMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// A type-level custom population function rejected a row.
    #[error("custom population for '{type_name}' failed: {message}")]
    Custom { type_name: String, message: String },

    /// An accessor index had no field behind it; indicates a model whose
    /// `assign` disagrees with its `field_configs`.
    #[error("accessor {accessor} out of range for '{type_name}'")]
    UnknownAccessor { type_name: String, accessor: usize },

    /// A bounded-parallel materialization worker panicked.
    #[error("materialization worker panicked")]
    WorkerPanicked,
}

impl PopulationError {
    /// Shorthand for the common mismatch case inside `assign` impls.
    pub fn mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: &crate::value::Value,
    ) -> Self {
        Self::ColumnMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual
                .tag()
                .map_or_else(|| "null".to_string(), |t| t.to_string()),
        }
    }
}

/// Caller-supplied materialization strategy.
///
/// Parallelism here is a policy of the call, not a property of the data: the
/// same set materializes identically either way, output order always matching
/// row order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializationPolicy {
    /// Fan rows out across a bounded worker pool.
    pub parallel: bool,
    /// Worker count for the parallel strategy.
    pub worker_count: usize,
    /// Back-fill declared defaults for columns absent from the query.
    pub backfill_defaults: bool,
}

impl Default for MaterializationPolicy {
    fn default() -> Self {
        Self {
            parallel: false,
            worker_count: 4,
            backfill_defaults: false,
        }
    }
}

impl MaterializationPolicy {
    /// One row at a time, in order.
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Bounded-parallel-ordered across `worker_count` workers.
    pub fn parallel(worker_count: usize) -> Self {
        Self {
            parallel: true,
            worker_count: worker_count.max(1),
            backfill_defaults: false,
        }
    }

    pub fn with_backfill(mut self) -> Self {
        self.backfill_defaults = true;
        self
    }
}
