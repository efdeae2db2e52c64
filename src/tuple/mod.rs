//! Result tuple assembly: pairing N ordered raw sets with N ordered types.
//!
//! Two equivalent paths exist and are used interchangeably:
//!
//! - the fixed-arity path ([`ResultTuple2`] .. [`ResultTuple16`]), giving
//!   compile-time-typed access to each set when target types are known at
//!   compile time;
//! - the dynamic path ([`DynResultTuple`]), arbitrary arity with types
//!   resolved at call time through [`ModelInfo`](crate::model::ModelInfo)
//!   handles.
//!
//! Both retain per-set [`Provenance`](crate::provider::Provenance) so the
//! relationship stitcher can resolve descriptors for sets drawn from
//! different providers.

mod dynamic;
mod fixed;

pub use dynamic::{DynResultTuple, DynSet};
pub use fixed::*;

use crate::error::Error;
use crate::model::Model;
use crate::populate::{materialize, MaterializationPolicy, MaterializedSet, PopulationPlan};
use crate::provider::Provenance;
use crate::row::RawResultSet;

/// Ensure the descriptor in the producing provider's registry, compile the
/// plan for this set's shape, and materialize.
pub(crate) fn materialize_pair<T: Model>(
    raw: &RawResultSet,
    provenance: &Provenance,
    policy: &MaterializationPolicy,
) -> Result<MaterializedSet<T>, Error> {
    let registry = provenance.registry();
    let descriptor = registry.ensure::<T>()?;
    let plan = PopulationPlan::compile(&raw.column_names, &descriptor, registry)?;
    Ok(materialize::<T>(raw, &descriptor, &plan, policy)?)
}
