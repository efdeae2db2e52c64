//! # Weft
//!
//! A multi-result-set object materialization and cross-provider aggregation
//! engine: raw tabular rows in, relationship-linked typed object graphs out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Provider Segment Chain                      │
//! │   (one logical query fanned out across N providers)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │  ordered RawResultSets + provenance
//!                          ▼ [tuple assembler]
//! ┌─────────────────────────────────────────────────────────┐
//! │        ResultTuple2..16  /  DynResultTuple               │
//! │   set i  ──► plan compiler ──► row materializer          │
//! │                  (descriptor cache underneath)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │  N ordered MaterializedSets
//!                          ▼ [relationship stitcher]
//! ┌─────────────────────────────────────────────────────────┐
//! │        parent/child object graphs (collections           │
//! │        assigned per RelationshipSpec, in list order)     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Query execution itself (connections, commands, drivers) lives behind the
//! [`provider::QueryProvider`] trait; this crate starts where rows end.

pub mod descriptor;
pub mod error;
pub mod model;
pub mod populate;
pub mod provider;
pub mod row;
pub mod stitch;
pub mod tuple;
pub mod value;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::descriptor::{DescriptorLookup, DescriptorRegistry, TypeDescriptor};
    pub use crate::error::{Error, Result};
    pub use crate::model::{
        downcast_children, CollectionConfig, FieldConfig, Model, ModelInfo, ParamDirection,
        Populate,
    };
    pub use crate::populate::{materialize, MaterializationPolicy, MaterializedSet, PopulationPlan};
    pub use crate::provider::{QueryProvider, SegmentChain, SourcedSets, TraceLevel};
    pub use crate::row::{RawResultSet, RowView};
    pub use crate::stitch::RelationshipSpec;
    pub use crate::tuple::{DynResultTuple, ResultTuple2, ResultTuple3, ResultTuple4};
    pub use crate::value::{TypeTag, Value};
}

// Also export the most common entry points at the crate root.
pub use error::{Error, Result};
pub use model::{Model, Populate};
pub use populate::{MaterializationPolicy, MaterializedSet};
pub use provider::{QueryProvider, SegmentChain};
pub use row::RawResultSet;
pub use stitch::RelationshipSpec;
pub use value::{TypeTag, Value};
