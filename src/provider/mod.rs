//! Backing providers and the cross-provider segment chain.
//!
//! A provider is the crate's window onto the excluded query-execution layer:
//! it knows how to run its already-bound command as a single- or multi-set
//! read, owns its own descriptor registry, and exposes a best-effort trace
//! hook. The segment chain composes several providers into one logical query
//! whose result sets come back in one positional order.

mod segments;

pub use segments::{Provenance, ProviderSegment, SegmentChain, SegmentWork, SourcedSets};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::DescriptorRegistry;
use crate::row::RawResultSet;

/// Result type for provider reads.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failures surfaced by the execution layer behind a provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider's read failed; the message is driver-specific.
    #[error("provider '{provider}' failed: {message}")]
    Execution { provider: String, message: String },

    /// A multi-set segment returned a different number of sets than its
    /// declared table count.
    #[error("provider '{provider}' returned {actual} result sets, segment declared {expected}")]
    SetCountMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },

    /// A result set arrived structurally broken (ragged rows, tag arity).
    #[error("malformed result set: {detail}")]
    MalformedResultSet { detail: String },
}

impl ProviderError {
    pub fn execution(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Minimum level a provider's trace hook accepts.
///
/// Ordered `Debug < Information < None`; `None` silences the hook entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceLevel {
    Debug,
    Information,
    None,
}

impl TraceLevel {
    /// Whether a message at `at` passes this minimum level.
    pub fn enables(self, at: TraceLevel) -> bool {
        at != TraceLevel::None && at >= self
    }
}

/// One backing provider of a cross-provider query.
///
/// The command the provider executes is bound outside this crate; segments
/// only choose between its single- and multi-set entry points. Each provider
/// carries its own [`DescriptorRegistry`], so the same model type may be
/// described independently per provider.
#[async_trait]
pub trait QueryProvider: Send + Sync {
    /// Stable name used in provenance and error messages.
    fn name(&self) -> &str;

    /// This provider's own type-descriptor cache.
    fn registry(&self) -> Arc<DescriptorRegistry>;

    /// Minimum trace level; `None` by default.
    fn trace_level(&self) -> TraceLevel {
        TraceLevel::None
    }

    /// Best-effort trace sink; must never fail.
    fn trace(&self, level: TraceLevel, message: &str) {
        let _ = (level, message);
    }

    /// Execute the bound command expecting exactly one result set.
    async fn execute_single_set(&self) -> ProviderResult<RawResultSet>;

    /// Execute the bound command expecting multiple result sets, in the
    /// order the backing store produced them.
    async fn execute_multi_set(&self) -> ProviderResult<Vec<RawResultSet>>;
}

/// Emit through a provider's trace hook if its level allows it.
pub fn emit_trace(provider: &dyn QueryProvider, at: TraceLevel, message: &str) {
    if provider.trace_level().enables(at) {
        provider.trace(at, message);
    }
}
