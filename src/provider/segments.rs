//! The provider segment chain: one logical query fanned out across several
//! backing providers.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use super::{emit_trace, ProviderError, ProviderResult, QueryProvider, TraceLevel};
use crate::descriptor::{DescriptorLookup, DescriptorRegistry};
use crate::error::Error;
use crate::row::RawResultSet;

/// Which provider produced one result set of a tuple.
#[derive(Clone)]
pub struct Provenance {
    provider: String,
    registry: Arc<DescriptorRegistry>,
}

impl Provenance {
    pub fn new(provider: impl Into<String>, registry: Arc<DescriptorRegistry>) -> Self {
        Self {
            provider: provider.into(),
            registry,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The producing provider's descriptor registry.
    pub fn registry(&self) -> &Arc<DescriptorRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provenance")
            .field("provider", &self.provider)
            .finish()
    }
}

/// Ordered raw result sets plus per-set provenance — the hand-off from the
/// segment chain to the tuple assembler.
#[derive(Debug)]
pub struct SourcedSets {
    sets: Vec<RawResultSet>,
    provenance: Vec<Provenance>,
}

impl SourcedSets {
    /// Pair sets with their provenance; both lists are positionally aligned.
    pub fn new(sets: Vec<RawResultSet>, provenance: Vec<Provenance>) -> Result<Self, Error> {
        if sets.len() != provenance.len() {
            return Err(Error::SetCountMismatch {
                expected: sets.len(),
                actual: provenance.len(),
            });
        }
        Ok(Self { sets, provenance })
    }

    /// All sets from one provider, the common single-source case.
    pub fn single_provider(
        provider: impl Into<String>,
        registry: Arc<DescriptorRegistry>,
        sets: Vec<RawResultSet>,
    ) -> Self {
        let provenance = Provenance::new(provider, registry);
        let provenance = vec![provenance; sets.len()];
        Self { sets, provenance }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn sets(&self) -> &[RawResultSet] {
        &self.sets
    }

    pub fn provenance(&self) -> &[Provenance] {
        &self.provenance
    }

    /// Combined descriptor lookup over every producing provider's registry.
    pub fn lookup(&self) -> DescriptorLookup {
        let mut lookup = DescriptorLookup::new();
        for p in &self.provenance {
            lookup.push(p.registry.clone());
        }
        lookup
    }

    pub fn into_parts(self) -> (Vec<RawResultSet>, Vec<Provenance>) {
        (self.sets, self.provenance)
    }
}

/// One node of a segment chain: a bound provider and how many consecutive
/// result sets it contributes.
#[derive(Clone)]
pub struct ProviderSegment {
    provider: Arc<dyn QueryProvider>,
    table_count: usize,
}

impl ProviderSegment {
    /// A segment contributes at least one set.
    pub fn new(provider: Arc<dyn QueryProvider>, table_count: usize) -> Self {
        Self {
            provider,
            table_count: table_count.max(1),
        }
    }

    pub fn provider(&self) -> &Arc<dyn QueryProvider> {
        &self.provider
    }

    pub fn table_count(&self) -> usize {
        self.table_count
    }
}

/// One schedulable unit of a cross-provider read. Units share no mutable
/// state; the caller may run them in any order or all at once.
pub struct SegmentWork {
    provider: Arc<dyn QueryProvider>,
    table_count: usize,
}

impl SegmentWork {
    /// Run this segment's read against its provider: the single-set entry
    /// point for a table count of one, the multi-set entry point otherwise.
    pub async fn run(self) -> ProviderResult<Vec<RawResultSet>> {
        emit_trace(
            self.provider.as_ref(),
            TraceLevel::Debug,
            &format!("executing segment ({} sets)", self.table_count),
        );

        let sets = if self.table_count == 1 {
            vec![self.provider.execute_single_set().await?]
        } else {
            let sets = self.provider.execute_multi_set().await?;
            if sets.len() != self.table_count {
                return Err(ProviderError::SetCountMismatch {
                    provider: self.provider.name().to_string(),
                    expected: self.table_count,
                    actual: sets.len(),
                });
            }
            sets
        };

        emit_trace(
            self.provider.as_ref(),
            TraceLevel::Information,
            &format!("segment read complete ({} sets)", sets.len()),
        );
        Ok(sets)
    }
}

/// An ordered, appendable sequence of provider segments representing one
/// logical cross-provider query.
#[derive(Default)]
pub struct SegmentChain {
    segments: Vec<ProviderSegment>,
}

impl SegmentChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment for `provider` contributing `table_count` sets.
    pub fn append(
        &mut self,
        provider: Arc<dyn QueryProvider>,
        table_count: usize,
    ) -> &mut Self {
        self.segments.push(ProviderSegment::new(provider, table_count));
        self
    }

    pub fn push(&mut self, segment: ProviderSegment) -> &mut Self {
        self.segments.push(segment);
        self
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[ProviderSegment] {
        &self.segments
    }

    /// Total result sets the chain will produce.
    pub fn set_count(&self) -> usize {
        self.segments.iter().map(ProviderSegment::table_count).sum()
    }

    /// One schedulable unit per segment.
    pub fn build_work(&self) -> Vec<SegmentWork> {
        self.segments
            .iter()
            .map(|segment| SegmentWork {
                provider: segment.provider.clone(),
                table_count: segment.table_count,
            })
            .collect()
    }

    /// Run all units concurrently and join on the whole chain.
    ///
    /// Any unit's failure aborts the read; no partial-segment results are
    /// surfaced. Flattening preserves segment order and, within a multi-set
    /// segment, its internal set order. Cancellation and timeouts belong to
    /// the execution layer behind each provider.
    pub async fn execute(&self) -> Result<SourcedSets, Error> {
        debug!(segments = self.segments.len(), "executing segment chain");

        let results = try_join_all(self.build_work().into_iter().map(SegmentWork::run)).await?;

        let mut sets = Vec::with_capacity(self.set_count());
        let mut provenance = Vec::with_capacity(self.set_count());
        for (segment, segment_sets) in self.segments.iter().zip(results) {
            for set in segment_sets {
                sets.push(set);
                provenance.push(Provenance::new(
                    segment.provider.name(),
                    segment.provider.registry(),
                ));
            }
        }
        SourcedSets::new(sets, provenance)
    }

    /// Combined descriptor lookup over every segment provider's registry.
    pub fn lookup(&self) -> DescriptorLookup {
        let mut lookup = DescriptorLookup::new();
        for segment in &self.segments {
            lookup.push(segment.provider.registry());
        }
        lookup
    }
}
