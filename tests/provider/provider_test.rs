//! Segment chains over mock providers, end to end.

#[path = "../common/mod.rs"]
mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{raw_set, Customer, Order};
use weft::descriptor::DescriptorRegistry;
use weft::error::Error;
use weft::populate::MaterializationPolicy;
use weft::provider::{
    ProviderError, ProviderResult, QueryProvider, SegmentChain, TraceLevel,
};
use weft::row::RawResultSet;
use weft::stitch::RelationshipSpec;
use weft::tuple::ResultTuple2;
use weft::value::{TypeTag, Value};

struct MockProvider {
    name: String,
    registry: Arc<DescriptorRegistry>,
    sets: Vec<RawResultSet>,
    fail: bool,
    level: TraceLevel,
    traces: Mutex<Vec<(TraceLevel, String)>>,
}

impl MockProvider {
    fn new(name: &str, sets: Vec<RawResultSet>) -> Self {
        Self {
            name: name.to_string(),
            registry: Arc::new(DescriptorRegistry::new()),
            sets,
            fail: false,
            level: TraceLevel::None,
            traces: Mutex::new(Vec::new()),
        }
    }

    fn failing(name: &str) -> Self {
        let mut provider = Self::new(name, Vec::new());
        provider.fail = true;
        provider
    }

    fn with_trace_level(mut self, level: TraceLevel) -> Self {
        self.level = level;
        self
    }

    fn traces(&self) -> Vec<(TraceLevel, String)> {
        self.traces.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry(&self) -> Arc<DescriptorRegistry> {
        Arc::clone(&self.registry)
    }

    fn trace_level(&self) -> TraceLevel {
        self.level
    }

    fn trace(&self, level: TraceLevel, message: &str) {
        self.traces
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }

    async fn execute_single_set(&self) -> ProviderResult<RawResultSet> {
        if self.fail {
            return Err(ProviderError::execution(&self.name, "connection reset"));
        }
        Ok(self.sets[0].clone())
    }

    async fn execute_multi_set(&self) -> ProviderResult<Vec<RawResultSet>> {
        if self.fail {
            return Err(ProviderError::execution(&self.name, "connection reset"));
        }
        Ok(self.sets.clone())
    }
}

fn customers_raw() -> RawResultSet {
    raw_set(
        &[("id", TypeTag::Int), ("name", TypeTag::Text)],
        vec![
            vec![Value::Int(1), Value::Text("ada".into())],
            vec![Value::Int(2), Value::Text("grace".into())],
        ],
    )
    .with_source_table("customers")
}

fn orders_raw() -> RawResultSet {
    raw_set(
        &[("id", TypeTag::Int), ("customer_id", TypeTag::Int)],
        vec![
            vec![Value::Int(10), Value::Int(1)],
            vec![Value::Int(11), Value::Int(2)],
        ],
    )
    .with_source_table("orders")
}

fn tagged(name: &str) -> RawResultSet {
    raw_set(&[("tag", TypeTag::Text)], vec![vec![Value::Text(name.into())]])
}

#[test]
fn test_chain_counts_sets_across_segments() {
    let mut chain = SegmentChain::new();
    chain.append(Arc::new(MockProvider::new("a", vec![tagged("x")])), 1);
    chain.append(Arc::new(MockProvider::new("b", vec![tagged("y")])), 3);
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.set_count(), 4);
}

#[test]
fn test_segment_contributes_at_least_one_set() {
    let mut chain = SegmentChain::new();
    chain.append(Arc::new(MockProvider::new("a", vec![tagged("x")])), 0);
    assert_eq!(chain.segments()[0].table_count(), 1);
}

#[tokio::test]
async fn test_flattening_preserves_segment_and_set_order() {
    let mut chain = SegmentChain::new();
    chain.append(
        Arc::new(MockProvider::new("alpha", vec![tagged("a1"), tagged("a2")])),
        2,
    );
    chain.append(Arc::new(MockProvider::new("beta", vec![tagged("b1")])), 1);

    let sourced = chain.execute().await.unwrap();
    assert_eq!(sourced.len(), 3);

    let tags: Vec<&Value> = sourced.sets().iter().map(|s| &s.rows[0][0]).collect();
    assert_eq!(
        tags,
        vec![
            &Value::Text("a1".into()),
            &Value::Text("a2".into()),
            &Value::Text("b1".into()),
        ]
    );

    let providers: Vec<&str> = sourced.provenance().iter().map(|p| p.provider()).collect();
    assert_eq!(providers, vec!["alpha", "alpha", "beta"]);
}

#[tokio::test]
async fn test_declared_set_count_enforced_per_segment() {
    let mut chain = SegmentChain::new();
    chain.append(
        Arc::new(MockProvider::new("alpha", vec![tagged("a1"), tagged("a2")])),
        3,
    );

    let err = chain.execute().await.unwrap_err();
    match err {
        Error::Provider(ProviderError::SetCountMismatch {
            provider,
            expected,
            actual,
        }) => {
            assert_eq!(provider, "alpha");
            assert_eq!(expected, 3);
            assert_eq!(actual, 2);
        }
        other => panic!("expected SetCountMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_any_segment_failure_aborts_the_whole_read() {
    let mut chain = SegmentChain::new();
    chain.append(Arc::new(MockProvider::new("alpha", vec![tagged("a1")])), 1);
    chain.append(Arc::new(MockProvider::failing("beta")), 1);

    let err = chain.execute().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Provider(ProviderError::Execution { .. })
    ));
}

#[tokio::test]
async fn test_trace_hook_respects_the_provider_minimum_level() {
    let debug = Arc::new(
        MockProvider::new("dbg", vec![tagged("x")]).with_trace_level(TraceLevel::Debug),
    );
    let info = Arc::new(
        MockProvider::new("inf", vec![tagged("x")]).with_trace_level(TraceLevel::Information),
    );
    let silent = Arc::new(MockProvider::new("none", vec![tagged("x")]));

    let mut chain = SegmentChain::new();
    chain.append(Arc::clone(&debug) as Arc<dyn QueryProvider>, 1);
    chain.append(Arc::clone(&info) as Arc<dyn QueryProvider>, 1);
    chain.append(Arc::clone(&silent) as Arc<dyn QueryProvider>, 1);
    chain.execute().await.unwrap();

    let levels: Vec<TraceLevel> = debug.traces().iter().map(|(l, _)| *l).collect();
    assert_eq!(levels, vec![TraceLevel::Debug, TraceLevel::Information]);

    let levels: Vec<TraceLevel> = info.traces().iter().map(|(l, _)| *l).collect();
    assert_eq!(levels, vec![TraceLevel::Information]);

    assert!(silent.traces().is_empty());
}

#[test]
fn test_chain_lookup_covers_each_provider_registry_once() {
    let shared = Arc::new(MockProvider::new("alpha", vec![tagged("x")]));
    let other = Arc::new(MockProvider::new("beta", vec![tagged("y")]));

    let mut chain = SegmentChain::new();
    chain.append(Arc::clone(&shared) as Arc<dyn QueryProvider>, 1);
    chain.append(Arc::clone(&shared) as Arc<dyn QueryProvider>, 1);
    chain.append(other, 1);

    assert_eq!(chain.lookup().registry_count(), 2);
}

#[tokio::test]
async fn test_cross_provider_read_assembles_and_stitches() {
    let customers = Arc::new(MockProvider::new("crm", vec![customers_raw()]));
    let orders = Arc::new(MockProvider::new("billing", vec![orders_raw()]));

    let mut chain = SegmentChain::new();
    chain.append(Arc::clone(&customers) as Arc<dyn QueryProvider>, 1);
    chain.append(Arc::clone(&orders) as Arc<dyn QueryProvider>, 1);

    let sourced = chain.execute().await.unwrap();
    let mut tuple = ResultTuple2::<Customer, Order>::assemble(
        sourced,
        &MaterializationPolicy::sequential(),
    )
    .unwrap();
    tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "orders")])
        .unwrap();

    let set = &tuple.sets.0;
    assert_eq!(set.source_table(), Some("customers"));
    assert_eq!(set.items()[0].orders[0].id, 10);
    assert_eq!(set.items()[1].orders[0].id, 11);

    // Each type lives only in its producing provider's registry; the stitch
    // resolved the parent through the combined lookup.
    assert!(customers
        .registry()
        .get(std::any::TypeId::of::<Customer>())
        .is_some());
    assert!(customers
        .registry()
        .get(std::any::TypeId::of::<Order>())
        .is_none());
    assert!(orders
        .registry()
        .get(std::any::TypeId::of::<Order>())
        .is_some());
}
