//! The build-once descriptor registry and the cross-provider lookup.

use std::any::TypeId;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::debug;

use super::error::ConfigResult;
use super::TypeDescriptor;
use crate::model::{Model, ModelInfo};

/// Memoized, thread-safe, build-once-per-type descriptor cache.
///
/// Each provider owns one registry; tests may create isolated instances. The
/// fast path is a lock-free map read; first-time builds serialize on a single
/// build lock so concurrent first use yields exactly one build, and readers
/// that find an existing entry never block on it.
#[derive(Default)]
pub struct DescriptorRegistry {
    descriptors: DashMap<TypeId, Arc<TypeDescriptor>>,
    build_lock: Mutex<()>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or build the descriptor for `T`. Idempotent; a validation failure
    /// leaves the type unbuilt so a later call retries.
    pub fn ensure<T: Model>(&self) -> ConfigResult<Arc<TypeDescriptor>> {
        self.ensure_info(&ModelInfo::of::<T>())
    }

    /// Runtime-typed variant of [`ensure`](Self::ensure), used by the dynamic
    /// tuple path and for nested-model recursion.
    pub fn ensure_info(&self, info: &ModelInfo) -> ConfigResult<Arc<TypeDescriptor>> {
        if let Some(existing) = self.descriptors.get(&info.type_id()) {
            return Ok(existing.value().clone());
        }

        let _guard = self
            .build_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Another caller may have completed the build while we waited.
        if let Some(existing) = self.descriptors.get(&info.type_id()) {
            return Ok(existing.value().clone());
        }

        debug!(model = info.name(), "building type descriptor");

        // Leaf-first: nested types are validated, built, and inserted before
        // the types that declare them.
        let order = super::validate::discover_build_order(info)?;
        let mut contributed = std::collections::HashMap::new();
        let mut result = None;
        for node in order {
            let descriptor = match self.descriptors.get(&node.type_id()) {
                Some(existing) => {
                    // Already built; still need its column set for parents.
                    let built = existing.value().clone();
                    contributed.insert(
                        node.type_id(),
                        super::validate::contributed_columns(
                            &node,
                            &node.fields(),
                            &contributed,
                        )?,
                    );
                    built
                }
                None => {
                    let built = Arc::new(TypeDescriptor::build(&node, &mut contributed)?);
                    self.descriptors.insert(node.type_id(), built.clone());
                    built
                }
            };
            if node.type_id() == info.type_id() {
                result = Some(descriptor);
            }
        }

        // The root is always part of its own build order.
        Ok(result.unwrap_or_else(|| unreachable!("root type missing from build order")))
    }

    /// Look up an already-built descriptor.
    pub fn get(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.descriptors.get(&type_id).map(|d| d.value().clone())
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.descriptors.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl std::fmt::Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorRegistry")
            .field("descriptors", &self.descriptors.len())
            .finish()
    }
}

/// Ordered union of several providers' registries.
///
/// When a query spans providers, the stitcher resolves each set's descriptor
/// through this combined view; the first registry that knows the type wins.
#[derive(Clone, Default)]
pub struct DescriptorLookup {
    registries: Vec<Arc<DescriptorRegistry>>,
}

impl DescriptorLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(registry: Arc<DescriptorRegistry>) -> Self {
        let mut lookup = Self::new();
        lookup.push(registry);
        lookup
    }

    /// Add a registry; duplicates (by identity) are skipped.
    pub fn push(&mut self, registry: Arc<DescriptorRegistry>) {
        if !self.registries.iter().any(|r| Arc::ptr_eq(r, &registry)) {
            self.registries.push(registry);
        }
    }

    pub fn resolve(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.registries.iter().find_map(|r| r.get(type_id))
    }

    pub fn registry_count(&self) -> usize {
        self.registries.len()
    }
}

impl std::fmt::Debug for DescriptorLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorLookup")
            .field("registries", &self.registries.len())
            .finish()
    }
}
