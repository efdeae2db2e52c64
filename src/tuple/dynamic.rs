//! Dynamic-arity result tuples: types resolved at call time.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::descriptor::DescriptorLookup;
use crate::error::Error;
use crate::model::{DynModel, Model, ModelInfo};
use crate::populate::{MaterializationPolicy, PopulationPlan};
use crate::provider::{Provenance, SourcedSets};
use crate::stitch::{
    apply_specs, ChildGroups, RelationshipError, RelationshipSpec, SetView, StitchResult,
};

/// A runtime-typed materialized set: a homogeneous ordered collection of one
/// model type behind the shared dynamic base.
pub struct DynSet {
    items: Vec<Box<dyn DynModel>>,
    type_id: TypeId,
    type_name: &'static str,
}

impl DynSet {
    pub(crate) fn new(
        items: Vec<Box<dyn DynModel>>,
        type_id: TypeId,
        type_name: &'static str,
    ) -> Self {
        Self {
            items,
            type_id,
            type_name,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn items(&self) -> &[Box<dyn DynModel>] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [Box<dyn DynModel>] {
        &mut self.items
    }

    /// Recover the statically-typed items, when the caller knows the type.
    /// Fails (returning the set untouched) when `T` is not the element type.
    pub fn downcast_items<T: Model>(self) -> Result<Vec<T>, Self> {
        if self.type_id != TypeId::of::<T>() {
            return Err(self);
        }
        Ok(self
            .items
            .into_iter()
            .filter_map(|item| item.into_any().downcast::<T>().ok().map(|t| *t))
            .collect())
    }
}

impl std::fmt::Debug for DynSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynSet")
            .field("type_name", &self.type_name)
            .field("len", &self.items.len())
            .finish()
    }
}

struct DynGroups<'a> {
    set: &'a DynSet,
    by_key: HashMap<String, Vec<usize>>,
}

impl ChildGroups for DynGroups<'_> {
    fn take_typed(&self, key: &str) -> Option<Box<dyn Any + Send>> {
        // The native form of a dynamic set is the dynamic base itself;
        // typed parents recover elements via `downcast_children`.
        self.take_dyn(key)
            .map(|group| Box::new(group) as Box<dyn Any + Send>)
    }

    fn take_dyn(&self, key: &str) -> Option<Vec<Box<dyn DynModel>>> {
        self.by_key.get(key).map(|rows| {
            rows.iter()
                .map(|row| self.set.items[*row].clone_box())
                .collect()
        })
    }
}

impl SetView for DynSet {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn element_type_id(&self) -> TypeId {
        self.type_id
    }

    fn element_type_name(&self) -> &str {
        self.type_name
    }

    fn text_key(&self, row: usize, path: &str) -> Option<String> {
        self.items.get(row).and_then(|item| item.text_of(path))
    }

    fn group_children<'a>(&'a self, path: &str) -> Box<dyn ChildGroups + 'a> {
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (row, item) in self.items.iter().enumerate() {
            if let Some(key) = item.text_of(path) {
                by_key.entry(key).or_default().push(row);
            }
        }
        Box::new(DynGroups { set: self, by_key })
    }

    fn assign_group(
        &mut self,
        row: usize,
        property: &str,
        children: Box<dyn Any + Send>,
    ) -> StitchResult<()> {
        let len = self.items.len();
        match self.items.get_mut(row) {
            Some(item) => item.assign_children(property, children),
            None => Err(RelationshipError::ParentRowOutOfRange { row, len }),
        }
    }
}

/// Arbitrary-arity result tuple; target types are supplied at call time as
/// [`ModelInfo`] handles.
#[derive(Debug)]
pub struct DynResultTuple {
    sets: Vec<DynSet>,
    provenance: Vec<Provenance>,
}

impl DynResultTuple {
    /// Assemble set *i* as type *i*; `sourced` and `types` must agree on
    /// arity.
    pub fn assemble(
        sourced: SourcedSets,
        types: &[ModelInfo],
        policy: &MaterializationPolicy,
    ) -> Result<Self, Error> {
        if sourced.len() != types.len() {
            return Err(Error::SetCountMismatch {
                expected: types.len(),
                actual: sourced.len(),
            });
        }

        let mut sets = Vec::with_capacity(types.len());
        for (raw, (provenance, info)) in sourced
            .sets()
            .iter()
            .zip(sourced.provenance().iter().zip(types))
        {
            let registry = provenance.registry();
            let descriptor = registry.ensure_info(info)?;
            let plan = PopulationPlan::compile(&raw.column_names, &descriptor, registry)?;
            let items = info.materialize_dyn(raw, &descriptor, &plan, policy)?;
            sets.push(DynSet::new(items, info.type_id(), info.name()));
        }

        let (_, provenance) = sourced.into_parts();
        Ok(Self { sets, provenance })
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn sets(&self) -> &[DynSet] {
        &self.sets
    }

    pub fn sets_mut(&mut self) -> &mut [DynSet] {
        &mut self.sets
    }

    pub fn set(&self, index: usize) -> Option<&DynSet> {
        self.sets.get(index)
    }

    /// Consume the tuple, yielding the ordered list of typed collections.
    pub fn into_sets(self) -> Vec<DynSet> {
        self.sets
    }

    pub fn provenance(&self) -> &[Provenance] {
        &self.provenance
    }

    pub fn lookup(&self) -> DescriptorLookup {
        let mut lookup = DescriptorLookup::new();
        for p in &self.provenance {
            lookup.push(p.registry().clone());
        }
        lookup
    }

    /// Apply relationship specs, in list order, over this tuple's sets.
    pub fn stitch(&mut self, specs: &[RelationshipSpec]) -> StitchResult<()> {
        let lookup = self.lookup();
        let mut views: Vec<&mut dyn SetView> = self
            .sets
            .iter_mut()
            .map(|set| set as &mut dyn SetView)
            .collect();
        apply_specs(&mut views, &lookup, specs)
    }
}
