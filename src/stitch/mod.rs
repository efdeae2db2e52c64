//! Relationship stitching: joining positionally-ordered result sets into
//! parent/child object graphs.
//!
//! The stitcher works over an object-safe [`SetView`] so the same join
//! algorithm serves both fixed-arity (statically typed) and dynamic
//! (runtime-typed) result tuples, including tuples whose sets came from
//! different providers.
//!
//! Join keys compare by *text form*, not native equality: an integer `1` and
//! a text `"1"` meet. This mirrors the literal join semantics of the data
//! sources the engine aggregates over and is covered explicitly by tests;
//! callers needing typed equality must normalize their key columns first.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::descriptor::DescriptorLookup;
use crate::model::{CollectionElement, DynModel, Model};
use crate::populate::MaterializedSet;

/// Result type for stitch operations.
pub type StitchResult<T> = Result<T, RelationshipError>;

/// Errors raised while resolving or applying relationship specs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelationshipError {
    /// A spec resolved to an unusable pair of set indices.
    #[error("relationship {spec_index} is misconfigured: {reason}")]
    MisconfiguredRelationship { spec_index: usize, reason: String },

    /// The parent type declares no collection property of this name.
    #[error("parent type '{parent}' has no collection property '{property}'")]
    ParentPropertyMissing { parent: String, property: String },

    /// A field of this name exists on the parent but is not a mutable
    /// ordered collection.
    #[error("property '{property}' on parent type '{parent}' is not a list")]
    ParentPropertyNotAList { parent: String, property: String },

    /// The declared element type does not match the child set.
    #[error("collection '{property}' does not hold elements of '{expected}'")]
    ParentPropertyListIncorrectType { property: String, expected: String },

    /// More specs than set boundaries in the tuple.
    #[error("{specs} relationship specs but only {boundaries} set boundaries")]
    TooManyRelationships { specs: usize, boundaries: usize },

    /// The parent instance rejected the assignment; its `assign_children`
    /// does not cover a property its configuration declares.
    #[error("collection property '{property}' is not writable on the parent instance")]
    CollectionNotWritable { property: String },

    /// No provider registry in the combined lookup knows the parent type.
    #[error("no descriptor available for type '{type_name}'")]
    DescriptorUnavailable { type_name: String },

    /// Internal guard: a parent row index escaped the stitch loop's bounds.
    /// The stitcher itself only visits rows in range.
    #[error("parent row {row} out of range for a set of {len}")]
    ParentRowOutOfRange { row: usize, len: usize },
}

/// Caller-declared parent/child relationship between two sets of a tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSpec {
    /// Parent-side join column; dotted paths reach nested models.
    pub parent_column: String,
    /// Child-side join column; dotted paths reach nested models.
    pub child_column: String,
    /// Collection property on the parent receiving the matched children.
    pub parent_collection_property: String,
    /// Explicit parent set index; defaults to the spec's own position.
    pub parent_index: Option<usize>,
    /// Explicit child set index; defaults to the spec's position plus one.
    pub child_index: Option<usize>,
}

impl RelationshipSpec {
    pub fn new(
        parent_column: impl Into<String>,
        child_column: impl Into<String>,
        parent_collection_property: impl Into<String>,
    ) -> Self {
        Self {
            parent_column: parent_column.into(),
            child_column: child_column.into(),
            parent_collection_property: parent_collection_property.into(),
            parent_index: None,
            child_index: None,
        }
    }

    pub fn with_parent_index(mut self, index: usize) -> Self {
        self.parent_index = Some(index);
        self
    }

    pub fn with_child_index(mut self, index: usize) -> Self {
        self.child_index = Some(index);
        self
    }
}

/// Child rows of one set, grouped by the text form of their join column.
///
/// `take_*` clones the matched group, so several parents sharing a key text
/// each receive the full group.
pub trait ChildGroups {
    /// The group in the child set's native typed form (`Vec<C>` boxed), child
    /// order preserved.
    fn take_typed(&self, key: &str) -> Option<Box<dyn Any + Send>>;

    /// The group as the shared dynamic base, for dynamic collection targets.
    fn take_dyn(&self, key: &str) -> Option<Vec<Box<dyn DynModel>>>;
}

/// Object-safe view of one materialized set inside a tuple.
pub trait SetView {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn element_type_id(&self) -> TypeId;

    fn element_type_name(&self) -> &str;

    /// Text form of `path` on the instance at `row`.
    fn text_key(&self, row: usize, path: &str) -> Option<String>;

    /// Group this set's rows by the text form of `path`, original order kept
    /// within each group.
    fn group_children<'a>(&'a self, path: &str) -> Box<dyn ChildGroups + 'a>;

    /// Assign a matched child group into the instance at `row`.
    fn assign_group(
        &mut self,
        row: usize,
        property: &str,
        children: Box<dyn Any + Send>,
    ) -> StitchResult<()>;
}

/// Apply relationship specs, in list order, over the views of one tuple.
///
/// Specs resolve their set indices explicitly or sequentially (spec *i* joins
/// parent *i* to child *i*+1). An empty parent or child set is a no-op for
/// that spec. Determinism: children keep child-set order within a group;
/// parents are visited in parent-set order.
pub(crate) fn apply_specs(
    views: &mut [&mut dyn SetView],
    lookup: &DescriptorLookup,
    specs: &[RelationshipSpec],
) -> StitchResult<()> {
    let boundaries = views.len().saturating_sub(1);
    if specs.len() > boundaries {
        return Err(RelationshipError::TooManyRelationships {
            specs: specs.len(),
            boundaries,
        });
    }

    for (spec_index, spec) in specs.iter().enumerate() {
        let parent_index = spec.parent_index.unwrap_or(spec_index);
        let child_index = spec.child_index.unwrap_or(spec_index + 1);

        if parent_index == child_index {
            return Err(RelationshipError::MisconfiguredRelationship {
                spec_index,
                reason: format!("parent and child both resolve to set {parent_index}"),
            });
        }
        if parent_index >= views.len() || child_index >= views.len() {
            return Err(RelationshipError::MisconfiguredRelationship {
                spec_index,
                reason: format!(
                    "set index out of range (parent {parent_index}, child {child_index}, {} sets)",
                    views.len()
                ),
            });
        }

        let (parent, child) = split_pair(views, parent_index, child_index);

        // Nothing to join against; the parent property stays untouched.
        if parent.is_empty() || child.is_empty() {
            continue;
        }

        let descriptor = lookup.resolve(parent.element_type_id()).ok_or_else(|| {
            RelationshipError::DescriptorUnavailable {
                type_name: parent.element_type_name().to_string(),
            }
        })?;

        let property = spec.parent_collection_property.as_str();
        let element = match descriptor.collection(property) {
            Some(collection) => collection.element().clone(),
            None if descriptor.has_field_named(property) => {
                return Err(RelationshipError::ParentPropertyNotAList {
                    parent: descriptor.type_name().to_string(),
                    property: property.to_string(),
                });
            }
            None => {
                return Err(RelationshipError::ParentPropertyMissing {
                    parent: descriptor.type_name().to_string(),
                    property: property.to_string(),
                });
            }
        };

        if let CollectionElement::Typed {
            type_id,
            type_name,
        } = &element
        {
            if *type_id != child.element_type_id() {
                return Err(RelationshipError::ParentPropertyListIncorrectType {
                    property: property.to_string(),
                    expected: type_name.to_string(),
                });
            }
        }

        debug!(
            parent = descriptor.type_name(),
            property,
            parent_index,
            child_index,
            "stitching relationship"
        );

        let groups = child.group_children(&spec.child_column);
        for row in 0..parent.len() {
            let Some(key) = parent.text_key(row, &spec.parent_column) else {
                continue;
            };
            let matched = match element {
                CollectionElement::Dynamic => groups
                    .take_dyn(&key)
                    .map(|group| Box::new(group) as Box<dyn Any + Send>),
                CollectionElement::Typed { .. } => groups.take_typed(&key),
            };
            if let Some(children) = matched {
                parent.assign_group(row, property, children)?;
            }
        }
    }

    Ok(())
}

/// Disjoint parent (mutable) and child (shared) views; indices are distinct
/// and in range by the time this runs.
fn split_pair<'a>(
    views: &'a mut [&mut dyn SetView],
    parent: usize,
    child: usize,
) -> (&'a mut dyn SetView, &'a dyn SetView) {
    if parent < child {
        let (left, right) = views.split_at_mut(child);
        (&mut *left[parent], &*right[0])
    } else {
        let (left, right) = views.split_at_mut(parent);
        (&mut *right[0], &*left[child])
    }
}

struct TypedGroups<'a, T> {
    set: &'a MaterializedSet<T>,
    by_key: HashMap<String, Vec<usize>>,
}

impl<T: Model> ChildGroups for TypedGroups<'_, T> {
    fn take_typed(&self, key: &str) -> Option<Box<dyn Any + Send>> {
        self.by_key.get(key).map(|rows| {
            let group: Vec<T> = rows
                .iter()
                .map(|row| self.set.items()[*row].clone())
                .collect();
            Box::new(group) as Box<dyn Any + Send>
        })
    }

    fn take_dyn(&self, key: &str) -> Option<Vec<Box<dyn DynModel>>> {
        self.by_key.get(key).map(|rows| {
            rows.iter()
                .map(|row| self.set.items()[*row].clone_box())
                .collect()
        })
    }
}

impl<T: Model> SetView for MaterializedSet<T> {
    fn len(&self) -> usize {
        MaterializedSet::len(self)
    }

    fn element_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn element_type_name(&self) -> &str {
        T::model_name()
    }

    fn text_key(&self, row: usize, path: &str) -> Option<String> {
        self.items().get(row).and_then(|item| item.text_of(path))
    }

    fn group_children<'a>(&'a self, path: &str) -> Box<dyn ChildGroups + 'a> {
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (row, item) in self.items().iter().enumerate() {
            if let Some(key) = item.text_of(path) {
                by_key.entry(key).or_default().push(row);
            }
        }
        Box::new(TypedGroups { set: self, by_key })
    }

    fn assign_group(
        &mut self,
        row: usize,
        property: &str,
        children: Box<dyn Any + Send>,
    ) -> StitchResult<()> {
        let len = self.items().len();
        match self.items_mut().get_mut(row) {
            Some(item) => item.assign_children(property, children),
            None => Err(RelationshipError::ParentRowOutOfRange { row, len }),
        }
    }
}
