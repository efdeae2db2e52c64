//! Per-type metadata: descriptors, the build-once registry, and the
//! cross-provider descriptor lookup.
//!
//! A [`TypeDescriptor`] is built exactly once per model type and shared by
//! every caller through its provider's [`DescriptorRegistry`]. Descriptors
//! are immutable after creation; all per-query state lives in population
//! plans instead.

mod error;
mod registry;
mod validate;

pub use error::{ConfigResult, ConfigurationError};
pub use registry::{DescriptorLookup, DescriptorRegistry};

use std::any::TypeId;
use std::collections::HashMap;

use crate::model::{
    CollectionConfig, CollectionElement, FieldConfig, FieldKind, ModelInfo, ParamDirection,
};
use crate::value::Value;

/// How instances of a type are populated from rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationMode {
    /// Generic plan-driven column mapping.
    Planned,
    /// The type's own row function, selected once at build time.
    Custom,
}

/// Cached metadata for one field of a model type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    column: String,
    kind: FieldKind,
    nullable: bool,
    default: Option<Value>,
    direction: ParamDirection,
    read_format: Option<String>,
    write_format: Option<String>,
    ignored: bool,
    accessor: usize,
}

impl FieldDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Effective SQL-facing column name (rename applied).
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn direction(&self) -> ParamDirection {
        self.direction
    }

    pub fn read_format(&self) -> Option<&str> {
        self.read_format.as_deref()
    }

    pub fn write_format(&self) -> Option<&str> {
        self.write_format.as_deref()
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Precomputed fast-accessor index into the owning type.
    pub fn accessor(&self) -> usize {
        self.accessor
    }

    pub(crate) fn nested_info(&self) -> Option<&ModelInfo> {
        match &self.kind {
            FieldKind::Nested(info) => Some(info),
            _ => None,
        }
    }
}

/// Cached metadata for one collection property, used by the stitcher.
#[derive(Clone)]
pub struct CollectionDescriptor {
    property: &'static str,
    element: CollectionElement,
}

impl CollectionDescriptor {
    pub fn property(&self) -> &'static str {
        self.property
    }

    pub fn element(&self) -> &CollectionElement {
        &self.element
    }
}

/// Immutable per-type metadata, built once and shared process-wide through a
/// registry.
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    column_map: HashMap<String, usize>,
    nested_accessors: Vec<usize>,
    collections: Vec<CollectionDescriptor>,
    population: PopulationMode,
}

impl TypeDescriptor {
    /// Build a descriptor from a model's configuration.
    ///
    /// `contributed` must hold the transitive column sets of every nested
    /// type (the registry builds leaf-first and fills it in as it goes).
    pub(crate) fn build(
        info: &ModelInfo,
        contributed: &mut HashMap<TypeId, Vec<String>>,
    ) -> ConfigResult<Self> {
        let configs = info.fields();
        validate::validate_fields(info, &configs)?;
        let columns = validate::contributed_columns(info, &configs, contributed)?;
        contributed.insert(info.type_id(), columns);

        let mut fields = Vec::with_capacity(configs.len());
        let mut column_map = HashMap::new();
        let mut nested_accessors = Vec::new();

        for (accessor, config) in configs.into_iter().enumerate() {
            let FieldConfig {
                name,
                kind,
                column,
                nullable,
                default,
                direction,
                read_format,
                write_format,
                ignore,
            } = config;
            let column = column.unwrap_or_else(|| name.to_string());

            if !ignore {
                match &kind {
                    FieldKind::Scalar(_) => {
                        column_map.insert(column.to_lowercase(), accessor);
                    }
                    FieldKind::Nested(_) => nested_accessors.push(accessor),
                    FieldKind::Table | FieldKind::Collection => {}
                }
            }

            fields.push(FieldDescriptor {
                name,
                column,
                kind,
                nullable,
                default,
                direction,
                read_format,
                write_format,
                ignored: ignore,
                accessor,
            });
        }

        let collections = info
            .collections()
            .into_iter()
            .map(|CollectionConfig { property, element }| CollectionDescriptor {
                property,
                element,
            })
            .collect();

        Ok(Self {
            type_id: info.type_id(),
            type_name: info.name(),
            fields,
            column_map,
            nested_accessors,
            collections,
            population: if info.has_custom_population() {
                PopulationMode::Custom
            } else {
                PopulationMode::Planned
            },
        })
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields in accessor order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, accessor: usize) -> Option<&FieldDescriptor> {
        self.fields.get(accessor)
    }

    /// Resolve a result-set column to its target field, case-insensitively.
    pub fn resolve_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.column_map
            .get(&column.to_lowercase())
            .map(|accessor| &self.fields[*accessor])
    }

    /// Accessors of nested-model fields, in accessor order.
    pub fn nested_accessors(&self) -> &[usize] {
        &self.nested_accessors
    }

    pub fn collections(&self) -> &[CollectionDescriptor] {
        &self.collections
    }

    pub fn collection(&self, property: &str) -> Option<&CollectionDescriptor> {
        self.collections
            .iter()
            .find(|c| c.property.eq_ignore_ascii_case(property))
    }

    /// Whether a plain (non-collection) field of this name exists; used to
    /// tell "missing property" apart from "property is not a list".
    pub fn has_field_named(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn population_mode(&self) -> PopulationMode {
        self.population
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.len())
            .field("collections", &self.collections.len())
            .field("population", &self.population)
            .finish()
    }
}
