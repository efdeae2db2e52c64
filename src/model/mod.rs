//! Population-target model traits and per-field configuration.
//!
//! A *model type* is an application record type that result-set rows are
//! materialized into. Implementations describe their fields through
//! [`FieldConfig`] values (the effect surface of rename / default / ignore /
//! direction annotations), expose accessor-indexed assignment through
//! [`Populate`], and may declare child-collection properties for the
//! relationship stitcher through [`CollectionConfig`].
//!
//! Two views of a model exist side by side:
//!
//! - the statically-typed [`Model`] trait, used by the fixed-arity tuple path;
//! - the object-safe [`DynModel`] trait (blanket-implemented for every
//!   `Model`), the shared dynamic base used by the runtime-typed tuple path.

use std::any::{Any, TypeId};

use serde::{Deserialize, Serialize};

use crate::descriptor::TypeDescriptor;
use crate::populate::{MaterializationPolicy, PopulationError, PopulationPlan};
use crate::row::{RawResultSet, RowView};
use crate::stitch::RelationshipError;
use crate::value::{TypeTag, Value};

/// Per-type population override: builds a fully populated instance straight
/// from a row, bypassing the compiled plan. Selected once at descriptor-build
/// time, invoked per row.
pub type CustomPopulation<T> = fn(&RowView<'_>) -> Result<T, PopulationError>;

/// Object-safe core of a population target.
///
/// Accessor indices are positions into the type's `field_configs()` list; the
/// descriptor cache precomputes them so row assignment never goes through a
/// name lookup.
pub trait Populate: Any + Send + Sync {
    /// Assign one column value to the field at `accessor`.
    ///
    /// Implementations return [`PopulationError::ColumnMismatch`] when the
    /// value's variant cannot convert into the field.
    fn assign(&mut self, accessor: usize, value: &Value) -> Result<(), PopulationError>;

    /// Mutable access to a nested-model field, for same-row recursion.
    fn nested_mut(&mut self, accessor: usize) -> Option<&mut dyn Populate> {
        let _ = accessor;
        None
    }

    /// Text form of a possibly dotted property path (`"address.city"`),
    /// resolved through the object's own fields. None for null or unknown
    /// paths.
    fn text_of(&self, path: &str) -> Option<String>;

    /// Move a matched child group into the named collection property.
    ///
    /// The box holds either `Vec<C>` or `Vec<Box<dyn DynModel>>`; use
    /// [`downcast_children`] to accept both. The stitcher validates the
    /// property against the descriptor before calling this.
    fn assign_children(
        &mut self,
        property: &str,
        children: Box<dyn Any + Send>,
    ) -> Result<(), RelationshipError> {
        let _ = children;
        Err(RelationshipError::CollectionNotWritable {
            property: property.to_string(),
        })
    }
}

/// A statically-known population target.
pub trait Model: Populate + Default + Clone + Send + Sync + Sized + 'static {
    /// Stable name used in descriptors and error messages.
    fn model_name() -> &'static str;

    /// Per-field configuration, in accessor order.
    fn field_configs() -> Vec<FieldConfig>;

    /// Child-collection properties available to the relationship stitcher.
    fn collection_configs() -> Vec<CollectionConfig> {
        Vec::new()
    }

    /// Opt out of plan-driven mapping with a hand-written row function.
    fn custom_population() -> Option<CustomPopulation<Self>> {
        None
    }
}

/// Shared dynamic base for runtime-typed sets.
pub trait DynModel: Populate {
    fn clone_box(&self) -> Box<dyn DynModel>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Model> DynModel for T {
    fn clone_box(&self) -> Box<dyn DynModel> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Parameter direction of a field, mirrored from the originating command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamDirection {
    Input,
    Output,
}

/// What a declared field holds.
#[derive(Clone)]
pub enum FieldKind {
    /// A plain column value of the given tag.
    Scalar(TypeTag),
    /// A nested model populated from the same row.
    Nested(ModelInfo),
    /// A bulk/table-valued parameter type.
    Table,
    /// An inline collection; only legal when ignored (stitch collections are
    /// declared through `CollectionConfig` instead).
    Collection,
}

impl std::fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Scalar(tag) => write!(f, "Scalar({tag})"),
            FieldKind::Nested(info) => write!(f, "Nested({})", info.name()),
            FieldKind::Table => write!(f, "Table"),
            FieldKind::Collection => write!(f, "Collection"),
        }
    }
}

/// Declarative configuration for one field of a model type.
///
/// Built with the constructor for the field's kind, then refined builder
/// style:
///
/// ```
/// use weft::model::FieldConfig;
/// use weft::value::{TypeTag, Value};
///
/// let id = FieldConfig::scalar("id", TypeTag::Int)
///     .rename("user_id")
///     .not_null();
/// let region = FieldConfig::scalar("region", TypeTag::Text)
///     .default_value(Value::Text("emea".into()));
/// ```
#[derive(Debug, Clone)]
pub struct FieldConfig {
    pub(crate) name: &'static str,
    pub(crate) kind: FieldKind,
    pub(crate) column: Option<String>,
    pub(crate) nullable: bool,
    pub(crate) default: Option<Value>,
    pub(crate) direction: ParamDirection,
    pub(crate) read_format: Option<String>,
    pub(crate) write_format: Option<String>,
    pub(crate) ignore: bool,
}

impl FieldConfig {
    fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            column: None,
            nullable: true,
            default: None,
            direction: ParamDirection::Input,
            read_format: None,
            write_format: None,
            ignore: false,
        }
    }

    pub fn scalar(name: &'static str, tag: TypeTag) -> Self {
        Self::new(name, FieldKind::Scalar(tag))
    }

    pub fn nested<T: Model>(name: &'static str) -> Self {
        Self::new(name, FieldKind::Nested(ModelInfo::of::<T>()))
    }

    pub fn table(name: &'static str) -> Self {
        Self::new(name, FieldKind::Table)
    }

    pub fn collection(name: &'static str) -> Self {
        Self::new(name, FieldKind::Collection)
    }

    /// Map this field to a differently named source column.
    pub fn rename(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Reject null assignments to this field.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Back-fill this value when the field's column is absent from a query.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn direction(mut self, direction: ParamDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Format rule applied to text values on read; `{0}` is the raw value.
    pub fn read_format(mut self, pattern: impl Into<String>) -> Self {
        self.read_format = Some(pattern.into());
        self
    }

    /// Format rule applied when the field is written back as a parameter.
    pub fn write_format(mut self, pattern: impl Into<String>) -> Self {
        self.write_format = Some(pattern.into());
        self
    }

    /// Exclude this field from column mapping entirely.
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Effective SQL-facing column name: rename when present, else the field
    /// name.
    pub fn effective_column(&self) -> &str {
        self.column.as_deref().unwrap_or(self.name)
    }
}

/// Element type of a declared collection property.
#[derive(Clone)]
pub enum CollectionElement {
    Typed {
        type_id: TypeId,
        type_name: &'static str,
    },
    /// Accepts children of any model type, as `Vec<Box<dyn DynModel>>`.
    Dynamic,
}

/// A mutable ordered collection property the stitcher may assign into.
#[derive(Clone)]
pub struct CollectionConfig {
    pub(crate) property: &'static str,
    pub(crate) element: CollectionElement,
}

impl CollectionConfig {
    pub fn of<C: Model>(property: &'static str) -> Self {
        Self {
            property,
            element: CollectionElement::Typed {
                type_id: TypeId::of::<C>(),
                type_name: C::model_name(),
            },
        }
    }

    pub fn dynamic(property: &'static str) -> Self {
        Self {
            property,
            element: CollectionElement::Dynamic,
        }
    }

    pub fn property(&self) -> &'static str {
        self.property
    }
}

/// Runtime handle to a model type: everything the descriptor cache and the
/// dynamic tuple path need without the generic parameter.
#[derive(Clone)]
pub struct ModelInfo {
    type_id: TypeId,
    name: &'static str,
    fields: fn() -> Vec<FieldConfig>,
    collections: fn() -> Vec<CollectionConfig>,
    has_custom_population: bool,
    materialize_dyn: fn(
        &RawResultSet,
        &TypeDescriptor,
        &PopulationPlan,
        &MaterializationPolicy,
    ) -> Result<Vec<Box<dyn DynModel>>, PopulationError>,
}

impl ModelInfo {
    pub fn of<T: Model>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::model_name(),
            fields: T::field_configs,
            collections: T::collection_configs,
            has_custom_population: T::custom_population().is_some(),
            materialize_dyn: crate::populate::materialize_dyn_erased::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn fields(&self) -> Vec<FieldConfig> {
        (self.fields)()
    }

    pub(crate) fn collections(&self) -> Vec<CollectionConfig> {
        (self.collections)()
    }

    pub(crate) fn has_custom_population(&self) -> bool {
        self.has_custom_population
    }

    pub(crate) fn materialize_dyn(
        &self,
        raw: &RawResultSet,
        descriptor: &TypeDescriptor,
        plan: &PopulationPlan,
        policy: &MaterializationPolicy,
    ) -> Result<Vec<Box<dyn DynModel>>, PopulationError> {
        (self.materialize_dyn)(raw, descriptor, plan, policy)
    }
}

impl std::fmt::Debug for ModelInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInfo")
            .field("name", &self.name)
            .field("custom_population", &self.has_custom_population)
            .finish()
    }
}

/// Convert a stitched child group back into a typed vector.
///
/// Accepts both the typed form (`Vec<C>`, from a fixed-arity child set) and
/// the dynamic form (`Vec<Box<dyn DynModel>>`, from a runtime-typed child
/// set). Intended for `assign_children` implementations:
///
/// ```ignore
/// fn assign_children(&mut self, property: &str, children: Box<dyn Any + Send>)
///     -> Result<(), RelationshipError>
/// {
///     match property {
///         "orders" => {
///             self.orders = downcast_children::<Order>(property, children)?;
///             Ok(())
///         }
///         other => Err(RelationshipError::CollectionNotWritable {
///             property: other.to_string(),
///         }),
///     }
/// }
/// ```
pub fn downcast_children<C: Model>(
    property: &str,
    children: Box<dyn Any + Send>,
) -> Result<Vec<C>, RelationshipError> {
    let mismatch = || RelationshipError::ParentPropertyListIncorrectType {
        property: property.to_string(),
        expected: C::model_name().to_string(),
    };

    match children.downcast::<Vec<C>>() {
        Ok(typed) => Ok(*typed),
        Err(other) => match other.downcast::<Vec<Box<dyn DynModel>>>() {
            Ok(dyns) => dyns
                .into_iter()
                .map(|child| {
                    child
                        .into_any()
                        .downcast::<C>()
                        .map(|c| *c)
                        .map_err(|_| mismatch())
                })
                .collect(),
            Err(_) => Err(mismatch()),
        },
    }
}
