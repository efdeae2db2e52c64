//! Population plan compilation.

use std::collections::HashSet;

use crate::descriptor::{ConfigResult, DescriptorRegistry, TypeDescriptor};
use crate::model::FieldKind;
use crate::value::{TypeTag, Value};

/// One mapped column position of a plan.
#[derive(Debug, Clone)]
pub struct PlanSlot {
    /// Column position in the result set.
    pub column: usize,
    /// Precomputed accessor index of the target field.
    pub accessor: usize,
    /// Target field name, for error messages.
    pub field_name: &'static str,
    /// Declared tag of the target field.
    pub tag: TypeTag,
    pub nullable: bool,
    /// Read-side format rule, `{0}` being the raw text.
    pub read_format: Option<String>,
}

/// Plan for one nested-model field, compiled against the same column list as
/// its parent so nested objects populate from the same row in one pass.
#[derive(Debug, Clone)]
pub struct NestedPlan {
    /// Accessor of the nested field on the parent.
    pub accessor: usize,
    pub plan: PopulationPlan,
}

/// Compiled alignment between one query shape's columns and a descriptor.
#[derive(Debug, Clone, Default)]
pub struct PopulationPlan {
    slots: Vec<PlanSlot>,
    nested: Vec<NestedPlan>,
    absent_defaults: Vec<(usize, Value)>,
}

impl PopulationPlan {
    /// Compile a plan for `column_names` against `descriptor`.
    ///
    /// Pure and deterministic for a given column list. Columns with no
    /// case-insensitive field match stay unmapped. Nested-model fields get
    /// their own plans over the same columns, recursively; `registry` is the
    /// provider registry descriptors were ensured in (nested descriptors are
    /// built leaf-first, so this only performs lookups in practice).
    pub fn compile(
        column_names: &[String],
        descriptor: &TypeDescriptor,
        registry: &DescriptorRegistry,
    ) -> ConfigResult<Self> {
        let mut slots = Vec::new();
        for (position, name) in column_names.iter().enumerate() {
            let Some(field) = descriptor.resolve_column(name) else {
                continue;
            };
            if let FieldKind::Scalar(tag) = field.kind() {
                slots.push(PlanSlot {
                    column: position,
                    accessor: field.accessor(),
                    field_name: field.name(),
                    tag: *tag,
                    nullable: field.is_nullable(),
                    read_format: field.read_format().map(str::to_string),
                });
            }
        }

        let mut nested = Vec::new();
        for accessor in descriptor.nested_accessors() {
            let Some(field) = descriptor.field(*accessor) else {
                continue;
            };
            let Some(info) = field.nested_info() else {
                continue;
            };
            let nested_descriptor = registry.ensure_info(info)?;
            nested.push(NestedPlan {
                accessor: *accessor,
                plan: Self::compile(column_names, &nested_descriptor, registry)?,
            });
        }

        // Fields whose declared default applies because their column is
        // absent from this particular shape; computed once per shape.
        let present: HashSet<String> = column_names.iter().map(|c| c.to_lowercase()).collect();
        let absent_defaults = descriptor
            .fields()
            .iter()
            .filter(|f| !f.is_ignored())
            .filter(|f| matches!(f.kind(), FieldKind::Scalar(_)))
            .filter(|f| !present.contains(&f.column().to_lowercase()))
            .filter_map(|f| f.default_value().map(|v| (f.accessor(), v.clone())))
            .collect();

        Ok(Self {
            slots,
            nested,
            absent_defaults,
        })
    }

    /// Mapped column slots, in column order.
    pub fn slots(&self) -> &[PlanSlot] {
        &self.slots
    }

    pub fn nested(&self) -> &[NestedPlan] {
        &self.nested
    }

    /// (accessor, default) pairs to back-fill when the policy asks for it.
    pub fn absent_defaults(&self) -> &[(usize, Value)] {
        &self.absent_defaults
    }

    /// Whether any column of the shape mapped to a field, at any depth.
    pub fn maps_anything(&self) -> bool {
        !self.slots.is_empty() || self.nested.iter().any(|n| n.plan.maps_anything())
    }
}
