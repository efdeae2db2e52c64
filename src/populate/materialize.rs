//! Row materialization: plans + rows -> typed instances.

use tracing::trace;

use super::plan::PopulationPlan;
use super::{MaterializationPolicy, PopulationError, PopulationResult};
use crate::descriptor::{PopulationMode, TypeDescriptor};
use crate::model::{DynModel, Model, Populate};
use crate::row::{ColumnIndex, RawResultSet, RowView};
use crate::value::Value;

/// Below this row count the parallel strategy falls back to sequential; the
/// per-thread cost outweighs the work.
const PARALLEL_MIN_ROWS: usize = 32;

/// Ordered list of instances of one type, scoped to one materialize call.
#[derive(Debug, Clone)]
pub struct MaterializedSet<T> {
    items: Vec<T>,
    source_table: Option<String>,
}

impl<T> MaterializedSet<T> {
    pub fn new(items: Vec<T>, source_table: Option<String>) -> Self {
        Self {
            items,
            source_table,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Source table reported by the execution layer, when known.
    pub fn source_table(&self) -> Option<&str> {
        self.source_table.as_deref()
    }
}

impl<T> IntoIterator for MaterializedSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Materialize every row of `raw` into instances of `T`.
///
/// The population mode was decided once at descriptor-build time: either the
/// compiled plan drives accessor-indexed assignment (including nested-model
/// fields over the same row), or the type's custom population function is
/// invoked per row. Either way an error aborts the whole call.
pub fn materialize<T: Model>(
    raw: &RawResultSet,
    descriptor: &TypeDescriptor,
    plan: &PopulationPlan,
    policy: &MaterializationPolicy,
) -> PopulationResult<MaterializedSet<T>> {
    trace!(
        model = descriptor.type_name(),
        rows = raw.row_count(),
        parallel = policy.parallel,
        "materializing result set"
    );

    let items = match descriptor.population_mode() {
        PopulationMode::Custom => {
            let custom =
                T::custom_population().ok_or_else(|| PopulationError::Custom {
                    type_name: descriptor.type_name().to_string(),
                    message: "descriptor marked custom but the type supplies no function".into(),
                })?;
            run_rows(raw, policy, |row, index| custom(&RowView::new(row, index)))
        }
        PopulationMode::Planned => run_rows(raw, policy, |row, _| {
            let mut instance = T::default();
            populate_into(&mut instance, row, plan, policy.backfill_defaults)?;
            Ok(instance)
        }),
    }?;

    Ok(MaterializedSet::new(items, raw.source_table.clone()))
}

/// Runtime-typed materialization for the dynamic tuple path.
pub fn materialize_dyn<T: Model>(
    raw: &RawResultSet,
    descriptor: &TypeDescriptor,
    plan: &PopulationPlan,
    policy: &MaterializationPolicy,
) -> PopulationResult<Vec<Box<dyn DynModel>>> {
    Ok(materialize::<T>(raw, descriptor, plan, policy)?
        .into_items()
        .into_iter()
        .map(|item| Box::new(item) as Box<dyn DynModel>)
        .collect())
}

/// Fn-pointer form of [`materialize_dyn`], stored in `ModelInfo`.
pub(crate) fn materialize_dyn_erased<T: Model>(
    raw: &RawResultSet,
    descriptor: &TypeDescriptor,
    plan: &PopulationPlan,
    policy: &MaterializationPolicy,
) -> PopulationResult<Vec<Box<dyn DynModel>>> {
    materialize_dyn::<T>(raw, descriptor, plan, policy)
}

/// Drive one instance's population from one row: mapped columns first, then
/// nested models over the same row, then default back-fill.
fn populate_into(
    target: &mut dyn Populate,
    row: &[Value],
    plan: &PopulationPlan,
    backfill: bool,
) -> PopulationResult<()> {
    for slot in plan.slots() {
        let value = &row[slot.column];

        if value.is_null() && !slot.nullable {
            return Err(PopulationError::NotNullable {
                field: slot.field_name.to_string(),
            });
        }

        if let (Some(pattern), Value::Text(text)) = (&slot.read_format, value) {
            let formatted = Value::Text(pattern.replace("{0}", text));
            target.assign(slot.accessor, &formatted)?;
            continue;
        }

        if !value.conforms_to(slot.tag) {
            return Err(PopulationError::mismatch(
                slot.field_name,
                slot.tag.name(),
                value,
            ));
        }
        target.assign(slot.accessor, value)?;
    }

    for nested in plan.nested() {
        if let Some(child) = target.nested_mut(nested.accessor) {
            populate_into(child, row, &nested.plan, backfill)?;
        }
    }

    if backfill {
        for (accessor, value) in plan.absent_defaults() {
            target.assign(*accessor, value)?;
        }
    }

    Ok(())
}

/// Run `f` over every row, sequentially or across a bounded worker pool.
///
/// The parallel strategy splits rows into contiguous chunks, one scoped
/// thread per worker; chunk outputs concatenate in chunk order, so the output
/// list always matches input row order regardless of completion order.
fn run_rows<T, F>(
    raw: &RawResultSet,
    policy: &MaterializationPolicy,
    f: F,
) -> PopulationResult<Vec<T>>
where
    T: Send,
    F: Fn(&[Value], &ColumnIndex) -> PopulationResult<T> + Sync,
{
    let index = raw.column_index();

    let workers = policy.worker_count.min(raw.rows.len()).max(1);
    if !policy.parallel || workers == 1 || raw.rows.len() < PARALLEL_MIN_ROWS {
        return raw.rows.iter().map(|row| f(row, &index)).collect();
    }

    let chunk_size = raw.rows.len().div_ceil(workers);
    let chunk_results: Vec<PopulationResult<Vec<T>>> = std::thread::scope(|scope| {
        let index = &index;
        let f = &f;
        let handles: Vec<_> = raw
            .rows
            .chunks(chunk_size)
            .map(|rows| {
                scope.spawn(move || {
                    rows.iter()
                        .map(|row| f(row, index))
                        .collect::<PopulationResult<Vec<T>>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or(Err(PopulationError::WorkerPanicked))
            })
            .collect()
    });

    let mut items = Vec::with_capacity(raw.rows.len());
    for chunk in chunk_results {
        items.extend(chunk?);
    }
    Ok(items)
}
