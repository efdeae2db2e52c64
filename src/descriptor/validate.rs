//! Nested-model graph discovery and descriptor validation.
//!
//! Validation runs once per type, at build time. The nested-field graph is
//! walked with petgraph: a topological sort yields the leaf-first build order
//! (a parent is never built before its children) and detects field-graph
//! cycles in the same pass.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use super::error::{ConfigResult, ConfigurationError};
use crate::model::{FieldConfig, FieldKind, ModelInfo, ParamDirection};
use crate::value::{TypeTag, Value};

/// Walk the nested-model graph reachable from `root` and return the build
/// order, leaf types first.
///
/// Fails with [`ConfigurationError::CircularModel`] when any field's type
/// transitively contains the declaring type.
pub(crate) fn discover_build_order(root: &ModelInfo) -> ConfigResult<Vec<ModelInfo>> {
    let mut graph: DiGraphMap<TypeId, ()> = DiGraphMap::new();
    let mut infos: HashMap<TypeId, ModelInfo> = HashMap::new();
    let mut pending = vec![root.clone()];

    while let Some(info) = pending.pop() {
        if infos.contains_key(&info.type_id()) {
            continue;
        }
        graph.add_node(info.type_id());
        for field in info.fields() {
            if let FieldKind::Nested(nested) = &field.kind {
                graph.add_edge(info.type_id(), nested.type_id(), ());
                if !infos.contains_key(&nested.type_id()) {
                    pending.push(nested.clone());
                }
            }
        }
        infos.insert(info.type_id(), info);
    }

    match toposort(&graph, None) {
        Ok(order) => {
            // toposort puts parents before the types they nest; build order
            // is the reverse.
            let mut build_order: Vec<ModelInfo> = order
                .into_iter()
                .map(|id| infos[&id].clone())
                .collect();
            build_order.reverse();
            Ok(build_order)
        }
        Err(_) => Err(ConfigurationError::CircularModel {
            cycle: find_cycle(&graph, &infos, root.type_id()),
        }),
    }
}

/// Reconstruct one cycle path for the error message, by DFS with the ancestor
/// stack.
fn find_cycle(
    graph: &DiGraphMap<TypeId, ()>,
    infos: &HashMap<TypeId, ModelInfo>,
    start: TypeId,
) -> Vec<String> {
    fn visit(
        graph: &DiGraphMap<TypeId, ()>,
        node: TypeId,
        stack: &mut Vec<TypeId>,
        done: &mut HashSet<TypeId>,
    ) -> Option<Vec<TypeId>> {
        if let Some(pos) = stack.iter().position(|id| *id == node) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(node);
            return Some(cycle);
        }
        if !done.insert(node) {
            return None;
        }
        stack.push(node);
        for next in graph.neighbors(node) {
            if let Some(cycle) = visit(graph, next, stack, done) {
                return Some(cycle);
            }
        }
        stack.pop();
        None
    }

    let mut stack = Vec::new();
    let mut done = HashSet::new();
    let ids = visit(graph, start, &mut stack, &mut done).unwrap_or_default();
    ids.iter()
        .map(|id| infos.get(id).map_or("<unknown>", ModelInfo::name).to_string())
        .collect()
}

/// Per-field configuration checks for one type.
pub(crate) fn validate_fields(info: &ModelInfo, fields: &[FieldConfig]) -> ConfigResult<()> {
    for field in fields {
        if field.ignore {
            continue;
        }

        let err = |make: fn(String, String) -> ConfigurationError| {
            Err(make(info.name().to_string(), field.name.to_string()))
        };

        match &field.kind {
            FieldKind::Scalar(tag) => {
                if (field.read_format.is_some() || field.write_format.is_some())
                    && *tag != TypeTag::Text
                {
                    return err(|type_name, field| ConfigurationError::FormatOnNonText {
                        type_name,
                        field,
                    });
                }
            }
            FieldKind::Nested(_) => {}
            FieldKind::Table => {
                if field.direction == ParamDirection::Output {
                    return err(|type_name, field| ConfigurationError::OutputTableField {
                        type_name,
                        field,
                    });
                }
            }
            FieldKind::Collection => {
                return err(|type_name, field| ConfigurationError::CollectionField {
                    type_name,
                    field,
                });
            }
        }

        if field.default == Some(Value::Null) {
            return err(|type_name, field| ConfigurationError::NullDefault { type_name, field });
        }
    }
    Ok(())
}

/// Columns a type contributes to a row mapping: its own non-ignored mapped
/// columns plus, transitively, those of its nested models. Lowercased.
///
/// `contributed` must already hold the entry for every nested type (callers
/// build leaf-first), keyed by `TypeId`.
pub(crate) fn contributed_columns(
    info: &ModelInfo,
    fields: &[FieldConfig],
    contributed: &HashMap<TypeId, Vec<String>>,
) -> ConfigResult<Vec<String>> {
    let mut columns: Vec<String> = Vec::new();

    for field in fields {
        if field.ignore {
            continue;
        }
        match &field.kind {
            FieldKind::Nested(nested) => {
                if let Some(nested_columns) = contributed.get(&nested.type_id()) {
                    columns.extend(nested_columns.iter().cloned());
                }
            }
            FieldKind::Scalar(_) => {
                columns.push(field.effective_column().to_lowercase());
            }
            // Table fields are parameter-only and never mapped from columns.
            FieldKind::Table | FieldKind::Collection => {}
        }
    }

    let mut seen = HashSet::with_capacity(columns.len());
    for column in &columns {
        if !seen.insert(column.as_str()) {
            return Err(ConfigurationError::DuplicateColumn {
                type_name: info.name().to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(columns)
}
