//! Raw tabular input from the query-execution layer.
//!
//! A `RawResultSet` is the hand-off point between the excluded execution
//! collaborator (connections, commands, drivers) and this crate: ordered rows
//! of ordered column values, plus the column names and type tags describing
//! them. It is immutable and consumed once per materialize call.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderError;
use crate::value::{TypeTag, Value};

/// One result set as read by a provider.
///
/// Deserialization funnels through [`RawResultSet::new`], so a serialized set
/// with ragged rows is rejected at intake rather than at row access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawResultSetWire")]
pub struct RawResultSet {
    /// Ordered column names, as reported by the driver.
    pub column_names: Vec<String>,
    /// Type tag per column, positionally aligned with `column_names`.
    pub column_types: Vec<TypeTag>,
    /// Ordered rows; each row is positionally aligned with `column_names`.
    pub rows: Vec<Vec<Value>>,
    /// Source table, when the execution layer knows it.
    pub source_table: Option<String>,
}

impl RawResultSet {
    /// Build a result set, validating that every row has one value per column.
    pub fn new(
        column_names: Vec<String>,
        column_types: Vec<TypeTag>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, ProviderError> {
        let width = column_names.len();
        if column_types.len() != width {
            return Err(ProviderError::MalformedResultSet {
                detail: format!(
                    "{} column names but {} type tags",
                    width,
                    column_types.len()
                ),
            });
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(ProviderError::MalformedResultSet {
                    detail: format!("row {idx} has {} values, expected {width}", row.len()),
                });
            }
        }
        Ok(Self {
            column_names,
            column_types,
            rows,
            source_table: None,
        })
    }

    /// Attach the source-table name reported by the execution layer.
    pub fn with_source_table(mut self, table: impl Into<String>) -> Self {
        self.source_table = Some(table.into());
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_names.len()
    }

    /// Case-insensitive column-name -> position map.
    pub fn column_index(&self) -> ColumnIndex {
        ColumnIndex::new(&self.column_names)
    }
}

/// Unvalidated wire shape; [`RawResultSet`] deserializes through it.
#[derive(Deserialize)]
struct RawResultSetWire {
    column_names: Vec<String>,
    column_types: Vec<TypeTag>,
    rows: Vec<Vec<Value>>,
    #[serde(default)]
    source_table: Option<String>,
}

impl TryFrom<RawResultSetWire> for RawResultSet {
    type Error = ProviderError;

    fn try_from(wire: RawResultSetWire) -> Result<Self, Self::Error> {
        let mut set = Self::new(wire.column_names, wire.column_types, wire.rows)?;
        set.source_table = wire.source_table;
        Ok(set)
    }
}

/// Case-insensitive lookup from column name to column position.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    by_name: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn new(column_names: &[String]) -> Self {
        let mut by_name = HashMap::with_capacity(column_names.len());
        for (idx, name) in column_names.iter().enumerate() {
            // First occurrence wins for duplicated driver columns.
            by_name.entry(name.to_lowercase()).or_insert(idx);
        }
        Self { by_name }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.by_name.get(&column.to_lowercase()).copied()
    }
}

/// One row plus its column index, the input to custom population functions.
pub struct RowView<'a> {
    row: &'a [Value],
    index: &'a ColumnIndex,
}

impl<'a> RowView<'a> {
    pub fn new(row: &'a [Value], index: &'a ColumnIndex) -> Self {
        Self { row, index }
    }

    /// Value for a column by case-insensitive name.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.index.position(column).and_then(|idx| self.row.get(idx))
    }

    /// Value by column position.
    pub fn get_at(&self, idx: usize) -> Option<&'a Value> {
        self.row.get(idx)
    }

    pub fn len(&self) -> usize {
        self.row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row.is_empty()
    }
}
