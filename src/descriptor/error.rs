//! Descriptor-build error types.

use thiserror::Error;

/// Result type for descriptor operations.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Errors raised while building a type descriptor, before any row is read.
///
/// A failed build leaves the type absent from the registry; a later call
/// attempts the build again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Two fields map to the same column under case-insensitive comparison,
    /// possibly across the type's nested-model graph.
    #[error("model '{type_name}' maps column '{column}' more than once (case-insensitive)")]
    DuplicateColumn { type_name: String, column: String },

    /// A nested-model field transitively contains the declaring type.
    #[error("circular nested-model reference: {}", cycle.join(" -> "))]
    CircularModel { cycle: Vec<String> },

    /// A string-format rule was declared on a field that is not text.
    #[error("model '{type_name}' field '{field}' has a format rule but is not a text field")]
    FormatOnNonText { type_name: String, field: String },

    /// A declared default value of null is meaningless and rejected.
    #[error("model '{type_name}' field '{field}' declares a null default value")]
    NullDefault { type_name: String, field: String },

    /// An output-direction parameter cannot be a bulk/table type.
    #[error("model '{type_name}' field '{field}' is output-direction but has a table type")]
    OutputTableField { type_name: String, field: String },

    /// Inline collection fields are not populatable; collection properties
    /// for stitching are declared separately.
    #[error("model '{type_name}' field '{field}' is a collection type, which is not allowed")]
    CollectionField { type_name: String, field: String },
}
