//! Error types for the relationship layer
//!
//! Every failure carries a machine-checkable [`ErrorKind`] and a message that
//! names the mapper class, column, discriminator value or method involved.

use thiserror::Error;

/// Result type alias for relationship operations
pub type RelationResult<T> = Result<T, RelationshipError>;

/// Machine-checkable classification of a [`RelationshipError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidReferenceMethod,
    NoSuchReference,
    MissingColumn,
    ImmutableField,
    MissingRelated,
    MapperNotFound,
    RelationshipExists,
    ThroughNotFetched,
    Configuration,
    Query,
    Manifest,
    Io,
}

/// Error types for relationship configuration, stitching and persistence
#[derive(Debug, Error)]
pub enum RelationshipError {
    #[error("Method '{method}' is invalid for a reference relationship")]
    InvalidReferenceMethod { method: String },

    #[error("No reference relationship on {native_mapper} for value '{value}'")]
    NoSuchReference { native_mapper: String, value: String },

    #[error("Column '{column}' does not exist on {mapper}")]
    MissingColumn { mapper: String, column: String },

    #[error("Column '{column}' on {mapper} is immutable once set")]
    ImmutableField { mapper: String, column: String },

    #[error("Related '{name}' does not exist on {mapper}")]
    MissingRelated { mapper: String, name: String },

    #[error("Mapper '{mapper}' is not registered")]
    MapperNotFound { mapper: String },

    #[error("Relationship '{name}' already exists on {mapper}")]
    RelationshipExists { mapper: String, name: String },

    #[error("Relationship '{name}' on {mapper} needs '{through}' to be fetched first")]
    ThroughNotFetched {
        mapper: String,
        name: String,
        through: String,
    },

    #[error("Invalid relationship configuration: {0}")]
    Configuration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Manifest parsing error: {0}")]
    Manifest(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelationshipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReferenceMethod { .. } => ErrorKind::InvalidReferenceMethod,
            Self::NoSuchReference { .. } => ErrorKind::NoSuchReference,
            Self::MissingColumn { .. } => ErrorKind::MissingColumn,
            Self::ImmutableField { .. } => ErrorKind::ImmutableField,
            Self::MissingRelated { .. } => ErrorKind::MissingRelated,
            Self::MapperNotFound { .. } => ErrorKind::MapperNotFound,
            Self::RelationshipExists { .. } => ErrorKind::RelationshipExists,
            Self::ThroughNotFetched { .. } => ErrorKind::ThroughNotFetched,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Query(_) => ErrorKind::Query,
            Self::Manifest(_) => ErrorKind::Manifest,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid_reference_method(method: &str) -> Self {
        Self::InvalidReferenceMethod {
            method: method.to_string(),
        }
    }

    pub(crate) fn no_such_reference(native_mapper: &str, value: Option<&str>) -> Self {
        Self::NoSuchReference {
            native_mapper: native_mapper.to_string(),
            value: value.unwrap_or("NULL").to_string(),
        }
    }

    pub(crate) fn missing_column(mapper: &str, column: &str) -> Self {
        Self::MissingColumn {
            mapper: mapper.to_string(),
            column: column.to_string(),
        }
    }

    pub(crate) fn missing_related(mapper: &str, name: &str) -> Self {
        Self::MissingRelated {
            mapper: mapper.to_string(),
            name: name.to_string(),
        }
    }
}
