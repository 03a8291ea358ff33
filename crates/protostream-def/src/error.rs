/// Errors raised while building or loading a definition registry.
///
/// All of these are construction-time failures: once a [`crate::Registry`]
/// exists, lookups against it cannot fail because of schema inconsistency.
#[derive(Debug, thiserror::Error)]
pub enum DefError {
    /// A message, group or enum field names a type that is not in the registry.
    #[error("{message}.{field}: unresolved type reference {type_name}")]
    UnresolvedTypeReference {
        message: String,
        field: String,
        type_name: String,
    },

    /// Two definitions share a qualified name.
    #[error("duplicate type name {0}")]
    DuplicateTypeName(String),

    /// Two fields of one message share a number.
    #[error("{message}: duplicate field number {number}")]
    DuplicateFieldNumber { message: String, number: u32 },

    /// Two fields of one message share a name.
    #[error("{message}: duplicate field name {name}")]
    DuplicateFieldName { message: String, name: String },

    /// A field number outside 1..=2^29-1.
    #[error("{message}: invalid field number {number}")]
    InvalidFieldNumber { message: String, number: u32 },

    /// `packed` on a field that is not a repeated numeric scalar.
    #[error("{message}.{field}: only repeated scalar numeric fields can be packed")]
    InvalidPacked { message: String, field: String },

    /// A message, group or enum field without a type name.
    #[error("{message}.{field}: missing type name")]
    MissingTypeName { message: String, field: String },

    /// A scalar field carrying a type name.
    #[error("{message}.{field}: scalar fields do not take a type name")]
    UnexpectedTypeName { message: String, field: String },

    /// The schema document could not be read.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// The schema document is not valid JSON or does not match the layout.
    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),

    /// A field declares a value type name that does not exist.
    #[error("unknown value type {0}")]
    UnknownValueType(String),

    /// A field declares a cardinality label that does not exist.
    #[error("unknown field label {0}")]
    UnknownCardinality(String),
}

pub type Result<T> = std::result::Result<T, DefError>;
