use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown section: {0}")]
    UnknownSection(String),

    #[error("unknown field `{field}` in section {section}")]
    UnknownField { section: String, field: String },

    #[error("field `{field}` expects a {expected} value")]
    FieldKindMismatch { field: String, expected: &'static str },

    #[error("asset reference cannot move from remote back to local: {0}")]
    AssetDemotion(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
