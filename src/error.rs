use thiserror::Error;

/// Rejected matching configuration. Fatal before any record is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
}

/// A ground-truth pair that does not satisfy its construction invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{side} record has no normalized LCCN")]
    MissingLccn { side: &'static str },

    #[error("LCCN mismatch: catalog `{catalog}` vs reference `{reference}`")]
    LccnMismatch { catalog: String, reference: String },

    #[error("unknown match type: {0}")]
    UnknownMatchType(String),
}

#[derive(Debug, Error)]
pub enum BatchStoreError {
    #[error("batch {batch_id}: I/O error: {source}")]
    Io {
        batch_id: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("batch {batch_id}, record {line}: encode error: {source}")]
    Encode {
        batch_id: usize,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("batch {batch_id}, line {line}: decode error: {source}")]
    Decode {
        batch_id: usize,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("batch {0} not found")]
    Missing(usize),
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    BatchStore(#[from] BatchStoreError),
}

pub type Result<T> = std::result::Result<T, MatchError>;
