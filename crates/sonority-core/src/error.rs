use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing required feature: {feature}")]
    MissingFeature { feature: &'static str },

    #[error("feature {feature} must be a finite number, got {value}")]
    InvalidFeature { feature: &'static str, value: f64 },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
