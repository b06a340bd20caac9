use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The persisted model is truncated, inconsistent or not a model at all.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid parameter {name}={value}")]
    InvalidParameter { name: String, value: String },

    #[error("unknown tag: {0}")]
    UnknownTag(String),

    #[error("length mismatch: {words} words but {tags} tags")]
    LengthMismatch { words: usize, tags: usize },

    #[error("empty dataset")]
    EmptyDataset,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    BsonSer(#[from] bson::ser::Error),

    #[error(transparent)]
    BsonDe(#[from] bson::de::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_model(msg: impl Into<String>) -> Self {
        Self::InvalidModel(msg.into())
    }

    pub fn invalid_parameter(name: &str, value: &str) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
