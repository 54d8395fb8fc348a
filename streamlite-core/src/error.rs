use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamLiteError {
    #[error("invalid column spec `{spec}`: {reason}")]
    InvalidColumnSpec { spec: String, reason: &'static str },

    #[error("invalid consume options: {0}")]
    InvalidOption(#[from] clap::Error),

    #[error("end offset {end} must be greater than or equal to start offset {start}")]
    CrossingOffsets { start: u32, end: u32 },

    #[error("value {value} out of range for {ty}")]
    OutOfRange { value: String, ty: &'static str },

    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timestamp error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("{0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, StreamLiteError>;
