use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Missing source: {0}")]
    MissingSource(String),

    #[error("Data format error: {0}")]
    DataFormat(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
