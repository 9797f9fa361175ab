use thiserror::Error;

/// The materializer's only hard failure: the flat rows disagree with the
/// plan they were supposedly produced for.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MaterializeError {
    #[error("Rows are missing required column `{column}` for alias `{alias}`")]
    MissingColumn { alias: String, column: String },
}
