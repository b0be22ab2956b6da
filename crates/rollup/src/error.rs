use thiserror::Error;

/// Run-level failures. Any of these aborts the corpus run.
#[derive(Debug, Error)]
pub enum RollupError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty input dir, bad output extension, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// The corpus contained no documents at all.
    #[error("no input documents found")]
    NoDocuments,
}

/// Failures local to one document. The pipeline logs them and skips the
/// document; the rest of the corpus is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// A required node (Object, Estimate, EstimatePrice, Summary) is absent.
    #[error("node <{0}> not found")]
    MissingNode(&'static str),
    /// The document is not well-formed XML.
    #[error("malformed document: {0}")]
    Parse(String),
    /// The file could not be read.
    #[error("cannot read document: {0}")]
    Read(String),
}
