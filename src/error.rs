use thiserror::Error;

/// Fatal errors raised while loading or validating an assignment run.
///
/// Every variant aborts the run: nothing downstream can be trusted once a
/// class parameter, zone or link reference fails to resolve.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid user class '{class}': {reason}")]
    InvalidUserClass { class: char, reason: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("missing required config entry '{0}'")]
    MissingEntry(String),

    #[error("link ({anode}, {bnode}) {reason}")]
    UnresolvedLink { anode: u32, bnode: u32, reason: String },

    #[error("zone {0} is not a centroid of the network")]
    UnresolvedZone(u32),

    #[error("node {0} is not in the node table")]
    UnresolvedNode(u32),

    #[error("unknown volume-delay function {vdf} on link ({anode}, {bnode})")]
    UnknownVdf { vdf: u32, anode: u32, bnode: u32 },

    #[error("bad value in {table} row {row}, column '{column}': {reason}")]
    MalformedRow { table: String, row: usize, column: String, reason: String },

    #[error("i/o error on {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("failed to parse config as yaml: {0}")]
    Yaml(#[from] yaml_rust::ScanError),
}

pub type AssignResult<T> = Result<T, ConfigurationError>;

impl ConfigurationError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> ConfigurationError {
        ConfigurationError::InvalidParameter { name: String::from(name), reason: reason.into() }
    }
}
