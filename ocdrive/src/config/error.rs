use std::path::PathBuf;

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a valid ocdrive config: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    /// A numeric environment override did not parse
    #[error("{var}={value:?} is not a whole number of seconds")]
    BadSeconds { var: &'static str, value: String },
    /// Every problem found by validation, in field order
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
