use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum RSPMError {
    /// Values that cannot be used as given, such as missing data that has not been
    /// allowed by configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Arrays that should share a shape (or a leading axis) do not
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    /// A collaborator was used before it was fully configured
    #[error("{0} has not been configured")]
    NotConfigured(String),
    #[error("Unknown {kind} method: {name}")]
    UnknownMethod { kind: String, name: String },
    /// A combination of options that is not supported
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Could not parse configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl RSPMError {
    pub fn unknown_method(kind: &str, name: &str) -> Self {
        RSPMError::UnknownMethod {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

/// Convenience type for `Result<T, RSPMError>`.
pub type RSPMResult<T> = Result<T, RSPMError>;
