use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigValidationError {
    #[error("Missing required probe configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid {field}: {details}")]
    Invalid { field: &'static str, details: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConfigValidationError {
    pub fn invalid(field: &'static str, details: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            details: details.into(),
        }
    }

    pub fn config(details: impl Into<String>) -> Self {
        Self::Config(details.into())
    }
}

impl From<ConfigValidationError> for config::ConfigError {
    fn from(err: ConfigValidationError) -> Self {
        config::ConfigError::Message(err.to_string())
    }
}
