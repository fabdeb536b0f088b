use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("key not found")]
    NotFound,
    #[error("value is not an integer")]
    NotAnInteger,
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors from the runtime configuration surface (CONFIG GET/SET).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown config parameter '{0}'")]
    UnknownParameter(String),
    #[error("config parameter '{0}' is read-only")]
    ReadOnly(&'static str),
    #[error("invalid value '{value}' for config parameter '{param}'")]
    InvalidValue { param: &'static str, value: String },
}
