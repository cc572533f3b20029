use std::fmt;
use std::sync::PoisonError;

pub type Result<T> = std::result::Result<T, Error>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Process-level error: a human readable message plus the error that caused it.
#[derive(thiserror::Error)]
#[error("{msg}")]
pub struct Error {
    msg: String,
    #[source]
    source: Option<BoxedSource>,
}

impl Error {
    pub fn new(msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
            source: None,
        }
    }

    pub fn with_source(msg: &str, source: BoxedSource) -> Self {
        Self {
            msg: msg.to_string(),
            source: Some(source),
        }
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.msg, source),
            None => write!(f, "{}", self.msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source("I/O error", Box::new(err))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::with_source("Configuration error", Box::new(err))
    }
}

impl From<log::SetLoggerError> for Error {
    fn from(err: log::SetLoggerError) -> Self {
        Error::with_source("Failed to install logger", Box::new(err))
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::new(&format!("Configuration lock poisoned: {}", err))
    }
}
