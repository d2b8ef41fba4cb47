use std::fmt;

/// Result type for forkline-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime layer
#[derive(Debug)]
pub enum Error {
    /// Session store error
    Store(forkline_store::Error),

    /// Transcript reading error
    Transcript(forkline_transcript::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Messaging surface rejected or failed an operation
    Surface(String),

    /// Renderer failed to render or upload content
    Render(String),

    /// Invalid operation or state
    InvalidOperation(String),
}

impl Error {
    pub fn surface(msg: impl Into<String>) -> Self {
        Error::Surface(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Error::Render(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "Store error: {}", err),
            Error::Transcript(err) => write!(f, "Transcript error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Surface(msg) => write!(f, "Surface error: {}", msg),
            Error::Render(msg) => write!(f, "Render error: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Transcript(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Config(_)
            | Error::Surface(_)
            | Error::Render(_)
            | Error::InvalidOperation(_) => None,
        }
    }
}

impl From<forkline_store::Error> for Error {
    fn from(err: forkline_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<forkline_transcript::Error> for Error {
    fn from(err: forkline_transcript::Error) -> Self {
        Error::Transcript(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
