use std::fmt;

/// Typed error for ghost artifact I/O.
#[derive(Debug)]
pub enum GhostError {
    /// Attempted to save a recorder with no replay metadata attached.
    MissingMeta,
    /// The artifact is not a ghost file, or is from an unknown version.
    BadFormat(String),
    /// I/O error (file creation, writes, reads).
    Io(std::io::Error),
}

impl fmt::Display for GhostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMeta => write!(f, "replay metadata was never attached"),
            Self::BadFormat(msg) => write!(f, "bad ghost file: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for GhostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GhostError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
