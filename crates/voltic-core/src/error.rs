//! Error types for the Voltic circuit simulation.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors from loading a file into a file communicator.
///
/// A failed load leaves the communicator unloaded: byte requests stay
/// pending and availability polls report end-of-stream. No failure crosses
/// the simulation boundary as a panic.
#[derive(Debug)]
pub enum FileError {
    /// The backing file could not be opened.
    Open {
        /// The path that failed to open.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "cannot open '{}': {source}", path.display())
            }
        }
    }
}

impl Error for FileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_error_display_names_path() {
        let err = FileError::Open {
            path: PathBuf::from("/no/such/file"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        let text = err.to_string();
        assert!(text.contains("/no/such/file"));
        assert!(err.source().is_some());
    }
}
