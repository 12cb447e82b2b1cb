use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum TripToolsError {
    Read {
        path: PathBuf,
        source: io::Error,
    },
    Parse {
        path: PathBuf,
        source: quick_xml::Error,
    },
    MissingRoot {
        path: PathBuf,
    },
    Write {
        path: PathBuf,
        source: io::Error,
    },
}

impl std::fmt::Display for TripToolsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "Cannot read '{}': {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "Failed to parse '{}': {source}", path.display())
            }
            Self::MissingRoot { path } => {
                write!(f, "No GPX 1.1 root element in '{}'", path.display())
            }
            Self::Write { path, source } => {
                write!(f, "Cannot write '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for TripToolsError {}

impl TripToolsError {
    /// True for failures that mean the input file itself was unusable,
    /// as opposed to filesystem trouble.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::MissingRoot { .. })
    }
}
