use std::{error, fmt, io, path::Path};

/// The error type for the `build` module.
#[derive(Debug)]
pub enum Error {
    /// A trust model, trust choice or application isn't in the firmware tree.
    UnknownChoice {
        kind: &'static str,
        value: String,
        valid: Vec<String>,
    },
    /// The `build_number` file doesn't hold an integer.
    InvalidBuildNumber(String),
    /// `make` couldn't be started.
    Spawn { command: String, source: io::Error },
    /// `make` exited with a failure.
    Make {
        command: String,
        status: String,
        log: String,
        stderr: String,
    },
    /// Reading, writing or moving a file failed.
    Io { path: String, source: io::Error },
}

impl Error {
    pub(crate) fn io(path: &Path, source: io::Error) -> Error {
        Error::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnknownChoice { kind, value, valid } => write!(
                f,
                "Unknown {} {:?}, expected one of: {}",
                kind,
                value,
                valid.join(", ")
            ),
            Error::InvalidBuildNumber(content) => {
                write!(f, "Build number {:?} is not an integer", content)
            }
            Error::Spawn { command, source } => {
                write!(f, "Can't run {}: {}", command, source)
            }
            Error::Make {
                command,
                status,
                log,
                stderr,
            } => write!(
                f,
                "{} failed with {} (log in {}):\n{}",
                command, status, log, stderr
            ),
            Error::Io { path, source } => write!(f, "{}: {}", path, source),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Spawn { source, .. } => Some(source),
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
