use std::{error, fmt, io, path::Path};

/// The error type for the `deploy` module.
#[derive(Debug)]
pub enum Error {
    /// `ssh`, `scp` or `rsync` couldn't be started.
    Spawn { command: String, source: io::Error },
    /// A remote command exited with a failure.
    Command {
        command: String,
        status: String,
        stderr: String,
    },
    /// A local file to upload is missing or couldn't be copied.
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
            Error::Spawn { command, source } => {
                write!(f, "Can't run {}: {}", command, source)
            }
            Error::Command {
                command,
                status,
                stderr,
            } => write!(f, "{} failed with {}:\n{}", command, status, stderr),
            Error::Io { path, source } => write!(f, "{}: {}", path, source),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Spawn { source, .. } => Some(source),
            Error::Io { source, .. } => Some(source),
            Error::Command { .. } => None,
        }
    }
}
