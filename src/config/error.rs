use std::{error, fmt, io};

use crate::{identity, oscore};

/// The error type for the `config` module.
#[derive(Debug)]
pub enum Error {
    /// The configuration file couldn't be read.
    Io { path: String, source: io::Error },
    /// The configuration file isn't valid TOML or misses fields.
    Toml(toml::de::Error),
    /// A hex field couldn't be decoded.
    InvalidHex(&'static str),
    /// Wraps errors from the `identity` module.
    Identity(identity::Error),
    /// Wraps errors from the `oscore` module.
    Oscore(oscore::Error),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Error {
        Error::Toml(e)
    }
}

impl From<identity::Error> for Error {
    fn from(e: identity::Error) -> Error {
        Error::Identity(e)
    }
}

impl From<oscore::Error> for Error {
    fn from(e: oscore::Error) -> Error {
        Error::Oscore(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io { path, source } => {
                write!(f, "Can't read configuration {}: {}", path, source)
            }
            Error::Toml(e) => write!(f, "Invalid configuration: {}", e),
            Error::InvalidHex(field) => {
                write!(f, "Configuration field {} is not valid hex", field)
            }
            Error::Identity(e) => write!(f, "{}", e),
            Error::Oscore(e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Toml(e) => Some(e),
            Error::Identity(e) => Some(e),
            Error::Oscore(e) => Some(e),
            Error::InvalidHex(_) => None,
        }
    }
}
