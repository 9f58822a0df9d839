use std::{error, fmt, io, path::Path};

use crate::{cbor, keystore};

/// The catch-all error type for this module, mostly just wrapping errors from
/// various libraries.
#[derive(Debug)]
pub enum Error {
    /// The master salt doesn't have the expected length.
    SaltLength(usize),
    /// A context directory exists already, so two devices share an id.
    ContextExists { hostname: String, path: String },
    /// A field of a `secret.json` couldn't be decoded.
    InvalidField(&'static str),
    /// The two ends of a pair don't agree.
    Mismatch(&'static str),
    /// Wraps errors from the `cbor` module.
    Cbor(cbor::CborError),
    /// Wraps errors from `hkdf`.
    Hkdf(hkdf::InvalidLength),
    /// Error in `ccm`.
    Aead,
    /// Wraps errors from the `keystore` module.
    Keystore(keystore::Error),
    /// Wraps errors from `serde_json`.
    Json(serde_json::Error),
    /// Reading or writing a file failed.
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

impl From<cbor::CborError> for Error {
    fn from(e: cbor::CborError) -> Error {
        Error::Cbor(e)
    }
}

impl From<hkdf::InvalidLength> for Error {
    fn from(e: hkdf::InvalidLength) -> Error {
        Error::Hkdf(e)
    }
}

impl From<ccm::aead::Error> for Error {
    fn from(_: ccm::aead::Error) -> Error {
        Error::Aead
    }
}

impl From<keystore::Error> for Error {
    fn from(e: keystore::Error) -> Error {
        Error::Keystore(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Json(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SaltLength(n) => {
                write!(f, "Master salt has {} bytes instead of 16", n)
            }
            Error::ContextExists { hostname, path } => write!(
                f,
                "Context directory {} for {} exists already",
                path, hostname
            ),
            Error::InvalidField(field) => {
                write!(f, "Invalid value for {} in context", field)
            }
            Error::Mismatch(what) => {
                write!(f, "Both ends of a context disagree on the {}", what)
            }
            Error::Cbor(e) => write!(f, "{}", e),
            Error::Hkdf(e) => write!(f, "{}", e),
            Error::Aead => write!(f, "Error using AEAD"),
            Error::Keystore(e) => write!(f, "{}", e),
            Error::Json(e) => write!(f, "{}", e),
            Error::Io { path, source } => write!(f, "{}: {}", path, source),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Cbor(e) => Some(e),
            Error::Keystore(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
