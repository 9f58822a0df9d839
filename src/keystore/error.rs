use std::{error, fmt, io, path::Path};

/// The error type for the `keystore` module.
#[derive(Debug)]
pub enum Error {
    /// The derived scalar is zero or not below the group order.
    ScalarOutOfRange(String),
    /// A raw public key didn't have 64 bytes.
    PublicKeyLength(usize),
    /// A raw public key isn't a point on the curve.
    InvalidPublicKey,
    /// Encoding or decoding PEM failed.
    Pem(String),
    /// Reading or writing a keystore file failed.
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

// io::Error doesn't implement PartialEq, so compare the kinds
impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::ScalarOutOfRange(a), Error::ScalarOutOfRange(b)) => a == b,
            (Error::PublicKeyLength(a), Error::PublicKeyLength(b)) => a == b,
            (Error::InvalidPublicKey, Error::InvalidPublicKey) => true,
            (Error::Pem(a), Error::Pem(b)) => a == b,
            (
                Error::Io { path, source },
                Error::Io {
                    path: other_path,
                    source: other_source,
                },
            ) => path == other_path && source.kind() == other_source.kind(),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ScalarOutOfRange(input) => write!(
                f,
                "Scalar derived from {:?} is not a valid P-256 private key",
                input
            ),
            Error::PublicKeyLength(n) => {
                write!(f, "Public key has {} bytes instead of 64", n)
            }
            Error::InvalidPublicKey => {
                write!(f, "Public key is not a point on P-256")
            }
            Error::Pem(e) => write!(f, "PEM error: {}", e),
            Error::Io { path, source } => write!(f, "{}: {}", path, source),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
