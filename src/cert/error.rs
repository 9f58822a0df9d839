use std::{error, fmt};

use crate::{cbor, keystore};

/// The error type for the `cert` module.
#[derive(Debug)]
pub enum Error {
    /// A fixed-width field had the wrong length.
    FieldLength {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    /// A certificate wasn't the pair `[tbs, signature]`.
    NotAPair(usize),
    /// Wraps errors from the `cbor` module.
    Cbor(cbor::CborError),
    /// Wraps errors from the `keystore` module.
    Keystore(keystore::Error),
    /// Wraps signing and verification errors from `p256`.
    Ecdsa(p256::ecdsa::Error),
}

impl From<cbor::CborError> for Error {
    fn from(e: cbor::CborError) -> Error {
        Error::Cbor(e)
    }
}

impl From<keystore::Error> for Error {
    fn from(e: keystore::Error) -> Error {
        Error::Keystore(e)
    }
}

impl From<p256::ecdsa::Error> for Error {
    fn from(e: p256::ecdsa::Error) -> Error {
        Error::Ecdsa(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FieldLength {
                field,
                expected,
                found,
            } => write!(
                f,
                "Certificate {} has {} bytes instead of {}",
                field, found, expected
            ),
            Error::NotAPair(n) => write!(
                f,
                "Certificate is an array of {} items instead of 2",
                n
            ),
            Error::Cbor(e) => write!(f, "{}", e),
            Error::Keystore(e) => write!(f, "{}", e),
            Error::Ecdsa(e) => write!(f, "ECDSA error: {}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Cbor(e) => Some(e),
            Error::Keystore(e) => Some(e),
            Error::Ecdsa(e) => Some(e),
            _ => None,
        }
    }
}
