use std::{error, fmt};

/// The error type for the `cbor` module.
// TODO: Derive PartialEq as soon as serde_cbor does for its error type
#[derive(Debug)]
pub enum CborError {
    /// Wraps errors from `serde_cbor`.
    SerdeCbor(serde_cbor::Error),
    /// Expected a CBOR array at this position.
    NotAnArray,
    /// Tried to inspect a CBOR array of more than 23 items.
    TooManyItems,
}

impl From<serde_cbor::Error> for CborError {
    fn from(e: serde_cbor::Error) -> CborError {
        CborError::SerdeCbor(e)
    }
}

impl fmt::Display for CborError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CborError::SerdeCbor(e) => write!(f, "CBOR error: {}", e),
            CborError::NotAnArray => write!(f, "CBOR error: expected an array"),
            CborError::TooManyItems => write!(
                f,
                "CBOR error: can't inspect an array of more than 23 items"
            ),
        }
    }
}

impl error::Error for CborError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            CborError::SerdeCbor(e) => Some(e),
            _ => None,
        }
    }
}
