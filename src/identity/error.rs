use std::{error, fmt, net::Ipv6Addr};

/// The error type for the `identity` module.
///
/// All of these are configuration errors detected before any key material is
/// touched.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// An address couldn't be parsed as IPv6.
    InvalidAddress { hostname: String, address: String },
    /// The same hostname appears more than once.
    DuplicateHostname(String),
    /// Two devices were configured with the same address.
    DuplicateAddress {
        first: String,
        second: String,
        address: Ipv6Addr,
    },
    /// No device has the root address.
    MissingRoot(Ipv6Addr),
    /// Two devices share the last 6 bytes of their EUI-64.
    OscoreIdCollision {
        first: String,
        second: String,
        id: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidAddress { hostname, address } => {
                write!(f, "Invalid address {:?} for {}", address, hostname)
            }
            Error::DuplicateHostname(h) => {
                write!(f, "Hostname {} is configured more than once", h)
            }
            Error::DuplicateAddress {
                first,
                second,
                address,
            } => write!(
                f,
                "Address {} is used by both {} and {}",
                address, first, second
            ),
            Error::MissingRoot(a) => {
                write!(f, "No device has the root address {}", a)
            }
            Error::OscoreIdCollision { first, second, id } => write!(
                f,
                "Devices {} and {} share the OSCORE id {}",
                first, second, id
            ),
        }
    }
}

impl error::Error for Error {}
