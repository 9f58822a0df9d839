use serde::{Serialize, Serializer};
use std::{fmt, net::Ipv6Addr};

/// Length of an OSCORE recipient/sender id taken from an EUI-64.
pub const ID_LEN: usize = 6;

/// The universal/local bit of the first EUI-64 byte.
const UNIVERSAL_LOCAL: u8 = 0x02;

/// An 8-byte link-layer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Eui64([u8; 8]);

impl Eui64 {
    /// Wraps raw EUI-64 bytes.
    pub const fn new(bytes: [u8; 8]) -> Eui64 {
        Eui64(bytes)
    }

    /// Derives the EUI-64 carried in the interface identifier of `address`.
    ///
    /// The firmware flips the universal/local bit when it turns its link-layer
    /// address into an IPv6 interface identifier, except on the root, so the
    /// inverse is applied here to every non-root address.
    ///
    /// # Arguments
    /// * `address` - The address to derive the EUI-64 for.
    /// * `root` - The address of the root node.
    pub fn from_address(address: &Ipv6Addr, root: &Ipv6Addr) -> Eui64 {
        let mut eui = [0; 8];
        eui.copy_from_slice(&address.octets()[8..]);
        if address != root {
            eui[0] ^= UNIVERSAL_LOCAL;
        }

        Eui64(eui)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Returns the OSCORE id of this device, the last 6 bytes.
    pub fn oscore_id(&self) -> [u8; ID_LEN] {
        let mut id = [0; ID_LEN];
        id.copy_from_slice(&self.0[8 - ID_LEN..]);
        id
    }

    /// Returns the lower-case hex of the OSCORE id, as used in directory and
    /// JSON key names.
    pub fn oscore_id_hex(&self) -> String {
        hex::encode(self.oscore_id())
    }
}

impl From<[u8; 8]> for Eui64 {
    fn from(bytes: [u8; 8]) -> Eui64 {
        Eui64(bytes)
    }
}

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> =
            self.0.iter().map(|b| format!("{:02x}", b)).collect();
        write!(f, "{}", parts.join(":"))
    }
}

impl Serialize for Eui64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}
