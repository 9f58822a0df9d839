//! The identity map: which devices exist, their addresses and classes.

use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    net::Ipv6Addr,
};
use tracing::debug;

mod eui;
#[cfg_attr(tarpaulin, skip)]
mod error;
mod tags;

pub use eui::{Eui64, ID_LEN};
pub use error::Error;
pub use tags::{DeviceClass, StereotypeTags};

/// The result type for the `identity` module.
pub type Result<T> = std::result::Result<T, Error>;

/// The hardware family of a device, which fixes how its firmware is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    Zolertia,
    Nrf52840,
    RaspberryPi,
}

impl DeviceKind {
    /// Returns the `TARGET` passed to the firmware build.
    pub fn target(self) -> &'static str {
        match self {
            DeviceKind::Zolertia => "zoul",
            DeviceKind::Nrf52840 => "nrf52840",
            DeviceKind::RaspberryPi => "native",
        }
    }

    /// Returns the `PLATFORM` passed to the firmware build.
    pub fn platform(self) -> &'static str {
        match self {
            DeviceKind::Zolertia => "remote-revb",
            DeviceKind::Nrf52840 => "dk",
            DeviceKind::RaspberryPi => "native",
        }
    }
}

/// A device as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceRecord {
    pub hostname: String,
    pub address: String,
    pub class: DeviceClass,
    pub kind: DeviceKind,
}

/// A validated device.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub hostname: String,
    pub address: Ipv6Addr,
    pub class: DeviceClass,
    pub kind: DeviceKind,
    pub eui64: Eui64,
    pub is_root: bool,
}

impl Device {
    /// Returns the canonical textual form of the address, which is the input
    /// to key derivation.
    pub fn address_text(&self) -> String {
        self.address.to_string()
    }

    /// Returns the address with colons replaced by underscores, used to name
    /// files and directories belonging to this device.
    pub fn file_prefix(&self) -> String {
        file_prefix(&self.address_text())
    }

    /// Returns the stereotype tags that go into this device's certificate.
    pub fn tags(&self) -> StereotypeTags {
        StereotypeTags::new(self.class)
    }
}

/// Returns `address` with colons replaced by underscores.
pub fn file_prefix(address: &str) -> String {
    address.replace(':', "_")
}

/// The closed set of devices of a deployment, exactly one of them root.
#[derive(Debug, Clone)]
pub struct IdentityMap {
    // Sorted by hostname
    devices: Vec<Device>,
    root: usize,
}

impl IdentityMap {
    /// Validates the records and builds the map.
    ///
    /// Fails if an address doesn't parse, a hostname or address appears
    /// twice, no record has the root address, or two devices share the
    /// last 6 bytes of their EUI-64 (which is their OSCORE id).
    ///
    /// # Arguments
    /// * `records` - The devices of the deployment.
    /// * `root` - The address of the root device.
    pub fn new(records: Vec<DeviceRecord>, root: &str) -> Result<IdentityMap> {
        let root_address: Ipv6Addr = root.parse().map_err(|_| {
            Error::InvalidAddress {
                hostname: String::from("root"),
                address: root.to_string(),
            }
        })?;

        let mut hostnames = HashSet::new();
        let mut addresses: HashMap<Ipv6Addr, String> = HashMap::new();
        let mut devices = Vec::with_capacity(records.len());
        for record in records {
            let address: Ipv6Addr =
                record.address.parse().map_err(|_| Error::InvalidAddress {
                    hostname: record.hostname.clone(),
                    address: record.address.clone(),
                })?;
            if !hostnames.insert(record.hostname.clone()) {
                return Err(Error::DuplicateHostname(record.hostname));
            }
            if let Some(first) = addresses.insert(address, record.hostname.clone())
            {
                return Err(Error::DuplicateAddress {
                    first,
                    second: record.hostname,
                    address,
                });
            }

            let eui64 = Eui64::from_address(&address, &root_address);
            debug!(hostname = %record.hostname, %address, %eui64, "Device");
            devices.push(Device {
                hostname: record.hostname,
                address,
                class: record.class,
                kind: record.kind,
                eui64,
                is_root: address == root_address,
            });
        }
        devices.sort_by(|a, b| a.hostname.cmp(&b.hostname));

        let root = devices
            .iter()
            .position(|d| d.is_root)
            .ok_or(Error::MissingRoot(root_address))?;

        let map = IdentityMap { devices, root };
        map.check_oscore_ids()?;

        Ok(map)
    }

    /// Makes sure no two devices end up with the same OSCORE id.
    fn check_oscore_ids(&self) -> Result<()> {
        let mut seen: HashMap<[u8; ID_LEN], &str> = HashMap::new();
        for device in &self.devices {
            if let Some(first) =
                seen.insert(device.eui64.oscore_id(), &device.hostname)
            {
                return Err(Error::OscoreIdCollision {
                    first: first.to_string(),
                    second: device.hostname.clone(),
                    id: device.eui64.oscore_id_hex(),
                });
            }
        }

        Ok(())
    }

    /// Returns the root device.
    pub fn root(&self) -> &Device {
        &self.devices[self.root]
    }

    /// Returns the position of root in `devices()`.
    pub fn root_index(&self) -> usize {
        self.root
    }

    /// Returns all devices, ordered by hostname.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Returns all devices except root, ordered by hostname.
    pub fn peers(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| !d.is_root)
    }

    /// Looks up a device by hostname.
    pub fn get(&self, hostname: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.hostname == hostname)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn record(hostname: &str, address: &str, class: DeviceClass) -> DeviceRecord {
        DeviceRecord {
            hostname: hostname.to_string(),
            address: address.to_string(),
            class,
            kind: DeviceKind::Zolertia,
        }
    }

    pub fn two_device_map() -> IdentityMap {
        IdentityMap::new(
            vec![
                record("wsn2", "fd00::212:4b00:14d5:2bd6", DeviceClass::RaspberryPi),
                record("wsn1", "fd00::1", DeviceClass::Server),
            ],
            "fd00::1",
        )
        .unwrap()
    }

    #[test]
    fn root_and_order() {
        let map = two_device_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.root().hostname, "wsn1");
        assert!(map.root().is_root);
        let hostnames: Vec<_> =
            map.devices().iter().map(|d| d.hostname.as_str()).collect();
        assert_eq!(hostnames, vec!["wsn1", "wsn2"]);
        let peers: Vec<_> = map.peers().map(|d| d.hostname.as_str()).collect();
        assert_eq!(peers, vec!["wsn2"]);
        assert_eq!(map.get("wsn2").unwrap().eui64.oscore_id_hex(), "4b0014d52bd6");
    }

    #[test]
    fn file_prefixes() {
        let map = two_device_map();
        assert_eq!(map.root().file_prefix(), "fd00__1");
        assert_eq!(
            map.get("wsn2").unwrap().file_prefix(),
            "fd00__212_4b00_14d5_2bd6"
        );
    }

    #[test]
    fn address_is_canonicalized() {
        let map = IdentityMap::new(
            vec![record("wsn1", "FD00:0:0:0:0:0:0:1", DeviceClass::Server)],
            "fd00::1",
        )
        .unwrap();
        assert_eq!(map.root().address_text(), "fd00::1");
    }

    #[test]
    fn missing_root() {
        let err = IdentityMap::new(
            vec![record("wsn2", "fd00::2", DeviceClass::Server)],
            "fd00::1",
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingRoot(_)));
        assert!(matches!(
            IdentityMap::new(vec![], "fd00::1").unwrap_err(),
            Error::MissingRoot(_)
        ));
    }

    #[test]
    fn bad_address() {
        let err = IdentityMap::new(
            vec![record("wsn1", "not-an-address", DeviceClass::Server)],
            "fd00::1",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
    }

    #[test]
    fn duplicates() {
        let err = IdentityMap::new(
            vec![
                record("wsn1", "fd00::1", DeviceClass::Server),
                record("wsn1", "fd00::2", DeviceClass::Server),
            ],
            "fd00::1",
        )
        .unwrap_err();
        assert_eq!(err, Error::DuplicateHostname("wsn1".to_string()));

        let err = IdentityMap::new(
            vec![
                record("wsn1", "fd00::1", DeviceClass::Server),
                record("wsn2", "fd00::0:1", DeviceClass::Server),
            ],
            "fd00::1",
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateAddress { .. }));
    }

    #[test]
    fn oscore_id_collision_names_both() {
        // Same last 48 bits, different upper interface identifier bytes
        let err = IdentityMap::new(
            vec![
                record("wsn1", "fd00::1", DeviceClass::Server),
                record("wsn2", "fd00::212:4b00:14d5:2bd6", DeviceClass::Phone),
                record("wsn3", "fd00::aaaa:4b00:14d5:2bd6", DeviceClass::Phone),
            ],
            "fd00::1",
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::OscoreIdCollision {
                first: "wsn2".to_string(),
                second: "wsn3".to_string(),
                id: "4b0014d52bd6".to_string(),
            }
        );
        let message = err.to_string();
        assert!(message.contains("wsn2") && message.contains("wsn3"));
    }

    #[test]
    fn device_kinds() {
        assert_eq!(DeviceKind::Zolertia.target(), "zoul");
        assert_eq!(DeviceKind::Zolertia.platform(), "remote-revb");
        assert_eq!(DeviceKind::Nrf52840.platform(), "dk");
    }
}
