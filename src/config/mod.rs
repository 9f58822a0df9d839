//! The deployment configuration, loaded from a TOML file.
//!
//! It holds the identity map together with everything about the firmware
//! tree and the remote hosts that used to be scattered over the tool.
//! Relative paths are resolved against the current directory.

use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use crate::{
    cert::VALID_FOREVER,
    identity::{DeviceRecord, IdentityMap},
    oscore::{self, Params},
};

#[cfg_attr(tarpaulin, skip)]
mod error;
pub use error::Error;

/// The result type for the `config` module.
pub type Result<T> = std::result::Result<T, Error>;

mod defaults {
    pub fn validity_to() -> u32 {
        super::VALID_FOREVER
    }

    pub fn master_salt() -> Option<String> {
        Some(hex::encode(super::oscore::DEFAULT_MASTER_SALT))
    }

    pub fn static_keys() -> String {
        "common/static-keys.c".to_string()
    }

    pub fn trust_model_dir() -> String {
        "applications/trust/models".to_string()
    }

    pub fn trust_choose_dir() -> String {
        "applications/trust/choose".to_string()
    }

    pub fn applications_dir() -> String {
        "applications".to_string()
    }

    pub fn make() -> String {
        "make".to_string()
    }

    pub fn artefact() -> String {
        "build/{target}/{platform}/{binary}.bin".to_string()
    }

    pub fn username() -> String {
        "pi".to_string()
    }

    pub fn config_path() -> String {
        "iot-trust-task-alloc/tools/setup/devices.toml".to_string()
    }

    pub fn binary_dir() -> String {
        "iot-trust-task-alloc/tools/setup/bin".to_string()
    }

    pub fn keystore_dir() -> String {
        "iot-trust-task-alloc/tools/setup/keystore".to_string()
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address of the root device.
    pub root: String,
    #[serde(default)]
    pub certificates: Certificates,
    #[serde(default)]
    pub oscore: OscoreSection,
    pub firmware: Firmware,
    #[serde(default)]
    pub deploy: Deploy,
    #[serde(rename = "device", default)]
    pub devices: Vec<DeviceRecord>,
}

/// Validity bounds written into every certificate.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Certificates {
    #[serde(default)]
    pub validity_from: u32,
    #[serde(default = "defaults::validity_to")]
    pub validity_to: u32,
}

impl Default for Certificates {
    fn default() -> Certificates {
        Certificates {
            validity_from: 0,
            validity_to: VALID_FOREVER,
        }
    }
}

/// OSCORE parameters as hex strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OscoreSection {
    #[serde(default = "defaults::master_salt")]
    pub master_salt: Option<String>,
    #[serde(default)]
    pub id_context: Option<String>,
}

impl Default for OscoreSection {
    fn default() -> OscoreSection {
        OscoreSection {
            master_salt: defaults::master_salt(),
            id_context: None,
        }
    }
}

/// Layout of the firmware source tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Firmware {
    pub path: PathBuf,
    #[serde(default = "defaults::static_keys")]
    pub static_keys: String,
    #[serde(default = "defaults::trust_model_dir")]
    pub trust_model_dir: String,
    #[serde(default = "defaults::trust_choose_dir")]
    pub trust_choose_dir: String,
    #[serde(default = "defaults::applications_dir")]
    pub applications_dir: String,
    /// Where a build leaves its binary, relative to the variant directory.
    #[serde(default = "defaults::artefact")]
    pub artefact: String,
    /// The `make` program to build with.
    #[serde(default = "defaults::make")]
    pub make: String,
}

impl Firmware {
    pub fn static_keys_path(&self) -> PathBuf {
        self.path.join(&self.static_keys)
    }

    pub fn trust_model_path(&self) -> PathBuf {
        self.path.join(&self.trust_model_dir)
    }

    pub fn trust_choose_path(&self) -> PathBuf {
        self.path.join(&self.trust_choose_dir)
    }

    pub fn applications_path(&self) -> PathBuf {
        self.path.join(&self.applications_dir)
    }

    /// Returns the path of the binary built for `target`, `platform` and
    /// `binary`, filling in the `artefact` template.
    pub fn artefact_path(
        &self,
        binary: &str,
        target: &str,
        platform: &str,
    ) -> PathBuf {
        let relative = self
            .artefact
            .replace("{target}", target)
            .replace("{platform}", platform)
            .replace("{binary}", binary);
        self.path.join(binary).join(relative)
    }
}

/// Where files go on the remote hosts.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Deploy {
    #[serde(default = "defaults::username")]
    pub username: String,
    #[serde(default = "defaults::config_path")]
    pub config_path: String,
    #[serde(default = "defaults::binary_dir")]
    pub binary_dir: String,
    #[serde(default = "defaults::keystore_dir")]
    pub keystore_dir: String,
}

impl Default for Deploy {
    fn default() -> Deploy {
        Deploy {
            username: defaults::username(),
            config_path: defaults::config_path(),
            binary_dir: defaults::binary_dir(),
            keystore_dir: defaults::keystore_dir(),
        }
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Config> {
        Ok(toml::from_str(s)?)
    }
}

impl Config {
    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = text.parse()?;
        debug!(
            path = %path.display(),
            devices = config.devices.len(),
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Validates the devices and returns the identity map.
    pub fn identity_map(&self) -> Result<IdentityMap> {
        Ok(IdentityMap::new(self.devices.clone(), &self.root)?)
    }

    /// Decodes and validates the OSCORE parameters. An empty string leaves
    /// the value out.
    pub fn oscore_params(&self) -> Result<Params> {
        let master_salt = decode_hex("master_salt", &self.oscore.master_salt)?;
        let id_context = decode_hex("id_context", &self.oscore.id_context)?;

        Ok(Params::new(master_salt, id_context)?)
    }
}

fn decode_hex(field: &'static str, value: &Option<String>) -> Result<Option<Vec<u8>>> {
    value
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| hex::decode(s).map_err(|_| Error::InvalidHex(field)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{self, DeviceClass, DeviceKind};

    const FULL: &str = r#"
root = "fd00::1"

[certificates]
validity_from = 10
validity_to = 4102444800

[oscore]
master_salt = "00112233445566778899aabbccddeeff"
id_context = "37cbf3210017a2d3"

[firmware]
path = "../wsn"
artefact = "build/{target}/{platform}/{binary}.{target}"
make = "gmake"

[deploy]
username = "root"

[[device]]
hostname = "wsn1"
address = "fd00::1"
class = "server"
kind = "raspberry-pi"

[[device]]
hostname = "wsn2"
address = "fd00::212:4b00:14d5:2bd6"
class = "raspberry-pi"
kind = "zolertia"
"#;

    const MINIMAL: &str = r#"
root = "fd00::1"

[firmware]
path = "wsn"

[[device]]
hostname = "wsn1"
address = "fd00::1"
class = "server"
kind = "raspberry-pi"
"#;

    #[test]
    fn full() {
        let config: Config = FULL.parse().unwrap();
        assert_eq!(config.certificates.validity_from, 10);
        assert_eq!(config.certificates.validity_to, 4102444800);
        assert_eq!(config.deploy.username, "root");
        assert_eq!(config.deploy.binary_dir, defaults::binary_dir());

        let map = config.identity_map().unwrap();
        let edge = map.get("wsn2").unwrap();
        assert_eq!(edge.class, DeviceClass::RaspberryPi);
        assert_eq!(edge.kind, DeviceKind::Zolertia);

        let params = config.oscore_params().unwrap();
        assert_eq!(params.master_salt.unwrap()[15], 0xFF);
        assert_eq!(
            params.id_context,
            Some(vec![0x37, 0xCB, 0xF3, 0x21, 0x00, 0x17, 0xA2, 0xD3])
        );

        assert_eq!(
            config.firmware.artefact_path("node", "zoul", "remote-revb"),
            Path::new("../wsn/node/build/zoul/remote-revb/node.zoul")
        );
        assert_eq!(config.firmware.make, "gmake");
    }

    #[test]
    fn defaults() {
        let config: Config = MINIMAL.parse().unwrap();
        assert_eq!(config.certificates.validity_from, 0);
        assert_eq!(config.certificates.validity_to, u32::MAX);
        assert_eq!(config.deploy.username, "pi");
        assert_eq!(config.firmware.make, "make");
        assert_eq!(
            config.firmware.static_keys_path(),
            Path::new("wsn/common/static-keys.c")
        );
        assert_eq!(
            config.firmware.trust_model_path(),
            Path::new("wsn/applications/trust/models")
        );
        assert_eq!(
            config.firmware.artefact_path("edge", "native", "native"),
            Path::new("wsn/edge/build/native/native/edge.bin")
        );
        let params = config.oscore_params().unwrap();
        assert_eq!(params, Params::default());
    }

    #[test]
    fn invalid() {
        let bad_salt = MINIMAL.replace(
            "[firmware]",
            "[oscore]\nmaster_salt = \"0011\"\n\n[firmware]",
        );
        let config: Config = bad_salt.parse().unwrap();
        assert!(matches!(
            config.oscore_params(),
            Err(Error::Oscore(oscore::Error::SaltLength(2)))
        ));

        let bad_hex = MINIMAL.replace(
            "[firmware]",
            "[oscore]\nid_context = \"xyz\"\n\n[firmware]",
        );
        let config: Config = bad_hex.parse().unwrap();
        assert!(matches!(
            config.oscore_params(),
            Err(Error::InvalidHex("id_context"))
        ));

        let unknown = MINIMAL.replace("kind = ", "colour = \"red\"\nkind = ");
        assert!(matches!(unknown.parse::<Config>(), Err(Error::Toml(_))));

        let missing_root = MINIMAL.replace("root = \"fd00::1\"", "root = \"fd00::2\"");
        let config: Config = missing_root.parse().unwrap();
        assert!(matches!(
            config.identity_map(),
            Err(Error::Identity(identity::Error::MissingRoot(_)))
        ));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("devices.toml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
