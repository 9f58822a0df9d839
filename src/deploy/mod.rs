//! Copying the configuration, binaries and keystore onto the hosts.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::{config, identity::IdentityMap};

#[cfg_attr(tarpaulin, skip)]
mod error;
mod transport;

pub use error::Error;
pub use transport::{Host, LocalTransport, NullTransport, SshTransport, Transport};

/// The result type for the `deploy` module.
pub type Result<T> = std::result::Result<T, Error>;

/// What gets deployed.
pub struct Artefacts<'a> {
    /// The configuration file every host gets.
    pub config_file: &'a Path,
    /// The built binaries, by hostname.
    pub binaries: &'a BTreeMap<String, Vec<PathBuf>>,
    /// The local keystore, mirrored onto root.
    pub keystore_dir: &'a Path,
}

/// Deploys onto every host of a deployment through a `Transport`.
pub struct Deployer<'a, T: Transport> {
    transport: T,
    settings: &'a config::Deploy,
}

impl<'a, T: Transport> Deployer<'a, T> {
    pub fn new(transport: T, settings: &'a config::Deploy) -> Deployer<'a, T> {
        Deployer {
            transport,
            settings,
        }
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Deploys to all devices of `map`, in hostname order.
    ///
    /// Every host gets the configuration file. Non-root hosts get their
    /// binaries, root gets a copy of the keystore.
    pub fn deploy(&mut self, map: &IdentityMap, artefacts: &Artefacts) -> Result<()> {
        for device in map.devices() {
            let host = Host {
                hostname: device.hostname.clone(),
                username: self.settings.username.clone(),
            };
            self.transport.open(&host)?;
            let result = self.deploy_host(&host, device.is_root, artefacts);
            // Close even if an upload failed, but report the first error
            let closed = self.transport.close(&host);
            result.and(closed)?;
        }

        Ok(())
    }

    fn deploy_host(
        &mut self,
        host: &Host,
        is_root: bool,
        artefacts: &Artefacts,
    ) -> Result<()> {
        let remote = &self.settings.config_path;
        self.transport.upload(host, artefacts.config_file, remote)?;
        log_copy(host, artefacts.config_file, remote);

        if is_root {
            let remote = &self.settings.keystore_dir;
            self.transport.mirror(host, artefacts.keystore_dir, remote)?;
            log_copy(host, artefacts.keystore_dir, remote);
        } else if let Some(binaries) = artefacts.binaries.get(&host.hostname) {
            for binary in binaries {
                let name = binary
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let remote = format!("{}/{}", self.settings.binary_dir, name);
                self.transport.upload(host, binary, &remote)?;
                log_copy(host, binary, &remote);
            }
        }

        Ok(())
    }
}

fn log_copy(host: &Host, local: &Path, remote: &str) {
    info!("{} -> {}:{}", local.display(), host.destination(), remote);
}
