//! The provisioning run, from the identity map to the deployed hosts.
//!
//! Every stage finishes before the next one starts: key material, then
//! certificates, then OSCORE contexts, then firmware builds, then
//! deployment. Inputs are validated before anything is written.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::{
    build::{self, BuildOptions, Builder, StaticKeysSwap},
    cert::{self, Certificate, CertificateAuthority},
    codegen::StaticKeys,
    config::Config,
    deploy::{Artefacts, Deployer, Transport},
    identity::IdentityMap,
    keystore::{Keypair, Keystore},
    oscore::{self, Member, Params},
    Error, Result,
};

/// Name of the keystore directory inside `setup/`.
pub const KEYSTORE_DIR: &str = "keystore";

/// What a run is asked to do besides generating key material.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// The configuration file, which is also deployed to every host.
    pub config_file: PathBuf,
    /// The working tree, usually `setup/`.
    pub setup_dir: PathBuf,
    /// The firmware to build, or `None` to skip building.
    pub build: Option<BuildOptions>,
}

/// What a run produced.
#[derive(Debug)]
pub struct Outcome {
    pub build_number: u32,
    /// Certificates by hostname.
    pub certificates: BTreeMap<String, Certificate>,
    /// The `secret.json` files, one per non-root device.
    pub contexts: Vec<PathBuf>,
    pub analyser: PathBuf,
    /// Built binaries by hostname.
    pub binaries: BTreeMap<String, Vec<PathBuf>>,
}

/// Runs the whole provisioning for `config`, deploying with `transport`.
pub fn run<T: Transport>(
    config: &Config,
    options: &RunOptions,
    transport: T,
) -> Result<Outcome> {
    if options.build.is_some() {
        build::recover_static_keys(&config.firmware.static_keys_path())?;
    }

    // Validation
    let map = config.identity_map()?;
    let params = config.oscore_params()?;
    if let Some(build) = &options.build {
        build.validate(&config.firmware)?;
    }
    info!(devices = map.len(), root = %map.root().hostname, "Validated configuration");

    fs::create_dir_all(&options.setup_dir)
        .map_err(|e| Error::io(&options.setup_dir, e))?;
    let build_number = build::next_build_number(&options.setup_dir)?;
    let keystore = Keystore::create(keystore_dir(&options.setup_dir))?;

    let keypairs = generate_keys(&keystore, &map)?;
    let certificates = issue_certificates(config, &keystore, &map, &keypairs)?;
    let (contexts, analyser) =
        synthesize_contexts(&keystore, &map, &keypairs, &params)?;

    let binaries = match &options.build {
        Some(build) => build_firmware(
            config,
            options,
            build,
            &params,
            build_number,
            &map,
            &keypairs,
            &certificates,
        )?,
        None => BTreeMap::new(),
    };

    let artefacts = Artefacts {
        config_file: &options.config_file,
        binaries: &binaries,
        keystore_dir: keystore.dir(),
    };
    Deployer::new(transport, &config.deploy).deploy(&map, &artefacts)?;
    info!(build_number, "Provisioning complete");

    Ok(Outcome {
        build_number,
        certificates,
        contexts,
        analyser,
        binaries,
    })
}

/// Derives and saves the keypair of every device, in the order of
/// `map.devices()`.
fn generate_keys(keystore: &Keystore, map: &IdentityMap) -> Result<Vec<Keypair>> {
    let mut keypairs = Vec::with_capacity(map.len());
    for device in map.devices() {
        let address = device.address_text();
        let keypair = Keypair::derive(&address)?;
        keystore.save(&keypair, &address)?;
        debug!(hostname = %device.hostname, eui64 = %device.eui64, "Derived keypair");
        keypairs.push(keypair);
    }
    keystore.alias_root_private(&map.root().address_text())?;

    Ok(keypairs)
}

/// Issues root's certificate first, then the others by hostname. Each one
/// is written, read back and verified.
fn issue_certificates(
    config: &Config,
    keystore: &Keystore,
    map: &IdentityMap,
    keypairs: &[Keypair],
) -> Result<BTreeMap<String, Certificate>> {
    let devices = map.devices();
    let root_index = map.root_index();
    let mut ca = CertificateAuthority::new(
        map.root(),
        keypairs[root_index].clone(),
        config.certificates.validity_from,
        Some(config.certificates.validity_to),
    );
    let issuer = ca.public_key();

    let order = std::iter::once(root_index)
        .chain((0..devices.len()).filter(|&i| i != root_index));
    let mut certificates = BTreeMap::new();
    for i in order {
        let device = &devices[i];
        let address = device.address_text();
        let certificate = ca.issue(device, &keypairs[i].public_key())?;
        cert::write_certificate(keystore, &address, &certificate)?;

        let stored = cert::read_certificate(keystore, &address)?;
        stored.verify(&issuer)?;
        if stored != certificate || stored.tbs.issuer != map.root().eui64 {
            return Err(Error::CertificateMismatch(device.hostname.clone()));
        }
        certificates.insert(device.hostname.clone(), certificate);
    }
    info!(issued = ca.issued(), "Issued certificates");

    Ok(certificates)
}

fn synthesize_contexts(
    keystore: &Keystore,
    map: &IdentityMap,
    keypairs: &[Keypair],
    params: &Params,
) -> Result<(Vec<PathBuf>, PathBuf)> {
    // Contexts of an earlier run would clash with this one
    let contexts_dir = keystore.contexts_dir();
    if contexts_dir.exists() {
        fs::remove_dir_all(&contexts_dir)
            .map_err(|e| Error::io(&contexts_dir, e))?;
    }

    let members: Vec<_> = map
        .devices()
        .iter()
        .zip(keypairs)
        .map(|(device, keypair)| Member { device, keypair })
        .collect();
    let root = members[map.root_index()];
    let peers: Vec<_> =
        members.iter().copied().filter(|m| !m.device.is_root).collect();

    let contexts = oscore::write_contexts(keystore, root, &peers, params)?;
    let analyser = oscore::write_analyser_file(keystore, &members, params)?;
    oscore::check_contexts(keystore, root, &peers, params)?;

    Ok((contexts, analyser))
}

#[allow(clippy::too_many_arguments)]
fn build_firmware(
    config: &Config,
    options: &RunOptions,
    build: &BuildOptions,
    params: &Params,
    build_number: u32,
    map: &IdentityMap,
    keypairs: &[Keypair],
    certificates: &BTreeMap<String, Certificate>,
) -> Result<BTreeMap<String, Vec<PathBuf>>> {
    let mut binaries = BTreeMap::new();
    let root_cert = certificate(certificates, &map.root().hostname)?;
    let builder = Builder::new(
        &config.firmware,
        &options.setup_dir,
        build,
        params,
        build_number,
    );

    let swap = StaticKeysSwap::begin(&config.firmware.static_keys_path())?;
    for (device, keypair) in map.devices().iter().zip(keypairs) {
        if device.is_root {
            continue;
        }
        let our_cert = certificate(certificates, &device.hostname)?;
        let static_keys =
            StaticKeys::new(keypair.private_scalar(), root_cert, our_cert);
        let built = builder.build_device(&swap, device, &static_keys.to_string())?;
        binaries.insert(device.hostname.clone(), built);
    }
    swap.restore()?;

    Ok(binaries)
}

fn certificate<'a>(
    certificates: &'a BTreeMap<String, Certificate>,
    hostname: &str,
) -> Result<&'a Certificate> {
    certificates
        .get(hostname)
        .ok_or_else(|| Error::CertificateMismatch(hostname.to_string()))
}

/// Returns the keystore directory of `setup_dir`.
pub fn keystore_dir(setup_dir: &Path) -> PathBuf {
    setup_dir.join(KEYSTORE_DIR)
}
