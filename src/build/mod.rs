//! Building the firmware of every device with `make`.
//!
//! The firmware tree has one directory per binary variant. For a device,
//! its `static-keys.c` is swapped into the tree, every variant is built with
//! the deployment's compile-time options, and the binaries are moved into
//! `setup/<address>/` together with the `static-keys.c` they were built with
//! and the captured build output.

use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info};

use crate::{config::Firmware, identity::Device, oscore::Params};

#[cfg_attr(tarpaulin, skip)]
mod error;
mod number;
mod swap;

pub use error::Error;
pub use number::{next_build_number, BUILD_NUMBER_FILE};
pub use swap::{backup_path, recover_static_keys, StaticKeysSwap};

/// The result type for the `build` module.
pub type Result<T> = std::result::Result<T, Error>;

/// The binaries built for each device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Node,
    Edge,
    Adversary,
}

impl Variant {
    /// The name of the variant's directory, make goal and binary.
    pub fn name(self) -> &'static str {
        match self {
            Variant::Node => "node",
            Variant::Edge => "edge",
            Variant::Adversary => "adversary",
        }
    }
}

/// The choices made on the command line that end up in every build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOptions {
    pub trust_model: String,
    pub trust_choose: String,
    pub applications: Vec<String>,
    pub with_pcap: bool,
    /// Attacks for the adversary binary, which is only built if present.
    pub adversary: Option<Vec<String>>,
    /// Passed through as `-DNAME=VALUE`.
    pub defines: Vec<(String, String)>,
}

impl BuildOptions {
    pub fn variants(&self) -> Vec<Variant> {
        let mut variants = vec![Variant::Node, Variant::Edge];
        if self.adversary.is_some() {
            variants.push(Variant::Adversary);
        }
        variants
    }

    /// Checks the trust model, trust choice and applications against the
    /// directories of the firmware tree.
    pub fn validate(&self, firmware: &Firmware) -> Result<()> {
        check_choice(
            "trust model",
            &self.trust_model,
            &firmware.trust_model_path(),
        )?;
        check_choice(
            "trust choice",
            &self.trust_choose,
            &firmware.trust_choose_path(),
        )?;
        for application in &self.applications {
            check_choice(
                "application",
                application,
                &firmware.applications_path(),
            )?;
        }

        Ok(())
    }
}

/// Returns the sorted names of the entries of `dir`.
pub fn list_entries(dir: &Path) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if let Some(name) = entry.file_name().to_str() {
            entries.push(name.to_string());
        }
    }
    entries.sort();

    Ok(entries)
}

fn check_choice(kind: &'static str, value: &str, dir: &Path) -> Result<()> {
    let valid = list_entries(dir)?;
    if valid.iter().any(|v| v == value) {
        Ok(())
    } else {
        Err(Error::UnknownChoice {
            kind,
            value: value.to_string(),
            valid,
        })
    }
}

/// Formats `bytes` as a C initialiser, like `{0x01, 0x02}`.
pub fn c_initialiser(bytes: &[u8]) -> String {
    let items: Vec<_> = bytes.iter().map(|b| format!("0x{:02x}", b)).collect();
    format!("{{{}}}", items.join(", "))
}

/// Returns the variable assignments passed to `make` for one build.
///
/// # Arguments
/// * `options` - The command line choices.
/// * `params` - The OSCORE parameters, whose salt and id context are
///   compiled in.
/// * `build_number` - The number of this run.
/// * `device` - The device the firmware is for.
/// * `variant` - The binary being built.
pub fn make_variables(
    options: &BuildOptions,
    params: &Params,
    build_number: u32,
    device: &Device,
    variant: Variant,
) -> Vec<String> {
    let mut vars = vec![
        format!("BUILD_NUMBER={}", build_number),
        format!("TRUST_MODEL={}", options.trust_model),
        format!("TRUST_CHOOSE={}", options.trust_choose),
        format!("TARGET={}", device.kind.target()),
        format!("PLATFORM={}", device.kind.platform()),
        format!("APPLICATIONS={}", options.applications.join(" ")),
    ];
    if options.with_pcap {
        vars.push("MAKE_WITH_PCAP=1".to_string());
    }
    if let Some(salt) = &params.master_salt {
        vars.push(format!("OSCORE_MASTER_SALT={}", c_initialiser(salt)));
    }
    if let Some(id_context) = &params.id_context {
        vars.push(format!("OSCORE_ID_CONTEXT={}", c_initialiser(id_context)));
    }
    let cflags: Vec<_> = options
        .defines
        .iter()
        .map(|(name, value)| format!("-D{}={}", name, value))
        .collect();
    vars.push(format!("ADDITIONAL_CFLAGS={}", cflags.join(" ")));
    if variant == Variant::Adversary {
        if let Some(attacks) = &options.adversary {
            vars.push(format!("MAKE_ATTACKS={}", attacks.join(",")));
        }
    }

    vars
}

/// Runs the firmware builds of a deployment.
pub struct Builder<'a> {
    firmware: &'a Firmware,
    setup_dir: &'a Path,
    options: &'a BuildOptions,
    params: &'a Params,
    build_number: u32,
}

impl<'a> Builder<'a> {
    pub fn new(
        firmware: &'a Firmware,
        setup_dir: &'a Path,
        options: &'a BuildOptions,
        params: &'a Params,
        build_number: u32,
    ) -> Builder<'a> {
        Builder {
            firmware,
            setup_dir,
            options,
            params,
            build_number,
        }
    }

    /// Returns `setup/<address>/`.
    pub fn device_dir(&self, device: &Device) -> PathBuf {
        self.setup_dir.join(device.file_prefix())
    }

    /// Builds every variant for `device` with `static_keys` swapped in.
    ///
    /// Returns the paths of the binaries in `setup/<address>/`.
    pub fn build_device(
        &self,
        swap: &StaticKeysSwap,
        device: &Device,
        static_keys: &str,
    ) -> Result<Vec<PathBuf>> {
        let device_dir = self.device_dir(device);
        fs::create_dir_all(&device_dir).map_err(|e| Error::io(&device_dir, e))?;

        swap.install(static_keys)?;
        let saved = device_dir.join(crate::codegen::STATIC_KEYS_FILE);
        fs::write(&saved, static_keys).map_err(|e| Error::io(&saved, e))?;

        let mut binaries = Vec::new();
        for variant in self.options.variants() {
            let variant_dir = self.firmware.path.join(variant.name());
            let log = device_dir.join(format!("{}.build.log", variant.name()));

            let mut clean = Command::new(&self.firmware.make);
            clean.arg("-C").arg(&variant_dir).arg("distclean");
            run(clean, &log, false)?;

            let mut make = Command::new(&self.firmware.make);
            make.arg("-C").arg(&variant_dir).arg(variant.name());
            make.args(make_variables(
                self.options,
                self.params,
                self.build_number,
                device,
                variant,
            ));
            run(make, &log, true)?;

            let artefact = self.firmware.artefact_path(
                variant.name(),
                device.kind.target(),
                device.kind.platform(),
            );
            let binary = device_dir.join(format!("{}.bin", variant.name()));
            move_file(&artefact, &binary)?;
            info!(
                hostname = %device.hostname,
                binary = %binary.display(),
                "Built {}",
                variant.name()
            );
            binaries.push(binary);
        }

        Ok(binaries)
    }
}

/// Runs `command` to completion, writing its output to `log`.
fn run(mut command: Command, log: &Path, append: bool) -> Result<()> {
    let shown = format!("{:?}", command);
    debug!(command = %shown, "Running");
    let output = command.output().map_err(|source| Error::Spawn {
        command: shown.clone(),
        source,
    })?;

    let mut contents = if append {
        match fs::read(log) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::io(log, e)),
        }
    } else {
        Vec::new()
    };
    contents.extend_from_slice(format!("$ {}\n", shown).as_bytes());
    contents.extend_from_slice(&output.stdout);
    contents.extend_from_slice(&output.stderr);
    fs::write(log, contents).map_err(|e| Error::io(log, e))?;

    if !output.status.success() {
        return Err(Error::Make {
            command: shown,
            status: output.status.to_string(),
            log: log.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(())
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Across file systems rename fails, so copy instead
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            fs::copy(from, to).map_err(|e| Error::io(from, e))?;
            fs::remove_file(from).map_err(|e| Error::io(from, e))
        }
        Err(e) => Err(Error::io(from, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        identity::{tests::two_device_map, DeviceKind},
    };

    fn options() -> BuildOptions {
        BuildOptions {
            trust_model: "basic".to_string(),
            trust_choose: "banded".to_string(),
            applications: vec!["monitoring".to_string(), "routing".to_string()],
            with_pcap: false,
            adversary: None,
            defines: vec![],
        }
    }

    fn firmware(path: &Path) -> Firmware {
        let toml = format!(
            "root = \"fd00::1\"\n[firmware]\npath = {:?}\n",
            path.display().to_string()
        );
        toml.parse::<Config>().unwrap().firmware
    }

    #[test]
    fn variables() {
        let map = two_device_map();
        let edge = map.get("wsn2").unwrap();
        assert_eq!(edge.kind, DeviceKind::Zolertia);
        let params = Params {
            master_salt: Some(vec![0x64, 0x2B]),
            ..Params::default()
        };

        let vars = make_variables(&options(), &params, 3, edge, Variant::Node);
        assert_eq!(
            vars,
            vec![
                "BUILD_NUMBER=3",
                "TRUST_MODEL=basic",
                "TRUST_CHOOSE=banded",
                "TARGET=zoul",
                "PLATFORM=remote-revb",
                "APPLICATIONS=monitoring routing",
                "OSCORE_MASTER_SALT={0x64, 0x2b}",
                "ADDITIONAL_CFLAGS=",
            ]
        );
    }

    #[test]
    fn adversary_and_defines() {
        let map = two_device_map();
        let edge = map.get("wsn2").unwrap();
        let options = BuildOptions {
            with_pcap: true,
            adversary: Some(vec!["drop".to_string(), "delay".to_string()]),
            defines: vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "x".to_string()),
            ],
            ..options()
        };
        let params = Params {
            master_salt: None,
            id_context: Some(vec![0xAB]),
            ..Params::default()
        };
        assert_eq!(
            options.variants(),
            vec![Variant::Node, Variant::Edge, Variant::Adversary]
        );

        let node = make_variables(&options, &params, 1, edge, Variant::Node);
        assert!(node.contains(&"MAKE_WITH_PCAP=1".to_string()));
        assert!(node.contains(&"OSCORE_ID_CONTEXT={0xab}".to_string()));
        assert!(node.contains(&"ADDITIONAL_CFLAGS=-DA=1 -DB=x".to_string()));
        assert!(!node.iter().any(|v| v.starts_with("OSCORE_MASTER_SALT")));
        assert!(!node.iter().any(|v| v.starts_with("MAKE_ATTACKS")));

        let adversary =
            make_variables(&options, &params, 1, edge, Variant::Adversary);
        assert_eq!(adversary.last().unwrap(), "MAKE_ATTACKS=drop,delay");

        // An empty attack list still builds the adversary
        let options = BuildOptions {
            adversary: Some(vec![]),
            ..BuildOptions::default()
        };
        assert_eq!(options.variants().len(), 3);
    }

    #[test]
    fn validate_choices() {
        let dir = tempfile::tempdir().unwrap();
        let firmware = firmware(dir.path());
        for sub in [
            "applications/trust/models/basic",
            "applications/trust/models/continuous",
            "applications/trust/choose/banded",
            "applications/monitoring",
            "applications/routing",
        ] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }

        options().validate(&firmware).unwrap();

        let bad = BuildOptions {
            trust_model: "unknown".to_string(),
            ..options()
        };
        match bad.validate(&firmware) {
            Err(Error::UnknownChoice { kind, valid, .. }) => {
                assert_eq!(kind, "trust model");
                assert_eq!(valid, vec!["basic", "continuous"]);
            }
            other => panic!("unexpected {:?}", other),
        }

        let bad = BuildOptions {
            applications: vec!["missing".to_string()],
            ..options()
        };
        assert!(matches!(
            bad.validate(&firmware),
            Err(Error::UnknownChoice {
                kind: "application",
                ..
            })
        ));
    }

    // Builds by copying the installed static-keys.c, fails once `fail` exists
    #[cfg(unix)]
    const FAKE_MAKE: &str = r#"#!/bin/sh
tools="$(dirname "$0")"
echo "$@" >> "$tools/calls"
case "$3" in
distclean)
    rm -rf "$2/build"
    ;;
*)
    if [ -f "$tools/fail" ]; then
        echo "no rule to make $3" >&2
        exit 1
    fi
    mkdir -p "$2/build/zoul/remote-revb"
    cp "$2/../common/static-keys.c" "$2/build/zoul/remote-revb/$3.bin"
    echo "built $3"
    ;;
esac
"#;

    #[cfg(unix)]
    #[test]
    fn builds_every_variant() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tools = dir.path().join("tools");
        fs::create_dir(&tools).unwrap();
        let script = tools.join("make");
        fs::write(&script, FAKE_MAKE).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let tree = dir.path().join("wsn");
        for sub in ["common", "node", "edge"] {
            fs::create_dir_all(tree.join(sub)).unwrap();
        }
        fs::write(tree.join("common/static-keys.c"), "orig").unwrap();
        let toml = format!(
            "root = \"fd00::1\"\n[firmware]\npath = {:?}\nmake = {:?}\n",
            tree.display().to_string(),
            script.display().to_string()
        );
        let firmware = toml.parse::<Config>().unwrap().firmware;

        let setup = dir.path().join("setup");
        let options = options();
        let params = Params::default();
        let builder = Builder::new(&firmware, &setup, &options, &params, 7);
        let map = two_device_map();
        let edge = map.get("wsn2").unwrap();
        let device_dir = setup.join("fd00__212_4b00_14d5_2bd6");
        let static_keys = firmware.static_keys_path();

        let swap = StaticKeysSwap::begin(&static_keys).unwrap();
        let binaries = builder.build_device(&swap, edge, "keys of wsn2").unwrap();
        swap.restore().unwrap();

        assert_eq!(
            binaries,
            vec![device_dir.join("node.bin"), device_dir.join("edge.bin")]
        );
        for binary in &binaries {
            assert_eq!(fs::read_to_string(binary).unwrap(), "keys of wsn2");
        }
        assert_eq!(
            fs::read_to_string(device_dir.join("static-keys.c")).unwrap(),
            "keys of wsn2"
        );
        assert_eq!(fs::read_to_string(&static_keys).unwrap(), "orig");

        let log = fs::read_to_string(device_dir.join("node.build.log")).unwrap();
        assert!(log.contains("distclean"));
        assert!(log.contains("built node"));
        assert!(!log.contains("built edge"));

        let calls = fs::read_to_string(tools.join("calls")).unwrap();
        let calls: Vec<_> = calls.lines().collect();
        assert_eq!(calls.len(), 4);
        assert!(calls[0].ends_with("/node distclean"));
        assert!(calls[1].contains("/node node BUILD_NUMBER=7 TRUST_MODEL=basic"));
        assert!(calls[1].contains("TARGET=zoul PLATFORM=remote-revb"));
        assert!(calls[2].ends_with("/edge distclean"));
        assert!(calls[3].contains("/edge edge BUILD_NUMBER=7"));

        // A failing build stops the device and the original comes back
        fs::write(tools.join("fail"), "").unwrap();
        let swap = StaticKeysSwap::begin(&static_keys).unwrap();
        let result = builder.build_device(&swap, edge, "other keys");
        drop(swap);
        match result {
            Err(Error::Make { log, stderr, .. }) => {
                assert_eq!(stderr, "no rule to make node\n");
                assert_eq!(Path::new(&log), device_dir.join("node.build.log"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(fs::read_to_string(&static_keys).unwrap(), "orig");
        assert!(!backup_path(&static_keys).exists());
        let calls = fs::read_to_string(tools.join("calls")).unwrap();
        assert_eq!(calls.lines().count(), 6);
    }

    #[cfg(unix)]
    #[test]
    fn log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("node.build.log");
        fs::write(&log, "earlier\n").unwrap();
        let mut echo = Command::new("echo");
        echo.arg("later");
        run(echo, &log, true).unwrap();
        let contents = fs::read_to_string(&log).unwrap();
        assert!(contents.starts_with("earlier\n$ "));
        assert!(contents.ends_with("later\n"));

        // An earlier log that can't be read isn't silently replaced
        let unreadable = dir.path().join("edge.build.log");
        fs::create_dir(&unreadable).unwrap();
        match run(Command::new("true"), &unreadable, true) {
            Err(Error::Io { path, .. }) => assert_eq!(Path::new(&path), unreadable),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn initialiser() {
        assert_eq!(c_initialiser(&[]), "{}");
        assert_eq!(c_initialiser(&[0x00, 0xFF]), "{0x00, 0xff}");
    }
}
