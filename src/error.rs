use std::{error, fmt, io, path::Path};

use crate::{build, cert, config, deploy, identity, keystore, oscore};

/// The broad classes of failure, none of which is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad identity map, parameters or command line choices.
    Configuration,
    /// Key material or certificates that can't be built or don't verify.
    Cryptographic,
    /// Reading or writing local files.
    Io,
    /// `make`, `ssh`, `scp` or `rsync` failed.
    ExternalTool,
    /// Two devices share an OSCORE id.
    IdentityCollision,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Cryptographic => "cryptographic",
            ErrorKind::Io => "I/O",
            ErrorKind::ExternalTool => "external tool",
            ErrorKind::IdentityCollision => "identity collision",
        };
        f.write_str(name)
    }
}

/// The error type of a provisioning run, wrapping the module errors.
#[derive(Debug)]
pub enum Error {
    Config(config::Error),
    Identity(identity::Error),
    Keystore(keystore::Error),
    Cert(cert::Error),
    Oscore(oscore::Error),
    Build(build::Error),
    Deploy(deploy::Error),
    /// A certificate read back from the keystore isn't the one issued.
    CertificateMismatch(String),
    /// Preparing the setup directory failed.
    Io { path: String, source: io::Error },
}

impl Error {
    pub(crate) fn io(path: &Path, source: io::Error) -> Error {
        Error::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Returns the class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(e) => match e {
                config::Error::Identity(e) => identity_kind(e),
                config::Error::Io { .. } => ErrorKind::Io,
                _ => ErrorKind::Configuration,
            },
            Error::Identity(e) => identity_kind(e),
            Error::Keystore(e) => keystore_kind(e),
            Error::Cert(e) => match e {
                cert::Error::Keystore(e) => keystore_kind(e),
                _ => ErrorKind::Cryptographic,
            },
            Error::Oscore(e) => match e {
                oscore::Error::ContextExists { .. } => {
                    ErrorKind::IdentityCollision
                }
                oscore::Error::SaltLength(_) => ErrorKind::Configuration,
                oscore::Error::Io { .. } | oscore::Error::Json(_) => {
                    ErrorKind::Io
                }
                oscore::Error::Keystore(e) => keystore_kind(e),
                _ => ErrorKind::Cryptographic,
            },
            Error::Build(e) => match e {
                build::Error::Spawn { .. } | build::Error::Make { .. } => {
                    ErrorKind::ExternalTool
                }
                build::Error::Io { .. } => ErrorKind::Io,
                _ => ErrorKind::Configuration,
            },
            Error::Deploy(e) => match e {
                deploy::Error::Io { .. } => ErrorKind::Io,
                _ => ErrorKind::ExternalTool,
            },
            Error::CertificateMismatch(_) => ErrorKind::Cryptographic,
            Error::Io { .. } => ErrorKind::Io,
        }
    }
}

fn identity_kind(e: &identity::Error) -> ErrorKind {
    match e {
        identity::Error::OscoreIdCollision { .. } => ErrorKind::IdentityCollision,
        _ => ErrorKind::Configuration,
    }
}

fn keystore_kind(e: &keystore::Error) -> ErrorKind {
    match e {
        keystore::Error::Io { .. } => ErrorKind::Io,
        _ => ErrorKind::Cryptographic,
    }
}

impl From<config::Error> for Error {
    fn from(e: config::Error) -> Error {
        Error::Config(e)
    }
}

impl From<identity::Error> for Error {
    fn from(e: identity::Error) -> Error {
        Error::Identity(e)
    }
}

impl From<keystore::Error> for Error {
    fn from(e: keystore::Error) -> Error {
        Error::Keystore(e)
    }
}

impl From<cert::Error> for Error {
    fn from(e: cert::Error) -> Error {
        Error::Cert(e)
    }
}

impl From<oscore::Error> for Error {
    fn from(e: oscore::Error) -> Error {
        Error::Oscore(e)
    }
}

impl From<build::Error> for Error {
    fn from(e: build::Error) -> Error {
        Error::Build(e)
    }
}

impl From<deploy::Error> for Error {
    fn from(e: deploy::Error) -> Error {
        Error::Deploy(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "{}", e),
            Error::Identity(e) => write!(f, "{}", e),
            Error::Keystore(e) => write!(f, "{}", e),
            Error::Cert(e) => write!(f, "{}", e),
            Error::Oscore(e) => write!(f, "{}", e),
            Error::Build(e) => write!(f, "{}", e),
            Error::Deploy(e) => write!(f, "{}", e),
            Error::CertificateMismatch(hostname) => write!(
                f,
                "Certificate of {} read back from the keystore differs",
                hostname
            ),
            Error::Io { path, source } => write!(f, "{}: {}", path, source),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Config(e) => error::Error::source(e),
            Error::Identity(e) => error::Error::source(e),
            Error::Keystore(e) => error::Error::source(e),
            Error::Cert(e) => error::Error::source(e),
            Error::Oscore(e) => error::Error::source(e),
            Error::Build(e) => error::Error::source(e),
            Error::Deploy(e) => error::Error::source(e),
            Error::CertificateMismatch(_) => None,
            Error::Io { source, .. } => Some(source),
        }
    }
}
