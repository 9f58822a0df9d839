//! Provisioning of a wireless sensor network trust deployment.
//!
//! From a configured identity map, this derives a deterministic P-256
//! keypair for every device, has the root device sign a compact certificate
//! for each of them, and synthesizes the pairwise
//! [OSCORE](https://tools.ietf.org/html/rfc8613) contexts between root and
//! every other device from ECDH shared secrets. It then renders the
//! per-device `static-keys.c`, builds the firmware with `make` and copies
//! everything onto the hosts.
//!
//! All key material is a pure function of the device addresses, so running
//! the tool twice on the same configuration gives identical keys and
//! certificates, which is what lets rebuilt firmware keep working with an
//! existing keystore.
//!
//! ## Security
//! The keys are derived from public addresses. This is meant for testbeds,
//! **not for production deployments**.

// Unusual byte groupings are used for consistency with RFC.
#[allow(clippy::unusual_byte_groupings)]
pub mod cbor;

pub mod build;
pub mod cert;
pub mod codegen;
pub mod config;
pub mod deploy;
pub mod identity;
pub mod keystore;
pub mod oscore;
pub mod pipeline;

#[cfg_attr(tarpaulin, skip)]
mod error;
pub use error::{Error, ErrorKind};

/// The result type of a provisioning run.
pub type Result<T> = std::result::Result<T, Error>;
