//! OSCORE context synthesis.
//!
//! For every non-root device, the root and the device share a master secret
//! obtained through ECDH over their deterministic keypairs. The synthesizer
//! writes one `secret.json` per device for the gateway, a flat file listing
//! every ordered pair for an external packet analyser, and checks that both
//! ends of each pair derive matching keys (RFC 8613 §3.2).

mod analyser;
mod context;
#[cfg_attr(tarpaulin, skip)]
mod error;
mod secret;
mod util;

pub use analyser::{analyser_lines, write_analyser_file};
pub use context::SecurityContext;
pub use error::Error;
pub use secret::{
    check_contexts, write_contexts, Member, PairwiseContext, SecretFile,
    SecretParams, SECRET_FILE,
};

/// The result type for the `oscore` module.
pub type Result<T> = std::result::Result<T, Error>;

/// Size of the replay window announced to the gateway.
pub const REPLAY_WINDOW: u32 = 32;
/// Length of the master salt.
pub const MASTER_SALT_LEN: usize = 16;
/// The master salt shared by every pair, unless configured otherwise.
pub const DEFAULT_MASTER_SALT: [u8; MASTER_SALT_LEN] = [
    0x64, 0x2B, 0x2B, 0x8E, 0x9D, 0x0C, 0x42, 0x63, 0x92, 0x4C, 0xEA, 0xFC,
    0xF7, 0x03, 0x8B, 0x26,
];

/// The AEAD algorithms a context can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    AesCcm16_64_128,
}

impl Algorithm {
    /// The name used in `secret.json`.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::AesCcm16_64_128 => "AES-CCM-16-64-128",
        }
    }

    /// The label the packet analyser uses for this algorithm.
    pub fn analyser_label(self) -> &'static str {
        match self {
            Algorithm::AesCcm16_64_128 => "AES-CCM-16-64-128 (CCM*)",
        }
    }

    /// The COSE algorithm identifier.
    pub fn cose_id(self) -> u8 {
        match self {
            Algorithm::AesCcm16_64_128 => 10,
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            Algorithm::AesCcm16_64_128 => util::KEY_LEN,
        }
    }

    pub fn nonce_len(self) -> usize {
        match self {
            Algorithm::AesCcm16_64_128 => util::NONCE_LEN,
        }
    }

    pub fn from_name(name: &str) -> Option<Algorithm> {
        match name {
            "AES-CCM-16-64-128" => Some(Algorithm::AesCcm16_64_128),
            _ => None,
        }
    }
}

/// The hash function of the HKDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfHash {
    Sha256,
}

impl KdfHash {
    pub fn name(self) -> &'static str {
        match self {
            KdfHash::Sha256 => "sha256",
        }
    }

    pub fn from_name(name: &str) -> Option<KdfHash> {
        match name {
            "sha256" => Some(KdfHash::Sha256),
            _ => None,
        }
    }
}

/// Parameters shared by every context of a deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub algorithm: Algorithm,
    pub kdf: KdfHash,
    pub master_salt: Option<Vec<u8>>,
    pub id_context: Option<Vec<u8>>,
}

impl Params {
    /// Creates the parameters, checking the salt length.
    pub fn new(
        master_salt: Option<Vec<u8>>,
        id_context: Option<Vec<u8>>,
    ) -> Result<Params> {
        if let Some(salt) = &master_salt {
            if salt.len() != MASTER_SALT_LEN {
                return Err(Error::SaltLength(salt.len()));
            }
        }

        Ok(Params {
            master_salt,
            id_context,
            ..Params::default()
        })
    }
}

impl Default for Params {
    fn default() -> Params {
        Params {
            algorithm: Algorithm::AesCcm16_64_128,
            kdf: KdfHash::Sha256,
            master_salt: Some(DEFAULT_MASTER_SALT.to_vec()),
            id_context: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names() {
        let alg = Algorithm::AesCcm16_64_128;
        assert_eq!(Algorithm::from_name(alg.name()), Some(alg));
        assert_eq!(alg.analyser_label(), "AES-CCM-16-64-128 (CCM*)");
        assert_eq!(alg.cose_id(), 10);
        assert_eq!(Algorithm::from_name("AES-CCM-16-64-256"), None);
        assert_eq!(KdfHash::from_name("sha256"), Some(KdfHash::Sha256));
    }

    #[test]
    fn salt_length() {
        assert!(Params::new(Some(vec![0; 16]), None).is_ok());
        assert!(Params::new(None, Some(vec![1, 2])).is_ok());
        assert!(matches!(
            Params::new(Some(vec![0; 8]), None),
            Err(Error::SaltLength(8))
        ));
    }
}
