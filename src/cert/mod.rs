//! Compact certificates binding an EUI-64 to a P-256 public key.
//!
//! A certificate is the CBOR array `[tbs, signature]` where
//!
//! ```text
//! tbs = [serial, issuer, [valid_from, valid_to], subject, tags, public_key]
//! ```
//!
//! `issuer` and `subject` are 8 byte strings holding EUI-64s, `tags` is the
//! array of stereotype tags, `public_key` is the 64 byte string x‖y and
//! `signature` the 64 byte string r‖s of an ECDSA-SHA256 signature over the
//! encoded `tbs`. The firmware decodes exactly this layout, so the field order
//! must not change.

use p256::{
    ecdsa::{
        signature::{Signer, Verifier},
        Signature, VerifyingKey,
    },
    PublicKey,
};
use serde_bytes::{ByteBuf, Bytes};
use std::{convert::TryInto, fs};
use tracing::info;

use crate::{
    cbor,
    identity::{Device, Eui64, StereotypeTags},
    keystore::{self, Keypair, Keystore, PUBLIC_KEY_LEN},
};

#[cfg_attr(tarpaulin, skip)]
mod error;
pub use error::Error;

/// The result type for the `cert` module.
pub type Result<T> = std::result::Result<T, Error>;

/// Length of a fixed-width r‖s signature.
pub const SIGNATURE_LEN: usize = 64;
/// Upper validity bound of certificates that never expire.
pub const VALID_FOREVER: u32 = u32::MAX;

/// The wire shape of the TBS part.
type RawTbs = (u32, ByteBuf, (u32, u32), ByteBuf, StereotypeTags, ByteBuf);

/// The to-be-signed body of a certificate.
#[derive(Debug, Clone, PartialEq)]
pub struct Tbs {
    pub serial: u32,
    pub issuer: Eui64,
    pub valid_from: u32,
    pub valid_to: u32,
    pub subject: Eui64,
    pub tags: StereotypeTags,
    pub public_key: [u8; PUBLIC_KEY_LEN],
}

impl Tbs {
    /// Builds a TBS, validating the widths of the raw fields.
    ///
    /// # Arguments
    /// * `serial` - The serial number, unique within a run.
    /// * `issuer` - The 8 byte EUI-64 of the issuer.
    /// * `valid_from` - Start of validity.
    /// * `valid_to` - End of validity, never expiring if `None`.
    /// * `subject` - The 8 byte EUI-64 of the subject.
    /// * `tags` - The subject's stereotype tags.
    /// * `public_key` - The subject's public key as x‖y.
    pub fn new(
        serial: u32,
        issuer: &[u8],
        valid_from: u32,
        valid_to: Option<u32>,
        subject: &[u8],
        tags: StereotypeTags,
        public_key: &[u8],
    ) -> Result<Tbs> {
        // Make sure it's a point on the curve, not only 64 bytes
        keystore::public_key_from_raw(public_key)?;

        Ok(Tbs {
            serial,
            issuer: eui64_field("issuer", issuer)?,
            valid_from,
            valid_to: valid_to.unwrap_or(VALID_FOREVER),
            subject: eui64_field("subject", subject)?,
            tags,
            public_key: fixed_field("public key", public_key)?,
        })
    }

    /// Returns the CBOR encoding the signature is computed over.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(cbor::encode(self.as_raw())?)
    }

    /// Returns the subject's public key.
    pub fn subject_public_key(&self) -> Result<PublicKey> {
        Ok(keystore::public_key_from_raw(&self.public_key)?)
    }

    /// Returns a tuple that serializes into the wire format.
    #[allow(clippy::type_complexity)]
    fn as_raw(
        &self,
    ) -> (u32, Eui64, (u32, u32), Eui64, StereotypeTags, &Bytes) {
        (
            self.serial,
            self.issuer,
            (self.valid_from, self.valid_to),
            self.subject,
            self.tags,
            Bytes::new(&self.public_key),
        )
    }

    fn from_raw(raw: RawTbs) -> Result<Tbs> {
        let (serial, issuer, (valid_from, valid_to), subject, tags, public_key) =
            raw;
        Tbs::new(
            serial,
            &issuer,
            valid_from,
            Some(valid_to),
            &subject,
            tags,
            &public_key,
        )
    }
}

/// A TBS together with the issuer's signature over it.
#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    pub tbs: Tbs,
    pub signature: [u8; SIGNATURE_LEN],
}

impl Certificate {
    /// Signs `tbs` with ECDSA-SHA256.
    ///
    /// The nonce is derived from the key and message (RFC 6979), so signing
    /// the same TBS with the same key always gives the same certificate.
    pub fn sign(tbs: Tbs, signer: &Keypair) -> Result<Certificate> {
        let message = tbs.encode()?;
        let signature: Signature = signer.signing_key().sign(&message);
        let signature = fixed_field("signature", &signature.to_bytes())?;

        Ok(Certificate { tbs, signature })
    }

    /// Checks the signature against the issuer's public key.
    pub fn verify(&self, issuer: &PublicKey) -> Result<()> {
        let message = self.tbs.encode()?;
        let signature = Signature::from_slice(&self.signature)?;

        Ok(VerifyingKey::from(issuer).verify(&message, &signature)?)
    }

    /// Returns the binary certificate.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(cbor::encode((self.tbs.as_raw(), Bytes::new(&self.signature)))?)
    }

    /// Parses a binary certificate.
    pub fn decode(bytes: &[u8]) -> Result<Certificate> {
        // Only the top-level pair is accepted
        match cbor::array_len(bytes)? {
            2 => {}
            n => return Err(Error::NotAPair(n)),
        }
        let (tbs, signature): (RawTbs, ByteBuf) = cbor::decode(bytes)?;

        Ok(Certificate {
            tbs: Tbs::from_raw(tbs)?,
            signature: fixed_field("signature", &signature)?,
        })
    }

    /// Splits the signature into its r and s halves.
    pub fn signature_parts(&self) -> (&[u8], &[u8]) {
        self.signature.split_at(SIGNATURE_LEN / 2)
    }
}

/// Issues certificates for a deployment, handing out serial numbers in
/// order starting at 0.
pub struct CertificateAuthority {
    signer: Keypair,
    issuer: Eui64,
    valid_from: u32,
    valid_to: Option<u32>,
    next_serial: u32,
}

impl CertificateAuthority {
    /// Creates the authority of the root device.
    ///
    /// # Arguments
    /// * `root` - The root device, which is the issuer of all certificates.
    /// * `signer` - Root's keypair.
    /// * `valid_from` - Start of validity of every issued certificate.
    /// * `valid_to` - End of validity, never expiring if `None`.
    pub fn new(
        root: &Device,
        signer: Keypair,
        valid_from: u32,
        valid_to: Option<u32>,
    ) -> CertificateAuthority {
        CertificateAuthority {
            signer,
            issuer: root.eui64,
            valid_from,
            valid_to,
            next_serial: 0,
        }
    }

    /// Returns the public key certificates are verified with.
    pub fn public_key(&self) -> PublicKey {
        self.signer.public_key()
    }

    /// Returns the number of certificates issued so far.
    pub fn issued(&self) -> u32 {
        self.next_serial
    }

    /// Issues the certificate of `device` for its public key.
    pub fn issue(
        &mut self,
        device: &Device,
        public_key: &PublicKey,
    ) -> Result<Certificate> {
        let tbs = Tbs::new(
            self.next_serial,
            self.issuer.as_bytes(),
            self.valid_from,
            self.valid_to,
            device.eui64.as_bytes(),
            device.tags(),
            &keystore::raw_public_key(public_key),
        )?;
        let certificate = Certificate::sign(tbs, &self.signer)?;
        self.next_serial += 1;

        Ok(certificate)
    }
}

/// Writes the certificate of the device with `address` into the keystore.
pub fn write_certificate(
    keystore: &Keystore,
    address: &str,
    certificate: &Certificate,
) -> Result<()> {
    let path = keystore.cert_path(address);
    keystore::write(&path, &certificate.encode()?)?;
    info!(
        path = %path.display(),
        serial = certificate.tbs.serial,
        subject = %certificate.tbs.subject,
        "Saved certificate"
    );

    Ok(())
}

/// Reads the certificate of the device with `address` from the keystore.
pub fn read_certificate(keystore: &Keystore, address: &str) -> Result<Certificate> {
    let path = keystore.cert_path(address);
    let bytes =
        fs::read(&path).map_err(|e| keystore::Error::io(&path, e))?;

    Certificate::decode(&bytes)
}

fn eui64_field(field: &'static str, bytes: &[u8]) -> Result<Eui64> {
    Ok(Eui64::new(fixed_field(field, bytes)?))
}

fn fixed_field<const N: usize>(
    field: &'static str,
    bytes: &[u8],
) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| Error::FieldLength {
        field,
        expected: N,
        found: bytes.len(),
    })
}
