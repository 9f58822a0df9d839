use aes::Aes128;
use ccm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    consts::{U13, U8},
    Ccm,
};

use super::{
    error::Error,
    secret::SecretFile,
    util::{self, KEY_LEN, NONCE_LEN},
    Algorithm, Result,
};

type AesCcm16_64_128 = Ccm<Aes128, U8, U13>;

/// The derived part of an OSCORE security context.
///
/// This is what each endpoint computes from the master secret and salt
/// written by the synthesizer. The tool never protects real traffic, it only
/// uses these to check that both ends of a pair end up with matching keys.
#[derive(Debug, PartialEq)]
pub struct SecurityContext {
    algorithm: Algorithm,
    sender_id: Vec<u8>,
    recipient_id: Vec<u8>,
    sender_key: [u8; KEY_LEN],
    recipient_key: [u8; KEY_LEN],
    common_iv: [u8; NONCE_LEN],
}

impl SecurityContext {
    /// Derives a `SecurityContext` as specified in RFC 8613 §3.2.
    ///
    /// # Arguments
    /// * `algorithm` - The AEAD algorithm.
    /// * `master_secret` - The master secret.
    /// * `master_salt` - The master salt, empty if none is used.
    /// * `sender_id` - Our own id.
    /// * `recipient_id` - The id of the other endpoint.
    /// * `id_context` - The ID context, if any.
    pub fn new(
        algorithm: Algorithm,
        master_secret: &[u8],
        master_salt: &[u8],
        sender_id: &[u8],
        recipient_id: &[u8],
        id_context: Option<&[u8]>,
    ) -> Result<SecurityContext> {
        let key_len = algorithm.key_len();
        let nonce_len = algorithm.nonce_len();

        let sender_key_vec = util::hkdf(
            master_secret,
            master_salt,
            &util::build_info(sender_id, id_context, algorithm, "Key", key_len)?,
            key_len,
        )?;
        let recipient_key_vec = util::hkdf(
            master_secret,
            master_salt,
            &util::build_info(
                recipient_id,
                id_context,
                algorithm,
                "Key",
                key_len,
            )?,
            key_len,
        )?;
        let common_iv_vec = util::hkdf(
            master_secret,
            master_salt,
            &util::build_info(&[], id_context, algorithm, "IV", nonce_len)?,
            nonce_len,
        )?;
        let mut sender_key = [0; KEY_LEN];
        sender_key.copy_from_slice(&sender_key_vec);
        let mut recipient_key = [0; KEY_LEN];
        recipient_key.copy_from_slice(&recipient_key_vec);
        let mut common_iv = [0; NONCE_LEN];
        common_iv.copy_from_slice(&common_iv_vec);

        Ok(SecurityContext {
            algorithm,
            sender_id: sender_id.to_vec(),
            recipient_id: recipient_id.to_vec(),
            sender_key,
            recipient_key,
            common_iv,
        })
    }

    /// Derives the context described by a `secret.json`.
    pub fn from_secret_file(file: &SecretFile) -> Result<SecurityContext> {
        let params = file.parse()?;
        SecurityContext::new(
            params.algorithm,
            &params.master_secret,
            params.master_salt.as_deref().unwrap_or(&[]),
            &params.sender_id,
            &params.recipient_id,
            params.id_context.as_deref(),
        )
    }

    pub fn sender_key(&self) -> &[u8] {
        &self.sender_key
    }

    pub fn recipient_key(&self) -> &[u8] {
        &self.recipient_key
    }

    pub fn common_iv(&self) -> &[u8] {
        &self.common_iv
    }

    /// Encrypts `plaintext` the way a request with partial IV `piv` from
    /// this endpoint would be protected.
    pub fn seal(&self, piv: u64, plaintext: &[u8]) -> Result<Vec<u8>> {
        let piv = util::format_piv(piv);
        let aad = util::build_aad(self.algorithm, &self.sender_id, &piv)?;
        let nonce = util::compute_nonce(&piv, &self.sender_id, &self.common_iv);

        let ccm = AesCcm16_64_128::new(GenericArray::from_slice(&self.sender_key));
        Ok(ccm.encrypt(
            &nonce.into(),
            Payload {
                aad: &aad,
                msg: plaintext,
            },
        )?)
    }

    /// Decrypts a request with partial IV `piv` sent by the other endpoint.
    pub fn open(&self, piv: u64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let piv = util::format_piv(piv);
        let aad = util::build_aad(self.algorithm, &self.recipient_id, &piv)?;
        let nonce =
            util::compute_nonce(&piv, &self.recipient_id, &self.common_iv);

        let ccm =
            AesCcm16_64_128::new(GenericArray::from_slice(&self.recipient_key));
        Ok(ccm.decrypt(
            &nonce.into(),
            Payload {
                aad: &aad,
                msg: ciphertext,
            },
        )?)
    }

    /// Checks that `peer` is the other end of this context: the ids are
    /// swapped, each sender key is the other's recipient key, the common IV
    /// agrees, and a probe sealed on either side opens on the other.
    pub fn check_peer(&self, peer: &SecurityContext) -> Result<()> {
        if self.sender_id != peer.recipient_id
            || self.recipient_id != peer.sender_id
        {
            return Err(Error::Mismatch("ids"));
        }
        if self.sender_key != peer.recipient_key
            || self.recipient_key != peer.sender_key
        {
            return Err(Error::Mismatch("keys"));
        }
        if self.common_iv != peer.common_iv {
            return Err(Error::Mismatch("common IV"));
        }

        let probe = b"trust-setup probe";
        if peer.open(0, &self.seal(0, probe)?)? != probe
            || self.open(1, &peer.seal(1, probe)?)? != probe
        {
            return Err(Error::Mismatch("probe"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER_SECRET: [u8; 16] = [
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
        0x0C, 0x0D, 0x0E, 0x0F, 0x10,
    ];
    const MASTER_SALT: [u8; 8] =
        [0x9E, 0x7C, 0xA9, 0x22, 0x23, 0x78, 0x63, 0x40];
    const ID_CONTEXT: [u8; 8] =
        [0x37, 0xCB, 0xF3, 0x21, 0x00, 0x17, 0xA2, 0xD3];
    const CLIENT_ID: [u8; 0] = [];
    const SERVER_ID: [u8; 1] = [0x01];

    const CLIENT_KEY: [u8; 16] = [
        0xF0, 0x91, 0x0E, 0xD7, 0x29, 0x5E, 0x6A, 0xD4, 0xB5, 0x4F, 0xC7,
        0x93, 0x15, 0x43, 0x02, 0xFF,
    ];
    const SERVER_KEY: [u8; 16] = [
        0xFF, 0xB1, 0x4E, 0x09, 0x3C, 0x94, 0xC9, 0xCA, 0xC9, 0x47, 0x16,
        0x48, 0xB4, 0xF9, 0x87, 0x10,
    ];
    const COMMON_IV: [u8; 13] = [
        0x46, 0x22, 0xD4, 0xDD, 0x6D, 0x94, 0x41, 0x68, 0xEE, 0xFB, 0x54,
        0x98, 0x7C,
    ];

    const CTX_CLIENT_KEY: [u8; 16] = [
        0xAF, 0x2A, 0x13, 0x00, 0xA5, 0xE9, 0x57, 0x88, 0xB3, 0x56, 0x33,
        0x6E, 0xEE, 0xCD, 0x2B, 0x92,
    ];
    const CTX_SERVER_KEY: [u8; 16] = [
        0xE3, 0x9A, 0x0C, 0x7C, 0x77, 0xB4, 0x3F, 0x03, 0xB4, 0xB3, 0x9A,
        0xB9, 0xA2, 0x68, 0x69, 0x9F,
    ];
    const CTX_COMMON_IV: [u8; 13] = [
        0x2C, 0xA5, 0x8F, 0xB8, 0x5F, 0xF1, 0xB8, 0x1C, 0x0B, 0x71, 0x81,
        0xB8, 0x5E,
    ];

    const ALG: Algorithm = Algorithm::AesCcm16_64_128;

    fn client() -> SecurityContext {
        SecurityContext::new(
            ALG,
            &MASTER_SECRET,
            &MASTER_SALT,
            &CLIENT_ID,
            &SERVER_ID,
            None,
        )
        .unwrap()
    }

    fn server() -> SecurityContext {
        SecurityContext::new(
            ALG,
            &MASTER_SECRET,
            &MASTER_SALT,
            &SERVER_ID,
            &CLIENT_ID,
            None,
        )
        .unwrap()
    }

    #[test]
    fn context_derivation() {
        let client = client();
        assert_eq!(client.sender_key(), &CLIENT_KEY);
        assert_eq!(client.recipient_key(), &SERVER_KEY);
        assert_eq!(client.common_iv(), &COMMON_IV);
    }

    #[test]
    fn context_derivation_with_id_context() {
        let client = SecurityContext::new(
            ALG,
            &MASTER_SECRET,
            &MASTER_SALT,
            &CLIENT_ID,
            &SERVER_ID,
            Some(&ID_CONTEXT),
        )
        .unwrap();
        assert_eq!(client.sender_key(), &CTX_CLIENT_KEY);
        assert_eq!(client.recipient_key(), &CTX_SERVER_KEY);
        assert_eq!(client.common_iv(), &CTX_COMMON_IV);
    }

    #[test]
    fn peers_match() {
        client().check_peer(&server()).unwrap();
        server().check_peer(&client()).unwrap();
    }

    #[test]
    fn mismatch_is_detected() {
        let other = SecurityContext::new(
            ALG,
            &[0; 32],
            &MASTER_SALT,
            &SERVER_ID,
            &CLIENT_ID,
            None,
        )
        .unwrap();
        assert!(matches!(
            client().check_peer(&other),
            Err(Error::Mismatch("keys"))
        ));
        assert!(matches!(
            client().check_peer(&client()),
            Err(Error::Mismatch("ids"))
        ));
    }

    #[test]
    fn tampered_ciphertext() {
        let mut sealed = client().seal(5, b"hello").unwrap();
        assert_eq!(server().open(5, &sealed).unwrap(), b"hello");
        sealed[0] ^= 1;
        assert!(matches!(server().open(5, &sealed), Err(Error::Aead)));
        // Wrong piv changes nonce and AAD
        let sealed = client().seal(5, b"hello").unwrap();
        assert!(server().open(6, &sealed).is_err());
    }
}
