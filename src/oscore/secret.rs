use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::{debug, info};

use crate::{
    identity::{Device, ID_LEN},
    keystore::{Keypair, Keystore},
};

use super::{
    error::Error, Algorithm, KdfHash, Params, Result, SecurityContext,
    REPLAY_WINDOW,
};

/// Name of the file holding a context inside its directory.
pub const SECRET_FILE: &str = "secret.json";

/// A device together with its keypair.
#[derive(Clone, Copy)]
pub struct Member<'a> {
    pub device: &'a Device,
    pub keypair: &'a Keypair,
}

/// The master secret and ids shared by a sender and a recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseContext {
    pub sender_id: [u8; ID_LEN],
    pub recipient_id: [u8; ID_LEN],
    pub master_secret: [u8; 32],
}

impl PairwiseContext {
    /// Derives the context of `sender` talking to `recipient`.
    ///
    /// Since ECDH is commutative, the context derived for the opposite
    /// direction has the same master secret with the ids swapped.
    pub fn derive(sender: Member, recipient: Member) -> PairwiseContext {
        PairwiseContext {
            sender_id: sender.device.eui64.oscore_id(),
            recipient_id: recipient.device.eui64.oscore_id(),
            master_secret: sender
                .keypair
                .shared_secret(&recipient.keypair.public_key()),
        }
    }
}

/// The contents of a `secret.json`, as read by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretFile {
    pub algorithm: String,
    #[serde(rename = "kdf-hashfun")]
    pub kdf_hashfun: String,
    pub window: u32,
    #[serde(rename = "sender-id_hex")]
    pub sender_id_hex: String,
    #[serde(rename = "recipient-id_hex")]
    pub recipient_id_hex: String,
    pub secret_hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt_hex: Option<String>,
    #[serde(
        rename = "id-context_hex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id_context_hex: Option<String>,
}

/// The decoded values of a `SecretFile`.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretParams {
    pub algorithm: Algorithm,
    pub sender_id: Vec<u8>,
    pub recipient_id: Vec<u8>,
    pub master_secret: Vec<u8>,
    pub master_salt: Option<Vec<u8>>,
    pub id_context: Option<Vec<u8>>,
}

impl SecretFile {
    /// Builds the file describing `context` under the deployment `params`.
    pub fn new(context: &PairwiseContext, params: &Params) -> SecretFile {
        SecretFile {
            algorithm: params.algorithm.name().to_string(),
            kdf_hashfun: params.kdf.name().to_string(),
            window: REPLAY_WINDOW,
            sender_id_hex: hex::encode(context.sender_id),
            recipient_id_hex: hex::encode(context.recipient_id),
            secret_hex: hex::encode(context.master_secret),
            salt_hex: params.master_salt.as_ref().map(hex::encode),
            id_context_hex: params.id_context.as_ref().map(hex::encode),
        }
    }

    /// Returns the JSON with 4 space indentation.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;

        String::from_utf8(buf).map_err(|_| Error::InvalidField("json"))
    }

    /// Decodes algorithm and hex fields.
    pub fn parse(&self) -> Result<SecretParams> {
        let algorithm = Algorithm::from_name(&self.algorithm)
            .ok_or(Error::InvalidField("algorithm"))?;
        KdfHash::from_name(&self.kdf_hashfun)
            .ok_or(Error::InvalidField("kdf-hashfun"))?;

        Ok(SecretParams {
            algorithm,
            sender_id: decode_hex("sender-id_hex", &self.sender_id_hex)?,
            recipient_id: decode_hex("recipient-id_hex", &self.recipient_id_hex)?,
            master_secret: decode_hex("secret_hex", &self.secret_hex)?,
            master_salt: self
                .salt_hex
                .as_deref()
                .map(|s| decode_hex("salt_hex", s))
                .transpose()?,
            id_context: self
                .id_context_hex
                .as_deref()
                .map(|s| decode_hex("id-context_hex", s))
                .transpose()?,
        })
    }

    /// Reads a `secret.json`.
    pub fn read(path: &std::path::Path) -> Result<SecretFile> {
        let json = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

        Ok(serde_json::from_str(&json)?)
    }
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|_| Error::InvalidField(field))
}

/// Writes one `oscore-contexts/<recipient-id>/secret.json` per peer of root.
///
/// The root is the sender of every context. A directory that already exists
/// means two devices ended up with the same recipient id, which is fatal.
/// Returns the paths written, in peer order.
///
/// # Arguments
/// * `keystore` - The keystore to write into.
/// * `root` - The root device and its keypair.
/// * `peers` - Every other device and its keypair.
/// * `params` - The deployment-wide OSCORE parameters.
pub fn write_contexts(
    keystore: &Keystore,
    root: Member,
    peers: &[Member],
    params: &Params,
) -> Result<Vec<PathBuf>> {
    let contexts_dir = keystore.contexts_dir();
    fs::create_dir_all(&contexts_dir)
        .map_err(|e| Error::io(&contexts_dir, e))?;

    let mut written = Vec::with_capacity(peers.len());
    for &peer in peers {
        let context = PairwiseContext::derive(root, peer);
        let dir = contexts_dir.join(hex::encode(context.recipient_id));
        // create_dir fails if it exists, that's the collision check
        fs::create_dir(&dir).map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Error::ContextExists {
                hostname: peer.device.hostname.clone(),
                path: dir.display().to_string(),
            },
            _ => Error::io(&dir, e),
        })?;

        let path = dir.join(SECRET_FILE);
        let json = SecretFile::new(&context, params).to_json()?;
        fs::write(&path, json).map_err(|e| Error::io(&path, e))?;
        debug!(
            sender = %hex::encode(context.sender_id),
            recipient = %hex::encode(context.recipient_id),
            "Derived context"
        );
        info!(hostname = %peer.device.hostname, path = %path.display(), "Saved OSCORE context");
        written.push(path);
    }

    Ok(written)
}

/// Reads back every `secret.json` written for `peers` and checks it against
/// the context the peer derives with its own private key.
pub fn check_contexts(
    keystore: &Keystore,
    root: Member,
    peers: &[Member],
    params: &Params,
) -> Result<()> {
    for &peer in peers {
        let path = keystore
            .contexts_dir()
            .join(peer.device.eui64.oscore_id_hex())
            .join(SECRET_FILE);
        let ours = SecurityContext::from_secret_file(&SecretFile::read(&path)?)?;
        let mirrored = SecretFile::new(&PairwiseContext::derive(peer, root), params);
        let theirs = SecurityContext::from_secret_file(&mirrored)?;
        ours.check_peer(&theirs)?;
        debug!(hostname = %peer.device.hostname, "Context agrees with peer");
    }
    info!(contexts = peers.len(), "Checked OSCORE contexts");

    Ok(())
}
