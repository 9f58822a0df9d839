use std::{fs, path::PathBuf};
use tracing::info;

use crate::keystore::Keystore;

use super::{error::Error, secret::Member, PairwiseContext, Params, Result};

/// Returns one line per ordered pair of distinct members.
///
/// Each line holds six quoted fields: sender id, recipient id, master secret,
/// master salt, id context and the analyser's algorithm label. Missing salt or
/// id context are empty strings.
pub fn analyser_lines(members: &[Member], params: &Params) -> Vec<String> {
    let salt = params.master_salt.as_ref().map(hex::encode).unwrap_or_default();
    let id_context =
        params.id_context.as_ref().map(hex::encode).unwrap_or_default();
    let label = params.algorithm.analyser_label();

    let mut lines = Vec::with_capacity(members.len() * members.len());
    for (i, &sender) in members.iter().enumerate() {
        for (j, &recipient) in members.iter().enumerate() {
            if i == j {
                continue;
            }
            let context = PairwiseContext::derive(sender, recipient);
            lines.push(format!(
                "\"{}\",\"{}\",\"{}\",\"{}\",\"{}\",\"{}\"",
                hex::encode(context.sender_id),
                hex::encode(context.recipient_id),
                hex::encode(context.master_secret),
                salt,
                id_context,
                label
            ));
        }
    }

    lines
}

/// Writes `oscore.contexts.uat` into the keystore.
pub fn write_analyser_file(
    keystore: &Keystore,
    members: &[Member],
    params: &Params,
) -> Result<PathBuf> {
    let lines = analyser_lines(members, params);
    let mut contents = lines.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }

    let path = keystore.analyser_path();
    fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
    info!(path = %path.display(), pairs = lines.len(), "Saved analyser contexts");

    Ok(path)
}
