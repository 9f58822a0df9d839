use std::{fs, io, path::Path};
use tracing::info;

use super::{Error, Result};

/// Name of the file in `setup/` holding the last build number.
pub const BUILD_NUMBER_FILE: &str = "build_number";

/// Increments the build number stored in `setup_dir` and returns it.
///
/// The first run in a fresh tree gets 1.
pub fn next_build_number(setup_dir: &Path) -> Result<u32> {
    let path = setup_dir.join(BUILD_NUMBER_FILE);
    let previous = match fs::read_to_string(&path) {
        Ok(content) => content
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::InvalidBuildNumber(content.trim().to_string()))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(Error::io(&path, e)),
    };

    let next = previous
        .checked_add(1)
        .ok_or_else(|| Error::InvalidBuildNumber(previous.to_string()))?;
    fs::write(&path, next.to_string()).map_err(|e| Error::io(&path, e))?;
    info!(build_number = next, "Incremented build number");

    Ok(next)
}
