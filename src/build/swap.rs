use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

use super::{Error, Result};

/// Returns the path of the backup of `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".orig");
    PathBuf::from(name)
}

/// Restores the backup an interrupted run left behind, if there is one.
///
/// Returns whether a backup was restored.
pub fn recover_static_keys(path: &Path) -> Result<bool> {
    let backup = backup_path(path);
    if !backup.exists() {
        return Ok(false);
    }

    warn!(
        path = %path.display(),
        "Previous run was interrupted, restoring backup"
    );
    fs::rename(&backup, path).map_err(|e| Error::io(&backup, e))?;

    Ok(true)
}

/// Holds the firmware tree's `static-keys.c` while device files replace it.
///
/// The original is moved aside when the swap begins and put back by
/// `restore`, or when the guard is dropped without being restored.
#[derive(Debug)]
pub struct StaticKeysSwap {
    path: PathBuf,
    backup: Option<PathBuf>,
    restored: bool,
}

impl StaticKeysSwap {
    /// Moves the current file at `path` aside, if there is one.
    pub fn begin(path: &Path) -> Result<StaticKeysSwap> {
        let backup = if path.exists() {
            let backup = backup_path(path);
            fs::rename(path, &backup).map_err(|e| Error::io(path, e))?;
            debug!(backup = %backup.display(), "Backed up static keys");
            Some(backup)
        } else {
            None
        };

        Ok(StaticKeysSwap {
            path: path.to_path_buf(),
            backup,
            restored: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the file with `contents`.
    pub fn install(&self, contents: &str) -> Result<()> {
        fs::write(&self.path, contents).map_err(|e| Error::io(&self.path, e))
    }

    /// Puts the original back, or removes the installed file if there was
    /// none.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        self.put_back()
    }

    fn put_back(&self) -> Result<()> {
        match &self.backup {
            Some(backup) => {
                fs::rename(backup, &self.path).map_err(|e| Error::io(backup, e))?
            }
            None if self.path.exists() => fs::remove_file(&self.path)
                .map_err(|e| Error::io(&self.path, e))?,
            None => {}
        }
        info!(path = %self.path.display(), "Restored static keys");

        Ok(())
    }
}

impl Drop for StaticKeysSwap {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(e) = self.put_back() {
                error!("Failed restoring static keys: {}", e);
            }
        }
    }
}
