use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::debug;

use super::{Error, Result};

/// A remote host and the account used to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub hostname: String,
    pub username: String,
}

impl Host {
    /// Returns `user@host`.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.hostname)
    }
}

/// Moves files onto hosts.
///
/// Remote paths are relative to the login directory. Uploads overwrite
/// existing files so deploying twice gives the same result.
pub trait Transport {
    /// Opens a session to `host`, authenticating if needed.
    fn open(&mut self, host: &Host) -> Result<()>;

    /// Copies the file `local` to `remote`, creating its parent directory.
    fn upload(&mut self, host: &Host, local: &Path, remote: &str) -> Result<()>;

    /// Copies the contents of directory `local` into `remote` recursively.
    fn mirror(&mut self, host: &Host, local: &Path, remote: &str) -> Result<()>;

    /// Closes the session opened by `open`.
    fn close(&mut self, host: &Host) -> Result<()>;
}

/// Copies over SSH, asking for the password once per host.
///
/// `open` starts an OpenSSH control master in the background, which is
/// where the password prompt happens. Uploads then reuse its connection
/// through the control socket.
pub struct SshTransport {
    control_dir: PathBuf,
}

impl SshTransport {
    /// Creates the transport, keeping control sockets in `control_dir`.
    pub fn new(control_dir: impl Into<PathBuf>) -> SshTransport {
        SshTransport {
            control_dir: control_dir.into(),
        }
    }

    fn control_path(&self, host: &Host) -> PathBuf {
        self.control_dir.join(format!("{}.sock", host.destination()))
    }

    /// Returns the `rsync` making `remote` an exact copy of `local`.
    fn rsync(&self, host: &Host, local: &Path, remote: &str) -> Command {
        let mut command = Command::new("rsync");
        command
            .arg("-a")
            // Entries gone locally, such as contexts of removed devices, go
            .arg("--delete")
            .arg("-e")
            .arg(format!("ssh -o {}", self.control_option(host)))
            // Trailing slash copies the contents, not the directory
            .arg(format!("{}/", local.display()))
            .arg(format!("{}:{}/", host.destination(), remote));
        command
    }

    fn control_option(&self, host: &Host) -> String {
        format!("ControlPath={}", self.control_path(host).display())
    }

    fn ssh(&self, host: &Host) -> Command {
        let mut command = Command::new("ssh");
        command
            .arg("-o")
            .arg(self.control_option(host))
            .arg(host.destination());
        command
    }

    fn mkdir(&self, host: &Host, dir: &str) -> Result<()> {
        let mut command = self.ssh(host);
        command.arg("mkdir").arg("-p").arg(dir);
        run(command)
    }
}

impl Transport for SshTransport {
    fn open(&mut self, host: &Host) -> Result<()> {
        fs::create_dir_all(&self.control_dir)
            .map_err(|e| Error::io(&self.control_dir, e))?;

        let mut command = Command::new("ssh");
        command
            .args(["-o", "ControlMaster=yes"])
            .arg("-o")
            .arg(self.control_option(host))
            .args(["-o", "ControlPersist=yes", "-N", "-f"])
            .arg(host.destination());
        // Inherits the terminal for the password prompt
        let shown = format!("{:?}", command);
        let status = command.status().map_err(|source| Error::Spawn {
            command: shown.clone(),
            source,
        })?;
        if !status.success() {
            return Err(Error::Command {
                command: shown,
                status: status.to_string(),
                stderr: String::new(),
            });
        }

        Ok(())
    }

    fn upload(&mut self, host: &Host, local: &Path, remote: &str) -> Result<()> {
        if let Some(parent) = parent_dir(remote) {
            self.mkdir(host, parent)?;
        }

        let mut command = Command::new("scp");
        command
            .arg("-o")
            .arg(self.control_option(host))
            .arg(local)
            .arg(format!("{}:{}", host.destination(), remote));
        run(command)
    }

    fn mirror(&mut self, host: &Host, local: &Path, remote: &str) -> Result<()> {
        self.mkdir(host, remote)?;
        run(self.rsync(host, local, remote))
    }

    fn close(&mut self, host: &Host) -> Result<()> {
        let mut command = Command::new("ssh");
        command
            .arg("-o")
            .arg(self.control_option(host))
            .args(["-O", "exit"])
            .arg(host.destination());
        run(command)
    }
}

/// Copies into `<root>/<hostname>/` on the local file system.
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>) -> LocalTransport {
        LocalTransport { root: root.into() }
    }

    /// Returns where `remote` on `host` ends up locally.
    pub fn path(&self, host: &Host, remote: &str) -> PathBuf {
        self.root.join(&host.hostname).join(remote)
    }
}

impl Transport for LocalTransport {
    fn open(&mut self, host: &Host) -> Result<()> {
        let dir = self.root.join(&host.hostname);
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))
    }

    fn upload(&mut self, host: &Host, local: &Path, remote: &str) -> Result<()> {
        let target = self.path(host, remote);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::copy(local, &target).map_err(|e| Error::io(local, e))?;

        Ok(())
    }

    fn mirror(&mut self, host: &Host, local: &Path, remote: &str) -> Result<()> {
        let target = self.path(host, remote);
        match fs::remove_dir_all(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&target, e)),
        }
        copy_dir(local, &target)
    }

    fn close(&mut self, _host: &Host) -> Result<()> {
        Ok(())
    }
}

/// Logs what would be copied without copying anything.
#[derive(Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn open(&mut self, host: &Host) -> Result<()> {
        debug!(host = %host.destination(), "Not connecting");
        Ok(())
    }

    fn upload(&mut self, _host: &Host, _local: &Path, _remote: &str) -> Result<()> {
        Ok(())
    }

    fn mirror(&mut self, _host: &Host, _local: &Path, _remote: &str) -> Result<()> {
        Ok(())
    }

    fn close(&mut self, _host: &Host) -> Result<()> {
        Ok(())
    }
}

fn parent_dir(remote: &str) -> Option<&str> {
    remote
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).map_err(|e| Error::io(to, e))?;
    for entry in fs::read_dir(from).map_err(|e| Error::io(from, e))? {
        let entry = entry.map_err(|e| Error::io(from, e))?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        if source.is_dir() {
            copy_dir(&source, &target)?;
        } else {
            fs::copy(&source, &target).map_err(|e| Error::io(&source, e))?;
        }
    }

    Ok(())
}

fn run(mut command: Command) -> Result<()> {
    let shown = format!("{:?}", command);
    debug!(command = %shown, "Running");
    let output = command.output().map_err(|source| Error::Spawn {
        command: shown.clone(),
        source,
    })?;
    if !output.status.success() {
        return Err(Error::Command {
            command: shown,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(())
}
