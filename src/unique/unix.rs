use crate::unique::{get_lock_path, Error};
use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
enum PlatformError {
    #[error("Failed to open lock file: {0}")]
    Open(#[source] std::io::Error),
    #[error("Failed to call flock: {0}")]
    Flock(#[source] Errno),
}

// Holding the open file keeps the advisory lock, closing it releases the lock
#[derive(Debug)]
pub struct UninstallerInstance {
    _file: File,
}

impl UninstallerInstance {
    pub fn try_acquire() -> Result<UninstallerInstance, Error> {
        Self::try_acquire_at(&get_lock_path())
    }

    pub fn try_acquire_at(path: &Path) -> Result<UninstallerInstance, Error> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .map_err(|e| Error::PlatformError(Box::new(PlatformError::Open(e))))?;
        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {
                log::debug!("Acquired lock {}", path.display());
                Ok(UninstallerInstance { _file: file })
            }
            Err(Errno::EWOULDBLOCK) => Err(Error::AlreadyRunning(path.to_owned())),
            Err(e) => Err(Error::PlatformError(Box::new(PlatformError::Flock(e)))),
        }
    }
}
