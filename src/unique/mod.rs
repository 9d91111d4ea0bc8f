//! Utility to ensure a single instance of the uninstaller is running

use std::path::PathBuf;
use thiserror::Error;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use self::unix as platform;
    } else {
        compile_error!("unsupported platform");
    }
}

pub use platform::UninstallerInstance;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to check if the uninstaller is already running: {0}")]
    PlatformError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("The uninstaller is already running (lock held on {})", .0.display())]
    AlreadyRunning(PathBuf),
}

/// Location of the lock file shared by every front-end
pub fn get_lock_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(format!("{}.lock", crate::common::APP_DIRECTORY_NAME))
}
