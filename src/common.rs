//! Common constants and helper functions used in both the dialog and CLI applications

use anyhow::Context;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger};
use std::fs;
use std::fs::File;
use std::path::PathBuf;

pub const APP_NAME: &str = "Uninstall USBPre Auto-Init";

pub const APP_DIRECTORY_NAME: &str = "usbpre-uninstall";

pub const DAEMON_PATH: &str = "/usr/local/bin/usbpre_monitor_daemon";

pub const PLIST_PATH: &str = "/Library/LaunchDaemons/com.sounddevices.usbpre.monitor.plist";

pub const LOG_PATH: &str = "/var/log/usbpre_monitor.log";

pub const PACKAGE_ID: &str = "com.sounddevices.usbpre.monitor";

/// Grace period between stopping the service and unlinking its binary
pub const SETTLE_DELAY_MS: u64 = 1000;

/// Path to the local application data folder
/// This is where the uninstaller logs will be stored
pub fn local_data_directory() -> anyhow::Result<PathBuf> {
    let path = dirs::data_local_dir()
        .context("Unable to get data_local_dir()")?
        .join(APP_DIRECTORY_NAME);
    fs::create_dir_all(&path).context("Unable to create data directory")?;
    Ok(path)
}

/// Path to the application config folder
/// This is where an optional config.toml overriding the daemon paths lives
pub fn config_directory() -> anyhow::Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Unable to get config_dir()")?
        .join(APP_DIRECTORY_NAME))
}

pub fn install_logger(debug: bool, to_terminal: bool, to_disk: bool) -> anyhow::Result<()> {
    let filter = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = simplelog::ConfigBuilder::default()
        .add_filter_ignore_str("cursive")
        .set_target_level(LevelFilter::Debug)
        .build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![];
    if to_terminal {
        loggers.push(TermLogger::new(
            filter,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if to_disk {
        let file = File::create(get_log_path()?).context("Unable to create log file")?;
        loggers.push(WriteLogger::new(filter, config, file));
    }
    CombinedLogger::init(loggers)?;
    if debug {
        log::warn!("Debug logging enabled");
    }
    Ok(())
}

pub fn get_log_path() -> anyhow::Result<PathBuf> {
    Ok(local_data_directory()?.join("log.txt"))
}
