//! Runs a single command with administrator privileges.
//!
//! Every call shows exactly one interactive authentication prompt and blocks the calling
//! thread until the user has answered it and the command has exited. Callers must therefore
//! never invoke the runner from a thread that is responsible for drawing a user interface.

use itertools::Itertools;
use std::borrow::Cow;
use std::process::Command;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

pub const OSASCRIPT: &str = "/usr/bin/osascript";

pub const PKEXEC: &str = "pkexec";

/// Substituted when the elevated command wrote something to stderr that is not valid UTF-8
pub const UNKNOWN_ERROR: &str = "Unknown error";

// AppleScript error number raised when the authentication dialog is cancelled
const APPLESCRIPT_USER_CANCELED: &str = "(-128)";

// pkexec exit status when the authentication dialog is dismissed
const PKEXEC_DISMISSED: i32 = 126;

#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("Unable to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{diagnostic} (exit status {status})")]
    Failed { status: i32, diagnostic: String },
}

impl ElevationError {
    /// The exit status of the elevated invocation, if it ran at all
    pub fn status(&self) -> Option<i32> {
        match self {
            ElevationError::Launch { .. } => None,
            ElevationError::Failed { status, .. } => Some(*status),
        }
    }

    /// The text the command wrote to its error stream
    pub fn diagnostic(&self) -> Cow<'_, str> {
        match self {
            ElevationError::Launch { source, .. } => Cow::Owned(source.to_string()),
            ElevationError::Failed { diagnostic, .. } => Cow::Borrowed(diagnostic),
        }
    }

    /// Whether the user dismissed the authentication prompt rather than the command failing
    pub fn is_cancelled(&self) -> bool {
        match self {
            ElevationError::Launch { .. } => false,
            ElevationError::Failed { status, diagnostic } => {
                diagnostic.contains(APPLESCRIPT_USER_CANCELED) || *status == PKEXEC_DISMISSED
            }
        }
    }
}

/// Executes one external command with administrator privileges.
#[cfg_attr(test, automock)]
pub trait CommandRunner {
    fn execute(&self, executable: &str, arguments: &[String]) -> Result<(), ElevationError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn execute(&self, executable: &str, arguments: &[String]) -> Result<(), ElevationError> {
        (**self).execute(executable, arguments)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for Box<T> {
    fn execute(&self, executable: &str, arguments: &[String]) -> Result<(), ElevationError> {
        (**self).execute(executable, arguments)
    }
}

/// The platform facility used to obtain administrator privileges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    /// `do shell script ... with administrator privileges` submitted through osascript
    AppleScript,
    /// polkit's pkexec running `/bin/sh -c`
    Pkexec,
}

impl Default for Elevation {
    fn default() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "macos")] {
                Elevation::AppleScript
            } else {
                Elevation::Pkexec
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElevatedRunner {
    elevation: Elevation,
}

impl ElevatedRunner {
    pub fn new(elevation: Elevation) -> Self {
        Self { elevation }
    }

    fn command(&self, command_line: &str) -> Command {
        match self.elevation {
            Elevation::AppleScript => {
                let mut cmd = Command::new(OSASCRIPT);
                cmd.arg("-e").arg(applescript_request(command_line));
                cmd
            }
            Elevation::Pkexec => {
                let mut cmd = Command::new(PKEXEC);
                cmd.arg("/bin/sh").arg("-c").arg(command_line);
                cmd
            }
        }
    }
}

impl CommandRunner for ElevatedRunner {
    fn execute(&self, executable: &str, arguments: &[String]) -> Result<(), ElevationError> {
        let line = command_line(executable, arguments);
        log::debug!("Requesting {:?} elevation for: {}", self.elevation, line);
        run_to_completion(self.command(&line))
    }
}

// Waits for the command, capturing its error stream
fn run_to_completion(mut cmd: Command) -> Result<(), ElevationError> {
    let output = cmd.output().map_err(|source| ElevationError::Launch {
        program: cmd.get_program().to_string_lossy().into_owned(),
        source,
    })?;
    if output.status.success() {
        return Ok(());
    }
    // A missing code means the process was killed by a signal
    let status = output.status.code().unwrap_or(-1);
    let diagnostic = decode_diagnostic(output.stderr);
    log::debug!("Elevated command exited with {}: {}", status, diagnostic);
    Err(ElevationError::Failed { status, diagnostic })
}

fn decode_diagnostic(stderr: Vec<u8>) -> String {
    match String::from_utf8(stderr) {
        Ok(text) => text.trim().to_owned(),
        Err(_) => UNKNOWN_ERROR.to_owned(),
    }
}

/// Joins the executable and its arguments into a single POSIX shell command line.
///
/// Words made only of characters the shell treats literally are left as-is, so ordinary
/// paths read naturally in logs. Anything else is wrapped in single quotes.
pub fn command_line(executable: &str, arguments: &[String]) -> String {
    std::iter::once(executable)
        .chain(arguments.iter().map(String::as_str))
        .map(shell_quote)
        .join(" ")
}

fn shell_quote(word: &str) -> Cow<'_, str> {
    let literal = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@%".contains(c));
    if literal {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}

/// Escapes backslashes and double quotes for use inside an AppleScript string literal
pub fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// The script handed to osascript for a shell command line
pub fn applescript_request(command_line: &str) -> String {
    format!(
        "do shell script \"{}\" with administrator privileges",
        escape_applescript(command_line)
    )
}
