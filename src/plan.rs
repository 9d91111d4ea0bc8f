//! The fixed, ordered list of elevated commands that removes the monitor daemon.

use crate::common::{DAEMON_PATH, LOG_PATH, PACKAGE_ID, PLIST_PATH};
use enum_iterator::Sequence;
use serde::Serialize;
use std::fmt;

pub const LAUNCHCTL: &str = "/bin/launchctl";
pub const RM: &str = "/bin/rm";
pub const PKGUTIL: &str = "/usr/sbin/pkgutil";

/// What a step does. Declaration order is execution order: the service must be unloaded
/// before its descriptor disappears, and the receipt is only forgotten once the files are gone.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Sequence, Serialize)]
pub enum StepKind {
    StopService,
    RemoveDescriptor,
    RemoveBinary,
    RemoveLog,
    ForgetPackage,
}

/// Groups steps into the stages shown to the user
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Phase {
    StoppingService,
    RemovingFiles,
    RemovingReceipt,
}

impl StepKind {
    pub fn phase(self) -> Phase {
        match self {
            StepKind::StopService => Phase::StoppingService,
            StepKind::RemoveDescriptor | StepKind::RemoveBinary | StepKind::RemoveLog => {
                Phase::RemovingFiles
            }
            StepKind::ForgetPackage => Phase::RemovingReceipt,
        }
    }
}

impl Phase {
    pub fn message(self) -> &'static str {
        match self {
            Phase::StoppingService => "Stopping daemon...",
            Phase::RemovingFiles => "Removing files...",
            Phase::RemovingReceipt => "Removing package receipt...",
        }
    }
}

/// One elevated invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UninstallStep {
    kind: StepKind,
    executable: String,
    arguments: Vec<String>,
    description: String,
}

impl UninstallStep {
    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn phase(&self) -> Phase {
        self.kind.phase()
    }
}

impl fmt::Display for UninstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UninstallPlan {
    daemon_path: String,
    plist_path: String,
    log_path: String,
    package_id: String,
    steps: Vec<UninstallStep>,
}

impl UninstallPlan {
    pub fn new(
        daemon_path: impl Into<String>,
        plist_path: impl Into<String>,
        log_path: impl Into<String>,
        package_id: impl Into<String>,
    ) -> Self {
        let mut plan = UninstallPlan {
            daemon_path: daemon_path.into(),
            plist_path: plist_path.into(),
            log_path: log_path.into(),
            package_id: package_id.into(),
            steps: vec![],
        };
        plan.steps = enum_iterator::all::<StepKind>()
            .map(|kind| plan.step(kind))
            .collect();
        plan
    }

    fn step(&self, kind: StepKind) -> UninstallStep {
        let (executable, arguments, description) = match kind {
            StepKind::StopService => (
                LAUNCHCTL,
                vec!["unload".to_owned(), self.plist_path.clone()],
                format!("Unload service {}", self.plist_path),
            ),
            StepKind::RemoveDescriptor => (
                RM,
                vec!["-f".to_owned(), self.plist_path.clone()],
                format!("Remove service descriptor {}", self.plist_path),
            ),
            StepKind::RemoveBinary => (
                RM,
                vec!["-f".to_owned(), self.daemon_path.clone()],
                format!("Remove daemon binary {}", self.daemon_path),
            ),
            StepKind::RemoveLog => (
                RM,
                vec!["-f".to_owned(), self.log_path.clone()],
                format!("Remove log file {}", self.log_path),
            ),
            StepKind::ForgetPackage => (
                PKGUTIL,
                vec!["--forget".to_owned(), self.package_id.clone()],
                format!("Forget package receipt {}", self.package_id),
            ),
        };
        UninstallStep {
            kind,
            executable: executable.to_owned(),
            arguments,
            description,
        }
    }

    pub fn steps(&self) -> &[UninstallStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn daemon_path(&self) -> &str {
        &self.daemon_path
    }

    pub fn plist_path(&self) -> &str {
        &self.plist_path
    }

    pub fn log_path(&self) -> &str {
        &self.log_path
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Human readable list of everything the plan deletes, for confirmation screens
    pub fn removal_targets(&self) -> Vec<String> {
        vec![
            self.daemon_path.clone(),
            self.plist_path.clone(),
            self.log_path.clone(),
            format!("Package receipt ({})", self.package_id),
        ]
    }
}

impl Default for UninstallPlan {
    fn default() -> Self {
        UninstallPlan::new(DAEMON_PATH, PLIST_PATH, LOG_PATH, PACKAGE_ID)
    }
}
