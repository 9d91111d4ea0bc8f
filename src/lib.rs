//! Removes the USBPre monitor daemon and everything its installer left behind.
//!
//! The removal is a fixed [`plan::UninstallPlan`] of five commands, each run with
//! administrator privileges by an [`elevate::CommandRunner`]. An
//! [`sequencer::UninstallSequencer`] executes them in order on a [`worker::UninstallWorker`]
//! thread, pushing progress into a [`reporter::StatusReporter`] supplied by the front-end.

pub mod common;
pub mod config;
pub mod elevate;
pub mod plan;
pub mod reporter;
pub mod sequencer;
pub mod unique;
pub mod worker;

pub use elevate::{CommandRunner, ElevatedRunner, Elevation, ElevationError};
pub use plan::{UninstallPlan, UninstallStep};
pub use reporter::{Status, StatusReporter};
pub use sequencer::{SequenceOutcome, StepFailure, UninstallSequencer};
