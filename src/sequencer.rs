//! Walks an [`UninstallPlan`] one elevated step at a time.
//!
//! The first failing step ends the run. Nothing already removed is put back, which is safe
//! because every file removal ignores missing targets and the whole plan can simply be
//! run again.

use crate::common::SETTLE_DELAY_MS;
use crate::elevate::{CommandRunner, ElevationError};
use crate::plan::{Phase, StepKind, UninstallPlan, UninstallStep};
use crate::reporter::StatusReporter;
use human_repr::HumanDuration;
use std::thread;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(SETTLE_DELAY_MS);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    /// Zero based index of the step being executed
    Running(usize),
    Succeeded,
    /// Zero based index of the step that failed
    Failed(usize),
}

/// A step whose elevated command did not succeed
#[derive(Debug, Error)]
#[error("Failed to execute: {}\n{}", .step.executable(), .source.diagnostic())]
pub struct StepFailure {
    /// One based position of the step within the plan
    pub number: usize,
    pub step: UninstallStep,
    #[source]
    pub source: ElevationError,
}

pub type StepOutcome = Result<(), StepFailure>;

#[derive(Debug)]
pub enum SequenceOutcome {
    Succeeded,
    Failed(StepFailure),
}

impl SequenceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SequenceOutcome::Succeeded)
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        match self {
            SequenceOutcome::Succeeded => None,
            SequenceOutcome::Failed(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> StepOutcome {
        match self {
            SequenceOutcome::Succeeded => Ok(()),
            SequenceOutcome::Failed(failure) => Err(failure),
        }
    }
}

/// Drives a single uninstall run. Consumed by [`UninstallSequencer::run`], so a sequencer
/// can never be started twice.
pub struct UninstallSequencer<E, R> {
    plan: UninstallPlan,
    runner: E,
    reporter: R,
    settle_delay: Duration,
    state: SequenceState,
}

impl<E: CommandRunner, R: StatusReporter> UninstallSequencer<E, R> {
    pub fn new(plan: UninstallPlan, runner: E, reporter: R) -> Self {
        Self {
            plan,
            runner,
            reporter,
            settle_delay: DEFAULT_SETTLE_DELAY,
            state: SequenceState::Idle,
        }
    }

    /// How long to wait after the service is stopped before its files are removed
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn run(mut self) -> SequenceOutcome {
        log::info!("Starting uninstall of {} steps", self.plan.len());
        let outcome = match self.run_steps() {
            Ok(()) => {
                self.transition(SequenceState::Succeeded);
                SequenceOutcome::Succeeded
            }
            Err(failure) => {
                self.transition(SequenceState::Failed(failure.number - 1));
                SequenceOutcome::Failed(failure)
            }
        };
        self.reporter.report_outcome(&outcome);
        outcome
    }

    fn run_steps(&mut self) -> StepOutcome {
        let total = self.plan.len();
        let mut phase: Option<Phase> = None;
        for index in 0..total {
            self.transition(SequenceState::Running(index));
            let step = &self.plan.steps()[index];

            if phase != Some(step.phase()) {
                phase = Some(step.phase());
                self.reporter.report_progress(step.phase().message());
            }

            log::info!("Step {}/{}: {}", index + 1, total, step);
            if let Err(source) = self.runner.execute(step.executable(), step.arguments()) {
                log::error!("Step {}/{} failed: {}", index + 1, total, source);
                return Err(StepFailure {
                    number: index + 1,
                    step: step.clone(),
                    source,
                });
            }

            if step.kind() == StepKind::StopService && !self.settle_delay.is_zero() {
                // Best effort: the daemon usually exits well within this, but nothing checks it
                log::info!(
                    "Waiting {} for the service to exit",
                    self.settle_delay.human_duration()
                );
                thread::sleep(self.settle_delay);
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: SequenceState) {
        log::debug!("Uninstall state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
