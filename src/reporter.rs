//! The sink the sequencer pushes progress into. Front-ends implement it; the core never
//! touches presentation state directly.

use crate::sequencer::SequenceOutcome;
use std::sync::mpsc;

pub trait StatusReporter {
    fn report_progress(&mut self, message: &str);
    fn report_outcome(&mut self, outcome: &SequenceOutcome);
}

impl<R: StatusReporter + ?Sized> StatusReporter for &mut R {
    fn report_progress(&mut self, message: &str) {
        (**self).report_progress(message)
    }

    fn report_outcome(&mut self, outcome: &SequenceOutcome) {
        (**self).report_outcome(outcome)
    }
}

impl<R: StatusReporter + ?Sized> StatusReporter for Box<R> {
    fn report_progress(&mut self, message: &str) {
        (**self).report_progress(message)
    }

    fn report_outcome(&mut self, outcome: &SequenceOutcome) {
        (**self).report_outcome(outcome)
    }
}

/// Messages delivered by [`mpsc::Sender<Status>`] acting as a reporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Progress(String),
    Succeeded,
    Failed(String),
}

impl From<&SequenceOutcome> for Status {
    fn from(outcome: &SequenceOutcome) -> Self {
        match outcome {
            SequenceOutcome::Succeeded => Status::Succeeded,
            SequenceOutcome::Failed(failure) => Status::Failed(failure.to_string()),
        }
    }
}

impl StatusReporter for mpsc::Sender<Status> {
    fn report_progress(&mut self, message: &str) {
        if self.send(Status::Progress(message.to_owned())).is_err() {
            log::debug!("Status receiver gone, dropping progress '{}'", message);
        }
    }

    fn report_outcome(&mut self, outcome: &SequenceOutcome) {
        if self.send(outcome.into()).is_err() {
            log::debug!("Status receiver gone, dropping outcome");
        }
    }
}
