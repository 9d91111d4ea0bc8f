use crate::elevate::CommandRunner;
use crate::plan::UninstallPlan;
use crate::reporter::StatusReporter;
use crate::sequencer::{SequenceOutcome, UninstallSequencer};
use std::mem::take;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Unable to start the uninstall worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("The uninstall worker panicked")]
    Panicked,
}

/// Runs one uninstall sequence on its own thread so that the blocking authentication
/// prompts never stall the thread that owns the user interface.
pub struct UninstallWorker {
    join_handle: Option<JoinHandle<SequenceOutcome>>,
}

impl UninstallWorker {
    pub fn start<E, R>(
        plan: UninstallPlan,
        runner: E,
        reporter: R,
        settle_delay: Duration,
    ) -> Result<UninstallWorker, WorkerError>
    where
        E: CommandRunner + Send + 'static,
        R: StatusReporter + Send + 'static,
    {
        let join_handle = thread::Builder::new()
            .name("uninstall-worker".to_owned())
            .spawn(move || {
                log::info!("Starting UninstallWorker");
                let outcome = UninstallSequencer::new(plan, runner, reporter)
                    .with_settle_delay(settle_delay)
                    .run();
                log::info!("UninstallWorker finished");
                outcome
            })
            .map_err(WorkerError::Spawn)?;
        Ok(UninstallWorker {
            join_handle: Some(join_handle),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Blocks until the run has completed. There is no way to abort a run early.
    pub fn join(mut self) -> Result<SequenceOutcome, WorkerError> {
        match take(&mut self.join_handle) {
            Some(handle) => handle.join().map_err(|_| WorkerError::Panicked),
            None => Err(WorkerError::Panicked),
        }
    }
}

impl Drop for UninstallWorker {
    fn drop(&mut self) {
        if let Some(handle) = take(&mut self.join_handle) {
            log::debug!("Waiting for UninstallWorker to finish");
            handle.join().ok();
        }
    }
}
