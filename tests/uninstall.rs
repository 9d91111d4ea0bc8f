use std::cell::RefCell;
use std::collections::BTreeSet;
use std::sync::mpsc;
use std::time::Duration;
use usbpre_uninstall::plan::{StepKind, LAUNCHCTL, PKGUTIL, RM};
use usbpre_uninstall::worker::UninstallWorker;
use usbpre_uninstall::{
    CommandRunner, ElevationError, SequenceOutcome, Status, StatusReporter, UninstallPlan,
    UninstallSequencer,
};

// Records every invocation and fails on the configured 1-based call
#[derive(Default)]
struct ScriptedRunner {
    fail_on: Option<(usize, i32, &'static str)>,
    calls: RefCell<Vec<(String, Vec<String>)>>,
}

impl ScriptedRunner {
    fn failing_on(call: usize, status: i32, diagnostic: &'static str) -> Self {
        Self {
            fail_on: Some((call, status, diagnostic)),
            calls: RefCell::new(vec![]),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn execute(&self, executable: &str, arguments: &[String]) -> Result<(), ElevationError> {
        let mut calls = self.calls.borrow_mut();
        calls.push((executable.to_owned(), arguments.to_vec()));
        match self.fail_on {
            Some((call, status, diagnostic)) if call == calls.len() => {
                Err(ElevationError::Failed {
                    status,
                    diagnostic: diagnostic.to_owned(),
                })
            }
            _ => Ok(()),
        }
    }
}

// Models the machine the daemon was installed on
struct FakeSystem {
    files: RefCell<BTreeSet<String>>,
    loaded: RefCell<bool>,
    receipts: RefCell<BTreeSet<String>>,
}

impl FakeSystem {
    fn installed(plan: &UninstallPlan) -> Self {
        FakeSystem {
            files: RefCell::new(
                [plan.daemon_path(), plan.plist_path(), plan.log_path()]
                    .into_iter()
                    .map(str::to_owned)
                    .collect(),
            ),
            loaded: RefCell::new(true),
            receipts: RefCell::new([plan.package_id().to_owned()].into_iter().collect()),
        }
    }

    fn is_clean(&self) -> bool {
        self.files.borrow().is_empty() && !*self.loaded.borrow() && self.receipts.borrow().is_empty()
    }
}

impl CommandRunner for FakeSystem {
    fn execute(&self, executable: &str, arguments: &[String]) -> Result<(), ElevationError> {
        match (executable, arguments) {
            // launchctl unload of something not loaded only warns
            (LAUNCHCTL, [verb, _]) if verb == "unload" => {
                *self.loaded.borrow_mut() = false;
                Ok(())
            }
            (RM, [flag, path]) if flag == "-f" => {
                self.files.borrow_mut().remove(path);
                Ok(())
            }
            (RM, [path]) => {
                if self.files.borrow_mut().remove(path) {
                    Ok(())
                } else {
                    Err(ElevationError::Failed {
                        status: 1,
                        diagnostic: format!("rm: {}: No such file or directory", path),
                    })
                }
            }
            (PKGUTIL, [flag, id]) if flag == "--forget" => {
                self.receipts.borrow_mut().remove(id);
                Ok(())
            }
            _ => panic!("unexpected command {} {:?}", executable, arguments),
        }
    }
}

#[derive(Default)]
struct Recorder {
    progress: Vec<String>,
    succeeded: Option<bool>,
}

impl StatusReporter for Recorder {
    fn report_progress(&mut self, message: &str) {
        self.progress.push(message.to_owned());
    }

    fn report_outcome(&mut self, outcome: &SequenceOutcome) {
        assert!(self.succeeded.is_none(), "outcome reported twice");
        self.succeeded = Some(outcome.is_success());
    }
}

fn sample_plans() -> Vec<UninstallPlan> {
    vec![
        UninstallPlan::default(),
        UninstallPlan::new("/opt/d/bin/daemon", "/etc/launchd/d.plist", "/tmp/d.log", "org.d"),
        UninstallPlan::new("/a b/daemon", "/c\"d/e.plist", "/f\\g.log", "x.y"),
    ]
}

fn run(plan: &UninstallPlan, runner: impl CommandRunner, reporter: &mut Recorder) -> SequenceOutcome {
    UninstallSequencer::new(plan.clone(), runner, reporter)
        .with_settle_delay(Duration::ZERO)
        .run()
}

#[test]
fn every_step_runs_once_in_plan_order() {
    for plan in sample_plans() {
        let runner = ScriptedRunner::default();
        let mut recorder = Recorder::default();
        let outcome = run(&plan, &runner, &mut recorder);
        assert!(outcome.is_success());
        let expected = plan
            .steps()
            .iter()
            .map(|s| (s.executable().to_owned(), s.arguments().to_vec()))
            .collect::<Vec<_>>();
        assert_eq!(*runner.calls.borrow(), expected);
        assert_eq!(recorder.succeeded, Some(true));
    }
}

#[test]
fn failure_on_step_k_runs_exactly_k_steps() {
    for plan in sample_plans() {
        for k in 1..=plan.len() {
            let runner = ScriptedRunner::failing_on(k, 1, "boom");
            let mut recorder = Recorder::default();
            let outcome = run(&plan, &runner, &mut recorder);
            assert_eq!(runner.calls.borrow().len(), k);
            let failure = outcome.failure().expect("run should fail");
            assert_eq!(failure.number, k);
            assert_eq!(&failure.step, &plan.steps()[k - 1]);
            assert_eq!(recorder.succeeded, Some(false));
        }
    }
}

#[test]
fn happy_path_reports_fixed_progress() {
    let runner = ScriptedRunner::default();
    let mut recorder = Recorder::default();
    let outcome = run(&UninstallPlan::default(), &runner, &mut recorder);
    assert!(matches!(outcome, SequenceOutcome::Succeeded));
    assert_eq!(runner.calls.borrow().len(), 5);
    assert_eq!(
        recorder.progress,
        vec![
            "Stopping daemon...",
            "Removing files...",
            "Removing package receipt..."
        ]
    );
    assert_eq!(recorder.succeeded, Some(true));
}

#[test]
fn mid_sequence_failure_keeps_diagnostic() {
    let plan = UninstallPlan::default();
    let runner = ScriptedRunner::failing_on(3, 1, "Operation not permitted");
    let mut recorder = Recorder::default();
    let outcome = run(&plan, &runner, &mut recorder);

    let calls = runner.calls.borrow();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2].1, vec!["-f".to_owned(), plan.daemon_path().to_owned()]);
    assert!(calls.iter().all(|(exe, _)| exe != PKGUTIL));

    let failure = outcome.into_result().unwrap_err();
    assert_eq!(failure.number, 3);
    assert_eq!(failure.step.kind(), StepKind::RemoveBinary);
    assert_eq!(failure.source.status(), Some(1));
    assert_eq!(failure.source.diagnostic(), "Operation not permitted");
    assert!(failure.to_string().ends_with("Operation not permitted"));
}

#[test]
fn denied_elevation_touches_no_files() {
    let plan = UninstallPlan::default();
    let system = FakeSystem::installed(&plan);
    let denying = ScriptedRunner::failing_on(1, 1, "execution error: User canceled. (-128)");
    let mut recorder = Recorder::default();
    let outcome = run(&plan, &denying, &mut recorder);

    assert_eq!(denying.calls.borrow().len(), 1);
    assert_eq!(denying.calls.borrow()[0].0, LAUNCHCTL);
    let failure = outcome.failure().expect("run should fail");
    assert_eq!(failure.number, 1);
    assert!(failure.source.is_cancelled());
    assert_eq!(system.files.borrow().len(), 3);
}

#[test]
fn running_twice_converges() {
    let plan = UninstallPlan::default();
    let system = FakeSystem::installed(&plan);

    let mut first = Recorder::default();
    assert!(run(&plan, &system, &mut first).is_success());
    assert!(system.is_clean());

    let mut second = Recorder::default();
    assert!(run(&plan, &system, &mut second).is_success());
    assert!(system.is_clean());
    assert_eq!(first.progress, second.progress);
}

#[test]
fn rerun_after_partial_failure_completes() {
    let plan = UninstallPlan::default();
    let system = FakeSystem::installed(&plan);

    // Let the first three steps through, then fail as if the receipt lookup broke
    struct FailAfter<'a> {
        system: &'a FakeSystem,
        remaining: RefCell<usize>,
    }
    impl CommandRunner for FailAfter<'_> {
        fn execute(&self, executable: &str, arguments: &[String]) -> Result<(), ElevationError> {
            let mut remaining = self.remaining.borrow_mut();
            if *remaining == 0 {
                return Err(ElevationError::Failed {
                    status: 1,
                    diagnostic: "interrupted".to_owned(),
                });
            }
            *remaining -= 1;
            self.system.execute(executable, arguments)
        }
    }

    let partial = FailAfter {
        system: &system,
        remaining: RefCell::new(3),
    };
    let outcome = run(&plan, &partial, &mut Recorder::default());
    assert_eq!(outcome.failure().map(|f| f.number), Some(4));
    // Nothing is restored after the failure
    assert!(!system.files.borrow().contains(plan.daemon_path()));
    assert!(system.files.borrow().contains(plan.log_path()));

    assert!(run(&plan, &system, &mut Recorder::default()).is_success());
    assert!(system.is_clean());
}

#[test]
fn worker_streams_status_messages() {
    let plan = UninstallPlan::default();
    let (tx, rx) = mpsc::channel();
    let runner = Box::new(ScriptedSendRunner { fail_on: Some(2) });
    let worker = UninstallWorker::start(plan, runner, tx, Duration::ZERO).unwrap();
    let outcome = worker.join().unwrap();
    assert_eq!(outcome.failure().map(|f| f.number), Some(2));

    let statuses = rx.iter().collect::<Vec<_>>();
    assert_eq!(statuses.len(), 3);
    assert_eq!(statuses[0], Status::Progress("Stopping daemon...".to_owned()));
    assert_eq!(statuses[1], Status::Progress("Removing files...".to_owned()));
    match &statuses[2] {
        Status::Failed(message) => assert!(message.starts_with("Failed to execute: /bin/rm")),
        other => panic!("unexpected status {:?}", other),
    }
}

// Thread safe variant for the worker, which moves the runner onto another thread
struct ScriptedSendRunner {
    fail_on: Option<usize>,
}

impl CommandRunner for ScriptedSendRunner {
    fn execute(&self, _executable: &str, _arguments: &[String]) -> Result<(), ElevationError> {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let call = CALLS.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fail_on {
            Some(n) if n == call => Err(ElevationError::Failed {
                status: 1,
                diagnostic: "Operation not permitted".to_owned(),
            }),
            _ => Ok(()),
        }
    }
}
