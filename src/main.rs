//! Entry point for the interactive uninstaller
use clap::Parser;
use cursive::event::Event;
use cursive::traits::Nameable;
use cursive::views::{Dialog, TextView};
use cursive::{CbSink, Cursive, CursiveExt};
use std::path::PathBuf;
use usbpre_uninstall::common::{install_logger, APP_NAME};
use usbpre_uninstall::config::UninstallConfig;
use usbpre_uninstall::unique::UninstallerInstance;
use usbpre_uninstall::worker::UninstallWorker;
use usbpre_uninstall::{ElevatedRunner, SequenceOutcome, StatusReporter};

const STATUS_TEXT: &str = "STATUS_TEXT";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
    /// Override the config file path
    #[arg(long)]
    config: Option<PathBuf>,
}

struct UserData {
    config: UninstallConfig,
    worker: Option<UninstallWorker>,
}

// Forwards progress from the worker thread into the dialog's event loop
struct DialogReporter(CbSink);

impl StatusReporter for DialogReporter {
    fn report_progress(&mut self, message: &str) {
        let message = message.to_owned();
        self.0
            .send(Box::new(move |cursive: &mut Cursive| {
                cursive.call_on_name(STATUS_TEXT, |view: &mut TextView| {
                    view.set_content(message)
                });
            }))
            .ok();
    }

    fn report_outcome(&mut self, outcome: &SequenceOutcome) {
        let result = match outcome {
            SequenceOutcome::Succeeded => Ok(()),
            SequenceOutcome::Failed(failure) => {
                let mut message = failure.to_string();
                if failure.source.is_cancelled() {
                    message.push_str("\n\nAuthorization was cancelled.");
                }
                Err(message)
            }
        };
        self.0
            .send(Box::new(move |cursive: &mut Cursive| {
                on_finished(cursive, result)
            }))
            .ok();
    }
}

fn create(config: &UninstallConfig) -> Dialog {
    let files = config
        .plan()
        .removal_targets()
        .iter()
        .map(|target| format!("• {}", target))
        .collect::<Vec<_>>()
        .join("\n");
    let text = format!(
        "This will remove the USBPre monitor daemon from your system.\n\n\
         The daemon will no longer automatically initialize your USBPre device when plugged in.\n\n\
         Files to be removed:\n{}",
        files
    );
    Dialog::around(TextView::new(text))
        .title(APP_NAME)
        .button("Uninstall", on_uninstall)
        .button("Cancel", |cursive| cursive.quit())
}

fn on_uninstall(cursive: &mut Cursive) {
    cursive.add_layer(
        Dialog::text(
            "This will remove the monitor daemon. \
             You'll need to manually initialize your USBPre device after unplugging it.",
        )
        .title("Uninstall USBPre Auto-Init?")
        .button("Uninstall", |cursive| {
            cursive.pop_layer();
            start_uninstall(cursive);
        })
        .button("Cancel", |cursive| {
            cursive.pop_layer();
        }),
    );
}

fn start_uninstall(cursive: &mut Cursive) {
    let (plan, settle_delay) = match cursive.user_data::<UserData>() {
        Some(ud) => (ud.config.plan(), ud.config.settle_delay()),
        None => return,
    };
    cursive.add_layer(
        Dialog::around(TextView::new("Requesting authorization...").with_name(STATUS_TEXT))
            .title("Uninstalling"),
    );
    let reporter = DialogReporter(cursive.cb_sink().clone());
    match UninstallWorker::start(plan, ElevatedRunner::default(), reporter, settle_delay) {
        Ok(worker) => {
            cursive.with_user_data(|ud: &mut UserData| ud.worker = Some(worker));
        }
        Err(e) => {
            log::error!("{:#}", e);
            cursive.pop_layer();
            cursive.add_layer(Dialog::info(format!("\n{}", e)).title("Uninstallation Failed"));
        }
    }
}

fn on_finished(cursive: &mut Cursive, result: Result<(), String>) {
    let worker = cursive
        .user_data::<UserData>()
        .and_then(|ud| ud.worker.take());
    if let Some(worker) = worker {
        if let Err(e) = worker.join() {
            log::error!("{:#}", e);
        }
    }
    cursive.pop_layer();
    match result {
        Ok(()) => cursive.add_layer(
            Dialog::text(
                "USBPre Auto-Init has been successfully removed from your system.\n\n\
                 You can now close this window.",
            )
            .title("Uninstallation Complete")
            .button("Ok", |cursive| cursive.quit()),
        ),
        // Returning to the main dialog allows a retry, every removal tolerates missing files
        Err(message) => {
            cursive.add_layer(Dialog::info(format!("\n{}", message)).title("Uninstallation Failed"))
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    log::info!(
        "Starting {} (dialog), version: {}",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    let config = UninstallConfig::load(args.config)?;
    let mut siv = Cursive::default();
    siv.clear_global_callbacks(Event::CtrlChar('c'));
    siv.clear_global_callbacks(Event::Exit);
    siv.add_layer(create(&config));
    siv.set_user_data(UserData {
        config,
        worker: None,
    });
    siv.run();
    log::info!("Exiting");
    Ok(())
}

fn main() {
    let args: Args = Args::parse();

    // Check this is the only instance running
    let _unique_instance = match UninstallerInstance::try_acquire() {
        Ok(i) => i,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // The terminal belongs to the dialogs, so only log to disk
    if let Err(e) = install_logger(args.debug, false, true) {
        eprintln!("Unable to install logger: {:#}", e);
        std::process::exit(1);
    }
    if let Err(e) = run(args) {
        log::error!("{:#}", e);
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
