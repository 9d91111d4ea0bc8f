//! Entry point for the headless uninstaller
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use usbpre_uninstall::common::{install_logger, APP_NAME};
use usbpre_uninstall::config::UninstallConfig;
use usbpre_uninstall::unique::UninstallerInstance;
use usbpre_uninstall::worker::UninstallWorker;
use usbpre_uninstall::{ElevatedRunner, SequenceOutcome, StatusReporter, UninstallPlan};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
    /// Do not ask for confirmation before uninstalling
    #[arg(short, long)]
    yes: bool,
    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
    /// Also write the log to the application data directory
    #[arg(long)]
    log_file: bool,
    /// Override the config file path
    #[arg(long)]
    config: Option<PathBuf>,
}

struct ConsoleReporter {
    quiet: bool,
}

impl StatusReporter for ConsoleReporter {
    fn report_progress(&mut self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    fn report_outcome(&mut self, outcome: &SequenceOutcome) {
        if let SequenceOutcome::Failed(failure) = outcome {
            log::error!("Step {} failed: {}", failure.number, failure.step);
        }
    }
}

#[derive(Serialize)]
struct OutcomeReport<'a> {
    succeeded: bool,
    failed_step: Option<usize>,
    description: Option<&'a str>,
    status: Option<i32>,
    diagnostic: Option<String>,
}

impl<'a> From<&'a SequenceOutcome> for OutcomeReport<'a> {
    fn from(outcome: &'a SequenceOutcome) -> Self {
        let failure = outcome.failure();
        OutcomeReport {
            succeeded: outcome.is_success(),
            failed_step: failure.map(|f| f.number),
            description: failure.map(|f| f.step.description()),
            status: failure.and_then(|f| f.source.status()),
            diagnostic: failure.map(|f| f.source.diagnostic().into_owned()),
        }
    }
}

fn confirm(plan: &UninstallPlan) -> anyhow::Result<bool> {
    println!("This will remove the USBPre monitor daemon from your system.");
    println!("Files to be removed:");
    for target in plan.removal_targets() {
        println!("  • {}", target);
    }
    print!("Uninstall USBPre Auto-Init? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Unable to read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

// Returns the process exit code
fn run(args: Args) -> anyhow::Result<i32> {
    log::info!(
        "Starting {} (CLI), version: {}",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    let config = UninstallConfig::load(args.config).context("Unable to load config file")?;
    let plan = config.plan();

    if !args.yes && !confirm(&plan)? {
        log::info!("Uninstall cancelled by user");
        return Ok(0);
    }

    let reporter = ConsoleReporter { quiet: args.json };
    let worker = UninstallWorker::start(
        plan,
        ElevatedRunner::default(),
        reporter,
        config.settle_delay(),
    )?;
    let outcome = worker.join()?;

    if args.json {
        let pretty = serde_json::to_string_pretty(&OutcomeReport::from(&outcome))?;
        println!("{}", pretty);
    } else {
        match &outcome {
            SequenceOutcome::Succeeded => {
                println!("USBPre Auto-Init has been successfully removed from your system.")
            }
            SequenceOutcome::Failed(failure) => {
                eprintln!("Uninstallation Failed\n{}", failure);
                if failure.source.is_cancelled() {
                    eprintln!("Authorization was cancelled, the remaining steps were not run.");
                }
            }
        }
    }
    Ok(if outcome.is_success() { 0 } else { 1 })
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

    // Setup logging
    if let Err(e) = install_logger(args.debug, true, args.log_file) {
        eprintln!("Unable to install logger: {:#}", e);
        std::process::exit(1);
    }
    // Run the application logic
    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
