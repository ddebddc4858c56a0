mod args;

use std::process::ExitCode;

use anyhow::Context;
use args::Cli;
use clap::Parser;
use cursor_id_reset::display::Display;
use cursor_id_reset::ids::IdGenerator;
use cursor_id_reset::lang::Language;
use cursor_id_reset::process::{ProcessTerminator, TerminatorConfig};
use cursor_id_reset::reset::{Reset, ResetOptions, ResetReport};
use cursor_id_reset::storage::ConfigStore;
use cursor_id_reset::{clienv, privilege, Error};
use tracing_subscriber::EnvFilter;

enum Privileges {
    Granted,
    /// An elevated copy was started and does the work.
    Relaunched,
    Denied,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let automated = cli.automated || clienv::automated_mode();
    let display = Display::new(Language::detect(cli.lang).texts());
    let wait = !automated && !cli.no_wait;

    match check_privileges(&display).await? {
        Privileges::Granted => {}
        Privileges::Relaunched => return Ok(ExitCode::SUCCESS),
        Privileges::Denied => {
            if wait {
                display.wait_for_enter();
            }
            return Ok(ExitCode::FAILURE);
        }
    }

    if let Err(e) = display.clear_screen() {
        tracing::warn!(error = %e, "Failed to clear screen");
    }
    display.logo();

    let code = match run(&cli, automated, &display).await {
        Ok(report) => {
            tracing::debug!(path = %report.config_path.display(), sqm_preserved = report.sqm_preserved, "Reset finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Reset failed");
            let reported = e
                .downcast_ref::<Error>()
                .is_some_and(|e| matches!(e, Error::StillRunning { .. }));
            if !reported {
                display.error(&format!("{} {:#}", display.texts().error_prefix, e));
            }
            ExitCode::FAILURE
        }
    };

    if wait {
        display.wait_for_enter();
    }
    Ok(code)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli, automated: bool, display: &Display) -> anyhow::Result<ResetReport> {
    let path = match &cli.storage_path {
        Some(path) => path.clone(),
        None => clienv::storage_path().context("Failed to locate storage.json")?,
    };
    tracing::debug!(path = %path.display(), "Using storage path");

    if automated {
        tracing::debug!("Running in automated mode, skipping process shutdown");
    }
    let options = ResetOptions {
        read_only: cli.read_only,
        skip_kill: cli.skip_kill || automated,
    };

    let store = ConfigStore::new(path).with_owner(clienv::sudo_owner());
    let terminator = ProcessTerminator::system(TerminatorConfig::default())?;
    let generator = IdGenerator::new();

    let report = Reset::new(&terminator, &store, &generator, display, options)
        .run()
        .await?;
    Ok(report)
}

async fn check_privileges(display: &Display) -> anyhow::Result<Privileges> {
    if privilege::is_elevated()? {
        return Ok(Privileges::Granted);
    }
    Ok(handle_unprivileged(display).await)
}

#[cfg(windows)]
async fn handle_unprivileged(display: &Display) -> Privileges {
    let texts = display.texts();
    println!();
    println!("{}", texts.requesting_admin);

    match privilege::relaunch_elevated().await {
        Ok(()) => Privileges::Relaunched,
        Err(e) => {
            tracing::error!(error = %e, "Elevation failed");
            display.privilege_error(&[texts.run_as_admin.to_string()]);
            Privileges::Denied
        }
    }
}

#[cfg(not(windows))]
async fn handle_unprivileged(display: &Display) -> Privileges {
    let texts = display.texts();
    let exe = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string());
    display.privilege_error(&[
        texts.run_with_sudo.to_string(),
        format!("{} {}", texts.sudo_example, exe),
    ]);
    Privileges::Denied
}
