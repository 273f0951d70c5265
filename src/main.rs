// Entrypoint for the `todo` binary.
// - Keeps `main` small: set up logging and configuration, build a session
//   and hand the parsed command to `cli::dispatch`.
// - Errors are reported once here, then the process exits with status 1.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use todocli::cli::{self, Cli};
use todocli::config::Config;
use todocli::update::{CratesIo, SystemClock, UpdateChecker};
use todocli::{auth, ui, TodoClient};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "todocli=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn check_for_update(config: &Config) {
    if !config.update_check {
        return;
    }
    let Ok(source) = CratesIo::new() else {
        return;
    };
    let checker = UpdateChecker::new(
        SystemClock,
        source,
        config.update_state_path(),
        env!("CARGO_PKG_VERSION"),
    );
    if let Some(notice) = checker.check() {
        ui::print_update_notice(&notice);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    check_for_update(&config);

    if !cli.command.needs_session() {
        return cli::run_local(&cli.command, &config);
    }
    let session = auth::get_oauth_session(&config)?;
    let client = TodoClient::new(session, &config.lists_url());
    cli::dispatch(&client, cli.command)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json = cli.command.wants_json();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::print_error(&err, json);
            ExitCode::FAILURE
        }
    }
}
