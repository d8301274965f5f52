mod cli;
mod commands;
mod declaration;
mod error;
mod output;
mod state;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, StateAccess};
use crate::error::CliError;
use crate::state::{Session, StateLock};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("OPNMIRROR_LOG").unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need the mirror
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "opnmirror", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let access = cmd.state_access();
            let mut lock = match access {
                StateAccess::Exclusive | StateAccess::TryExclusive => {
                    Some(StateLock::open(&state::state_path(&cli.global))?)
                }
                StateAccess::Read | StateAccess::PerPass => None,
            };
            // Held until the state is saved.
            let _guard = match lock.as_mut() {
                Some(lock) if access == StateAccess::TryExclusive => {
                    let lock_path = lock.path().display().to_string();
                    Some(lock.try_acquire()?.ok_or(CliError::SyncInProgress { lock: lock_path })?)
                }
                Some(lock) => Some(lock.acquire()?),
                None => None,
            };

            let session = Session::open(&cli.global)?;
            let writes_state = cmd.writes_state();
            tracing::debug!(command = ?cmd, profile = %session.profile_name, "dispatching command");

            let result = commands::dispatch(cmd, &session, &cli.global).await;

            // Optimistic writes from a failed deploy are still real.
            if writes_state {
                if let Err(save_err) = session.save() {
                    if result.is_ok() {
                        return Err(save_err);
                    }
                    tracing::error!(error = %save_err, "could not save mirror state");
                }
            }
            result
        }
    }
}
