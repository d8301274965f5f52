//! Command dispatch: bridges CLI args -> `Mirror` calls -> output formatting.

pub mod config_cmd;
pub mod container;
pub mod deploy;
pub mod resources;
pub mod server;
pub mod sync;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::state::Session;

/// Dispatch a mirror-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Server(args) => server::handle(session, args, global).await,
        Command::Sync(args) => sync::handle(session, args, global).await,
        Command::Check(args) => deploy::check(session, &args.file, global),
        Command::Deploy(args) => deploy::handle(session, args, global).await,
        Command::List(args) => resources::handle(session, &args, global),
        Command::Container(args) => container::handle(session, args, global).await,
        // Config and Completions are handled before a session is opened
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions do not use the mirror".into(),
        )),
    }
}
