//! Server registry handlers.

use serde::Serialize;
use tabled::Tabled;

use opnmirror_config as config;
use opnmirror_core::{Interface, RegisterRequest, Server, SyncInfo};

use crate::cli::{GlobalOpts, ServerArgs, ServerCommand};
use crate::error::CliError;
use crate::output::{self, Painter};
use crate::state::Session;

use super::{sync, util};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct ServerView {
    #[serde(flatten)]
    server: Server,
    last_sync: Option<SyncInfo>,
}

#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "TLS")]
    tls: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Last Sync")]
    last_sync: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl ServerRow {
    fn from_view(v: &ServerView, paint: Painter) -> Self {
        Self {
            name: v.server.name.clone(),
            host: v.server.hostname.clone(),
            tls: if v.server.verify_ssl { "verified" } else { "insecure" }.into(),
            version: v.server.product_version.clone().unwrap_or_else(|| "-".into()),
            last_sync: util::timestamp(v.last_sync.as_ref().map(|i| i.last_sync)),
            status: v
                .last_sync
                .as_ref()
                .map_or_else(|| paint.dim("never"), |i| sync::paint_status(i.status, paint)),
        }
    }
}

#[derive(Tabled)]
struct InterfaceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
}

impl From<&Interface> for InterfaceRow {
    fn from(i: &Interface) -> Self {
        let address = match (i.ip_address, i.subnet_bits) {
            (Some(ip), Some(bits)) => format!("{ip}/{bits}"),
            (Some(ip), None) => ip.to_string(),
            (None, _) => "-".into(),
        };
        Self {
            name: i.name.clone(),
            device: i.device.clone(),
            description: i.description.clone(),
            address,
            enabled: util::yes_no(i.enabled),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: ServerArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let paint = Painter::new(&global.color);
    match args.command {
        ServerCommand::Test => {
            let connection = session.connection_for(&session.profile_name, global)?;
            let info = session.mirror.test_connection(&connection).await?;
            if !global.quiet {
                eprintln!(
                    "{} {} {} at {}",
                    paint.good("✓"),
                    info.product_name,
                    info.product_version,
                    connection.hostname
                );
            }
            let out = output::render_list(
                &global.output,
                &info.interfaces,
                |i| InterfaceRow::from(i),
                |i| i.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ServerCommand::Register { no_sync } => {
            let name = session.profile_name.clone();
            let profile = session.profile()?;
            let request = RegisterRequest {
                name: name.clone(),
                connection: session.connection_for(&name, global)?,
                credential_ref: format!("keyring:{}", config::credential_ref(&name)),
            };
            tracing::debug!(server = %name, host = %profile.hostname, "registering");

            if no_sync {
                let outcome = session.mirror.register_server(request).await?;
                let out = output::render_single(
                    &global.output,
                    &outcome,
                    |o| format!("{} {}", paint.good("✓"), o.message),
                    |o| o.server_id.to_string(),
                );
                output::print_output(&out, global.quiet);
                return Ok(());
            }

            let outcome = session.mirror.onboard_and_sync(request).await?;
            let out = output::render_single(
                &global.output,
                &outcome,
                |o| {
                    format!(
                        "{} {} (OPNsense {})\n{}",
                        paint.good("✓"),
                        o.registration.message,
                        o.product_version,
                        sync::detail(&o.sync, paint)
                    )
                },
                |o| o.registration.server_id.to_string(),
            );
            output::print_output(&out, global.quiet);
            sync::ensure_usable(&outcome.sync)
        }

        ServerCommand::List => {
            let views = session
                .mirror
                .servers()
                .into_iter()
                .map(|server| {
                    let last_sync = session.mirror.sync_info(server.id).ok().flatten();
                    ServerView { server, last_sync }
                })
                .collect::<Vec<_>>();
            let out = output::render_list(
                &global.output,
                &views,
                |v| ServerRow::from_view(v, paint),
                |v| v.server.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ServerCommand::Remove { server } => {
            let id = session
                .mirror
                .resolve(&server)
                .map_err(|_| CliError::server_not_found(&server))?;
            if !util::confirm(
                &format!("Forget server '{server}' and its mirrored state?"),
                "server remove",
                global.yes,
            )? {
                return Ok(());
            }
            let removed = session.mirror.unregister_server(id)?;
            if !global.quiet {
                eprintln!("{} Server '{}' removed", paint.good("✓"), removed.name);
            }
            Ok(())
        }
    }
}
