//! Container record handlers.

use crate::cli::{ContainerArgs, ContainerCommand, GlobalOpts};
use crate::error::CliError;
use crate::output::{self, Painter};
use crate::state::Session;

use super::util;

pub async fn handle(session: &Session, args: ContainerArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ContainerCommand::Remove { name } => {
            let id = session.server_id()?;
            if !util::confirm(
                &format!("Release the address, MAC, and ports of container '{name}'?"),
                "container remove",
                global.yes,
            )? {
                return Ok(());
            }
            let removed = session.mirror.remove_container(id, &name).await?;
            let paint = Painter::new(&global.color);
            let out = output::render_single(
                &global.output,
                &removed,
                |c| {
                    format!(
                        "{} Container '{}' removed; {} and {} are free again.\n  \
                         Appliance-side VLAN, reservation, and forwards are unchanged.",
                        paint.good("✓"),
                        c.name,
                        c.network.ip_address,
                        c.network.mac_address
                    )
                },
                |c| c.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
