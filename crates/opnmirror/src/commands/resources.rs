//! Mirrored resource listings. Reads the local mirror only.

use tabled::Tabled;

use opnmirror_core::{EntityKind, MirrorEntity, Resource};

use crate::cli::{GlobalOpts, ListArgs};
use crate::error::CliError;
use crate::output;
use crate::state::Session;

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn natural_key(resource: &Resource) -> String {
    match resource {
        Resource::Interface(e) => e.natural_key(),
        Resource::Vlan(e) => e.natural_key(),
        Resource::FirewallRule(e) => e.natural_key(),
        Resource::PortForward(e) => e.natural_key(),
        Resource::DhcpServer(e) => e.natural_key(),
        Resource::DhcpStaticMapping(e) => e.natural_key(),
        Resource::Container(e) => e.natural_key(),
    }
}

fn row(resource: &Resource) -> ResourceRow {
    let key = natural_key(resource);
    let (summary, description) = match resource {
        Resource::Interface(i) => (
            format!(
                "{} {}",
                i.device,
                i.ip_address.map_or_else(|| "-".into(), |ip| ip.to_string())
            ),
            i.description.clone(),
        ),
        Resource::Vlan(v) => (format!("{} pcp {}", v.device, v.priority), v.description.clone()),
        Resource::FirewallRule(r) => (
            format!(
                "{} {} {} {} -> {}:{}{}",
                r.action,
                r.interface,
                r.protocol,
                r.source,
                r.destination,
                r.destination_port,
                if r.enabled { "" } else { " (disabled)" }
            ),
            r.description.clone(),
        ),
        Resource::PortForward(p) => (
            format!(
                "-> {}:{}{}",
                p.internal_ip,
                p.internal_port,
                if p.enabled { "" } else { " (disabled)" }
            ),
            p.description.clone(),
        ),
        Resource::DhcpServer(d) => (
            format!(
                "{}-{}{}",
                d.range_from,
                d.range_to,
                if d.enabled { "" } else { " (disabled)" }
            ),
            d.domain.clone(),
        ),
        Resource::DhcpStaticMapping(m) => (m.ip_address.to_string(), m.hostname.clone()),
        Resource::Container(c) => (
            format!(
                "vlan {} {} {} ports {}",
                c.network.vlan_id,
                c.network.ip_address,
                c.network.mac_address,
                c.ports
                    .iter()
                    .map(|p| format!("{}/{}", p.host_port, p.protocol))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            c.image.clone(),
        ),
    };
    ResourceRow {
        key,
        summary,
        description,
    }
}

pub fn handle(session: &Session, args: &ListArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = session.server_id()?;
    let kind = EntityKind::from(args.kind);
    let resources = session.mirror.list_resources(id, kind)?;
    tracing::debug!(%kind, count = resources.len(), "listing resources");
    let out = output::render_list(&global.output, &resources, row, natural_key);
    output::print_output(&out, global.quiet);
    Ok(())
}
