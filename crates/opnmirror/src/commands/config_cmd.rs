//! Config subcommand handlers. None of these touch the mirror.

use std::path::Path;

use dialoguer::{Confirm, Input, Select};
use serde::Serialize;
use tabled::Tabled;

use opnmirror_config::{self as config, Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn config_path(global: &GlobalOpts) -> std::path::PathBuf {
    global.config.clone().unwrap_or_else(config::config_path)
}

fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.api_secret.is_some() {
            profile.api_secret = Some("********".into());
        }
    }
    cfg
}

#[derive(Clone, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "TLS")]
    tls: String,
    #[tabled(rename = "Default")]
    default: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config_path(global);
    match args.command {
        ConfigCommand::Init => init(&path),

        ConfigCommand::Show => {
            let cfg = config::load_config_from(&path)?;
            let shown = redacted(&cfg);
            let out = output::render_single(
                &global.output,
                &shown,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("# {e}")),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let state = global.state.clone().unwrap_or_else(config::state_path);
            output::print_output(
                &format!("config: {}\nstate:  {}", path.display(), state.display()),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_from(&path)?;
            let default = cfg.profile_name(None);
            let rows: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileRow {
                    name: name.clone(),
                    hostname: p.hostname.clone(),
                    tls: if config::tls_for(p).verifies() { "verified" } else { "insecure" }.into(),
                    default: if *name == default { "*" } else { "" }.into(),
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &rows,
                ProfileRow::clone,
                |r| r.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetSecret => {
            let cfg = config::load_config_from(&path)?;
            let name = cfg.profile_name(global.profile.as_deref());
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", "),
                });
            }
            let secret = rpassword::prompt_password(format!("API secret for '{name}': "))
                .map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "api_secret".into(),
                    reason: "API secret cannot be empty".into(),
                });
            }
            config::store_api_secret(&name, &secret)?;
            if !global.quiet {
                eprintln!("✓ API secret stored in system keyring ({})", config::credential_ref(&name));
            }
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init(path: &Path) -> Result<(), CliError> {
    eprintln!("opnmirror configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    let mut cfg = config::load_config_from(path)?;

    let profile_name: String = Input::new()
        .with_prompt("Profile name (also the server name)")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let hostname: String = Input::new()
        .with_prompt("Appliance address")
        .default("192.168.1.1".into())
        .interact_text()
        .map_err(prompt_err)?;

    let api_key: String = Input::new()
        .with_prompt("API key")
        .interact_text()
        .map_err(prompt_err)?;

    let secret = rpassword::prompt_password("API secret: ").map_err(prompt_err)?;
    if api_key.is_empty() || secret.is_empty() {
        return Err(CliError::Validation {
            field: "credentials".into(),
            reason: "API key and secret cannot be empty".into(),
        });
    }

    let store_choices = &[
        "Store secret in system keyring (recommended)",
        "Save secret to config file (plaintext)",
    ];
    let store_selection = Select::new()
        .with_prompt("Where to store the API secret?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let api_secret = if store_selection == 0 {
        config::store_api_secret(&profile_name, &secret)?;
        eprintln!("   ✓ API secret stored in system keyring");
        None
    } else {
        Some(secret)
    };

    let verify_ssl = Confirm::new()
        .with_prompt("Verify the appliance's TLS certificate?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    cfg.profiles.insert(
        profile_name.clone(),
        Profile {
            hostname,
            api_key: Some(api_key),
            api_secret,
            verify_ssl,
            ..Profile::default()
        },
    );
    if cfg.profiles.len() == 1 || cfg.default_profile.is_none() {
        cfg.default_profile = Some(profile_name.clone());
    }

    config::save_config_to(path, &cfg)?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Profile: {profile_name}");
    eprintln!("\n  Next: opnmirror -p {profile_name} server register");
    Ok(())
}
