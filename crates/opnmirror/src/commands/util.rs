//! Shared helpers for command handlers.

use std::io::IsTerminal;

use chrono::{DateTime, Utc};

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
/// Without a terminal to ask on, `--yes` is required.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// `2026-10-19 14:02:11` in UTC, or `-`.
pub fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

pub fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.into()
}
