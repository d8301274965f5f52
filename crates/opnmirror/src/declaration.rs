//! Declaration files: the resources a user wants on an appliance.
//!
//! Accepted shapes, all YAML:
//!
//! ```yaml
//! kind: vlan                 # a single resource
//! parent_interface: igc1
//! tag: 120
//! ```
//!
//! a top-level list of resources, or a mapping with a `resources:` list.

use std::path::Path;

use opnmirror_core::Proposal;

use crate::error::CliError;

pub fn read(path: &Path) -> Result<Vec<Proposal>, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|e| declaration_err(path, e.to_string()))?;
    parse(&raw).map_err(|reason| declaration_err(path, reason))
}

fn declaration_err(path: &Path, reason: String) -> CliError {
    CliError::Declaration {
        path: path.display().to_string(),
        reason,
    }
}

pub fn parse(raw: &str) -> Result<Vec<Proposal>, String> {
    let doc: serde_yaml::Value = serde_yaml::from_str(raw).map_err(|e| e.to_string())?;
    let items = match doc {
        serde_yaml::Value::Sequence(items) => items,
        serde_yaml::Value::Mapping(mut map) => match map.remove("resources") {
            Some(serde_yaml::Value::Sequence(items)) => items,
            Some(_) => return Err("`resources` must be a list".into()),
            None => vec![serde_yaml::Value::Mapping(map)],
        },
        serde_yaml::Value::Null => Vec::new(),
        _ => return Err("expected a mapping or a list of resources".into()),
    };
    if items.is_empty() {
        return Err("no resources declared".into());
    }

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_yaml::from_value::<Proposal>(item)
                .map_err(|e| format!("resource #{}: {e}", i + 1))
        })
        .collect()
}
