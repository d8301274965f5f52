//! Per-invocation session: loaded config, the mirror restored from the
//! state file, and the profile → server wiring.
//!
//! Core never touches disk. This module reads the JSON `MirrorSnapshot`
//! at start-up and writes it back after commands that change the mirror.
//! Writers hold [`StateLock`] from load to save.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fd_lock::{RwLock, RwLockWriteGuard};
use tracing::{debug, info};

use opnmirror_config::{self as config, Config, Profile};
use opnmirror_core::{
    ConnectionConfig, Mirror, MirrorSettings, MirrorSnapshot, OpnConnector, ServerId,
    TlsVerification,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub struct Session {
    pub config: Config,
    pub config_path: PathBuf,
    pub state_path: PathBuf,
    pub profile_name: String,
    pub mirror: Mirror,
}

impl Session {
    /// Load config and state. A missing state file is an empty mirror.
    pub fn open(global: &GlobalOpts) -> Result<Self, CliError> {
        let config_path = global.config.clone().unwrap_or_else(config::config_path);
        let state_path = state_path(global);
        let config = config::load_config_from(&config_path)?;
        let profile_name = config.profile_name(global.profile.as_deref());
        let settings = settings_for(&config, &profile_name, global);
        let mirror = load_mirror(&state_path, settings)?;
        Ok(Self {
            config,
            config_path,
            state_path,
            profile_name,
            mirror,
        })
    }

    pub fn save(&self) -> Result<(), CliError> {
        save_mirror(&self.state_path, &self.mirror)
    }

    /// The active profile, or a usage error listing the defined ones.
    pub fn profile(&self) -> Result<&Profile, CliError> {
        self.profile_named(&self.profile_name)
    }

    pub fn profile_named(&self, name: &str) -> Result<&Profile, CliError> {
        self.config
            .profiles
            .get(name)
            .ok_or_else(|| CliError::ProfileNotFound {
                name: name.to_owned(),
                available: available_profiles(&self.config),
            })
    }

    /// Connection settings for a profile with `--insecure` / `--timeout`
    /// applied on top.
    pub fn connection_for(&self, name: &str, global: &GlobalOpts) -> Result<ConnectionConfig, CliError> {
        let profile = self.profile_named(name)?;
        let mut connection =
            config::profile_to_connection_config(profile, name, &self.config.defaults)?;
        if global.insecure {
            connection.tls = TlsVerification::DangerAcceptInvalid;
        }
        if let Some(secs) = global.timeout {
            connection.timeout = Duration::from_secs(secs);
        }
        Ok(connection)
    }

    /// The registered server for the active profile, without connecting.
    pub fn server_id(&self) -> Result<ServerId, CliError> {
        self.mirror
            .resolve(&self.profile_name)
            .map_err(|_| CliError::server_not_found(&self.profile_name))
    }

    /// The registered server for the active profile, connected with the
    /// profile's credentials.
    pub fn connected_server(&self, global: &GlobalOpts) -> Result<ServerId, CliError> {
        let id = self.server_id()?;
        let connection = self.connection_for(&self.profile_name, global)?;
        self.mirror.connect(id, &connection)?;
        Ok(id)
    }

    /// Connect every registered server that has a profile of the same
    /// name. Servers without one are skipped (and stay unconnected).
    pub fn connect_all(&self, global: &GlobalOpts) -> Result<usize, CliError> {
        self.connect_all_in(&self.mirror, global)
    }

    /// [`Session::connect_all`] against another mirror, such as one
    /// reloaded from the state file.
    pub fn connect_all_in(&self, mirror: &Mirror, global: &GlobalOpts) -> Result<usize, CliError> {
        let mut connected = 0;
        for server in mirror.servers() {
            if !self.config.profiles.contains_key(&server.name) {
                tracing::warn!(server = %server.name, "no profile for server, skipping");
                continue;
            }
            let connection = self.connection_for(&server.name, global)?;
            mirror.connect(server.id, &connection)?;
            connected += 1;
        }
        Ok(connected)
    }
}

fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn settings_for(config: &Config, profile_name: &str, global: &GlobalOpts) -> MirrorSettings {
    let mut settings = config.mirror_settings(config.profiles.get(profile_name));
    if let Some(secs) = global.timeout {
        settings.remote_timeout = Duration::from_secs(secs);
    }
    settings
}

// ── State file ───────────────────────────────────────────────────────

pub fn state_path(global: &GlobalOpts) -> PathBuf {
    global.state.clone().unwrap_or_else(config::state_path)
}

/// Advisory lock serializing every process that writes one state file.
///
/// The lock lives on a sibling `.lock` file: saves replace the state file
/// by rename, so a lock on the state file itself would not survive one.
/// Released when the guard drops, or when the process exits.
pub struct StateLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl StateLock {
    pub fn open(state_path: &Path) -> Result<Self, CliError> {
        if let Some(parent) = state_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path = state_path.with_extension("json.lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        Ok(Self {
            path,
            lock: RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until no other process holds the lock.
    pub fn acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>, CliError> {
        let free = match self.lock.try_write() {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::WouldBlock => false,
            Err(e) => return Err(e.into()),
        };
        if !free {
            info!(lock = %self.path.display(), "waiting for another opnmirror process");
        }
        Ok(self.lock.write()?)
    }

    /// `None` when another process holds the lock.
    pub fn try_acquire(&mut self) -> Result<Option<RwLockWriteGuard<'_, File>>, CliError> {
        match self.lock.try_write() {
            Ok(guard) => Ok(Some(guard)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn load_mirror(path: &Path, settings: MirrorSettings) -> Result<Mirror, CliError> {
    let connector = Arc::new(OpnConnector);
    if !path.exists() {
        debug!(path = %path.display(), "no state file, starting empty");
        return Ok(Mirror::new(connector, settings));
    }
    let state_err = |reason: String| CliError::State {
        path: path.display().to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| state_err(e.to_string()))?;
    let snapshot: MirrorSnapshot =
        serde_json::from_str(&raw).map_err(|e| state_err(e.to_string()))?;
    let mirror =
        Mirror::restore(connector, settings, snapshot).map_err(|e| state_err(e.to_string()))?;
    debug!(path = %path.display(), servers = mirror.servers().len(), "state loaded");
    Ok(mirror)
}

/// Write through a sibling temp file so a crash never leaves half a file.
pub fn save_mirror(path: &Path, mirror: &Mirror) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&mirror.snapshot())?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "state saved");
    Ok(())
}
