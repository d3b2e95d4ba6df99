use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::input;
use crate::library::{JsonFileStore, LibraryStore};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibrarySettings {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputSettings {
    pub device: Option<PathBuf>,
    pub grab: bool,
    pub poll_interval_ms: u64,
    pub width: u32,
    pub height: u32,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            device: None,
            grab: false,
            poll_interval_ms: 4,
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    pub exit_grace_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { exit_grace_ms: 800 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub library: LibrarySettings,
    pub input: InputSettings,
    pub session: SessionSettings,
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("could not determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("sigilctl"))
}

fn settings_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

fn default_settings_text() -> &'static str {
    include_str!("../config/default.toml")
}

impl Settings {
    /// Reads `~/.config/sigilctl/config.toml`, writing the default file first
    /// if there is none.
    pub fn load_or_install_default() -> Result<Self> {
        let path = settings_path()?;
        if !path.exists() {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            fs::write(&path, default_settings_text())
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("installed default settings at {}", path.display());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        Self::parse(&txt).with_context(|| format!("invalid settings in {}", path.display()))
    }

    pub fn parse(txt: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(txt)?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    pub fn library_path(&self) -> Result<PathBuf> {
        match &self.library.path {
            Some(p) => Ok(p.clone()),
            None => Ok(config_dir()?.join("gestures.json")),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.input.poll_interval_ms)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.session.exit_grace_ms)
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let devices: Vec<_> = input::discover_devices()
            .into_iter()
            .map(|d| {
                serde_json::json!({
                    "path": d.path,
                    "name": d.name,
                    "kind": format!("{:?}", d.kind),
                })
            })
            .collect();
        let library = match self.library_path() {
            Ok(path) => {
                let status = match JsonFileStore::new(&path).load() {
                    Ok(lib) => serde_json::json!({"ok": true, "gestures": lib.len()}),
                    Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
                };
                serde_json::json!({"path": path, "status": status})
            }
            Err(e) => serde_json::json!({"error": e.to_string()}),
        };
        serde_json::json!({
            "settings": settings_path().ok(),
            "library": library,
            "input_readable": Path::new("/dev/input").read_dir().is_ok(),
            "input_group_member": check_in_input_group(),
            "devices": devices,
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn validate_settings(s: &Settings) -> Result<()> {
    if !(1..=1000).contains(&s.input.poll_interval_ms) {
        return Err(anyhow!("input.poll_interval_ms must be in 1..=1000"));
    }
    if s.input.width == 0 || s.input.height == 0 {
        return Err(anyhow!("input.width and input.height must be positive"));
    }
    if s.session.exit_grace_ms > 10_000 {
        return Err(anyhow!("session.exit_grace_ms must be at most 10000"));
    }
    if let Some(p) = &s.library.path {
        if p.as_os_str().is_empty() {
            return Err(anyhow!("library.path must not be empty"));
        }
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}
