// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::merge;
use super::Settings;

impl Settings {
    /// Settings file location: `settings.json` under [`polain_home`](Self::polain_home)
    pub fn default_path() -> PathBuf {
        Self::polain_home().join("settings.json")
    }

    /// Read and validate a settings file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }

        let settings: Settings = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Write to `path`, keeping keys of an existing file that these
    /// settings do not cover. An unreadable existing file is replaced.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let ours = serde_json::to_value(self)?;
        let value = match read_json(path) {
            Some(existing) => merge::deep_merge(existing, ours),
            None => ours,
        };
        write_json(path, &value)
    }

    /// Write to `path`, replacing whatever it held
    pub fn overwrite(&self, path: &Path) -> Result<()> {
        write_json(path, &serde_json::to_value(self)?)
    }

    /// Get the polain home directory (~/.polain or $POLAIN_HOME).
    pub fn polain_home() -> PathBuf {
        if let Ok(home) = std::env::var("POLAIN_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".polain")
    }
}

fn read_json(path: &Path) -> Option<serde_json::Value> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Replacing unreadable settings file: {}", e);
            None
        }
    }
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
