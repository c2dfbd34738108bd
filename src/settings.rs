use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use crate::attribution::{AttributionConfig, AttributionPolicy};
use crate::context::CallContext;
use crate::models::{ParseVideoRefError, VideoRef};
use crate::utils::{parse_interval, IntervalError};

/// Credentials for a metadata supplier that talks to the platform.
///
/// Reserved: the bundled binary serves metadata from its SQLite cache and
/// only reports whether these are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamCredentials {
    pub cookie: Option<String>,
    pub uid: Option<String>,
}

impl UpstreamCredentials {
    pub fn is_configured(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.cookie) || present(&self.uid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: PathBuf,
    pub tracked_videos: Vec<String>,
    pub max_windows: u64,
    pub query_timeout_secs: u64,
    pub attribution_policy: AttributionPolicy,
    pub default_interval: String,
    pub upstream: UpstreamCredentials,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("watchtime.sqlite3"),
            tracked_videos: Vec::new(),
            max_windows: 10_000,
            query_timeout_secs: 30,
            attribution_policy: AttributionPolicy::StartWindow,
            default_interval: "1h".into(),
            upstream: UpstreamCredentials::default(),
        }
    }
}

impl Settings {
    pub fn attribution_config(&self) -> AttributionConfig {
        AttributionConfig {
            max_windows: self.max_windows,
            policy: self.attribution_policy,
            ..AttributionConfig::default()
        }
    }

    pub fn tracked_video_refs(&self) -> Result<Vec<VideoRef>, ParseVideoRefError> {
        self.tracked_videos.iter().map(|raw| raw.parse()).collect()
    }

    pub fn default_interval(&self) -> Result<chrono::Duration, IntervalError> {
        parse_interval(&self.default_interval)
    }

    pub fn call_context(&self) -> CallContext {
        CallContext::with_timeout(Duration::from_secs(self.query_timeout_secs))
    }
}

/// JSON settings file. A missing file yields defaults; writes are pretty-printed.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            read_settings(&path)?
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Applies `change` and writes the result back to disk.
    pub fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        change(&mut guard);
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let data = read_settings(&self.path)?;
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn read_settings(path: &Path) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse settings in {}", path.display()))
}
