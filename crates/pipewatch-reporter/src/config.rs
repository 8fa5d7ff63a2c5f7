use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use pipewatch_core::LockWait;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Give up on the in-flight batch map after this long.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Wait for the batch map lock forever, ignoring `timeout_ms`.
    #[serde(default)]
    pub blocking: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub format: RenderFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    /// Compact view: in-flight count and stalled threads by plugin.
    #[default]
    Text,
    /// Full record on one line.
    Json,
    /// Full record, indented.
    Pretty,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_interval_ms() -> u64 {
    1_000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { timeout_ms: default_timeout_ms(), blocking: false }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { interval_ms: default_interval_ms(), count: None }
    }
}

impl FromStr for RenderFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(RenderFormat::Text),
            "json" => Ok(RenderFormat::Json),
            "pretty" => Ok(RenderFormat::Pretty),
            other => Err(anyhow!("unknown render format {other:?} (expected text, json or pretty)")),
        }
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderFormat::Text => "text",
            RenderFormat::Json => "json",
            RenderFormat::Pretty => "pretty",
        })
    }
}

impl ReporterConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: ReporterConfig = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn lock_wait(&self) -> LockWait {
        if self.lock.blocking {
            LockWait::Blocking
        } else {
            LockWait::Bounded(Duration::from_millis(self.lock.timeout_ms))
        }
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch.interval_ms)
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(shellexpand::tilde("~/.pipewatch/config.toml").to_string())
    }
}
