//! Configuration module
//!
//! Primitive settings come from `arkwrap/config` through prefer; tool program
//! overrides live in the `[programs]` table of the same file.

mod programs;

pub use programs::ProgramOverrides;

use std::time::Duration;

use prefer::Config as PreferConfig;

use crate::backend::process::DEFAULT_GRACE;

pub struct Config {
    inner: PreferConfig,
}

impl Config {
    pub async fn load() -> prefer::Result<Self> {
        let inner = prefer::load("arkwrap/config").await?;
        Ok(Self { inner })
    }

    async fn get_bool(&self, key: &str) -> Option<bool> {
        self.inner
            .get(key)
            .await
            .ok()
            .and_then(|v: prefer::ConfigValue| v.as_bool())
    }

    async fn get_i64(&self, key: &str) -> Option<i64> {
        self.inner
            .get(key)
            .await
            .ok()
            .and_then(|v: prefer::ConfigValue| v.as_i64())
    }

    pub async fn overwrite(&self) -> bool {
        self.get_bool("extract.overwrite").await.unwrap_or(false)
    }

    pub async fn limit_preview_size(&self) -> bool {
        self.get_bool("preview.limit_file_size").await.unwrap_or(true)
    }

    pub async fn preview_size_limit_mb(&self) -> u64 {
        self.get_i64("preview.file_size_limit_mb")
            .await
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(DEFAULT_PREVIEW_LIMIT_MB)
    }

    pub async fn termination_grace(&self) -> Duration {
        self.get_i64("process.termination_grace_ms")
            .await
            .and_then(|v| u64::try_from(v).ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_GRACE)
    }
}

const DEFAULT_PREVIEW_LIMIT_MB: u64 = 50;

/// Resolved settings snapshot handed to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub overwrite: bool,
    pub limit_preview_size: bool,
    pub preview_size_limit_mb: u64,
    pub termination_grace: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overwrite: false,
            limit_preview_size: true,
            preview_size_limit_mb: DEFAULT_PREVIEW_LIMIT_MB,
            termination_grace: DEFAULT_GRACE,
        }
    }
}

impl Settings {
    pub async fn from_config(config: &Config) -> Self {
        Self {
            overwrite: config.overwrite().await,
            limit_preview_size: config.limit_preview_size().await,
            preview_size_limit_mb: config.preview_size_limit_mb().await,
            termination_grace: config.termination_grace().await,
        }
    }

    /// Load from the user's config file, falling back to defaults.
    pub async fn load() -> Self {
        match Config::load().await {
            Ok(config) => Self::from_config(&config).await,
            Err(_) => {
                log::debug!("no arkwrap/config found, using defaults");
                Self::default()
            }
        }
    }

    /// Largest entry that may be previewed, if previews are limited.
    pub fn preview_limit_bytes(&self) -> Option<u64> {
        self.limit_preview_size
            .then(|| self.preview_size_limit_mb.saturating_mul(1024 * 1024))
    }
}
