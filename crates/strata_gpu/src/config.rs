//! Memory manager configuration

use crate::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use strata_env::{Platform, PlatformLimits};

/// Coalescing delay for non-urgent manage requests.
pub const DEFAULT_DELAYED_MANAGE_MS: u64 = 67;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpuMemoryConfig {
    /// Platform row to budget against; detected when absent.
    pub platform: Option<Platform>,
    /// Total GPU memory to budget. Wins over whatever the driver reports.
    pub total_gpu_memory_bytes: Option<u64>,
    /// Surfaces, in importance order, allowed to keep a frontbuffer; platform default when absent.
    pub max_surfaces_with_frontbuffer_soft_limit: Option<usize>,
    pub delayed_manage_ms: u64,
    /// Start in window-count budgeting mode.
    pub window_count: Option<u32>,
}

impl Default for GpuMemoryConfig {
    fn default() -> Self {
        Self {
            platform: None,
            total_gpu_memory_bytes: None,
            max_surfaces_with_frontbuffer_soft_limit: None,
            delayed_manage_ms: DEFAULT_DELAYED_MANAGE_MS,
            window_count: None,
        }
    }
}

impl GpuMemoryConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_gpu_memory_bytes == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "total_gpu_memory_bytes",
                reason: "must be non-zero when set".to_string(),
            });
        }
        if self.max_surfaces_with_frontbuffer_soft_limit == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_surfaces_with_frontbuffer_soft_limit",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        if self.window_count == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "window_count",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }

    pub fn limits(&self) -> PlatformLimits {
        PlatformLimits::for_platform(self.platform.unwrap_or_else(Platform::detect))
    }

    pub fn delayed_manage_delay(&self) -> Duration {
        Duration::from_millis(self.delayed_manage_ms)
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_total_gpu_memory(mut self, bytes: u64) -> Self {
        self.total_gpu_memory_bytes = Some(bytes);
        self
    }

    pub fn with_frontbuffer_soft_limit(mut self, limit: usize) -> Self {
        self.max_surfaces_with_frontbuffer_soft_limit = Some(limit);
        self
    }
}
