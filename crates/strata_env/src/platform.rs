// platform.rs
//! Platform family detection.
//! Resolved once per process; falls back to `Desktop` when nothing more specific is found.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable that forces a platform family (`desktop`, `android`, `chromeos`).
pub const PLATFORM_ENV_VAR: &str = "STRATA_PLATFORM";

/// Platform family the memory limits are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Desktop,
    Android,
    #[serde(rename = "chromeos")]
    ChromeOs,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Desktop, Platform::Android, Platform::ChromeOs];

    /// Detect the running platform. Cached after the first call.
    pub fn detect() -> Self {
        static INSTANCE: OnceCell<Platform> = OnceCell::new();
        *INSTANCE.get_or_init(|| {
            let platform = Self::detect_impl();
            tracing::debug!(?platform, "detected platform family");
            platform
        })
    }

    fn detect_impl() -> Self {
        if let Ok(value) = std::env::var(PLATFORM_ENV_VAR) {
            match value.parse() {
                Ok(platform) => return platform,
                Err(_) => tracing::warn!(%value, "ignoring unknown {}", PLATFORM_ENV_VAR),
            }
        }
        if cfg!(target_os = "android") {
            Platform::Android
        } else if is_chromeos() {
            Platform::ChromeOs
        } else {
            Platform::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Desktop => "desktop",
            Platform::Android => "android",
            Platform::ChromeOs => "chromeos",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlatform(pub String);

impl fmt::Display for UnknownPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown platform '{}'", self.0)
    }
}

impl std::error::Error for UnknownPlatform {}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(Platform::Desktop),
            "android" => Ok(Platform::Android),
            "chromeos" | "chrome_os" | "cros" => Ok(Platform::ChromeOs),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/* --------------------- Linux: ChromeOS probe --------------------- */

#[cfg(target_os = "linux")]
fn is_chromeos() -> bool {
    // /etc/lsb-release: "CHROMEOS_RELEASE_NAME=Chrome OS"
    std::fs::read_to_string("/etc/lsb-release")
        .map(|text| parse_lsb_release(&text))
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_chromeos() -> bool {
    false
}

#[cfg_attr(not(any(target_os = "linux", test)), allow(dead_code))]
fn parse_lsb_release(text: &str) -> bool {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .any(|(key, value)| key.trim() == "CHROMEOS_RELEASE_NAME" && !value.trim().is_empty())
}
