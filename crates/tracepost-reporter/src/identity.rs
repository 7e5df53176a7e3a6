//! Runtime identity of the current process
//!
//! Classifies the platform from the compile target and supplies the
//! application version reported with each crash.

use tracepost_core::domain::Platform;
use tracepost_core::ports::IRuntimeIdentity;

/// [`IRuntimeIdentity`] for the running process.
#[derive(Debug, Clone)]
pub struct ProcessIdentity {
    platform: Platform,
    app_version: String,
}

impl ProcessIdentity {
    /// Identity for this build target, reporting `app_version`.
    pub fn new(app_version: impl Into<String>) -> Self {
        Self {
            platform: detect_platform(),
            app_version: app_version.into(),
        }
    }

    /// Identity with an explicit platform.
    pub fn with_platform(platform: Platform, app_version: impl Into<String>) -> Self {
        Self {
            platform,
            app_version: app_version.into(),
        }
    }

    /// Identity using the configured version, falling back to this crate's.
    pub fn from_config_version(version: Option<&str>) -> Self {
        Self::new(version.unwrap_or(env!("CARGO_PKG_VERSION")))
    }
}

impl IRuntimeIdentity for ProcessIdentity {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn app_version(&self) -> String {
        self.app_version.clone()
    }
}

/// Platform of the current compile target.
pub fn detect_platform() -> Platform {
    if cfg!(target_family = "wasm") {
        Platform::Web
    } else if cfg!(target_os = "android") {
        Platform::Android
    } else if cfg!(target_os = "ios") {
        Platform::Ios
    } else if is_headless() {
        Platform::Headless
    } else {
        Platform::Desktop
    }
}

fn is_headless() -> bool {
    if !cfg!(target_os = "linux") {
        return false;
    }
    std::env::var_os("DISPLAY").is_none() && std::env::var_os("WAYLAND_DISPLAY").is_none()
}
