//! Runtime platform classification
//!
//! The platform identifier is sent as the `package_name` form field and
//! decides whether a process-level fault hook can be installed at all.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Kind of runtime the application is running on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Native desktop process (Linux, macOS, Windows)
    Desktop,
    /// Android application process
    Android,
    /// iOS application process
    Ios,
    /// Native process without a display (servers, CI)
    Headless,
    /// Browser sandbox (wasm); no process-level fault trapping
    Web,
}

impl Platform {
    /// Whether a process-wide fault handler can be installed on this platform.
    pub fn supports_fault_trapping(&self) -> bool {
        !matches!(self, Platform::Web)
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Platform::Desktop => "Desktop",
            Platform::Android => "Android",
            Platform::Ios => "iOS",
            Platform::Headless => "HeadlessDesktop",
            Platform::Web => "WebGL",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_web_skips_trapping() {
        assert!(Platform::Desktop.supports_fault_trapping());
        assert!(Platform::Android.supports_fault_trapping());
        assert!(Platform::Ios.supports_fault_trapping());
        assert!(Platform::Headless.supports_fault_trapping());
        assert!(!Platform::Web.supports_fault_trapping());
    }

    #[test]
    fn test_display() {
        assert_eq!(Platform::Desktop.to_string(), "Desktop");
        assert_eq!(Platform::Web.to_string(), "WebGL");
    }
}
