//! Runtime identity port
//!
//! Describes the running application for the delivery form fields and for
//! the install-time platform check.

use crate::domain::Platform;

/// Port trait describing the running application
pub trait IRuntimeIdentity: Send + Sync {
    /// Platform the application is running on
    fn platform(&self) -> Platform;

    /// Application version string
    fn app_version(&self) -> String;
}
