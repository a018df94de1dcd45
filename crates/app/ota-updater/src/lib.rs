//! Client side of over-the-air bundle updates
//!
//! [`UpdateChecker`] builds a query from the installed package (or the app's
//! static config on first run), asks an [`UpdateSource`] for the bundle to move
//! to, and flags updates that were rolled back before. Checks never fail: a
//! network or local state error is logged and treated as "no update".

mod checker;
mod config;
mod error;
mod source;
mod state;

pub use checker::{DownloadedPackage, RemotePackage, UpdateChecker};
pub use config::{DEFAULT_REQUEST_TIMEOUT, UpdaterConfig};
pub use error::{UpdaterError, UpdaterResult};
pub use source::{DeploymentStatus, HttpUpdateSource, UpdateSource};
pub use state::{FailedUpdates, JsonStateStore, LocalPackage, MemoryStateStore, PackageStore};
