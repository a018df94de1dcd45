//! Types shared by the bundle update server and its clients.
//!
//! The server side stores [`BundleRecord`]s and answers [`UpdateQuery`]s with
//! an optional [`UpdateDescriptor`]. Both sides identify bundle content by its
//! [`ContentHash`].

pub mod api;
mod error;
mod hash;
mod types;

pub use error::CoreError;
pub use hash::ContentHash;
pub use types::{BundleKey, BundleRecord, Platform, UpdateDescriptor, UpdateQuery};
