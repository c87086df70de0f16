//! # curator-cloud
//!
//! Client for the shared cloud store that the sync engine mirrors into.
//!
//! - [`CloudClient`]: HTTP implementation of [`curator_core::CloudService`]
//! - [`HttpConnectivityProbe`]: reachability check used by the scheduler
//! - `mock` feature: [`mock::MockCloudService`], an in-memory cloud that
//!   assigns its own ids and records every call

pub mod client;
pub mod connectivity;
#[cfg(feature = "mock")]
pub mod mock;

pub use client::{CloudClient, CloudConfig};
pub use connectivity::HttpConnectivityProbe;
