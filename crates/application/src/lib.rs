//! Application services and ports.

#![forbid(unsafe_code)]

mod renewal_scheduler;
mod rotation_ports;
mod rotation_service;
mod secret_sync;

#[cfg(test)]
mod test_support;

pub use renewal_scheduler::RenewalScheduler;
pub use rotation_ports::{
    IssuedSecret, PlatformGroup, PlatformProject, SecretIssuer, SourceControlPlatform,
};
pub use rotation_service::{DiscoveryTickSummary, RotationService};
pub use secret_sync::{SyncOutcome, sync_secret};
