//! Capability contract for the cloud block-storage control plane.

use std::future::Future;
use std::pin::Pin;

use crate::disk::DiskConfig;

/// Status a disk must report before it is surfaced as a volume.
pub const READY_STATUS: &str = "READY";

/// A disk as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Disk {
    /// Provider-side disk name.
    pub name: String,
    /// Lifecycle status reported by the control plane.
    pub status: String,
}

impl Disk {
    /// Returns `true` when the disk is usable as a volume.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == READY_STATUS
    }
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Minimal interface implemented by cloud disk providers.
///
/// Operations cross a network boundary and may block while a resource
/// transitions; implementations bound such waits and fail with a timeout
/// rather than blocking indefinitely. Each operation must be individually
/// safe to retry, since the driver performs no cross-call coordination.
pub trait DiskProvider {
    /// Provider specific error type returned by the operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Provisions a new disk described by `config`.
    fn create<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error>;

    /// Deletes the disk named by `config`.
    fn delete<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error>;

    /// Attaches the disk to the host this driver runs on.
    fn attach<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error>;

    /// Detaches the disk from the host this driver runs on.
    fn detach<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error>;

    /// Lists all disks visible to the configured project and zone.
    fn list(&self) -> ProviderFuture<'_, Vec<Disk>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_status_gates_visibility() {
        let ready = Disk {
            name: String::from("vol1"),
            status: String::from("READY"),
        };
        let creating = Disk {
            name: String::from("vol2"),
            status: String::from("CREATING"),
        };

        assert!(ready.is_ready());
        assert!(!creating.is_ready());
    }
}
