//! Core library for the cloudvol volume driver.
//!
//! The crate exposes cloud block-storage disks as mountable host paths for
//! a container runtime. A stateless driver derives a canonical disk
//! configuration from each volume name and orchestrates the provider and
//! host-filesystem calls behind the lifecycle verbs (create → mount →
//! unmount → remove), recomputing everything per request so uncorrelated
//! calls agree on device names and mount points.

pub mod compute;
pub mod config;
pub mod disk;
pub mod driver;
pub mod fs;
pub mod observe;
pub mod provider;
pub mod test_support;

pub use compute::{ComputeProvider, ComputeProviderError};
pub use config::{ConfigError, DriverConfig};
pub use disk::{DiskConfig, DiskConfigError};
pub use driver::{Capability, DEFAULT_ROOT, DriverError, Scope, Volume, VolumeDriver};
pub use fs::{
    CommandOutput, CommandRunner, FilesystemOps, FsError, HostFilesystem, PathMeta,
    ProcessCommandRunner,
};
pub use observe::{LifecycleObserver, NoopObserver, Verb};
pub use provider::{Disk, DiskProvider, ProviderFuture, READY_STATUS};
