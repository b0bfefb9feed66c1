//! Volume lifecycle orchestration over the provider and filesystem
//! capabilities.
//!
//! The driver holds no per-volume state: every verb re-derives its disk
//! configuration from the volume name and asks the provider or the host
//! filesystem for the truth. Multi-step verbs abort on the first failing
//! step with no compensation; retrying the whole verb is safe because each
//! step is individually idempotent.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::disk::{DiskConfig, DiskConfigError};
use crate::fs::{FilesystemOps, FsError};
use crate::observe::{LifecycleObserver, NoopObserver, Verb};
use crate::provider::DiskProvider;

/// Default root directory for volume mount points.
pub const DEFAULT_ROOT: &str = "/mnt/";

/// Mode applied when the driver creates a mount-point directory.
const MOUNT_POINT_MODE: u32 = 0o755;

/// Caller-visible projection of a disk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Volume {
    /// Logical volume name.
    pub name: String,
    /// Mount point recomputed from the name; absent in list summaries.
    pub mountpoint: Option<Utf8PathBuf>,
}

/// Visibility scope advertised by the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    /// Volumes are visible on this host only.
    Local,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
        }
    }
}

/// Static driver capabilities.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Capability {
    /// Volume visibility scope.
    pub scope: Scope,
}

/// Errors surfaced by the lifecycle verbs.
#[derive(Debug, Error)]
pub enum DriverError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the disk configuration cannot be derived; no provider or
    /// filesystem call has been made.
    #[error("invalid volume configuration: {0}")]
    Config(#[from] DiskConfigError),
    /// Raised when the mount-point path exists but is not a directory. The
    /// existing path is left untouched.
    #[error("mountpoint {path} already exists and is not a directory")]
    MountPointConflict {
        /// Conflicting path.
        path: Utf8PathBuf,
    },
    /// Provider failure, propagated verbatim.
    #[error("provider error: {0}")]
    Provider(#[source] E),
    /// Host filesystem failure, propagated verbatim.
    #[error("filesystem error: {0}")]
    Filesystem(#[source] FsError),
}

/// Stateless volume lifecycle driver.
///
/// Composes a [`DiskProvider`] and a [`FilesystemOps`] implementation under
/// a fixed mount root. Concurrent calls for the same name race at the
/// capability layer; callers that need serialisation must provide it.
#[derive(Debug)]
pub struct VolumeDriver<P, F, O = NoopObserver> {
    root: Utf8PathBuf,
    provider: P,
    fs: F,
    observer: O,
}

impl<P, F> VolumeDriver<P, F, NoopObserver>
where
    P: DiskProvider,
    F: FilesystemOps,
{
    /// Creates a driver with no observer.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, provider: P, fs: F) -> Self {
        Self::with_observer(root, provider, fs, NoopObserver)
    }
}

impl<P, F, O> VolumeDriver<P, F, O>
where
    P: DiskProvider,
    F: FilesystemOps,
    O: LifecycleObserver,
{
    /// Creates a driver reporting lifecycle events to `observer`.
    #[must_use]
    pub fn with_observer(root: impl Into<Utf8PathBuf>, provider: P, fs: F, observer: O) -> Self {
        Self {
            root: root.into(),
            provider,
            fs,
            observer,
        }
    }

    /// Returns the root directory volumes are mounted under.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Provisions a new disk for `name` using create-time options.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] before any provider call when the
    /// options fail derivation, or [`DriverError::Provider`] verbatim.
    pub async fn create(
        &self,
        name: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<(), DriverError<P::Error>> {
        self.observer.request(Verb::Create, Some(name));
        let started = Instant::now();
        let config = DiskConfig::derive(name, options)?;

        self.provider
            .create(&config)
            .await
            .map_err(DriverError::Provider)?;

        self.observer
            .completed(Verb::Create, &config.name, started.elapsed());
        Ok(())
    }

    /// Lists volumes backed by disks the provider reports as ready.
    ///
    /// Disks in transient states are omitted, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Provider`] verbatim.
    pub async fn list(&self) -> Result<Vec<Volume>, DriverError<P::Error>> {
        self.observer.request(Verb::List, None);
        let disks = self.provider.list().await.map_err(DriverError::Provider)?;

        Ok(disks
            .into_iter()
            .filter(crate::provider::Disk::is_ready)
            .map(|disk| Volume {
                name: disk.name,
                mountpoint: None,
            })
            .collect())
    }

    /// Looks up a single volume by name.
    ///
    /// Returns `Ok(None)` when the provider reports no disk with that name.
    /// Names are expected to be unique at the provider; should duplicates
    /// occur, the last listed match wins.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] or [`DriverError::Provider`].
    pub async fn get(&self, name: &str) -> Result<Option<Volume>, DriverError<P::Error>> {
        self.observer.request(Verb::Get, Some(name));
        let config = DiskConfig::derive_default(name)?;
        let disks = self.provider.list().await.map_err(DriverError::Provider)?;

        let mut found = None;
        for disk in disks {
            if disk.name != config.name {
                continue;
            }
            found = Some(Volume {
                name: disk.name,
                mountpoint: Some(config.mount_point(&self.root)),
            });
        }

        Ok(found)
    }

    /// Resolves the mount point for `name`, creating the directory if absent.
    ///
    /// Performs no attach or mount.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MountPointConflict`] when the path exists but
    /// is not a directory, leaving it untouched, or [`DriverError::Config`] /
    /// [`DriverError::Filesystem`].
    pub async fn path(&self, name: &str) -> Result<Utf8PathBuf, DriverError<P::Error>> {
        self.observer.request(Verb::Path, Some(name));
        let config = DiskConfig::derive_default(name)?;
        let target = config.mount_point(&self.root);
        self.ensure_mount_point(&target)?;
        Ok(target)
    }

    /// Attaches the disk, formats it if blank, and mounts it.
    ///
    /// Formatting is a safe no-op when the device already carries a
    /// filesystem signature, so repeated mounts never destroy data. The
    /// first failing step aborts the remainder and surfaces that step's
    /// error; no completed step is rolled back.
    ///
    /// # Errors
    ///
    /// Returns the failing step's error: [`DriverError::Config`],
    /// [`DriverError::MountPointConflict`], [`DriverError::Provider`], or
    /// [`DriverError::Filesystem`].
    pub async fn mount(&self, name: &str) -> Result<Utf8PathBuf, DriverError<P::Error>> {
        self.observer.request(Verb::Mount, Some(name));
        let started = Instant::now();
        let config = DiskConfig::derive_default(name)?;
        let target = config.mount_point(&self.root);

        self.ensure_mount_point(&target)?;

        self.provider
            .attach(&config)
            .await
            .map_err(DriverError::Provider)?;

        let device = config.device_path();
        self.fs.format(&device).map_err(DriverError::Filesystem)?;
        self.fs
            .mount(&device, &target)
            .map_err(DriverError::Filesystem)?;

        self.observer
            .completed(Verb::Mount, &config.name, started.elapsed());
        Ok(target)
    }

    /// Unmounts the volume, then detaches its disk.
    ///
    /// An unmount failure aborts before detach; a still-mounted device is
    /// never detached by this layer.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`], [`DriverError::Filesystem`], or
    /// [`DriverError::Provider`].
    pub async fn unmount(&self, name: &str) -> Result<(), DriverError<P::Error>> {
        self.observer.request(Verb::Unmount, Some(name));
        let started = Instant::now();
        let config = DiskConfig::derive_default(name)?;
        let target = config.mount_point(&self.root);

        self.fs.unmount(&target).map_err(DriverError::Filesystem)?;

        self.provider
            .detach(&config)
            .await
            .map_err(DriverError::Provider)?;

        self.observer
            .completed(Verb::Unmount, &config.name, started.elapsed());
        Ok(())
    }

    /// Deletes the disk backing `name`.
    ///
    /// No local unmounted/detached precondition is checked; the provider's
    /// own safety checks decide, and their refusal is surfaced verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] or [`DriverError::Provider`].
    pub async fn remove(&self, name: &str) -> Result<(), DriverError<P::Error>> {
        self.observer.request(Verb::Remove, Some(name));
        let started = Instant::now();
        let config = DiskConfig::derive_default(name)?;

        self.provider
            .delete(&config)
            .await
            .map_err(DriverError::Provider)?;

        self.observer
            .completed(Verb::Remove, &config.name, started.elapsed());
        Ok(())
    }

    /// Returns the driver's static capabilities.
    #[must_use]
    pub fn capabilities(&self) -> Capability {
        self.observer.request(Verb::Capabilities, None);
        Capability {
            scope: Scope::Local,
        }
    }

    fn ensure_mount_point(&self, target: &Utf8Path) -> Result<(), DriverError<P::Error>> {
        match self.fs.stat(target).map_err(DriverError::Filesystem)? {
            None => self
                .fs
                .mkdir_all(target, MOUNT_POINT_MODE)
                .map_err(DriverError::Filesystem),
            Some(meta) if meta.is_dir => Ok(()),
            Some(_) => Err(DriverError::MountPointConflict {
                path: target.to_owned(),
            }),
        }
    }
}
