//! Disk configuration derived from a logical volume name.
//!
//! Every lifecycle verb recomputes its configuration from the volume name
//! alone, so two uncorrelated calls for the same name must agree on the
//! device name and mount point. All derivation here is pure string work
//! with no I/O.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Prefix applied to the provider-side device name of a volume.
const DEVICE_NAME_PREFIX: &str = "cloudvol-";

/// Directory where the platform surfaces attached disks by device name.
const DEVICE_BY_ID_PREFIX: &str = "/dev/disk/by-id/google-";

/// Errors raised while deriving or validating a disk configuration.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DiskConfigError {
    /// Raised when an option key outside the recognised set is supplied.
    #[error("unknown option {key:?}")]
    UnknownOption {
        /// Offending option key.
        key: String,
    },
    /// Raised when the `SizeGb` option is not a base-10 integer.
    #[error("invalid SizeGb value {value:?}: {message}")]
    InvalidSizeGb {
        /// Value that failed to parse.
        value: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the derived volume name is empty.
    #[error("disk name cannot be empty")]
    EmptyName,
    /// Raised when both provisioning sources are requested at once.
    #[error("source snapshot and source image cannot both be set")]
    ConflictingSources,
}

/// Validated per-request disk configuration.
///
/// Never persisted; the name is the sole correlation key across calls.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiskConfig {
    /// Logical volume name, also the provider-side disk name.
    pub name: String,
    /// Provider disk type or tier, passed through verbatim.
    pub disk_type: Option<String>,
    /// Requested capacity in gigabytes.
    pub size_gb: Option<u64>,
    /// Snapshot to provision from. Mutually exclusive with `source_image`.
    pub source_snapshot: Option<String>,
    /// Image to provision from. Mutually exclusive with `source_snapshot`.
    pub source_image: Option<String>,
}

impl DiskConfig {
    /// Derives a configuration from a name and create-time options.
    ///
    /// The recognised option keys are exactly `Name`, `Type`, `SizeGb`,
    /// `SourceSnapshot`, and `SourceImage`.
    ///
    /// # Errors
    ///
    /// Returns [`DiskConfigError::UnknownOption`] for any other key,
    /// [`DiskConfigError::InvalidSizeGb`] when the size does not parse, and
    /// the validation errors described on [`DiskConfig::validate`].
    pub fn derive(
        name: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<Self, DiskConfigError> {
        let mut config = Self {
            name: name.to_owned(),
            ..Self::default()
        };

        for (key, value) in options {
            match key.as_str() {
                "Name" => config.name = value.clone(),
                "Type" => config.disk_type = non_empty(value),
                "SizeGb" => {
                    config.size_gb =
                        Some(value.parse().map_err(|err: std::num::ParseIntError| {
                            DiskConfigError::InvalidSizeGb {
                                value: value.clone(),
                                message: err.to_string(),
                            }
                        })?);
                }
                "SourceSnapshot" => config.source_snapshot = non_empty(value),
                "SourceImage" => config.source_image = non_empty(value),
                _ => {
                    return Err(DiskConfigError::UnknownOption { key: key.clone() });
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Derives the default configuration for `name` with no options.
    ///
    /// # Errors
    ///
    /// Returns [`DiskConfigError::EmptyName`] when the name is empty.
    pub fn derive_default(name: &str) -> Result<Self, DiskConfigError> {
        Self::derive(name, &BTreeMap::new())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DiskConfigError::EmptyName`] when the name is empty, or
    /// [`DiskConfigError::ConflictingSources`] when both a source snapshot
    /// and a source image are set.
    pub fn validate(&self) -> Result<(), DiskConfigError> {
        if self.name.is_empty() {
            return Err(DiskConfigError::EmptyName);
        }

        if self.source_snapshot.is_some() && self.source_image.is_some() {
            return Err(DiskConfigError::ConflictingSources);
        }

        Ok(())
    }

    /// Returns the device name the disk is attached under.
    #[must_use]
    pub fn device_name(&self) -> String {
        format!("{DEVICE_NAME_PREFIX}{}", self.name)
    }

    /// Returns the host block-device path of the attached disk.
    #[must_use]
    pub fn device_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{DEVICE_BY_ID_PREFIX}{}", self.device_name()))
    }

    /// Returns the mount point for this volume under `root`.
    #[must_use]
    pub fn mount_point(&self, root: &Utf8Path) -> Utf8PathBuf {
        root.join(&self.name)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
