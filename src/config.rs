//! Configuration loading via `ortho-config`.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::driver::DEFAULT_ROOT;

/// Driver configuration derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "CLOUDVOL")]
pub struct DriverConfig {
    /// Cloud project that owns the disks.
    pub project: String,
    /// Availability zone the disks and this host live in.
    pub zone: String,
    /// Name of the compute instance disks are attached to.
    pub instance: String,
    /// OAuth bearer token used to authenticate control-plane calls. On a
    /// compute instance this is typically fetched from the metadata server
    /// by the service supervisor and handed to the driver.
    pub access_token: String,
    /// Root directory volumes are mounted under. Defaults to `/mnt/`.
    #[ortho_config(default = DEFAULT_ROOT.to_owned())]
    pub root: String,
}

/// Metadata for a configuration field, used to generate actionable error
/// messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl DriverConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to cloudvol.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags
    /// in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("cloudvol")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages
    /// include guidance on how to provide missing values via environment
    /// variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.project,
            &FieldMetadata::new("cloud project", "CLOUDVOL_PROJECT", "project"),
        )?;
        Self::require_field(
            &self.zone,
            &FieldMetadata::new("availability zone", "CLOUDVOL_ZONE", "zone"),
        )?;
        Self::require_field(
            &self.instance,
            &FieldMetadata::new("compute instance name", "CLOUDVOL_INSTANCE", "instance"),
        )?;
        Self::require_field(
            &self.access_token,
            &FieldMetadata::new("API access token", "CLOUDVOL_ACCESS_TOKEN", "access_token"),
        )?;
        Self::require_field(
            &self.root,
            &FieldMetadata::new("mount root directory", "CLOUDVOL_ROOT", "root"),
        )?;
        Ok(())
    }

    /// Returns the mount root as a path.
    #[must_use]
    pub fn root_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.root)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn base_config() -> DriverConfig {
        DriverConfig {
            project: String::from("proj"),
            zone: String::from("europe-west1-b"),
            instance: String::from("host-1"),
            access_token: String::from("token"),
            root: String::from("/mnt/"),
        }
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(base_config().validate().is_ok());
    }

    #[rstest]
    #[case("project", "CLOUDVOL_PROJECT")]
    #[case("zone", "CLOUDVOL_ZONE")]
    #[case("instance", "CLOUDVOL_INSTANCE")]
    #[case("access_token", "CLOUDVOL_ACCESS_TOKEN")]
    #[case("root", "CLOUDVOL_ROOT")]
    fn validate_names_the_missing_env_var(#[case] field: &str, #[case] env_var: &str) {
        let mut config = base_config();
        match field {
            "project" => config.project = String::from(" "),
            "zone" => config.zone = String::new(),
            "instance" => config.instance = String::new(),
            "access_token" => config.access_token = String::new(),
            _ => config.root = String::new(),
        }

        let err = config.validate().expect_err("blank field should fail");
        assert!(
            err.to_string().contains(env_var),
            "error should name {env_var}: {err}"
        );
    }

    #[test]
    fn root_path_preserves_the_configured_root() {
        assert_eq!(base_config().root_path(), Utf8PathBuf::from("/mnt/"));
    }
}
