//! Host filesystem capability: stat, mkdir, format, mount, unmount.
//!
//! Formatting and mounting shell out to the host utilities through a
//! [`CommandRunner`], so tests can script outcomes without touching real
//! block devices. Directory inspection and creation use `std::fs` directly.

use std::ffi::OsString;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

const DEFAULT_BLKID_BIN: &str = "blkid";
const DEFAULT_MKFS_BIN: &str = "mkfs.ext4";
const DEFAULT_MOUNT_BIN: &str = "mount";
const DEFAULT_UMOUNT_BIN: &str = "umount";

/// Exit status `blkid` reports when the device carries no recognised
/// filesystem signature.
const BLKID_NO_SIGNATURE: i32 = 2;

/// Metadata reported for an existing path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PathMeta {
    /// Whether the path is a directory.
    pub is_dir: bool,
}

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Errors surfaced by host filesystem operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FsError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a host utility completes with a non-zero exit code.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Command name used for the attempted operation.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
    /// Raised when a direct filesystem call fails.
    #[error("filesystem operation on {path} failed: {message}")]
    Io {
        /// Path the operation targeted.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
}

impl FsError {
    fn command_failure(program: &str, output: &CommandOutput) -> Self {
        Self::CommandFailure {
            program: program.to_owned(),
            status: output.code,
            status_text: output
                .code
                .map_or_else(|| String::from("signal"), |code| code.to_string()),
            stderr: output.stderr.clone(),
        }
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, FsError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, FsError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| FsError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Local filesystem operations required by the volume driver.
///
/// Calls are synchronous; all targets are local and low-latency.
pub trait FilesystemOps {
    /// Reports metadata for `path`, or `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Io`] for failures other than absence.
    fn stat(&self, path: &Utf8Path) -> Result<Option<PathMeta>, FsError>;

    /// Creates `path` and any missing parents with the given mode.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Io`] when creation fails.
    fn mkdir_all(&self, path: &Utf8Path, mode: u32) -> Result<(), FsError>;

    /// Formats `device` with the driver's filesystem.
    ///
    /// Must be a safe no-op when the device already carries a recognised
    /// filesystem signature; repeated mounts never destroy existing data.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Spawn`] or [`FsError::CommandFailure`] when the
    /// probe or the formatter fails.
    fn format(&self, device: &Utf8Path) -> Result<(), FsError>;

    /// Mounts `device` on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Spawn`] or [`FsError::CommandFailure`] when the
    /// mount utility fails.
    fn mount(&self, device: &Utf8Path, target: &Utf8Path) -> Result<(), FsError>;

    /// Unmounts the filesystem mounted on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Spawn`] or [`FsError::CommandFailure`] when the
    /// unmount utility fails.
    fn unmount(&self, target: &Utf8Path) -> Result<(), FsError>;
}

/// Filesystem implementation backed by the host utilities.
#[derive(Clone, Debug)]
pub struct HostFilesystem<R: CommandRunner> {
    blkid_bin: String,
    mkfs_bin: String,
    mount_bin: String,
    umount_bin: String,
    runner: R,
}

impl HostFilesystem<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    #[must_use]
    pub fn with_process_runner() -> Self {
        Self::new(ProcessCommandRunner)
    }
}

impl Default for HostFilesystem<ProcessCommandRunner> {
    fn default() -> Self {
        Self::with_process_runner()
    }
}

impl<R: CommandRunner> HostFilesystem<R> {
    /// Creates a host filesystem using the provided runner and the default
    /// utility names.
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self {
            blkid_bin: String::from(DEFAULT_BLKID_BIN),
            mkfs_bin: String::from(DEFAULT_MKFS_BIN),
            mount_bin: String::from(DEFAULT_MOUNT_BIN),
            umount_bin: String::from(DEFAULT_UMOUNT_BIN),
            runner,
        }
    }

    fn run_checked(&self, program: &str, args: &[OsString]) -> Result<(), FsError> {
        let output = self.runner.run(program, args)?;
        if output.is_success() {
            return Ok(());
        }
        Err(FsError::command_failure(program, &output))
    }
}

impl<R: CommandRunner> FilesystemOps for HostFilesystem<R> {
    fn stat(&self, path: &Utf8Path) -> Result<Option<PathMeta>, FsError> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(Some(PathMeta {
                is_dir: meta.is_dir(),
            })),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(FsError::Io {
                path: path.to_owned(),
                message: err.to_string(),
            }),
        }
    }

    fn mkdir_all(&self, path: &Utf8Path, mode: u32) -> Result<(), FsError> {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)
            .map_err(|err| FsError::Io {
                path: path.to_owned(),
                message: err.to_string(),
            })
    }

    fn format(&self, device: &Utf8Path) -> Result<(), FsError> {
        let probe = self
            .runner
            .run(&self.blkid_bin, &[OsString::from(device.as_str())])?;
        if probe.is_success() {
            // Existing signature: the device already holds data.
            return Ok(());
        }
        if probe.code != Some(BLKID_NO_SIGNATURE) {
            return Err(FsError::command_failure(&self.blkid_bin, &probe));
        }

        self.run_checked(&self.mkfs_bin, &[OsString::from(device.as_str())])
    }

    fn mount(&self, device: &Utf8Path, target: &Utf8Path) -> Result<(), FsError> {
        self.run_checked(
            &self.mount_bin,
            &[
                OsString::from(device.as_str()),
                OsString::from(target.as_str()),
            ],
        )
    }

    fn unmount(&self, target: &Utf8Path) -> Result<(), FsError> {
        self.run_checked(&self.umount_bin, &[OsString::from(target.as_str())])
    }
}
