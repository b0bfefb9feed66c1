//! Test support utilities shared across unit and integration tests.
//!
//! Provides deterministic in-memory fakes for the two driver capabilities,
//! a scripted command runner for the host filesystem, and a recording
//! observer.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::disk::DiskConfig;
use crate::fs::{CommandOutput, CommandRunner, FilesystemOps, FsError, PathMeta};
use crate::observe::{LifecycleObserver, Verb};
use crate::provider::{Disk, DiskProvider, ProviderFuture};

/// Error raised by [`FakeProvider`] when a failure is scripted.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FakeProviderError {
    /// Scripted create failure.
    #[error("scripted create failure")]
    Create,
    /// Scripted delete failure.
    #[error("scripted delete failure")]
    Delete,
    /// Scripted attach failure.
    #[error("scripted attach failure")]
    Attach,
    /// Scripted detach failure.
    #[error("scripted detach failure")]
    Detach,
    /// Scripted list failure.
    #[error("scripted list failure")]
    List,
}

/// Provider call recorded by [`FakeProvider`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProviderCall {
    /// `create` with the named disk.
    Create(String),
    /// `delete` with the named disk.
    Delete(String),
    /// `attach` with the named disk.
    Attach(String),
    /// `detach` with the named disk.
    Detach(String),
    /// `list`.
    List,
}

#[derive(Debug, Default)]
struct ProviderState {
    disks: Vec<Disk>,
    created: Vec<DiskConfig>,
    calls: Vec<ProviderCall>,
    fail_on_create: bool,
    fail_on_delete: bool,
    fail_on_attach: bool,
    fail_on_detach: bool,
    fail_on_list: bool,
}

/// In-memory disk provider with scripted failures and recorded calls.
#[derive(Clone, Debug, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl FakeProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProviderState> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("fake provider lock poisoned: {err}"))
    }

    /// Seeds a disk the provider will report from `list`.
    pub fn seed_disk(&self, name: &str, status: &str) {
        self.lock().disks.push(Disk {
            name: name.to_owned(),
            status: status.to_owned(),
        });
    }

    /// Scripts `create` calls to fail.
    pub fn fail_on_create(&self) {
        self.lock().fail_on_create = true;
    }

    /// Scripts `delete` calls to fail.
    pub fn fail_on_delete(&self) {
        self.lock().fail_on_delete = true;
    }

    /// Scripts `attach` calls to fail.
    pub fn fail_on_attach(&self) {
        self.lock().fail_on_attach = true;
    }

    /// Scripts `detach` calls to fail.
    pub fn fail_on_detach(&self) {
        self.lock().fail_on_detach = true;
    }

    /// Scripts `list` calls to fail.
    pub fn fail_on_list(&self) {
        self.lock().fail_on_list = true;
    }

    /// Returns all recorded calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    /// Returns the configurations passed to `create`.
    #[must_use]
    pub fn created(&self) -> Vec<DiskConfig> {
        self.lock().created.clone()
    }
}

impl DiskProvider for FakeProvider {
    type Error = FakeProviderError;

    fn create<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(ProviderCall::Create(config.name.clone()));
            if state.fail_on_create {
                return Err(FakeProviderError::Create);
            }
            state.created.push(config.clone());
            state.disks.push(Disk {
                name: config.name.clone(),
                status: String::from(crate::provider::READY_STATUS),
            });
            Ok(())
        })
    }

    fn delete<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(ProviderCall::Delete(config.name.clone()));
            if state.fail_on_delete {
                return Err(FakeProviderError::Delete);
            }
            state.disks.retain(|disk| disk.name != config.name);
            Ok(())
        })
    }

    fn attach<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(ProviderCall::Attach(config.name.clone()));
            if state.fail_on_attach {
                return Err(FakeProviderError::Attach);
            }
            Ok(())
        })
    }

    fn detach<'a>(&'a self, config: &'a DiskConfig) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(ProviderCall::Detach(config.name.clone()));
            if state.fail_on_detach {
                return Err(FakeProviderError::Detach);
            }
            Ok(())
        })
    }

    fn list(&self) -> ProviderFuture<'_, Vec<Disk>, Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(ProviderCall::List);
            if state.fail_on_list {
                return Err(FakeProviderError::List);
            }
            Ok(state.disks.clone())
        })
    }
}

/// Filesystem call recorded by [`FakeFilesystem`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FsCall {
    /// `stat` on the path.
    Stat(Utf8PathBuf),
    /// `mkdir_all` with the path and mode.
    MkdirAll(Utf8PathBuf, u32),
    /// `format` on the device.
    Format(Utf8PathBuf),
    /// `mount` of device on target.
    Mount(Utf8PathBuf, Utf8PathBuf),
    /// `unmount` of the target.
    Unmount(Utf8PathBuf),
}

#[derive(Debug, Default)]
struct FsState {
    dirs: Vec<Utf8PathBuf>,
    files: Vec<Utf8PathBuf>,
    calls: Vec<FsCall>,
    fail_on_mkdir: bool,
    fail_on_format: bool,
    fail_on_mount: bool,
    fail_on_unmount: bool,
}

/// In-memory filesystem with scripted failures and recorded calls.
#[derive(Clone, Debug, Default)]
pub struct FakeFilesystem {
    state: Arc<Mutex<FsState>>,
}

impl FakeFilesystem {
    /// Creates an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FsState> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("fake filesystem lock poisoned: {err}"))
    }

    /// Seeds an existing directory.
    pub fn seed_dir(&self, path: &Utf8Path) {
        self.lock().dirs.push(path.to_owned());
    }

    /// Seeds an existing non-directory entry.
    pub fn seed_file(&self, path: &Utf8Path) {
        self.lock().files.push(path.to_owned());
    }

    /// Scripts `mkdir_all` calls to fail.
    pub fn fail_on_mkdir(&self) {
        self.lock().fail_on_mkdir = true;
    }

    /// Scripts `format` calls to fail.
    pub fn fail_on_format(&self) {
        self.lock().fail_on_format = true;
    }

    /// Scripts `mount` calls to fail.
    pub fn fail_on_mount(&self) {
        self.lock().fail_on_mount = true;
    }

    /// Scripts `unmount` calls to fail.
    pub fn fail_on_unmount(&self) {
        self.lock().fail_on_unmount = true;
    }

    /// Returns all recorded calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<FsCall> {
        self.lock().calls.clone()
    }

    /// Returns recorded calls with `stat` entries filtered out.
    #[must_use]
    pub fn mutations(&self) -> Vec<FsCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, FsCall::Stat(_)))
            .collect()
    }

    fn scripted_failure(program: &str) -> FsError {
        FsError::CommandFailure {
            program: program.to_owned(),
            status: Some(1),
            status_text: String::from("1"),
            stderr: String::from("simulated failure"),
        }
    }
}

impl FilesystemOps for FakeFilesystem {
    fn stat(&self, path: &Utf8Path) -> Result<Option<PathMeta>, FsError> {
        let mut state = self.lock();
        state.calls.push(FsCall::Stat(path.to_owned()));
        if state.dirs.iter().any(|dir| dir == path) {
            return Ok(Some(PathMeta { is_dir: true }));
        }
        if state.files.iter().any(|file| file == path) {
            return Ok(Some(PathMeta { is_dir: false }));
        }
        Ok(None)
    }

    fn mkdir_all(&self, path: &Utf8Path, mode: u32) -> Result<(), FsError> {
        let mut state = self.lock();
        state.calls.push(FsCall::MkdirAll(path.to_owned(), mode));
        if state.fail_on_mkdir {
            return Err(FsError::Io {
                path: path.to_owned(),
                message: String::from("simulated failure"),
            });
        }
        let dir = path.to_owned();
        state.dirs.push(dir);
        Ok(())
    }

    fn format(&self, device: &Utf8Path) -> Result<(), FsError> {
        let mut state = self.lock();
        state.calls.push(FsCall::Format(device.to_owned()));
        if state.fail_on_format {
            return Err(Self::scripted_failure("mkfs.ext4"));
        }
        Ok(())
    }

    fn mount(&self, device: &Utf8Path, target: &Utf8Path) -> Result<(), FsError> {
        let mut state = self.lock();
        state
            .calls
            .push(FsCall::Mount(device.to_owned(), target.to_owned()));
        if state.fail_on_mount {
            return Err(Self::scripted_failure("mount"));
        }
        Ok(())
    }

    fn unmount(&self, target: &Utf8Path) -> Result<(), FsError> {
        let mut state = self.lock();
        state.calls.push(FsCall::Unmount(target.to_owned()));
        if state.fail_on_unmount {
            return Err(Self::scripted_failure("umount"));
        }
        Ok(())
    }
}

/// Observed lifecycle request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObservedRequest {
    /// Verb the request carried.
    pub verb: Verb,
    /// Volume name, when the verb addresses one.
    pub name: Option<String>,
}

#[derive(Debug, Default)]
struct ObserverState {
    requests: Vec<ObservedRequest>,
    completions: Vec<(Verb, String)>,
}

/// Observer that records every event for later assertions.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    state: Arc<Mutex<ObserverState>>,
}

impl RecordingObserver {
    /// Creates an empty observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ObserverState> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("recording observer lock poisoned: {err}"))
    }

    /// Returns the recorded requests in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ObservedRequest> {
        self.lock().requests.clone()
    }

    /// Returns the recorded completions in order.
    #[must_use]
    pub fn completions(&self) -> Vec<(Verb, String)> {
        self.lock().completions.clone()
    }
}

impl LifecycleObserver for RecordingObserver {
    fn request(&self, verb: Verb, name: Option<&str>) {
        self.lock().requests.push(ObservedRequest {
            verb,
            name: name.map(str::to_owned),
        });
    }

    fn completed(&self, verb: Verb, name: &str, _elapsed: Duration) {
        self.lock().completions.push((verb, name.to_owned()));
    }
}

/// Records a single invocation made through [`ScriptedCommandRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

#[derive(Debug, Default)]
struct RunnerState {
    responses: VecDeque<CommandOutput>,
    invocations: Vec<CommandInvocation>,
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic host-utility outcomes without spawning
/// processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedCommandRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl ScriptedCommandRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RunnerState> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("scripted runner lock poisoned: {err}"))
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.lock().invocations.clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a specific exit code with empty output.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.lock().responses.push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, FsError> {
        let mut state = self.lock();
        state.invocations.push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        state.responses.pop_front().ok_or_else(|| FsError::Spawn {
            program: program.to_owned(),
            message: String::from("no scripted response available"),
        })
    }
}
