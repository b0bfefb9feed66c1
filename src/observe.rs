//! Observability capability injected into the volume driver.
//!
//! The driver reports request receipt and successful completions to an
//! observer supplied at construction time instead of writing to a global
//! logger, so embedders decide where lifecycle telemetry goes.

use std::time::Duration;

/// Lifecycle verb being observed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verb {
    /// Disk provisioning.
    Create,
    /// Volume enumeration.
    List,
    /// Single-volume lookup.
    Get,
    /// Mount-point resolution.
    Path,
    /// Attach, format, and mount.
    Mount,
    /// Unmount and detach.
    Unmount,
    /// Disk deletion.
    Remove,
    /// Driver capability query.
    Capabilities,
}

impl Verb {
    /// Returns the lower-case verb name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Get => "get",
            Self::Path => "path",
            Self::Mount => "mount",
            Self::Unmount => "unmount",
            Self::Remove => "remove",
            Self::Capabilities => "capabilities",
        }
    }
}

/// Receiver for driver lifecycle events.
pub trait LifecycleObserver {
    /// Called when a lifecycle request is received.
    ///
    /// `name` is absent for verbs that do not address a single volume.
    fn request(&self, verb: Verb, name: Option<&str>);

    /// Called after a mutating verb completes successfully.
    fn completed(&self, verb: Verb, name: &str, elapsed: Duration);
}

/// Observer that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl LifecycleObserver for NoopObserver {
    fn request(&self, _verb: Verb, _name: Option<&str>) {}

    fn completed(&self, _verb: Verb, _name: &str, _elapsed: Duration) {}
}
