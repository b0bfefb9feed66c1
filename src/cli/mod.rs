//! Command-line interface definitions for the `cloudvol` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `cloudvol` binary.
#[derive(Debug, Parser)]
#[command(
    name = "cloudvol",
    about = "Expose cloud block-storage disks as mountable volumes",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Provision a new disk for a volume.
    #[command(name = "create", about = "Provision a new disk for a volume")]
    Create(CreateCommand),
    /// List volumes backed by ready disks.
    #[command(name = "list", about = "List volumes backed by ready disks")]
    List,
    /// Look up a single volume and its mount point.
    #[command(name = "get", about = "Look up a single volume and its mount point")]
    Get(NameArg),
    /// Resolve (and create if missing) a volume's mount point.
    #[command(name = "path", about = "Resolve a volume's mount point")]
    Path(NameArg),
    /// Attach, format if blank, and mount a volume.
    #[command(name = "mount", about = "Attach, format if blank, and mount a volume")]
    Mount(NameArg),
    /// Unmount a volume and detach its disk.
    #[command(name = "unmount", about = "Unmount a volume and detach its disk")]
    Unmount(NameArg),
    /// Delete the disk backing a volume.
    #[command(name = "remove", about = "Delete the disk backing a volume")]
    Remove(NameArg),
    /// Print the driver's capabilities.
    #[command(name = "capabilities", about = "Print the driver's capabilities")]
    Capabilities,
}

/// Arguments for the `cloudvol create` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Volume name; also the provider-side disk name.
    pub(crate) name: String,
    /// Disk type or tier, passed to the provider verbatim.
    #[arg(long = "type", value_name = "TYPE")]
    pub(crate) disk_type: Option<String>,
    /// Requested capacity in gigabytes.
    #[arg(long, value_name = "GB")]
    pub(crate) size_gb: Option<String>,
    /// Snapshot to provision the disk from.
    #[arg(long, value_name = "SNAPSHOT", conflicts_with = "source_image")]
    pub(crate) source_snapshot: Option<String>,
    /// Image to provision the disk from.
    #[arg(long, value_name = "IMAGE", conflicts_with = "source_snapshot")]
    pub(crate) source_image: Option<String>,
}

/// Single volume-name argument shared by most subcommands.
#[derive(Debug, Parser)]
pub(crate) struct NameArg {
    /// Volume name.
    pub(crate) name: String,
}
