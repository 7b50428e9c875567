//! Command-line interface definitions for the `vcloud-disks` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, ValueEnum};

/// Top-level CLI for the `vcloud-disks` binary.
#[derive(Debug, Parser)]
#[command(
    name = "vcloud-disks",
    about = "Manage vCloud Director independent disks as block volumes",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// List every volume in the configured region.
    #[command(name = "list", about = "List every volume in the configured region")]
    List,
    /// Print the id and state of every volume.
    #[command(name = "status", about = "Print the id and state of every volume")]
    Status,
    /// Show one volume in detail.
    #[command(name = "get", about = "Show one volume in detail")]
    Get(VolumeArgs),
    /// Create a volume and print its id.
    #[command(name = "create", about = "Create a volume and print its id")]
    Create(CreateCommand),
    /// Attach a volume to a virtual machine.
    #[command(name = "attach", about = "Attach a volume to a virtual machine")]
    Attach(AttachCommand),
    /// Detach a volume from the virtual machine holding it.
    #[command(name = "detach", about = "Detach a volume from its virtual machine")]
    Detach(DetachCommand),
    /// Delete a volume.
    #[command(name = "remove", about = "Delete a volume")]
    Remove(VolumeArgs),
    /// Replace the tags of one or more volumes.
    #[command(name = "set-tags", about = "Replace the tags of one or more volumes")]
    SetTags(TagsCommand),
    /// Merge tags into one or more volumes.
    #[command(name = "update-tags", about = "Merge tags into one or more volumes")]
    UpdateTags(TagsCommand),
    /// Delete tag keys from one or more volumes.
    #[command(name = "remove-tags", about = "Delete tag keys from one or more volumes")]
    RemoveTags(RemoveTagsCommand),
}

/// Arguments naming a single volume.
#[derive(Debug, Parser)]
pub(crate) struct VolumeArgs {
    /// Volume identifier.
    #[arg(value_name = "VOLUME_ID")]
    pub(crate) volume_id: String,
}

/// Access format accepted by `create`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum FormatArg {
    /// Raw block device.
    #[default]
    Block,
    /// NFS share; rejected by vCloud Director.
    Nfs,
}

/// Arguments for the `vcloud-disks create` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Volume name.
    #[arg(value_name = "NAME")]
    pub(crate) name: String,
    /// Size in GiB.
    #[arg(long, value_name = "GIB", default_value_t = 1)]
    pub(crate) size_gib: u64,
    /// Description; defaults to the name.
    #[arg(long, value_name = "TEXT")]
    pub(crate) description: Option<String>,
    /// Access format.
    #[arg(long, value_enum, default_value_t = FormatArg::Block)]
    pub(crate) format: FormatArg,
    /// Snapshot to seed the volume from; rejected by vCloud Director.
    #[arg(long, value_name = "SNAPSHOT_ID")]
    pub(crate) snapshot: Option<String>,
    /// Target data center; falls back to configuration, then the first data
    /// center of the region.
    #[arg(long, value_name = "VDC_ID")]
    pub(crate) data_center: Option<String>,
    /// Device identifier recorded with the volume.
    #[arg(long, value_name = "DEVICE")]
    pub(crate) device_id: Option<String>,
    /// Attach the volume to this virtual machine once it is available.
    #[arg(long, value_name = "VM_ID")]
    pub(crate) attach_to: Option<String>,
    /// Metadata entry written after creation, as KEY=VALUE. Repeatable.
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub(crate) tags: Vec<(String, String)>,
}

/// Arguments for the `vcloud-disks attach` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct AttachCommand {
    /// Volume identifier.
    #[arg(value_name = "VOLUME_ID")]
    pub(crate) volume_id: String,
    /// Virtual machine identifier.
    #[arg(value_name = "VM_ID")]
    pub(crate) server_id: String,
    /// Device identifier requested for the attachment.
    #[arg(long, value_name = "DEVICE", default_value = "")]
    pub(crate) device_id: String,
}

/// Arguments for the `vcloud-disks detach` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DetachCommand {
    /// Volume identifier.
    #[arg(value_name = "VOLUME_ID")]
    pub(crate) volume_id: String,
    /// Request a forced detach.
    #[arg(long)]
    pub(crate) force: bool,
}

/// Arguments for `set-tags` and `update-tags`.
#[derive(Debug, Parser)]
pub(crate) struct TagsCommand {
    /// Volumes to modify, in order. Earlier volumes keep their changes when a
    /// later one fails.
    #[arg(value_name = "VOLUME_ID", required = true)]
    pub(crate) volume_ids: Vec<String>,
    /// Tag as KEY=VALUE. Repeatable.
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub(crate) tags: Vec<(String, String)>,
}

/// Arguments for `remove-tags`.
#[derive(Debug, Parser)]
pub(crate) struct RemoveTagsCommand {
    /// Volumes to modify, in order.
    #[arg(value_name = "VOLUME_ID", required = true)]
    pub(crate) volume_ids: Vec<String>,
    /// Tag key to delete. Repeatable.
    #[arg(long = "key", value_name = "KEY", required = true)]
    pub(crate) keys: Vec<String>,
}

/// Parses a `KEY=VALUE` pair. The key must not be blank; the value may be.
pub(crate) fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let trimmed_key = key.trim();
    if trimmed_key.is_empty() {
        return Err(format!("tag key must not be empty in '{raw}'"));
    }
    Ok((trimmed_key.to_owned(), value.to_owned()))
}
