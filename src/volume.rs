//! Provider-neutral block volume model and the volume management contract.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Number of bytes in one gibibyte.
pub const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;

/// Free-form key/value tags stored alongside a volume.
pub type Tags = BTreeMap<String, String>;

/// Lifecycle state of a volume as reported by the provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VolumeState {
    /// The volume exists and can be attached.
    Available,
    /// The provider is still preparing the volume.
    Pending,
}

impl fmt::Display for VolumeState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => formatter.write_str("available"),
            Self::Pending => formatter.write_str("pending"),
        }
    }
}

/// Access format a volume exposes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum VolumeFormat {
    /// Raw block device.
    #[default]
    Block,
    /// Network file system share.
    Nfs,
}

/// Storage media backing a volume.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum VolumeType {
    /// Spinning disk.
    #[default]
    Hdd,
    /// Solid state disk.
    Ssd,
}

/// A block volume as seen by callers, independent of the provider schema.
///
/// Values are rebuilt from the provider on every read and never mutated;
/// re-fetch to observe tag or attachment changes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Volume {
    /// Provider-assigned identifier.
    pub id: String,
    /// Display name; falls back to the identifier.
    pub name: String,
    /// Description; falls back to the name.
    pub description: String,
    /// Capacity in bytes.
    pub size_bytes: u64,
    /// Current lifecycle state.
    pub state: VolumeState,
    /// Access format, always [`VolumeFormat::Block`] for this provider.
    pub format: VolumeFormat,
    /// Backing media type.
    pub volume_type: VolumeType,
    /// Region that owns the volume.
    pub region_id: String,
    /// Data center holding the volume.
    pub data_center_id: String,
    /// Compute instance the volume is attached to, if any.
    pub attached_server_id: Option<String>,
    /// Device identifier recorded when the volume was created.
    pub device_id: Option<String>,
    /// Creation time recorded when the volume was created.
    pub created_at: Option<DateTime<Utc>>,
    /// Caller tags kept in the provider metadata store.
    pub tags: Tags,
}

/// Minimal `(id, state)` projection of a [`Volume`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeStatus {
    /// Provider-assigned identifier.
    pub id: String,
    /// Current lifecycle state.
    pub state: VolumeState,
}

impl From<&Volume> for VolumeStatus {
    fn from(volume: &Volume) -> Self {
        Self {
            id: volume.id.clone(),
            state: volume.state,
        }
    }
}

/// Parameters accepted when creating a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeCreateOptions {
    /// Human-friendly volume name.
    pub name: String,
    /// Optional description; the name is used when absent.
    pub description: Option<String>,
    /// Requested capacity in bytes.
    pub size_bytes: u64,
    /// Requested access format.
    pub format: VolumeFormat,
    /// Snapshot to seed the volume from.
    pub snapshot_id: Option<String>,
    /// Target data center; the first one in the region is used when absent.
    pub data_center_id: Option<String>,
    /// Device identifier to record with the volume.
    pub device_id: Option<String>,
    /// Compute instance to attach the volume to once it is available.
    pub attach_to: Option<String>,
    /// Tags written to the metadata store after creation.
    pub metadata: Tags,
}

impl VolumeCreateOptions {
    /// Starts a builder for [`VolumeCreateOptions`].
    #[must_use]
    pub fn builder() -> VolumeCreateOptionsBuilder {
        VolumeCreateOptionsBuilder::new()
    }

    /// Returns the description, defaulting to the name.
    #[must_use]
    pub fn description_or_name(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }

    /// Returns `true` when a non-empty snapshot source was requested.
    #[must_use]
    pub fn has_snapshot_source(&self) -> bool {
        self.snapshot_id
            .as_deref()
            .is_some_and(|snapshot| !snapshot.trim().is_empty())
    }

    /// Validates the fields every provider needs.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeRequestError::Validation`] when the name is empty or
    /// the size is zero.
    pub fn validate(&self) -> Result<(), VolumeRequestError> {
        if self.name.is_empty() {
            return Err(VolumeRequestError::Validation(String::from("name")));
        }
        if self.size_bytes == 0 {
            return Err(VolumeRequestError::Validation(String::from("size_bytes")));
        }
        Ok(())
    }
}

/// Builder for [`VolumeCreateOptions`] that trims inputs and validates on
/// build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeCreateOptionsBuilder {
    name: String,
    description: Option<String>,
    size_bytes: u64,
    format: VolumeFormat,
    snapshot_id: Option<String>,
    data_center_id: Option<String>,
    device_id: Option<String>,
    attach_to: Option<String>,
    metadata: Tags,
}

impl VolumeCreateOptionsBuilder {
    /// Creates an empty builder; the name and size must be set before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the volume name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, value: impl Into<String>) -> Self {
        self.description = Some(value.into());
        self
    }

    /// Sets the size in bytes.
    #[must_use]
    pub const fn size_bytes(mut self, value: u64) -> Self {
        self.size_bytes = value;
        self
    }

    /// Sets the size in gibibytes, saturating on overflow.
    #[must_use]
    pub const fn size_gib(mut self, value: u64) -> Self {
        self.size_bytes = value.saturating_mul(BYTES_PER_GIB);
        self
    }

    /// Sets the access format.
    #[must_use]
    pub const fn format(mut self, value: VolumeFormat) -> Self {
        self.format = value;
        self
    }

    /// Sets the snapshot source.
    #[must_use]
    pub fn snapshot_id(mut self, value: Option<String>) -> Self {
        self.snapshot_id = value;
        self
    }

    /// Sets the target data center.
    #[must_use]
    pub fn data_center_id(mut self, value: Option<String>) -> Self {
        self.data_center_id = value;
        self
    }

    /// Sets the device identifier recorded with the volume.
    #[must_use]
    pub fn device_id(mut self, value: Option<String>) -> Self {
        self.device_id = value;
        self
    }

    /// Requests attachment to the given server once the volume is available.
    #[must_use]
    pub fn attach_to(mut self, value: Option<String>) -> Self {
        self.attach_to = value;
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builds and validates the [`VolumeCreateOptions`], trimming string
    /// inputs and dropping optional fields that trim to nothing.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeRequestError::Validation`] when the name is empty or
    /// the size is zero.
    pub fn build(self) -> Result<VolumeCreateOptions, VolumeRequestError> {
        let options = VolumeCreateOptions {
            name: self.name.trim().to_owned(),
            description: trimmed(self.description),
            size_bytes: self.size_bytes,
            format: self.format,
            snapshot_id: trimmed(self.snapshot_id),
            data_center_id: trimmed(self.data_center_id),
            device_id: trimmed(self.device_id),
            attach_to: trimmed(self.attach_to),
            metadata: self.metadata,
        };
        options.validate()?;
        Ok(options)
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// Errors raised while building volume requests.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum VolumeRequestError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Future returned by volume operations.
pub type VolumeFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Volume management operations implemented by providers.
///
/// The `*_many` variants apply the single-volume operation to each id in the
/// order given and stop at the first failure. Earlier volumes keep their
/// changes: there is no rollback, so callers must expect partial
/// application.
pub trait VolumeSupport: Sync {
    /// Provider specific error type returned by the operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reports whether the account may create and modify volumes.
    fn is_subscribed(&self) -> VolumeFuture<'_, bool, Self::Error>;

    /// Creates a volume and returns its identifier.
    fn create<'a>(
        &'a self,
        options: &'a VolumeCreateOptions,
    ) -> VolumeFuture<'a, String, Self::Error>;

    /// Attaches a volume to a compute instance and waits for completion.
    fn attach<'a>(
        &'a self,
        volume_id: &'a str,
        server_id: &'a str,
        device_id: &'a str,
    ) -> VolumeFuture<'a, (), Self::Error>;

    /// Detaches a volume from whichever instance holds it.
    fn detach<'a>(&'a self, volume_id: &'a str, force: bool) -> VolumeFuture<'a, (), Self::Error>;

    /// Deletes a volume.
    fn remove<'a>(&'a self, volume_id: &'a str) -> VolumeFuture<'a, (), Self::Error>;

    /// Looks up a single volume.
    fn get<'a>(&'a self, volume_id: &'a str) -> VolumeFuture<'a, Option<Volume>, Self::Error>;

    /// Lists every volume in the active region.
    fn list(&self) -> VolumeFuture<'_, Vec<Volume>, Self::Error>;

    /// Lists the `(id, state)` pairs of every volume in the active region.
    fn list_status(&self) -> VolumeFuture<'_, Vec<VolumeStatus>, Self::Error>;

    /// Replaces the tags of a volume with `tags`.
    fn set_tags<'a>(&'a self, volume_id: &'a str, tags: &'a Tags)
    -> VolumeFuture<'a, (), Self::Error>;

    /// Merges `tags` into the tags of a volume.
    fn update_tags<'a>(
        &'a self,
        volume_id: &'a str,
        tags: &'a Tags,
    ) -> VolumeFuture<'a, (), Self::Error>;

    /// Deletes the named tag keys from a volume.
    fn remove_tags<'a>(
        &'a self,
        volume_id: &'a str,
        keys: &'a [String],
    ) -> VolumeFuture<'a, (), Self::Error>;

    /// Applies [`VolumeSupport::set_tags`] to each volume in order.
    fn set_tags_many<'a>(
        &'a self,
        volume_ids: &'a [String],
        tags: &'a Tags,
    ) -> VolumeFuture<'a, (), Self::Error> {
        Box::pin(async move {
            for volume_id in volume_ids {
                self.set_tags(volume_id, tags).await?;
            }
            Ok(())
        })
    }

    /// Applies [`VolumeSupport::update_tags`] to each volume in order.
    fn update_tags_many<'a>(
        &'a self,
        volume_ids: &'a [String],
        tags: &'a Tags,
    ) -> VolumeFuture<'a, (), Self::Error> {
        Box::pin(async move {
            for volume_id in volume_ids {
                self.update_tags(volume_id, tags).await?;
            }
            Ok(())
        })
    }

    /// Applies [`VolumeSupport::remove_tags`] to each volume in order.
    fn remove_tags_many<'a>(
        &'a self,
        volume_ids: &'a [String],
        keys: &'a [String],
    ) -> VolumeFuture<'a, (), Self::Error> {
        Box::pin(async move {
            for volume_id in volume_ids {
                self.remove_tags(volume_id, keys).await?;
            }
            Ok(())
        })
    }
}
