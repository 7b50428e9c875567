//! vCloud Director implementation of the volume management contract.
//!
//! The adapter maps [`VolumeSupport`] onto vCloud independent disks. Requests
//! are encoded by [`codec`], executed through a [`ResourceClient`], and the
//! responses are turned back into [`Volume`]s by [`translator`]. Mutating
//! operations return a vendor task that is polled until it finishes.

pub mod client;
pub mod codec;
mod error;
pub mod http;
mod lifecycle;
pub mod translator;
pub mod types;

use crate::config::VcloudConfig;
use crate::poll::PollPolicy;
use crate::volume::{Tags, Volume, VolumeCreateOptions, VolumeFuture, VolumeStatus, VolumeSupport};

pub use client::{ClientFuture, MetadataStore, ResourceClient};
pub use error::VolumeError;
pub use http::HttpResourceClient;
pub use types::{DataCenter, ResourceKind, TaskHandle, TaskStatus};

/// Volume adapter bound to one region of a vCloud Director installation.
#[derive(Clone, Debug)]
pub struct VcloudVolumeAdapter<C, M = C> {
    client: C,
    metadata: M,
    region_id: String,
    default_data_center_id: Option<String>,
    attach_readiness: PollPolicy,
}

impl<C, M> VcloudVolumeAdapter<C, M>
where
    C: ResourceClient,
    M: MetadataStore,
{
    /// Creates an adapter over the given transport and metadata store.
    pub fn new(client: C, metadata: M, region_id: impl Into<String>) -> Self {
        Self {
            client,
            metadata,
            region_id: region_id.into(),
            default_data_center_id: None,
            attach_readiness: PollPolicy::attach_readiness(),
        }
    }

    /// Sets the data center used when a create request names none. Without
    /// it the first data center of the region is used.
    #[must_use]
    pub fn with_default_data_center(mut self, data_center_id: Option<String>) -> Self {
        self.default_data_center_id = data_center_id.filter(|id| !id.trim().is_empty());
        self
    }

    /// Replaces the policy used while waiting for a new volume to become
    /// available before attaching it.
    #[must_use]
    pub fn with_attach_readiness_policy(mut self, policy: PollPolicy) -> Self {
        self.attach_readiness = policy;
        self
    }

    /// Region the adapter operates in.
    #[must_use]
    pub fn region_id(&self) -> &str {
        &self.region_id
    }
}

impl VcloudVolumeAdapter<HttpResourceClient> {
    /// Builds an adapter that talks HTTP to the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Config`] when the configuration fails
    /// validation.
    pub fn from_config(config: &VcloudConfig) -> Result<Self, VolumeError> {
        let client = HttpResourceClient::new(config)?;
        Ok(Self::new(client.clone(), client, config.region_id.trim())
            .with_default_data_center(config.default_data_center_id.clone()))
    }
}

impl<C, M> VolumeSupport for VcloudVolumeAdapter<C, M>
where
    C: ResourceClient,
    M: MetadataStore,
{
    type Error = VolumeError;

    fn is_subscribed(&self) -> VolumeFuture<'_, bool, Self::Error> {
        Box::pin(self.check_subscription())
    }

    fn create<'a>(
        &'a self,
        options: &'a VolumeCreateOptions,
    ) -> VolumeFuture<'a, String, Self::Error> {
        Box::pin(self.create_volume(options))
    }

    fn attach<'a>(
        &'a self,
        volume_id: &'a str,
        server_id: &'a str,
        device_id: &'a str,
    ) -> VolumeFuture<'a, (), Self::Error> {
        Box::pin(self.attach_volume(volume_id, server_id, device_id))
    }

    fn detach<'a>(&'a self, volume_id: &'a str, force: bool) -> VolumeFuture<'a, (), Self::Error> {
        Box::pin(self.detach_volume(volume_id, force))
    }

    fn remove<'a>(&'a self, volume_id: &'a str) -> VolumeFuture<'a, (), Self::Error> {
        Box::pin(self.remove_volume(volume_id))
    }

    fn get<'a>(&'a self, volume_id: &'a str) -> VolumeFuture<'a, Option<Volume>, Self::Error> {
        Box::pin(self.get_volume(volume_id))
    }

    fn list(&self) -> VolumeFuture<'_, Vec<Volume>, Self::Error> {
        Box::pin(self.list_volumes())
    }

    fn list_status(&self) -> VolumeFuture<'_, Vec<VolumeStatus>, Self::Error> {
        Box::pin(self.list_volume_status())
    }

    fn set_tags<'a>(
        &'a self,
        volume_id: &'a str,
        tags: &'a Tags,
    ) -> VolumeFuture<'a, (), Self::Error> {
        Box::pin(self.replace_tags(volume_id, tags))
    }

    fn update_tags<'a>(
        &'a self,
        volume_id: &'a str,
        tags: &'a Tags,
    ) -> VolumeFuture<'a, (), Self::Error> {
        Box::pin(self.merge_tags(volume_id, tags))
    }

    fn remove_tags<'a>(
        &'a self,
        volume_id: &'a str,
        keys: &'a [String],
    ) -> VolumeFuture<'a, (), Self::Error> {
        Box::pin(self.delete_tags(volume_id, keys))
    }
}
