//! Attach, detach and removal of independent disks.

use tracing::{info, instrument};

use super::super::client::{MetadataStore, ResourceClient};
use super::super::codec::encode_attach_or_detach;
use super::super::types::{DISK_ATTACH_MEDIA_TYPE, ResourceKind};
use super::super::{VcloudVolumeAdapter, VolumeError};

#[derive(Copy, Clone, Debug)]
enum DiskAction {
    Attach,
    Detach,
}

impl DiskAction {
    const fn vendor_action(self) -> &'static str {
        match self {
            Self::Attach => "attachVolume",
            Self::Detach => "detachVolume",
        }
    }

    const fn path(self) -> &'static str {
        match self {
            Self::Attach => "disk/action/attach",
            Self::Detach => "disk/action/detach",
        }
    }
}

impl<C, M> VcloudVolumeAdapter<C, M>
where
    C: ResourceClient,
    M: MetadataStore,
{
    /// Attaches a disk to a VM and waits for the vendor task.
    ///
    /// The device identifier is recorded at creation time only; vCloud picks
    /// the bus slot itself.
    #[instrument(skip_all, fields(volume_id = %volume_id, server_id = %server_id))]
    pub(in crate::vcloud) async fn attach_volume(
        &self,
        volume_id: &str,
        server_id: &str,
        _device_id: &str,
    ) -> Result<(), VolumeError> {
        self.ensure_subscribed("attach").await?;
        self.send_disk_action(DiskAction::Attach, volume_id, server_id)
            .await
    }

    /// Detaches a disk from the VM that holds it and waits for the vendor
    /// task. `force` is accepted for contract compatibility; vCloud has no
    /// forced detach.
    #[instrument(skip_all, fields(volume_id = %volume_id))]
    pub(in crate::vcloud) async fn detach_volume(
        &self,
        volume_id: &str,
        _force: bool,
    ) -> Result<(), VolumeError> {
        self.ensure_subscribed("detach").await?;
        let volume = self
            .get_volume(volume_id)
            .await?
            .ok_or_else(|| VolumeError::not_found(ResourceKind::Disk.to_string(), volume_id))?;
        let Some(server_id) = volume.attached_server_id else {
            return Err(VolumeError::InvalidRequest(format!(
                "volume {volume_id} is not attached to a virtual machine"
            )));
        };
        self.send_disk_action(DiskAction::Detach, volume_id, &server_id)
            .await
    }

    /// Deletes a disk.
    #[instrument(skip_all, fields(volume_id = %volume_id))]
    pub(in crate::vcloud) async fn remove_volume(&self, volume_id: &str) -> Result<(), VolumeError> {
        self.ensure_subscribed("remove").await?;
        self.client.delete(ResourceKind::Disk, volume_id).await?;
        info!(volume_id, "removed volume");
        Ok(())
    }

    async fn send_disk_action(
        &self,
        action: DiskAction,
        volume_id: &str,
        server_id: &str,
    ) -> Result<(), VolumeError> {
        let body = encode_attach_or_detach(&self.client.to_url(ResourceKind::Disk, volume_id))?;
        let url = format!(
            "{}/{}",
            self.client.to_url(ResourceKind::VApp, server_id),
            action.path()
        );
        let response = self
            .client
            .post(action.vendor_action(), &url, DISK_ATTACH_MEDIA_TYPE, body)
            .await?;
        self.await_task(&response).await
    }
}
