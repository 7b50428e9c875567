//! Volume discovery across the data centers of a region.

use tracing::{debug, instrument};

use crate::volume::{Volume, VolumeStatus};

use super::super::client::{MetadataStore, ResourceClient};
use super::super::codec::{ResourceAttributes, decode_resource_list};
use super::super::translator::{TranslationContext, to_volume};
use super::super::types::{DISK_MEDIA_TYPE, DataCenter, ResourceKind};
use super::super::{VcloudVolumeAdapter, VolumeError};

impl<C, M> VcloudVolumeAdapter<C, M>
where
    C: ResourceClient,
    M: MetadataStore,
{
    /// Lists every disk in every data center of the region, in provider
    /// order. Disks deleted while the listing runs are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::InternalInconsistency`] when a catalog entry
    /// lacks a location, and transport errors unchanged.
    #[instrument(skip_all, fields(region_id = %self.region_id))]
    pub(in crate::vcloud) async fn list_volumes(&self) -> Result<Vec<Volume>, VolumeError> {
        let mut volumes = Vec::new();
        for data_center in self.client.list_data_centers(&self.region_id).await? {
            self.collect_data_center(&data_center, &mut volumes).await?;
        }
        Ok(volumes)
    }

    /// Projects [`Self::list_volumes`] onto `(id, state)` pairs.
    #[instrument(skip_all)]
    pub(in crate::vcloud) async fn list_volume_status(
        &self,
    ) -> Result<Vec<VolumeStatus>, VolumeError> {
        Ok(self
            .list_volumes()
            .await?
            .iter()
            .map(VolumeStatus::from)
            .collect())
    }

    /// Finds one volume by scanning the listing.
    #[instrument(skip_all, fields(volume_id = %volume_id))]
    pub(in crate::vcloud) async fn get_volume(
        &self,
        volume_id: &str,
    ) -> Result<Option<Volume>, VolumeError> {
        Ok(self
            .list_volumes()
            .await?
            .into_iter()
            .find(|volume| volume.id == volume_id))
    }

    async fn collect_data_center(
        &self,
        data_center: &DataCenter,
        volumes: &mut Vec<Volume>,
    ) -> Result<(), VolumeError> {
        let document = self.client.get(ResourceKind::Vdc, &data_center.id).await?;
        if document.trim().is_empty() {
            return Ok(());
        }
        let disks = decode_resource_list(&document, "ResourceEntity")?
            .into_iter()
            .filter(|entity| entity.attribute("type") == Some(DISK_MEDIA_TYPE));

        for entity in disks {
            let volume_id = self.entity_id(&entity, data_center)?;
            if let Some(volume) = self.load_volume(&data_center.id, &volume_id).await? {
                volumes.push(volume);
            }
        }
        Ok(())
    }

    fn entity_id(
        &self,
        entity: &ResourceAttributes,
        data_center: &DataCenter,
    ) -> Result<String, VolumeError> {
        entity
            .attribute("href")
            .filter(|href| !href.is_empty())
            .map(|href| self.client.to_id(href))
            .ok_or_else(|| {
                VolumeError::InternalInconsistency(format!(
                    "disk entry without href in data center {}",
                    data_center.id
                ))
            })
    }

    async fn load_volume(
        &self,
        data_center_id: &str,
        volume_id: &str,
    ) -> Result<Option<Volume>, VolumeError> {
        let primary = match self.client.get(ResourceKind::Disk, volume_id).await {
            Ok(document) => document,
            Err(err) if err.is_not_found() => {
                debug!(volume_id, "disk vanished during listing");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        if primary.trim().is_empty() {
            return Ok(None);
        }

        let metadata = self.optional_sub_resource(volume_id, "metadata").await;
        let attachment = self.optional_sub_resource(volume_id, "attachedVms").await;
        let context = TranslationContext {
            region_id: &self.region_id,
            data_center_id,
            volume_id,
        };
        Ok(to_volume(
            context,
            &primary,
            metadata.as_deref(),
            attachment.as_deref(),
            &|href: &str| self.client.to_id(href),
        ))
    }

    async fn optional_sub_resource(&self, volume_id: &str, name: &str) -> Option<String> {
        let path = format!("{volume_id}/{name}");
        match self.client.get(ResourceKind::Disk, &path).await {
            Ok(document) if !document.trim().is_empty() => Some(document),
            Ok(_) => None,
            Err(err) => {
                debug!(volume_id, sub_resource = name, error = %err, "ignoring sub-resource");
                None
            }
        }
    }
}
