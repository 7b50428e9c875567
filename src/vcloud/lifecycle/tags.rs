//! Tag management backed by the disk metadata sub-resource.

use tracing::instrument;

use crate::volume::Tags;

use super::super::client::{MetadataStore, ResourceClient};
use super::super::types::ResourceKind;
use super::super::{VcloudVolumeAdapter, VolumeError};

impl<C, M> VcloudVolumeAdapter<C, M>
where
    C: ResourceClient,
    M: MetadataStore,
{
    /// Replaces the tags of a volume: keys absent from `tags` are deleted,
    /// then `tags` is written.
    #[instrument(skip_all, fields(volume_id = %volume_id))]
    pub(in crate::vcloud) async fn replace_tags(
        &self,
        volume_id: &str,
        tags: &Tags,
    ) -> Result<(), VolumeError> {
        self.ensure_subscribed("set_tags").await?;
        let volume = self
            .get_volume(volume_id)
            .await?
            .ok_or_else(|| VolumeError::not_found(ResourceKind::Disk.to_string(), volume_id))?;

        let stale: Vec<String> = volume
            .tags
            .keys()
            .filter(|key| !tags.contains_key(*key))
            .cloned()
            .collect();
        if !stale.is_empty() {
            self.metadata
                .delete_keys(ResourceKind::Disk, volume_id, &stale)
                .await?;
        }
        self.metadata
            .write(ResourceKind::Disk, volume_id, tags)
            .await
    }

    /// Merges `tags` into the tags of a volume.
    #[instrument(skip_all, fields(volume_id = %volume_id))]
    pub(in crate::vcloud) async fn merge_tags(
        &self,
        volume_id: &str,
        tags: &Tags,
    ) -> Result<(), VolumeError> {
        self.ensure_subscribed("update_tags").await?;
        self.metadata
            .write(ResourceKind::Disk, volume_id, tags)
            .await
    }

    /// Deletes the named keys from the tags of a volume.
    #[instrument(skip_all, fields(volume_id = %volume_id))]
    pub(in crate::vcloud) async fn delete_tags(
        &self,
        volume_id: &str,
        keys: &[String],
    ) -> Result<(), VolumeError> {
        self.ensure_subscribed("remove_tags").await?;
        self.metadata
            .delete_keys(ResourceKind::Disk, volume_id, keys)
            .await
    }
}
