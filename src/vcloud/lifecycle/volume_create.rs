//! Volume creation for the vCloud adapter.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::poll::{Probe, poll_until};
use crate::volume::{Tags, VolumeCreateOptions, VolumeFormat, VolumeState};

use super::super::client::{MetadataStore, ResourceClient};
use super::super::codec::{decode_single_resource, encode_create};
use super::super::translator::{CREATED_TAG, DEVICE_ID_TAG};
use super::super::types::{DISK_CREATE_MEDIA_TYPE, ResourceKind};
use super::super::{VcloudVolumeAdapter, VolumeError};

const NO_VOLUME_RETURNED: &str = "operation reported success but returned no volume";

impl<C, M> VcloudVolumeAdapter<C, M>
where
    C: ResourceClient,
    M: MetadataStore,
{
    /// Creates an independent disk and returns its identifier.
    ///
    /// Metadata recording and the optional attachment are best effort: their
    /// failures are logged and do not fail the creation.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidRequest`] for NFS or snapshot-backed
    /// requests before any call is made, [`VolumeError::NotSubscribed`] when
    /// the account lacks volume support, and [`VolumeError::GeneralFailure`]
    /// when the provider response carries no usable disk.
    #[instrument(skip_all, fields(name = %options.name))]
    pub(in crate::vcloud) async fn create_volume(
        &self,
        options: &VolumeCreateOptions,
    ) -> Result<String, VolumeError> {
        if options.format == VolumeFormat::Nfs {
            return Err(VolumeError::InvalidRequest(String::from(
                "NFS volumes are not supported",
            )));
        }
        if options.has_snapshot_source() {
            return Err(VolumeError::InvalidRequest(String::from(
                "volumes cannot be created from snapshots",
            )));
        }
        options.validate()?;
        self.ensure_subscribed("create").await?;

        let data_center_id = self.resolve_data_center(options).await?;
        let body = encode_create(
            &options.name,
            options.description_or_name(),
            options.size_bytes,
        )?;
        let url = format!(
            "{}/disk",
            self.client.to_url(ResourceKind::Vdc, &data_center_id)
        );
        let response = self
            .client
            .post("createDisk", &url, DISK_CREATE_MEDIA_TYPE, body)
            .await?;
        let volume_id = self.created_volume_id(&response)?;
        info!(volume_id = %volume_id, data_center_id = %data_center_id, "created volume");

        if let Err(err) = self.record_creation_metadata(&volume_id, options).await {
            warn!(volume_id = %volume_id, error = %err, "failed to record metadata on new volume");
        }

        if let Some(server_id) = options.attach_to.as_deref() {
            let device_id = options.device_id.as_deref().unwrap_or_default();
            if let Err(err) = self
                .attach_when_available(&volume_id, server_id, device_id)
                .await
            {
                warn!(
                    volume_id = %volume_id,
                    server_id,
                    error = %err,
                    "failed to attach new volume"
                );
            }
        }

        Ok(volume_id)
    }

    async fn resolve_data_center(
        &self,
        options: &VolumeCreateOptions,
    ) -> Result<String, VolumeError> {
        if let Some(id) = options
            .data_center_id
            .as_ref()
            .or(self.default_data_center_id.as_ref())
        {
            return Ok(id.clone());
        }
        self.client
            .list_data_centers(&self.region_id)
            .await?
            .into_iter()
            .next()
            .map(|data_center| data_center.id)
            .ok_or_else(|| VolumeError::not_found(ResourceKind::Vdc.to_string(), &self.region_id))
    }

    fn created_volume_id(&self, response: &str) -> Result<String, VolumeError> {
        if response.trim().is_empty() {
            return Err(VolumeError::GeneralFailure(NO_VOLUME_RETURNED.to_owned()));
        }
        let disk = decode_single_resource(response, "Disk")?
            .ok_or_else(|| VolumeError::GeneralFailure(NO_VOLUME_RETURNED.to_owned()))?;
        let href = disk
            .attribute("href")
            .filter(|href| !href.is_empty())
            .ok_or_else(|| {
                VolumeError::GeneralFailure(String::from("created volume carries no identifier"))
            })?;
        Ok(self.client.to_id(href))
    }

    async fn record_creation_metadata(
        &self,
        volume_id: &str,
        options: &VolumeCreateOptions,
    ) -> Result<(), VolumeError> {
        let mut tags: Tags = options.metadata.clone();
        tags.insert(
            CREATED_TAG.to_owned(),
            Utc::now().timestamp_millis().to_string(),
        );
        tags.insert(
            DEVICE_ID_TAG.to_owned(),
            options.device_id.clone().unwrap_or_default(),
        );
        self.metadata
            .write(ResourceKind::Disk, volume_id, &tags)
            .await
    }

    /// Waits for the volume to report available, then attaches it. The
    /// attachment is attempted even when the readiness window runs out.
    async fn attach_when_available(
        &self,
        volume_id: &str,
        server_id: &str,
        device_id: &str,
    ) -> Result<(), VolumeError> {
        let ready = poll_until(
            &self.attach_readiness,
            "volume availability",
            volume_id,
            || self.probe_available(volume_id),
        )
        .await?;
        if ready.is_none() {
            debug!(volume_id, "volume still pending after readiness window");
        }
        self.attach_volume(volume_id, server_id, device_id).await
    }

    async fn probe_available(&self, volume_id: &str) -> Result<Probe<()>, VolumeError> {
        match self.get_volume(volume_id).await {
            Ok(Some(volume)) if volume.state == VolumeState::Available => Ok(Probe::Ready(())),
            Ok(_) => Ok(Probe::Pending),
            Err(err) => {
                debug!(volume_id, error = %err, "availability probe failed");
                Ok(Probe::Pending)
            }
        }
    }
}
