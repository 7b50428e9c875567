//! Volume lifecycle operations for the vCloud adapter.

mod listing;
mod tags;
mod volume_attach;
mod volume_create;

use tracing::{debug, instrument};

use crate::config::MINIMUM_API_VERSION;

use super::client::{MetadataStore, ResourceClient};
use super::codec::decode_task;
use super::{VcloudVolumeAdapter, VolumeError};

impl<C, M> VcloudVolumeAdapter<C, M>
where
    C: ResourceClient,
    M: MetadataStore,
{
    /// Reports whether the endpoint speaks an API version with independent
    /// disk support.
    #[instrument(skip_all)]
    pub(in crate::vcloud) async fn check_subscription(&self) -> Result<bool, VolumeError> {
        let version = self.client.api_version().await?;
        let subscribed = version.at_least(MINIMUM_API_VERSION);
        debug!(api_version = %version, subscribed, "checked volume entitlement");
        Ok(subscribed)
    }

    /// Fails with [`VolumeError::NotSubscribed`] unless the account may use
    /// volumes.
    async fn ensure_subscribed(&self, operation: &str) -> Result<(), VolumeError> {
        if self.check_subscription().await? {
            return Ok(());
        }
        Err(VolumeError::NotSubscribed {
            operation: operation.to_owned(),
        })
    }

    /// Waits for the task referenced by a response document, if there is one.
    async fn await_task(&self, document: &str) -> Result<(), VolumeError> {
        if let Some(task) = decode_task(document)? {
            self.client.wait_for(&task).await?;
        }
        Ok(())
    }
}
