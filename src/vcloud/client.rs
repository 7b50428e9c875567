//! Transport seams between the adapter and the vCloud Director API.

use std::future::Future;
use std::pin::Pin;

use crate::volume::Tags;

use super::error::VolumeError;
use super::types::{ApiVersion, DataCenter, Href, ResourceKind, TaskHandle};

/// Future returned by transport operations.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, VolumeError>> + Send + 'a>>;

/// Issues requests against the vendor API.
///
/// `id` arguments may carry a sub-resource suffix such as `d-1/metadata`;
/// implementations append them to the resource location verbatim.
pub trait ResourceClient: Send + Sync {
    /// Fetches a resource document. An empty successful body is returned as
    /// an empty string.
    ///
    /// Fails with [`VolumeError::NotFound`] when the resource does not exist.
    fn get<'a>(&'a self, kind: ResourceKind, id: &'a str) -> ClientFuture<'a, String>;

    /// Posts `body` to `url` and returns the response document, which may
    /// reference an asynchronous task. `action` names the call in logs and
    /// errors.
    fn post<'a>(
        &'a self,
        action: &'a str,
        url: &'a str,
        media_type: &'a str,
        body: String,
    ) -> ClientFuture<'a, String>;

    /// Polls a task until it succeeds.
    ///
    /// Fails with [`VolumeError::RemoteOperationFailed`] when the task ends in
    /// error and [`VolumeError::Timeout`] when it outlives the wait bound.
    fn wait_for<'a>(&'a self, task: &'a TaskHandle) -> ClientFuture<'a, ()>;

    /// Deletes a resource, waiting for any task the deletion starts.
    ///
    /// Fails with [`VolumeError::NotFound`] when the resource does not exist.
    fn delete<'a>(&'a self, kind: ResourceKind, id: &'a str) -> ClientFuture<'a, ()>;

    /// Builds the absolute location of a resource.
    fn to_url(&self, kind: ResourceKind, id: &str) -> String;

    /// Extracts the resource identifier from a location.
    fn to_id(&self, url: &str) -> String {
        Href::from(url).resource_id().to_owned()
    }

    /// Reports the API version negotiated with the endpoint.
    fn api_version(&self) -> ClientFuture<'_, ApiVersion>;

    /// Lists the data centers of a region in provider order.
    fn list_data_centers<'a>(&'a self, region_id: &'a str) -> ClientFuture<'a, Vec<DataCenter>>;
}

/// Writes and deletes key/value tags on a resource's metadata sub-resource.
pub trait MetadataStore: Send + Sync {
    /// Merges `tags` into the metadata of the resource.
    fn write<'a>(&'a self, kind: ResourceKind, id: &'a str, tags: &'a Tags)
    -> ClientFuture<'a, ()>;

    /// Deletes the named keys from the metadata of the resource.
    fn delete_keys<'a>(
        &'a self,
        kind: ResourceKind,
        id: &'a str,
        keys: &'a [String],
    ) -> ClientFuture<'a, ()>;
}
