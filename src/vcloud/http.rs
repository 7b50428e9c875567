//! `reqwest` transport for vCloud Director 5.1 and later.

use std::future::ready;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use tracing::debug;

use crate::config::VcloudConfig;
use crate::poll::{PollPolicy, Probe, poll_until};
use crate::volume::Tags;

use super::client::{ClientFuture, MetadataStore, ResourceClient};
use super::codec::{decode_resource_list, decode_task, encode_metadata};
use super::error::VolumeError;
use super::types::{
    ApiVersion, DataCenter, Href, METADATA_MEDIA_TYPE, ResourceKind, TaskHandle, TaskStatus,
    VDC_MEDIA_TYPE,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const AUTH_HEADER: &str = "x-vcloud-authorization";

/// Resource client that talks to a vCloud Director endpoint over HTTPS.
///
/// The session token comes from configuration; logging in is out of scope.
#[derive(Clone, Debug)]
pub struct HttpResourceClient {
    http: Client,
    api_url: String,
    auth_token: String,
    api_version: ApiVersion,
    task_policy: PollPolicy,
}

impl HttpResourceClient {
    /// Builds a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Config`] when the configuration is invalid and
    /// [`VolumeError::Provider`] when the HTTP client cannot be built.
    pub fn new(config: &VcloudConfig) -> Result<Self, VolumeError> {
        config.validate()?;
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim().trim_end_matches('/').to_owned(),
            auth_token: config.auth_token.trim().to_owned(),
            api_version: ApiVersion::new(config.api_version.trim()),
            task_policy: config.task_poll_policy(),
        })
    }

    /// Replaces the policy used while waiting for tasks.
    #[must_use]
    pub const fn with_task_policy(mut self, policy: PollPolicy) -> Self {
        self.task_policy = policy;
        self
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(ACCEPT, format!("application/*+xml;version={}", self.api_version))
            .header(AUTH_HEADER, &self.auth_token)
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        kind: &str,
        target: &str,
    ) -> Result<String, VolumeError> {
        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(VolumeError::not_found(kind, target));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VolumeError::Provider {
                message: format!("{kind} {target}: HTTP {status}: {}", detail.trim()),
            });
        }
        Ok(response.text().await?)
    }

    async fn wait_for_response_task(&self, document: &str) -> Result<(), VolumeError> {
        match decode_task(document)? {
            Some(task) => self.wait_for_task(&task).await,
            None => Ok(()),
        }
    }

    async fn probe_task(&self, href: &Href) -> Result<Probe<()>, VolumeError> {
        let builder = self.request(Method::GET, href.as_str());
        let document = self.send(builder, "task", href.as_str()).await?;
        let task = decode_task(&document)?.ok_or_else(|| {
            VolumeError::GeneralFailure(format!("task {href} returned no task document"))
        })?;
        match task.status {
            TaskStatus::Succeeded => Ok(Probe::Ready(())),
            TaskStatus::Failed => Err(failed_task(&task)),
            TaskStatus::Pending => Ok(Probe::Pending),
        }
    }

    async fn wait_for_task(&self, task: &TaskHandle) -> Result<(), VolumeError> {
        match task.status {
            TaskStatus::Succeeded => return Ok(()),
            TaskStatus::Failed => return Err(failed_task(task)),
            TaskStatus::Pending => {}
        }
        debug!(task = %task.href, "waiting for task");
        poll_until(&self.task_policy, "task", task.href.as_str(), || {
            self.probe_task(&task.href)
        })
        .await?;
        Ok(())
    }

    fn metadata_key_url(&self, kind: ResourceKind, id: &str, key: &str) -> Result<Url, VolumeError> {
        let base = format!("{}/metadata", self.to_url(kind, id));
        let mut url = Url::parse(&base).map_err(|err| VolumeError::Provider {
            message: format!("invalid metadata URL {base}: {err}"),
        })?;
        url.path_segments_mut()
            .map_err(|()| VolumeError::Provider {
                message: format!("metadata URL {base} cannot carry a key"),
            })?
            .push(key);
        Ok(url)
    }
}

fn failed_task(task: &TaskHandle) -> VolumeError {
    VolumeError::RemoteOperationFailed {
        task: task.href.to_string(),
        message: task
            .error_message
            .clone()
            .unwrap_or_else(|| String::from("task ended in error")),
    }
}

impl ResourceClient for HttpResourceClient {
    fn get<'a>(&'a self, kind: ResourceKind, id: &'a str) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let url = self.to_url(kind, id);
            let builder = self.request(Method::GET, &url);
            self.send(builder, &kind.to_string(), id).await
        })
    }

    fn post<'a>(
        &'a self,
        action: &'a str,
        url: &'a str,
        media_type: &'a str,
        body: String,
    ) -> ClientFuture<'a, String> {
        Box::pin(async move {
            debug!(action, url, "posting request");
            let builder = self
                .request(Method::POST, url)
                .header(CONTENT_TYPE, media_type)
                .body(body);
            self.send(builder, action, url).await
        })
    }

    fn wait_for<'a>(&'a self, task: &'a TaskHandle) -> ClientFuture<'a, ()> {
        Box::pin(self.wait_for_task(task))
    }

    fn delete<'a>(&'a self, kind: ResourceKind, id: &'a str) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let url = self.to_url(kind, id);
            let builder = self.request(Method::DELETE, &url);
            let document = self.send(builder, &kind.to_string(), id).await?;
            self.wait_for_response_task(&document).await
        })
    }

    fn to_url(&self, kind: ResourceKind, id: &str) -> String {
        format!("{}/{}/{}", self.api_url, kind.segment(), id)
    }

    fn api_version(&self) -> ClientFuture<'_, ApiVersion> {
        Box::pin(ready(Ok(self.api_version.clone())))
    }

    fn list_data_centers<'a>(&'a self, region_id: &'a str) -> ClientFuture<'a, Vec<DataCenter>> {
        Box::pin(async move {
            let document = self.get(ResourceKind::Org, region_id).await?;
            let links = decode_resource_list(&document, "Link")?;
            Ok(links
                .iter()
                .filter(|link| link.attribute("type") == Some(VDC_MEDIA_TYPE))
                .filter_map(|link| {
                    let href = link.attribute("href")?;
                    let id = self.to_id(href);
                    let name = link.attribute("name").unwrap_or(&id).to_owned();
                    Some(DataCenter {
                        id,
                        name,
                        region_id: region_id.to_owned(),
                    })
                })
                .collect())
        })
    }
}

impl MetadataStore for HttpResourceClient {
    fn write<'a>(
        &'a self,
        kind: ResourceKind,
        id: &'a str,
        tags: &'a Tags,
    ) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            if tags.is_empty() {
                return Ok(());
            }
            let url = format!("{}/metadata", self.to_url(kind, id));
            let document = self
                .post("writeMetadata", &url, METADATA_MEDIA_TYPE, encode_metadata(tags)?)
                .await?;
            self.wait_for_response_task(&document).await
        })
    }

    fn delete_keys<'a>(
        &'a self,
        kind: ResourceKind,
        id: &'a str,
        keys: &'a [String],
    ) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            for key in keys {
                let url = self.metadata_key_url(kind, id, key)?;
                let builder = self.request(Method::DELETE, url.as_str());
                let document = self.send(builder, "metadata entry", key).await?;
                self.wait_for_response_task(&document).await?;
            }
            Ok(())
        })
    }
}
