//! Test support utilities shared across unit and integration tests.
//!
//! [`ScriptedVendor`] is an in-memory stand-in for a vCloud Director
//! endpoint. It serves the same XML documents the real API returns for
//! disks, data centers and metadata, records every call, and can be scripted
//! to fail in the places the adapter must tolerate.

use std::collections::VecDeque;
use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quick_xml::escape::escape;

use crate::vcloud::client::{ClientFuture, MetadataStore, ResourceClient};
use crate::vcloud::codec::decode_single_resource;
use crate::vcloud::types::{
    ApiVersion, DISK_MEDIA_TYPE, DataCenter, Href, ResourceKind, TaskHandle, VCLOUD_NAMESPACE,
    VDC_MEDIA_TYPE,
};
use crate::vcloud::VolumeError;
use crate::volume::Tags;

/// Base URL of every location handed out by [`ScriptedVendor`].
pub const FAKE_API_URL: &str = "https://vcd.test/api";

/// One call observed by [`ScriptedVendor`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VendorCall {
    /// `ResourceClient::get`.
    Get {
        /// Kind requested.
        kind: ResourceKind,
        /// Identifier, including any sub-resource suffix.
        id: String,
    },
    /// `ResourceClient::post`.
    Post {
        /// Vendor action name.
        action: String,
        /// Target location.
        url: String,
        /// Request body.
        body: String,
    },
    /// `ResourceClient::wait_for`.
    WaitFor {
        /// Task location.
        task: String,
    },
    /// `ResourceClient::delete`.
    Delete {
        /// Kind deleted.
        kind: ResourceKind,
        /// Identifier deleted.
        id: String,
    },
    /// `ResourceClient::api_version`.
    ApiVersion,
    /// `ResourceClient::list_data_centers`.
    ListDataCenters {
        /// Region listed.
        region_id: String,
    },
    /// `MetadataStore::write`.
    WriteMetadata {
        /// Resource written.
        id: String,
        /// Tags written.
        tags: Tags,
    },
    /// `MetadataStore::delete_keys`.
    DeleteMetadata {
        /// Resource modified.
        id: String,
        /// Keys deleted.
        keys: Vec<String>,
    },
}

/// Disk held by [`ScriptedVendor`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FakeDisk {
    /// Disk identifier.
    pub id: String,
    /// Data center listing the disk.
    pub data_center_id: String,
    /// `name` attribute; omitted from the document when empty.
    pub name: String,
    /// `Description` child; omitted when empty.
    pub description: String,
    /// `size` attribute.
    pub size: String,
    /// Metadata entries.
    pub metadata: Tags,
    /// VM holding the disk.
    pub attached_vm: Option<String>,
    /// Number of disk reads that still report status `0` before the disk
    /// reports `1`.
    pub pending_reads: usize,
}

impl FakeDisk {
    /// Creates an available, unattached disk.
    #[must_use]
    pub fn new(id: &str, data_center_id: &str) -> Self {
        Self {
            id: id.to_owned(),
            data_center_id: data_center_id.to_owned(),
            name: id.to_owned(),
            description: String::new(),
            size: String::from("1073741824"),
            metadata: Tags::new(),
            attached_vm: None,
            pending_reads: 0,
        }
    }

    /// Sets the metadata entries.
    #[must_use]
    pub fn with_metadata(mut self, entries: &[(&str, &str)]) -> Self {
        self.metadata = entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        self
    }

    /// Marks the disk as attached to `vm`.
    #[must_use]
    pub fn attached_to(mut self, vm: &str) -> Self {
        self.attached_vm = Some(vm.to_owned());
        self
    }
}

#[derive(Debug)]
struct State {
    api_version: String,
    region_id: String,
    data_centers: Vec<DataCenter>,
    disks: Vec<FakeDisk>,
    next_ids: VecDeque<String>,
    created: usize,
    new_disk_pending_reads: usize,
    create_response: Option<String>,
    fail_metadata_writes: bool,
    failing_task: Option<String>,
    calls: Vec<VendorCall>,
}

/// In-memory vCloud endpoint implementing [`ResourceClient`] and
/// [`MetadataStore`]. Clones share state.
#[derive(Clone, Debug)]
pub struct ScriptedVendor {
    state: Arc<Mutex<State>>,
}

impl Default for ScriptedVendor {
    fn default() -> Self {
        Self::new("org-1", &["vdc-1"])
    }
}

impl ScriptedVendor {
    /// Creates a vendor with API version 5.1, one region and the given data
    /// centers.
    #[must_use]
    pub fn new(region_id: &str, data_center_ids: &[&str]) -> Self {
        let data_centers = data_center_ids
            .iter()
            .map(|id| DataCenter {
                id: (*id).to_owned(),
                name: (*id).to_owned(),
                region_id: region_id.to_owned(),
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(State {
                api_version: String::from("5.1"),
                region_id: region_id.to_owned(),
                data_centers,
                disks: Vec::new(),
                next_ids: VecDeque::new(),
                created: 0,
                new_disk_pending_reads: 0,
                create_response: None,
                fail_metadata_writes: false,
                failing_task: None,
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the reported API version.
    pub fn set_api_version(&self, version: &str) {
        version.clone_into(&mut self.lock().api_version);
    }

    /// Adds a disk.
    pub fn seed_disk(&self, disk: FakeDisk) {
        self.lock().disks.push(disk);
    }

    /// Queues the identifier given to the next created disk.
    pub fn push_next_id(&self, id: &str) {
        self.lock().next_ids.push_back(id.to_owned());
    }

    /// Makes new disks report pending for `reads` disk reads.
    pub fn set_new_disk_pending_reads(&self, reads: usize) {
        self.lock().new_disk_pending_reads = reads;
    }

    /// Replaces the create response body; no disk is stored.
    pub fn set_create_response(&self, body: &str) {
        self.lock().create_response = Some(body.to_owned());
    }

    /// Makes metadata writes fail with a provider error.
    pub fn fail_metadata_writes(&self) {
        self.lock().fail_metadata_writes = true;
    }

    /// Makes every task wait fail with the given vendor message.
    pub fn fail_tasks(&self, message: &str) {
        self.lock().failing_task = Some(message.to_owned());
    }

    /// Returns a snapshot of a stored disk.
    #[must_use]
    pub fn disk(&self, id: &str) -> Option<FakeDisk> {
        self.lock().disks.iter().find(|disk| disk.id == id).cloned()
    }

    /// Returns every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<VendorCall> {
        self.lock().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Counts the recorded calls matching `predicate`.
    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&VendorCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Returns the recorded posts of the given vendor action.
    #[must_use]
    pub fn posts(&self, action: &str) -> Vec<VendorCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, VendorCall::Post { action: posted, .. } if posted == action))
            .cloned()
            .collect()
    }

    fn record(&self, call: VendorCall) {
        self.lock().calls.push(call);
    }

    fn serve_get(&self, kind: ResourceKind, id: &str) -> Result<String, VolumeError> {
        let mut state = self.lock();
        match kind {
            ResourceKind::Org if id == state.region_id => Ok(org_document(&state.data_centers)),
            ResourceKind::Vdc if state.data_centers.iter().any(|dc| dc.id == id) => {
                Ok(vdc_document(id, &state.disks))
            }
            ResourceKind::Disk => {
                let (disk_id, sub_resource) = id.split_once('/').unwrap_or((id, ""));
                let disk = state
                    .disks
                    .iter_mut()
                    .find(|disk| disk.id == disk_id)
                    .ok_or_else(|| VolumeError::not_found(kind.to_string(), id))?;
                match sub_resource {
                    "" => Ok(disk_document(disk)),
                    "metadata" => Ok(metadata_document(&disk.metadata)),
                    "attachedVms" => Ok(attached_vms_document(disk.attached_vm.as_deref())),
                    _ => Err(VolumeError::not_found(kind.to_string(), id)),
                }
            }
            _ => Err(VolumeError::not_found(kind.to_string(), id)),
        }
    }

    fn serve_post(&self, action: &str, url: &str, body: &str) -> Result<String, VolumeError> {
        match action {
            "createDisk" => self.create_disk(url, body),
            "attachVolume" => self.change_attachment(url, body, true),
            "detachVolume" => self.change_attachment(url, body, false),
            other => Err(VolumeError::Provider {
                message: format!("unsupported action {other}"),
            }),
        }
    }

    fn create_disk(&self, url: &str, body: &str) -> Result<String, VolumeError> {
        let mut state = self.lock();
        if let Some(response) = state.create_response.clone() {
            return Ok(response);
        }
        let data_center_id = url
            .trim_end_matches("/disk")
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_owned();
        let request = decode_single_resource(body, "Disk")?
            .ok_or_else(|| VolumeError::InvalidRequest(String::from("no Disk in request")))?;

        state.created += 1;
        let fallback = format!("disk-{}", state.created);
        let id = state.next_ids.pop_front().unwrap_or(fallback);
        let disk = FakeDisk {
            name: request.attribute("name").unwrap_or_default().to_owned(),
            description: request.child_text("Description").unwrap_or_default().to_owned(),
            size: request.attribute("size").unwrap_or_default().to_owned(),
            pending_reads: state.new_disk_pending_reads,
            ..FakeDisk::new(&id, &data_center_id)
        };
        let response = format!(
            r#"<Disk xmlns="{VCLOUD_NAMESPACE}" name="{name}" href="{FAKE_API_URL}/disk/{id}" status="0"><Tasks><Task status="running" href="{FAKE_API_URL}/task/create-{id}"/></Tasks></Disk>"#,
            name = escape(&disk.name),
        );
        state.disks.push(disk);
        Ok(response)
    }

    fn change_attachment(&self, url: &str, body: &str, attach: bool) -> Result<String, VolumeError> {
        let vm = url
            .split("/vApp/")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or_default()
            .to_owned();
        let disk_href = decode_single_resource(body, "Disk")?
            .and_then(|disk| disk.attribute("href").map(str::to_owned))
            .unwrap_or_default();
        let disk_id = Href::from(disk_href).resource_id().to_owned();

        let mut state = self.lock();
        let disk = state
            .disks
            .iter_mut()
            .find(|disk| disk.id == disk_id)
            .ok_or_else(|| VolumeError::not_found(ResourceKind::Disk.to_string(), &disk_id))?;
        disk.attached_vm = attach.then_some(vm);
        Ok(format!(
            r#"<Task xmlns="{VCLOUD_NAMESPACE}" status="running" href="{FAKE_API_URL}/task/disk-{disk_id}"/>"#
        ))
    }

    fn finish_task(&self, task: &TaskHandle) -> Result<(), VolumeError> {
        match self.lock().failing_task.clone() {
            Some(message) => Err(VolumeError::RemoteOperationFailed {
                task: task.href.to_string(),
                message,
            }),
            None => Ok(()),
        }
    }

    fn remove_disk(&self, kind: ResourceKind, id: &str) -> Result<(), VolumeError> {
        let mut state = self.lock();
        let before = state.disks.len();
        state.disks.retain(|disk| disk.id != id);
        if state.disks.len() == before {
            return Err(VolumeError::not_found(kind.to_string(), id));
        }
        Ok(())
    }

    fn merge_metadata(&self, id: &str, tags: &Tags) -> Result<(), VolumeError> {
        let mut state = self.lock();
        if state.fail_metadata_writes {
            return Err(VolumeError::Provider {
                message: String::from("metadata service unavailable"),
            });
        }
        let disk = state
            .disks
            .iter_mut()
            .find(|disk| disk.id == id)
            .ok_or_else(|| VolumeError::not_found(ResourceKind::Disk.to_string(), id))?;
        disk.metadata
            .extend(tags.iter().map(|(key, value)| (key.clone(), value.clone())));
        Ok(())
    }

    fn drop_metadata(&self, id: &str, keys: &[String]) -> Result<(), VolumeError> {
        let mut state = self.lock();
        let disk = state
            .disks
            .iter_mut()
            .find(|disk| disk.id == id)
            .ok_or_else(|| VolumeError::not_found(ResourceKind::Disk.to_string(), id))?;
        for key in keys {
            disk.metadata.remove(key);
        }
        Ok(())
    }
}

fn org_document(data_centers: &[DataCenter]) -> String {
    let links: String = data_centers
        .iter()
        .map(|dc| {
            format!(
                r#"<Link rel="down" type="{VDC_MEDIA_TYPE}" name="{}" href="{FAKE_API_URL}/vdc/{}"/>"#,
                escape(&dc.name),
                dc.id
            )
        })
        .collect();
    format!(r#"<Org xmlns="{VCLOUD_NAMESPACE}">{links}</Org>"#)
}

fn vdc_document(data_center_id: &str, disks: &[FakeDisk]) -> String {
    let entities: String = disks
        .iter()
        .filter(|disk| disk.data_center_id == data_center_id)
        .map(|disk| {
            format!(
                r#"<ResourceEntity type="{DISK_MEDIA_TYPE}" name="{}" href="{FAKE_API_URL}/disk/{}"/>"#,
                escape(&disk.name),
                disk.id
            )
        })
        .collect();
    format!(
        r#"<Vdc xmlns="{VCLOUD_NAMESPACE}" name="{data_center_id}"><ResourceEntities>{entities}</ResourceEntities></Vdc>"#
    )
}

fn disk_document(disk: &mut FakeDisk) -> String {
    let status = if disk.pending_reads > 0 {
        disk.pending_reads -= 1;
        "0"
    } else {
        "1"
    };
    let name = if disk.name.is_empty() {
        String::new()
    } else {
        format!(r#" name="{}""#, escape(&disk.name))
    };
    let description = if disk.description.is_empty() {
        String::new()
    } else {
        format!("<Description>{}</Description>", escape(&disk.description))
    };
    format!(
        r#"<Disk xmlns="{VCLOUD_NAMESPACE}"{name} size="{size}" status="{status}" href="{FAKE_API_URL}/disk/{id}">{description}</Disk>"#,
        size = escape(&disk.size),
        id = disk.id,
    )
}

fn metadata_document(metadata: &Tags) -> String {
    let entries: String = metadata
        .iter()
        .map(|(key, value)| {
            format!(
                r#"<MetadataEntry><Key>{}</Key><TypedValue xsi:type="MetadataStringValue"><Value>{}</Value></TypedValue></MetadataEntry>"#,
                escape(key),
                escape(value)
            )
        })
        .collect();
    format!(
        r#"<Metadata xmlns="{VCLOUD_NAMESPACE}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">{entries}</Metadata>"#
    )
}

fn attached_vms_document(vm: Option<&str>) -> String {
    let reference = vm.map_or_else(String::new, |vm| {
        format!(r#"<VmReference type="application/vnd.vmware.vcloud.vm+xml" href="{FAKE_API_URL}/vApp/{vm}"/>"#)
    });
    format!(r#"<Vms xmlns="{VCLOUD_NAMESPACE}">{reference}</Vms>"#)
}

impl ResourceClient for ScriptedVendor {
    fn get<'a>(&'a self, kind: ResourceKind, id: &'a str) -> ClientFuture<'a, String> {
        self.record(VendorCall::Get {
            kind,
            id: id.to_owned(),
        });
        Box::pin(ready(self.serve_get(kind, id)))
    }

    fn post<'a>(
        &'a self,
        action: &'a str,
        url: &'a str,
        _media_type: &'a str,
        body: String,
    ) -> ClientFuture<'a, String> {
        let result = self.serve_post(action, url, &body);
        self.record(VendorCall::Post {
            action: action.to_owned(),
            url: url.to_owned(),
            body,
        });
        Box::pin(ready(result))
    }

    fn wait_for<'a>(&'a self, task: &'a TaskHandle) -> ClientFuture<'a, ()> {
        self.record(VendorCall::WaitFor {
            task: task.href.to_string(),
        });
        Box::pin(ready(self.finish_task(task)))
    }

    fn delete<'a>(&'a self, kind: ResourceKind, id: &'a str) -> ClientFuture<'a, ()> {
        self.record(VendorCall::Delete {
            kind,
            id: id.to_owned(),
        });
        Box::pin(ready(self.remove_disk(kind, id)))
    }

    fn to_url(&self, kind: ResourceKind, id: &str) -> String {
        format!("{FAKE_API_URL}/{}/{id}", kind.segment())
    }

    fn api_version(&self) -> ClientFuture<'_, ApiVersion> {
        self.record(VendorCall::ApiVersion);
        let version: Result<ApiVersion, VolumeError> =
            Ok(ApiVersion::new(self.lock().api_version.clone()));
        Box::pin(ready(version))
    }

    fn list_data_centers<'a>(&'a self, region_id: &'a str) -> ClientFuture<'a, Vec<DataCenter>> {
        self.record(VendorCall::ListDataCenters {
            region_id: region_id.to_owned(),
        });
        let state = self.lock();
        let result = if state.region_id == region_id {
            Ok(state.data_centers.clone())
        } else {
            Err(VolumeError::not_found(ResourceKind::Org.to_string(), region_id))
        };
        drop(state);
        Box::pin(ready(result))
    }
}

impl MetadataStore for ScriptedVendor {
    fn write<'a>(
        &'a self,
        _kind: ResourceKind,
        id: &'a str,
        tags: &'a Tags,
    ) -> ClientFuture<'a, ()> {
        self.record(VendorCall::WriteMetadata {
            id: id.to_owned(),
            tags: tags.clone(),
        });
        Box::pin(ready(self.merge_metadata(id, tags)))
    }

    fn delete_keys<'a>(
        &'a self,
        _kind: ResourceKind,
        id: &'a str,
        keys: &'a [String],
    ) -> ClientFuture<'a, ()> {
        self.record(VendorCall::DeleteMetadata {
            id: id.to_owned(),
            keys: keys.to_vec(),
        });
        Box::pin(ready(self.drop_metadata(id, keys)))
    }
}
