//! Behavioural tests for the vCloud volume adapter against a scripted
//! endpoint.

use std::future::ready;
use std::time::Duration;

use rstest::*;
use vcloud_disks::test_support::{FAKE_API_URL, FakeDisk, ScriptedVendor, VendorCall};
use vcloud_disks::vcloud::client::{ClientFuture, ResourceClient};
use vcloud_disks::vcloud::types::{ApiVersion, DISK_MEDIA_TYPE, VCLOUD_NAMESPACE};
use vcloud_disks::vcloud::{DataCenter, ResourceKind, TaskHandle};
use vcloud_disks::{
    PollPolicy, Tags, VcloudVolumeAdapter, VolumeCreateOptions, VolumeError, VolumeFormat,
    VolumeState, VolumeSupport,
};

type Adapter = VcloudVolumeAdapter<ScriptedVendor>;

fn tiny_readiness() -> PollPolicy {
    PollPolicy::attach_readiness()
        .with_interval(Duration::from_millis(1))
        .with_timeout(Duration::from_millis(200))
}

fn adapter_for(vendor: &ScriptedVendor) -> Adapter {
    VcloudVolumeAdapter::new(vendor.clone(), vendor.clone(), "org-1")
        .with_attach_readiness_policy(tiny_readiness())
}

fn tags(entries: &[(&str, &str)]) -> Tags {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

fn options(name: &str) -> VolumeCreateOptions {
    VolumeCreateOptions::builder()
        .name(name)
        .size_gib(3)
        .build()
        .unwrap_or_else(|err| panic!("valid options: {err}"))
}

#[fixture]
fn vendor() -> ScriptedVendor {
    ScriptedVendor::default()
}

#[rstest]
#[tokio::test]
async fn create_returns_new_id_and_records_metadata_once(vendor: ScriptedVendor) {
    vendor.push_next_id("XYZ");
    let adapter = adapter_for(&vendor);

    let request = VolumeCreateOptions::builder()
        .name("d1")
        .size_gib(10)
        .format(VolumeFormat::Block)
        .build()
        .unwrap_or_else(|err| panic!("valid options: {err}"));

    let volume_id = adapter
        .create(&request)
        .await
        .unwrap_or_else(|err| panic!("create failed: {err}"));

    assert_eq!(volume_id, "XYZ");
    let writes: Vec<Tags> = vendor
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            VendorCall::WriteMetadata { id, tags } if id == "XYZ" => Some(tags),
            _ => None,
        })
        .collect();
    assert_eq!(writes.len(), 1, "exactly one metadata write expected");
    let written = writes.first().unwrap_or_else(|| panic!("no metadata write"));
    assert!(written.contains_key("dsnCreated"));
    assert_eq!(written.get("dsnDeviceId").map(String::as_str), Some(""));

    let posts = vendor.posts("createDisk");
    assert_eq!(posts.len(), 1);
    let Some(VendorCall::Post { url, .. }) = posts.first() else {
        panic!("missing createDisk post");
    };
    assert_eq!(url, &format!("{FAKE_API_URL}/vdc/vdc-1/disk"));
    let disk = vendor.disk("XYZ").unwrap_or_else(|| panic!("disk not stored"));
    assert_eq!(disk.size, "10737418240");
    assert_eq!(disk.description, "d1");
}

#[rstest]
#[tokio::test]
async fn created_volume_is_listed_with_creation_metadata(vendor: ScriptedVendor) {
    let adapter = adapter_for(&vendor);
    let request = VolumeCreateOptions::builder()
        .name("logs")
        .description("application logs")
        .size_gib(1)
        .device_id(Some(String::from("/dev/sdb")))
        .metadata("env", "prod")
        .build()
        .unwrap_or_else(|err| panic!("valid options: {err}"));

    let volume_id = adapter
        .create(&request)
        .await
        .unwrap_or_else(|err| panic!("create failed: {err}"));
    let volume = adapter
        .get(&volume_id)
        .await
        .unwrap_or_else(|err| panic!("get failed: {err}"))
        .unwrap_or_else(|| panic!("created volume missing"));

    assert_eq!(volume.name, "logs");
    assert_eq!(volume.description, "application logs");
    assert_eq!(volume.device_id.as_deref(), Some("/dev/sdb"));
    assert!(volume.created_at.is_some());
    assert_eq!(volume.tags, tags(&[("env", "prod")]));
    assert_eq!(volume.region_id, "org-1");
    assert_eq!(volume.data_center_id, "vdc-1");
}

#[rstest]
#[case::empty("")]
#[case::no_disk("<Task xmlns=\"http://www.vmware.com/vcloud/v1.5\" status=\"running\"/>")]
#[case::no_href("<Disk xmlns=\"http://www.vmware.com/vcloud/v1.5\" name=\"data\"/>")]
#[tokio::test]
async fn create_without_usable_disk_is_general_failure(
    vendor: ScriptedVendor,
    #[case] response: &str,
) {
    vendor.set_create_response(response);
    let adapter = adapter_for(&vendor);

    let error = adapter
        .create(&options("data"))
        .await
        .expect_err("create should fail");

    assert!(
        matches!(error, VolumeError::GeneralFailure(_)),
        "unexpected error: {error}"
    );
    assert_eq!(
        vendor.count_calls(|call| matches!(call, VendorCall::WriteMetadata { .. })),
        0
    );
}

#[rstest]
#[case::nfs(VolumeFormat::Nfs, None)]
#[case::snapshot(VolumeFormat::Block, Some("snap-1"))]
#[tokio::test]
async fn unsupported_create_requests_make_no_calls(
    vendor: ScriptedVendor,
    #[case] format: VolumeFormat,
    #[case] snapshot: Option<&str>,
) {
    let adapter = adapter_for(&vendor);
    let request = VolumeCreateOptions::builder()
        .name("data")
        .size_gib(1)
        .format(format)
        .snapshot_id(snapshot.map(str::to_owned))
        .build()
        .unwrap_or_else(|err| panic!("valid options: {err}"));

    let error = adapter.create(&request).await.expect_err("rejected");

    assert!(
        matches!(error, VolumeError::InvalidRequest(_)),
        "unexpected error: {error}"
    );
    assert!(vendor.calls().is_empty(), "calls: {:?}", vendor.calls());
}

#[rstest]
#[tokio::test]
async fn create_targets_requested_then_default_data_center() {
    let vendor = ScriptedVendor::new("org-1", &["vdc-1", "vdc-2", "vdc-3"]);
    let adapter = adapter_for(&vendor).with_default_data_center(Some(String::from("vdc-3")));

    let request = VolumeCreateOptions::builder()
        .name("pinned")
        .size_gib(1)
        .data_center_id(Some(String::from("vdc-2")))
        .build()
        .unwrap_or_else(|err| panic!("valid options: {err}"));
    let pinned = adapter
        .create(&request)
        .await
        .unwrap_or_else(|err| panic!("create failed: {err}"));
    let defaulted = adapter
        .create(&options("defaulted"))
        .await
        .unwrap_or_else(|err| panic!("create failed: {err}"));

    let disk_dc = |id: &str| {
        vendor
            .disk(id)
            .map(|disk| disk.data_center_id)
            .unwrap_or_default()
    };
    assert_eq!(disk_dc(&pinned), "vdc-2");
    assert_eq!(disk_dc(&defaulted), "vdc-3");
    assert_eq!(
        vendor.count_calls(|call| matches!(call, VendorCall::ListDataCenters { .. })),
        0
    );
}

#[rstest]
#[tokio::test]
async fn create_without_data_centers_is_not_found() {
    let vendor = ScriptedVendor::new("org-1", &[]);
    let adapter = adapter_for(&vendor);

    let error = adapter.create(&options("data")).await.expect_err("no vdc");

    assert!(error.is_not_found(), "unexpected error: {error}");
    assert!(vendor.posts("createDisk").is_empty());
}

#[rstest]
#[tokio::test]
async fn create_with_attach_waits_for_availability(vendor: ScriptedVendor) {
    vendor.push_next_id("disk-new");
    vendor.set_new_disk_pending_reads(2);
    let adapter = adapter_for(&vendor);
    let request = VolumeCreateOptions::builder()
        .name("data")
        .size_gib(1)
        .attach_to(Some(String::from("vm-7")))
        .build()
        .unwrap_or_else(|err| panic!("valid options: {err}"));

    let volume_id = adapter
        .create(&request)
        .await
        .unwrap_or_else(|err| panic!("create failed: {err}"));

    assert_eq!(volume_id, "disk-new");
    let disk = vendor.disk("disk-new").unwrap_or_else(|| panic!("disk missing"));
    assert_eq!(disk.attached_vm.as_deref(), Some("vm-7"));
    assert_eq!(disk.pending_reads, 0);
    assert_eq!(vendor.posts("attachVolume").len(), 1);
}

#[rstest]
#[tokio::test]
async fn create_survives_metadata_and_attach_failures(vendor: ScriptedVendor) {
    vendor.push_next_id("disk-new");
    vendor.fail_metadata_writes();
    vendor.fail_tasks("attach refused");
    let adapter = adapter_for(&vendor);
    let request = VolumeCreateOptions::builder()
        .name("data")
        .size_gib(1)
        .attach_to(Some(String::from("vm-7")))
        .build()
        .unwrap_or_else(|err| panic!("valid options: {err}"));

    let volume_id = adapter
        .create(&request)
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"));

    assert_eq!(volume_id, "disk-new");
    assert_eq!(vendor.posts("attachVolume").len(), 1);
}

#[rstest]
#[tokio::test]
async fn unsubscribed_account_is_rejected_before_mutation(vendor: ScriptedVendor) {
    vendor.set_api_version("1.5");
    vendor.seed_disk(FakeDisk::new("disk-1", "vdc-1"));
    let adapter = adapter_for(&vendor);

    let subscribed = adapter
        .is_subscribed()
        .await
        .unwrap_or_else(|err| panic!("entitlement check failed: {err}"));
    assert!(!subscribed);

    let create = adapter.create(&options("data")).await.expect_err("create");
    let attach = adapter
        .attach("disk-1", "vm-1", "")
        .await
        .expect_err("attach");
    let remove = adapter.remove("disk-1").await.expect_err("remove");
    let retag = adapter
        .update_tags("disk-1", &tags(&[("a", "1")]))
        .await
        .expect_err("update tags");

    for error in [create, attach, remove, retag] {
        assert!(
            matches!(error, VolumeError::NotSubscribed { .. }),
            "unexpected error: {error}"
        );
    }
    assert!(vendor.posts("createDisk").is_empty());
    assert!(vendor.posts("attachVolume").is_empty());
    assert!(vendor.disk("disk-1").is_some());
}

#[rstest]
#[tokio::test]
async fn attach_then_detach_round_trips_the_attachment(vendor: ScriptedVendor) {
    vendor.seed_disk(FakeDisk::new("disk-1", "vdc-1"));
    let adapter = adapter_for(&vendor);

    adapter
        .attach("disk-1", "vm-9", "/dev/sdc")
        .await
        .unwrap_or_else(|err| panic!("attach failed: {err}"));
    let attached = adapter
        .get("disk-1")
        .await
        .unwrap_or_else(|err| panic!("get failed: {err}"))
        .unwrap_or_else(|| panic!("volume missing"));
    assert_eq!(attached.attached_server_id.as_deref(), Some("vm-9"));

    adapter
        .detach("disk-1", false)
        .await
        .unwrap_or_else(|err| panic!("detach failed: {err}"));

    let detach_posts = vendor.posts("detachVolume");
    let Some(VendorCall::Post { url, body, .. }) = detach_posts.first() else {
        panic!("missing detach post");
    };
    assert_eq!(url, &format!("{FAKE_API_URL}/vApp/vm-9/disk/action/detach"));
    assert!(body.contains(&format!("{FAKE_API_URL}/disk/disk-1")), "body: {body}");
    assert_eq!(
        vendor.disk("disk-1").and_then(|disk| disk.attached_vm),
        None
    );
    assert_eq!(
        vendor.count_calls(|call| matches!(call, VendorCall::WaitFor { .. })),
        2
    );
}

#[rstest]
#[case(false)]
#[case(true)]
#[tokio::test]
async fn detach_of_unattached_volume_is_invalid(vendor: ScriptedVendor, #[case] force: bool) {
    vendor.seed_disk(FakeDisk::new("disk-1", "vdc-1"));
    let adapter = adapter_for(&vendor);

    let error = adapter.detach("disk-1", force).await.expect_err("detach");

    assert!(
        matches!(error, VolumeError::InvalidRequest(_)),
        "unexpected error: {error}"
    );
    assert!(vendor.posts("detachVolume").is_empty());
}

#[rstest]
#[tokio::test]
async fn detach_of_unknown_volume_is_not_found(vendor: ScriptedVendor) {
    let adapter = adapter_for(&vendor);

    let error = adapter.detach("ghost", false).await.expect_err("detach");

    assert!(error.is_not_found(), "unexpected error: {error}");
}

#[rstest]
#[tokio::test]
async fn failed_task_surfaces_vendor_message(vendor: ScriptedVendor) {
    vendor.seed_disk(FakeDisk::new("disk-1", "vdc-1"));
    vendor.fail_tasks("disk is busy");
    let adapter = adapter_for(&vendor);

    let error = adapter
        .attach("disk-1", "vm-1", "")
        .await
        .expect_err("attach");

    let VolumeError::RemoteOperationFailed { message, .. } = error else {
        panic!("expected RemoteOperationFailed, got {error}");
    };
    assert_eq!(message, "disk is busy");
}

#[rstest]
#[tokio::test]
async fn removed_volume_disappears(vendor: ScriptedVendor) {
    vendor.seed_disk(FakeDisk::new("disk-1", "vdc-1"));
    let adapter = adapter_for(&vendor);

    adapter
        .remove("disk-1")
        .await
        .unwrap_or_else(|err| panic!("remove failed: {err}"));
    let lookup = adapter
        .get("disk-1")
        .await
        .unwrap_or_else(|err| panic!("get failed: {err}"));
    assert_eq!(lookup, None);

    let error = adapter.remove("disk-1").await.expect_err("second remove");
    assert!(error.is_not_found(), "unexpected error: {error}");
}

#[rstest]
#[tokio::test]
async fn list_walks_data_centers_in_order() {
    let vendor = ScriptedVendor::new("org-1", &["vdc-1", "vdc-2"]);
    vendor.seed_disk(FakeDisk::new("a", "vdc-2"));
    vendor.seed_disk(
        FakeDisk::new("b", "vdc-1")
            .with_metadata(&[
                ("dsnCreated", "1700000000000"),
                ("dsnDeviceId", "/dev/sdd"),
                ("owner", "ops"),
            ])
            .attached_to("vm-2"),
    );
    vendor.seed_disk(FakeDisk {
        pending_reads: 5,
        ..FakeDisk::new("c", "vdc-2")
    });
    let adapter = adapter_for(&vendor);

    let volumes = adapter
        .list()
        .await
        .unwrap_or_else(|err| panic!("list failed: {err}"));

    let ids: Vec<&str> = volumes.iter().map(|volume| volume.id.as_str()).collect();
    assert_eq!(ids, ["b", "a", "c"]);
    let Some(b) = volumes.first() else {
        panic!("empty listing");
    };
    assert_eq!(b.data_center_id, "vdc-1");
    assert_eq!(b.attached_server_id.as_deref(), Some("vm-2"));
    assert_eq!(b.device_id.as_deref(), Some("/dev/sdd"));
    assert_eq!(
        b.created_at.map(|created| created.timestamp_millis()),
        Some(1_700_000_000_000)
    );
    assert_eq!(b.tags, tags(&[("owner", "ops")]));

    let statuses = adapter
        .list_status()
        .await
        .unwrap_or_else(|err| panic!("status failed: {err}"));
    let pairs: Vec<(String, VolumeState)> = statuses
        .into_iter()
        .map(|status| (status.id, status.state))
        .collect();
    assert_eq!(
        pairs,
        [
            (String::from("b"), VolumeState::Available),
            (String::from("a"), VolumeState::Available),
            (String::from("c"), VolumeState::Pending),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn replacing_tags_deletes_stale_keys_only(vendor: ScriptedVendor) {
    vendor.seed_disk(
        FakeDisk::new("disk-1", "vdc-1").with_metadata(&[("dsnCreated", "1700000000000")]),
    );
    let adapter = adapter_for(&vendor);

    adapter
        .set_tags("disk-1", &tags(&[("a", "1"), ("b", "2")]))
        .await
        .unwrap_or_else(|err| panic!("first set failed: {err}"));
    vendor.clear_calls();
    adapter
        .set_tags("disk-1", &tags(&[("b", "3")]))
        .await
        .unwrap_or_else(|err| panic!("second set failed: {err}"));

    let mutations: Vec<VendorCall> = vendor
        .calls()
        .into_iter()
        .filter(|call| {
            matches!(
                call,
                VendorCall::WriteMetadata { .. } | VendorCall::DeleteMetadata { .. }
            )
        })
        .collect();
    assert_eq!(
        mutations,
        [
            VendorCall::DeleteMetadata {
                id: String::from("disk-1"),
                keys: vec![String::from("a")],
            },
            VendorCall::WriteMetadata {
                id: String::from("disk-1"),
                tags: tags(&[("b", "3")]),
            },
        ]
    );
    let stored = vendor.disk("disk-1").map(|disk| disk.metadata);
    assert_eq!(
        stored,
        Some(tags(&[("b", "3"), ("dsnCreated", "1700000000000")]))
    );
}

#[rstest]
#[tokio::test]
async fn update_and_remove_tags_touch_named_keys(vendor: ScriptedVendor) {
    vendor.seed_disk(FakeDisk::new("disk-1", "vdc-1").with_metadata(&[("keep", "yes")]));
    let adapter = adapter_for(&vendor);

    adapter
        .update_tags("disk-1", &tags(&[("env", "prod"), ("tier", "gold")]))
        .await
        .unwrap_or_else(|err| panic!("update failed: {err}"));
    adapter
        .remove_tags("disk-1", &[String::from("tier")])
        .await
        .unwrap_or_else(|err| panic!("remove failed: {err}"));

    let volume = adapter
        .get("disk-1")
        .await
        .unwrap_or_else(|err| panic!("get failed: {err}"))
        .unwrap_or_else(|| panic!("volume missing"));
    assert_eq!(volume.tags, tags(&[("env", "prod"), ("keep", "yes")]));
}

#[rstest]
#[tokio::test]
async fn bulk_tagging_stops_at_first_failure_without_rollback(vendor: ScriptedVendor) {
    vendor.seed_disk(FakeDisk::new("disk-1", "vdc-1"));
    vendor.seed_disk(FakeDisk::new("disk-2", "vdc-1"));
    let adapter = adapter_for(&vendor);
    let ids = [
        String::from("disk-1"),
        String::from("ghost"),
        String::from("disk-2"),
    ];

    let error = adapter
        .set_tags_many(&ids, &tags(&[("env", "prod")]))
        .await
        .expect_err("ghost volume");

    assert!(error.is_not_found(), "unexpected error: {error}");
    assert_eq!(
        vendor.disk("disk-1").map(|disk| disk.metadata),
        Some(tags(&[("env", "prod")]))
    );
    assert_eq!(vendor.disk("disk-2").map(|disk| disk.metadata), Some(Tags::new()));
}

/// Serves a data center whose catalog lists a disk without a location.
#[derive(Clone, Debug, Default)]
struct CatalogWithoutHref {
    inner: ScriptedVendor,
}

impl ResourceClient for CatalogWithoutHref {
    fn get<'a>(&'a self, kind: ResourceKind, id: &'a str) -> ClientFuture<'a, String> {
        if kind == ResourceKind::Vdc {
            let document = format!(
                r#"<Vdc xmlns="{VCLOUD_NAMESPACE}"><ResourceEntities><ResourceEntity type="{DISK_MEDIA_TYPE}" name="orphan"/></ResourceEntities></Vdc>"#
            );
            let served: Result<String, VolumeError> = Ok(document);
            return Box::pin(ready(served));
        }
        self.inner.get(kind, id)
    }

    fn post<'a>(
        &'a self,
        action: &'a str,
        url: &'a str,
        media_type: &'a str,
        body: String,
    ) -> ClientFuture<'a, String> {
        self.inner.post(action, url, media_type, body)
    }

    fn wait_for<'a>(&'a self, task: &'a TaskHandle) -> ClientFuture<'a, ()> {
        self.inner.wait_for(task)
    }

    fn delete<'a>(&'a self, kind: ResourceKind, id: &'a str) -> ClientFuture<'a, ()> {
        self.inner.delete(kind, id)
    }

    fn to_url(&self, kind: ResourceKind, id: &str) -> String {
        self.inner.to_url(kind, id)
    }

    fn api_version(&self) -> ClientFuture<'_, ApiVersion> {
        self.inner.api_version()
    }

    fn list_data_centers<'a>(&'a self, region_id: &'a str) -> ClientFuture<'a, Vec<DataCenter>> {
        self.inner.list_data_centers(region_id)
    }
}

#[tokio::test]
async fn catalog_entry_without_href_is_internal_inconsistency() {
    let client = CatalogWithoutHref::default();
    let adapter = VcloudVolumeAdapter::new(client.clone(), client.inner.clone(), "org-1");

    let error = adapter.list().await.expect_err("orphan entry");

    assert!(
        matches!(error, VolumeError::InternalInconsistency(_)),
        "unexpected error: {error}"
    );
}
