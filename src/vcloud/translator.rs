//! Conversion of vCloud disk documents into provider-neutral [`Volume`]s.

use chrono::DateTime;

use crate::volume::{BYTES_PER_GIB, Tags, Volume, VolumeFormat, VolumeState, VolumeType};

use super::codec::{decode_metadata, decode_single_resource};

/// Metadata key holding the creation time in epoch milliseconds.
pub const CREATED_TAG: &str = "dsnCreated";
/// Metadata key holding the device identifier chosen at creation.
pub const DEVICE_ID_TAG: &str = "dsnDeviceId";

/// Identity of the volume being translated.
#[derive(Clone, Copy, Debug)]
pub struct TranslationContext<'a> {
    /// Region the adapter is bound to.
    pub region_id: &'a str,
    /// Data center the disk was listed under.
    pub data_center_id: &'a str,
    /// Identifier of the disk.
    pub volume_id: &'a str,
}

/// Maps the vendor disk `status` code: `1` is available, anything else is
/// still pending.
#[must_use]
pub fn state_from_code(code: &str) -> VolumeState {
    if code.trim() == "1" {
        VolumeState::Available
    } else {
        VolumeState::Pending
    }
}

/// Compares two dotted numeric versions. Non-numeric components count as
/// zero and missing components are padded with zero.
#[must_use]
pub fn api_version_at_least(version: &str, minimum: &str) -> bool {
    let parse = |text: &str| -> Vec<u64> {
        text.trim()
            .split('.')
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };
    let mut actual = parse(version);
    let mut wanted = parse(minimum);
    let width = actual.len().max(wanted.len());
    actual.resize(width, 0);
    wanted.resize(width, 0);
    actual >= wanted
}

/// Builds a [`Volume`] from the disk document and its optional sub-resources.
///
/// The attached VM's location is turned into an identifier by `to_id`,
/// normally [`ResourceClient::to_id`](super::client::ResourceClient::to_id).
///
/// Returns `None` when `primary` cannot be parsed or holds no `Disk` element.
/// Unparseable `metadata` or `attachment` documents are ignored.
#[must_use]
pub fn to_volume(
    context: TranslationContext<'_>,
    primary: &str,
    metadata: Option<&str>,
    attachment: Option<&str>,
    to_id: &dyn Fn(&str) -> String,
) -> Option<Volume> {
    let disk = decode_single_resource(primary, "Disk").ok().flatten()?;

    let mut volume = Volume {
        id: context.volume_id.to_owned(),
        name: String::new(),
        description: String::new(),
        size_bytes: BYTES_PER_GIB,
        state: VolumeState::Available,
        format: VolumeFormat::Block,
        volume_type: VolumeType::Hdd,
        region_id: context.region_id.to_owned(),
        data_center_id: context.data_center_id.to_owned(),
        attached_server_id: None,
        device_id: None,
        created_at: None,
        tags: Tags::new(),
    };

    if let Some(name) = disk.attribute("name") {
        name.clone_into(&mut volume.name);
    }
    if let Some(size) = disk
        .attribute("size")
        .and_then(|size| size.parse::<u64>().ok())
    {
        volume.size_bytes = size;
    }
    if let Some(status) = disk.attribute("status") {
        volume.state = state_from_code(status);
    }
    if let Some(description) = disk.child_text("Description") {
        description.clone_into(&mut volume.description);
    }

    if let Some(mut tags) = metadata.and_then(|document| decode_metadata(document).ok()) {
        volume.created_at = tags
            .remove(CREATED_TAG)
            .and_then(|millis| millis.trim().parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis);
        volume.device_id = tags
            .remove(DEVICE_ID_TAG)
            .filter(|device| !device.trim().is_empty());
        volume.tags = tags;
    }

    volume.attached_server_id = attachment.and_then(|document| attached_server(document, to_id));

    if volume.name.is_empty() {
        volume.name.clone_from(&volume.id);
    }
    if volume.description.is_empty() {
        volume.description.clone_from(&volume.name);
    }
    Some(volume)
}

fn attached_server(document: &str, to_id: &dyn Fn(&str) -> String) -> Option<String> {
    let reference = decode_single_resource(document, "VmReference").ok().flatten()?;
    let id = to_id(reference.attribute("href")?);
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::vcloud::types::Href;

    const CONTEXT: TranslationContext<'static> = TranslationContext {
        region_id: "org-1",
        data_center_id: "vdc-1",
        volume_id: "d-1",
    };

    fn last_segment(href: &str) -> String {
        Href::from(href).resource_id().to_owned()
    }

    fn translate(primary: &str, metadata: Option<&str>, attachment: Option<&str>) -> Volume {
        to_volume(CONTEXT, primary, metadata, attachment, &last_segment)
            .unwrap_or_else(|| panic!("primary document should translate"))
    }

    #[rstest]
    #[case("1", VolumeState::Available)]
    #[case("0", VolumeState::Pending)]
    #[case("-1", VolumeState::Pending)]
    #[case("available", VolumeState::Pending)]
    #[case("", VolumeState::Pending)]
    fn state_codes_map_to_volume_states(#[case] code: &str, #[case] expected: VolumeState) {
        assert_eq!(state_from_code(code), expected);
    }

    #[rstest]
    #[case("5.1", "5.1", true)]
    #[case("5.5", "5.1", true)]
    #[case("27.0", "5.1", true)]
    #[case("5", "5.1", false)]
    #[case("1.5", "5.1", false)]
    #[case("beta", "5.1", false)]
    fn api_versions_compare_component_wise(
        #[case] version: &str,
        #[case] minimum: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(api_version_at_least(version, minimum), expected);
    }

    #[test]
    fn bare_disk_gets_fallbacks() {
        let volume = translate("<Disk/>", None, None);

        assert_eq!(volume.id, "d-1");
        assert_eq!(volume.name, "d-1");
        assert_eq!(volume.description, "d-1");
        assert_eq!(volume.size_bytes, BYTES_PER_GIB);
        assert_eq!(volume.state, VolumeState::Available);
        assert_eq!(volume.format, VolumeFormat::Block);
        assert_eq!(volume.volume_type, VolumeType::Hdd);
        assert_eq!(volume.region_id, "org-1");
        assert_eq!(volume.data_center_id, "vdc-1");
        assert_eq!(volume.attached_server_id, None);
    }

    #[test]
    fn description_falls_back_to_name() {
        let volume = translate(r#"<Disk name="scratch" size="oops" status="0"/>"#, None, None);

        assert_eq!(volume.name, "scratch");
        assert_eq!(volume.description, "scratch");
        assert_eq!(volume.size_bytes, BYTES_PER_GIB);
        assert_eq!(volume.state, VolumeState::Pending);
    }

    #[test]
    fn metadata_and_attachment_are_applied() {
        let metadata = r#"<Metadata>
  <MetadataEntry><Key>dsnCreated</Key><Value>1700000000000</Value></MetadataEntry>
  <MetadataEntry><Key>dsnDeviceId</Key><Value>/dev/sdb</Value></MetadataEntry>
  <MetadataEntry><Key>owner</Key><Value>ops</Value></MetadataEntry>
</Metadata>"#;
        let attachment = r#"<Vms><VmReference href="https://vcd.test/api/vApp/vm-42" name="vm"/></Vms>"#;

        let volume = translate(
            r#"<Disk name="data" size="4096" status="1"><Description>cache</Description></Disk>"#,
            Some(metadata),
            Some(attachment),
        );

        assert_eq!(volume.size_bytes, 4096);
        assert_eq!(volume.description, "cache");
        assert_eq!(volume.device_id.as_deref(), Some("/dev/sdb"));
        assert_eq!(
            volume.created_at.map(|at| at.timestamp_millis()),
            Some(1_700_000_000_000)
        );
        assert_eq!(volume.attached_server_id.as_deref(), Some("vm-42"));
        assert_eq!(volume.tags.len(), 1);
        assert_eq!(volume.tags.get("owner").map(String::as_str), Some("ops"));
    }

    #[rstest]
    #[case(|href: &str| format!("urn:vm:{}", Href::from(href).resource_id()), Some("urn:vm:vm-42"))]
    #[case(|_: &str| String::new(), None)]
    fn attachment_id_comes_from_caller_translation(
        #[case] to_id: fn(&str) -> String,
        #[case] expected: Option<&str>,
    ) {
        let attachment = r#"<Vms><VmReference href="https://vcd.test/api/vApp/vm-42"/></Vms>"#;

        let volume = to_volume(CONTEXT, "<Disk/>", None, Some(attachment), &to_id)
            .unwrap_or_else(|| panic!("primary document should translate"));

        assert_eq!(volume.attached_server_id.as_deref(), expected);
    }

    #[test]
    fn empty_device_id_is_absent() {
        let metadata =
            "<Metadata><MetadataEntry><Key>dsnDeviceId</Key><Value></Value></MetadataEntry></Metadata>";
        let volume = translate("<Disk name=\"d\"/>", Some(metadata), None);
        assert_eq!(volume.device_id, None);
    }

    #[test]
    fn broken_sub_resources_are_ignored() {
        let volume = translate("<Disk name=\"d\"/>", Some("<Metadata>"), Some("<<<"));
        assert!(volume.tags.is_empty());
        assert_eq!(volume.attached_server_id, None);
    }

    #[rstest]
    #[case("")]
    #[case("<Vdc name=\"x\"/>")]
    #[case("<Disk")]
    fn unusable_primary_yields_none(#[case] primary: &str) {
        assert_eq!(to_volume(CONTEXT, primary, None, None, &last_segment), None);
    }
}
