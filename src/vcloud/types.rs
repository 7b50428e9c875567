//! Newtypes and wire constants for vCloud Director resources.

use std::fmt;
use std::ops::Deref;

/// Default namespace of vCloud Director 1.5+ documents.
pub const VCLOUD_NAMESPACE: &str = "http://www.vmware.com/vcloud/v1.5";

/// Media type of an independent disk.
pub const DISK_MEDIA_TYPE: &str = "application/vnd.vmware.vcloud.disk+xml";
/// Media type of a disk creation request.
pub const DISK_CREATE_MEDIA_TYPE: &str = "application/vnd.vmware.vcloud.diskCreateParams+xml";
/// Media type of an attach or detach request.
pub const DISK_ATTACH_MEDIA_TYPE: &str =
    "application/vnd.vmware.vcloud.diskAttachOrDetachParams+xml";
/// Media type of a metadata document.
pub const METADATA_MEDIA_TYPE: &str = "application/vnd.vmware.vcloud.metadata+xml";
/// Media type of a virtual data center.
pub const VDC_MEDIA_TYPE: &str = "application/vnd.vmware.vcloud.vdc+xml";

macro_rules! newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub struct $name(String);

        impl $name {
            /// Wraps the given value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the wrapped value.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(self.as_str())
            }
        }
    };
}

newtype!(
    /// Dotted API version such as `5.1`.
    ApiVersion
);
newtype!(
    /// Absolute resource location returned by the API.
    Href
);

impl ApiVersion {
    /// Returns `true` when this version is numerically at least `minimum`.
    #[must_use]
    pub fn at_least(&self, minimum: &str) -> bool {
        crate::vcloud::translator::api_version_at_least(self.as_str(), minimum)
    }
}

impl Href {
    /// Returns the last non-empty path segment, which vCloud uses as the
    /// resource identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.as_str()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

/// Kinds of resource the adapter addresses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourceKind {
    /// Independent disk.
    Disk,
    /// vApp or VM that disks attach to.
    VApp,
    /// Virtual data center.
    Vdc,
    /// Organisation, treated as the region.
    Org,
}

impl ResourceKind {
    /// URL path segment for the kind.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::VApp => "vApp",
            Self::Vdc => "vdc",
            Self::Org => "org",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disk => "volume",
            Self::VApp => "virtual machine",
            Self::Vdc => "data center",
            Self::Org => "region",
        };
        formatter.write_str(label)
    }
}

/// Virtual data center inside a region.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataCenter {
    /// Identifier of the data center.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Region (organisation) holding the data center.
    pub region_id: String,
}

/// Coarse state of an asynchronous vendor task.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskStatus {
    /// Queued or running.
    Pending,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error, or was aborted or cancelled.
    Failed,
}

impl TaskStatus {
    /// Maps the vendor `status` attribute of a `Task`.
    #[must_use]
    pub fn from_vendor(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Succeeded,
            "error" | "aborted" | "canceled" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Reference to an asynchronous vendor task.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskHandle {
    /// Location of the task resource.
    pub href: Href,
    /// Status at the time the handle was decoded.
    pub status: TaskStatus,
    /// Error detail reported by a failed task.
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("https://vcd.test/api/disk/abc", "abc")]
    #[case("https://vcd.test/api/disk/abc/", "abc")]
    #[case("abc", "abc")]
    #[case("", "")]
    fn href_resource_id_is_last_segment(#[case] href: &str, #[case] expected: &str) {
        assert_eq!(Href::from(href).resource_id(), expected);
    }

    #[rstest]
    #[case("success", TaskStatus::Succeeded)]
    #[case("error", TaskStatus::Failed)]
    #[case("aborted", TaskStatus::Failed)]
    #[case("canceled", TaskStatus::Failed)]
    #[case("running", TaskStatus::Pending)]
    #[case("queued", TaskStatus::Pending)]
    fn task_status_maps_vendor_strings(#[case] status: &str, #[case] expected: TaskStatus) {
        assert_eq!(TaskStatus::from_vendor(status), expected);
    }

    #[test]
    fn api_version_compares_numerically() {
        assert!(ApiVersion::from("5.10").at_least("5.1"));
        assert!(ApiVersion::from("5.1").at_least("5.1"));
        assert!(!ApiVersion::from("1.5").at_least("5.1"));
    }
}
