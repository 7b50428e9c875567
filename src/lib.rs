//! Block volume management for VMware vCloud Director.
//!
//! The crate maps a provider-neutral volume contract ([`VolumeSupport`]) onto
//! vCloud Director independent disks. [`VcloudVolumeAdapter`] orchestrates
//! the XML codec, the translator and a [`vcloud::ResourceClient`] transport;
//! [`HttpResourceClient`] is the `reqwest` transport used against a real
//! endpoint.

pub mod config;
pub mod poll;
pub mod test_support;
pub mod vcloud;
pub mod volume;

pub use config::{ConfigError, MAX_TASK_TIMEOUT_SECS, VcloudConfig};
pub use poll::{PollPolicy, Probe, TimeoutPolicy, poll_until};
pub use vcloud::{HttpResourceClient, VcloudVolumeAdapter, VolumeError};
pub use volume::{
    Tags, Volume, VolumeCreateOptions, VolumeCreateOptionsBuilder, VolumeFormat, VolumeFuture,
    VolumeRequestError, VolumeState, VolumeStatus, VolumeSupport, VolumeType,
};
