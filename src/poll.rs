//! Bounded retry-with-interval primitive shared by the task and readiness
//! waits.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::vcloud::VolumeError;

/// Outcome of a single probe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Probe<T> {
    /// The awaited condition holds and produced a value.
    Ready(T),
    /// The condition does not hold yet; probe again after the interval.
    Pending,
}

/// What [`poll_until`] reports once the time window is exhausted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeoutPolicy {
    /// Return `Ok(None)` and let the caller decide how to continue.
    GiveUp,
    /// Return [`VolumeError::Timeout`].
    Fail,
}

/// Fixed interval and window used by a polling loop. There is no backoff.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    /// Delay between two probes.
    pub interval: Duration,
    /// Total time window measured from the first probe.
    pub timeout: Duration,
    /// Behaviour once the window elapses.
    pub on_timeout: TimeoutPolicy,
}

impl PollPolicy {
    /// Policy for vendor tasks: probe every 5 seconds for up to 20 minutes
    /// and fail with a timeout afterwards.
    #[must_use]
    pub const fn task_completion() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(20 * 60),
            on_timeout: TimeoutPolicy::Fail,
        }
    }

    /// Policy for waiting on a new volume before attaching it: probe every
    /// 15 seconds for up to 10 minutes, then give up quietly.
    #[must_use]
    pub const fn attach_readiness() -> Self {
        Self {
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(10 * 60),
            on_timeout: TimeoutPolicy::GiveUp,
        }
    }

    /// Replaces the probe interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Replaces the time window.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs `probe` until it reports [`Probe::Ready`] or the policy window
/// elapses, sleeping `policy.interval` between probes.
///
/// The probe always runs at least once. A window too large to represent as
/// an [`Instant`] has no deadline. Errors returned by the probe end the
/// loop immediately; probes that want to tolerate transient failures should
/// map them to [`Probe::Pending`].
///
/// # Errors
///
/// Returns the first probe error, or [`VolumeError::Timeout`] naming `action`
/// and `resource_id` when the window elapses under [`TimeoutPolicy::Fail`].
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    action: &str,
    resource_id: &str,
    mut probe: F,
) -> Result<Option<T>, VolumeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, VolumeError>>,
{
    let deadline = Instant::now().checked_add(policy.timeout);
    loop {
        if let Probe::Ready(value) = probe().await? {
            return Ok(Some(value));
        }
        if deadline.is_some_and(|limit| Instant::now() >= limit) {
            break;
        }
        sleep(policy.interval).await;
    }

    match policy.on_timeout {
        TimeoutPolicy::GiveUp => Ok(None),
        TimeoutPolicy::Fail => Err(VolumeError::Timeout {
            action: action.to_owned(),
            resource_id: resource_id.to_owned(),
        }),
    }
}
