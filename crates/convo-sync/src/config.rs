//! Sync core configuration.

use std::time::Duration;

/// Tunables shared by the components. One instance is cloned into each.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Bound on every mutating store call. Expiry surfaces as
    /// `RemoteUnavailable` instead of hanging the caller.
    pub send_timeout: Duration,
    /// When set, a typing flag raised locally is cleared after this much
    /// inactivity, so a crashed or disconnected peer does not stay
    /// "typing" forever. `None` disables the timer.
    pub typing_idle_timeout: Option<Duration>,
    /// Buffered deliveries per subscription.
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(10),
            typing_idle_timeout: Some(Duration::from_secs(5)),
            channel_capacity: 64,
        }
    }
}
