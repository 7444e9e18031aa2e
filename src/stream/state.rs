use std::fmt;
use std::time::Duration;

/// Socket lifecycle: `Connecting → Open → Closed → Connecting (after delay) → …`.
///
/// `GaveUp` is only reachable with a bounded [`ReconnectPolicy::Backoff`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    GaveUp,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::GaveUp => "gave up",
        };
        f.write_str(s)
    }
}

/// When to try again after the socket closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay every time, retrying for as long as the session lives.
    Fixed { delay: Duration },
    /// Doubling delay capped at `max`; gives up after `max_attempts`
    /// consecutive failures.
    Backoff {
        initial: Duration,
        max: Duration,
        max_attempts: u32,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed {
            delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (1-based count of consecutive
    /// closes since the last successful open). `None` means stop retrying.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            ReconnectPolicy::Fixed { delay } => Some(delay),
            ReconnectPolicy::Backoff {
                initial,
                max,
                max_attempts,
            } => {
                if attempt == 0 || attempt > max_attempts {
                    return None;
                }
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                Some(initial.saturating_mul(factor).min(max))
            }
        }
    }

    /// Same policy shape with a different base delay.
    pub fn with_delay(self, delay: Duration) -> Self {
        match self {
            ReconnectPolicy::Fixed { .. } => ReconnectPolicy::Fixed { delay },
            ReconnectPolicy::Backoff {
                max, max_attempts, ..
            } => ReconnectPolicy::Backoff {
                initial: delay,
                max,
                max_attempts,
            },
        }
    }
}
