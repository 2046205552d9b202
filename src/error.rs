//! Error taxonomy for configuration, window invariants, and timer callbacks.

use std::fmt;

/// A [`WindowConfig`](crate::config::WindowConfig) or
/// [`TimerConfig`](crate::config::TimerConfig) failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `window_size` was zero.
    #[error("window_size must be greater than zero")]
    ZeroWindowSize,

    /// The sequence space is too small to hold two full windows, which
    /// breaks the midpoint rule's ability to disambiguate "ahead" from
    /// "wrapped around".
    #[error(
        "max_sequence ({max_sequence}) must be at least twice window_size ({window_size})"
    )]
    SequenceSpaceTooSmall {
        /// The configured window size.
        window_size: u32,
        /// The configured sequence space modulus.
        max_sequence: u64,
    },

    /// `initial_sequence` was not a valid member of the sequence space.
    #[error(
        "initial_sequence ({initial_sequence}) must be less than max_sequence ({max_sequence})"
    )]
    InitialSequenceOutOfRange {
        /// The configured initial sequence number.
        initial_sequence: u32,
        /// The configured sequence space modulus.
        max_sequence: u64,
    },

    /// `max_delay_ms` was set but the window has nowhere to derive a
    /// submit-time baseline from.
    #[error("max_delay_ms may not be u64::MAX, it is reserved to mean \"no deadline\"")]
    ReservedDelayValue,
}

/// A structural invariant of [`Window`](crate::window) was violated.
///
/// In debug builds this condition trips a `debug_assert!` and panics
/// immediately, since it indicates a bug in this crate rather than a
/// reachable runtime condition. In release builds the check is skipped for
/// the hot admission path and callers instead see this error surfaced from
/// the handful of entry points that can cheaply detect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("window invariant violated: {reason}")]
pub struct WindowInvariantViolated {
    pub(crate) reason: &'static str,
}

impl WindowInvariantViolated {
    pub(crate) fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A boxed error from a user-supplied [`DeadlineTimer`](crate::timer::DeadlineTimer)
/// expiry callback.
///
/// Callback failures are isolated: one failing callback does not stop the
/// timer from firing the remaining due entries, and does not poison the
/// timer for future `advance` calls. The failure is reported through
/// whatever sink [`DeadlineTimer::set_on_error`](crate::timer::DeadlineTimer::set_on_error)
/// was given, or silently counted in [`TimerStats`](crate::stats::TimerStats)
/// if no sink was installed.
pub struct TimerCallbackFailed {
    pub(crate) source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl TimerCallbackFailed {
    pub(crate) fn new(source: Box<dyn std::error::Error + Send + Sync + 'static>) -> Self {
        Self { source }
    }

    /// The underlying error returned by the callback.
    #[must_use]
    pub fn source(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

impl fmt::Debug for TimerCallbackFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerCallbackFailed")
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for TimerCallbackFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer callback failed: {}", self.source)
    }
}

impl std::error::Error for TimerCallbackFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_name_the_offending_field() {
        let err = ConfigError::SequenceSpaceTooSmall {
            window_size: 100,
            max_sequence: 150,
        };
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("150"));
    }

    #[test]
    fn timer_callback_failed_wraps_source() {
        let inner = std::io::Error::other("boom");
        let err = TimerCallbackFailed::new(Box::new(inner));
        assert!(err.to_string().contains("boom"));
        assert!(err.source().to_string().contains("boom"));
    }
}
