//! Validated configuration for windows and timers.
//!
//! Both configs are plain data: this crate does not load them from a file
//! or environment, it only validates what the embedding application
//! constructs. Enable the `serde` feature to (de)serialize them at whatever
//! boundary the application already uses for its own configuration.

use crate::error::ConfigError;
use crate::seq::DEFAULT_MAX_SEQUENCE;

/// Configuration for a [`SenderWindow`](crate::window::SenderWindow) or
/// [`ReceiverWindow`](crate::window::ReceiverWindow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct WindowConfig {
    /// Number of slots held by the window. Must be non-zero.
    pub window_size: u32,
    /// First sequence number the window will assign (sender) or expect
    /// (receiver).
    pub initial_sequence: u32,
    /// Size of the cyclic sequence space. Must be at least `2 * window_size`
    /// so the midpoint rule can tell "ahead" from "wrapped".
    pub max_sequence: u64,
    /// Maximum age, in milliseconds, a block may sit in the window before
    /// it is dropped as too late to deliver. `0` disables latency-bounded
    /// dropping entirely.
    pub max_delay_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: 8192,
            initial_sequence: 0,
            max_sequence: DEFAULT_MAX_SEQUENCE,
            max_delay_ms: 0,
        }
    }
}

impl WindowConfig {
    /// Checks the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `window_size` is zero, if the sequence
    /// space cannot hold two full windows, if `initial_sequence` is outside
    /// the sequence space, or if `max_delay_ms` is the reserved sentinel
    /// value `u64::MAX`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindowSize);
        }
        if self.max_sequence < u64::from(self.window_size) * 2 {
            return Err(ConfigError::SequenceSpaceTooSmall {
                window_size: self.window_size,
                max_sequence: self.max_sequence,
            });
        }
        if u64::from(self.initial_sequence) >= self.max_sequence {
            return Err(ConfigError::InitialSequenceOutOfRange {
                initial_sequence: self.initial_sequence,
                max_sequence: self.max_sequence,
            });
        }
        if self.max_delay_ms == u64::MAX {
            return Err(ConfigError::ReservedDelayValue);
        }
        Ok(())
    }
}

/// Configuration for a [`DeadlineTimer`](crate::timer::DeadlineTimer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct TimerConfig {
    /// Once the number of cancelled-but-unpopped heap entries exceeds this
    /// many live entries, the next `cancel` call compacts the heap.
    ///
    /// A lower value keeps memory bounded tighter at the cost of more
    /// frequent rebuilds; a higher value amortizes rebuild cost better for
    /// workloads with heavy cancel/reschedule churn.
    pub compaction_threshold: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            compaction_threshold: 1024,
        }
    }
}

impl TimerConfig {
    /// Checks the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Currently infallible; reserved for future fields. Kept as a
    /// `Result` so callers that chain `WindowConfig::validate` and
    /// `TimerConfig::validate` with `?` don't need to change when a future
    /// field does need validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}
