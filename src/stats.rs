//! Small counter structs exposed for observability, grounded in the same
//! "plain struct of `u64` counters with saturating increments" shape used
//! throughout the rest of this crate family for traffic statistics.

use std::ops::AddAssign;

/// Running counters for a [`SenderWindow`](crate::window::SenderWindow) or
/// [`ReceiverWindow`](crate::window::ReceiverWindow).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Blocks admitted into the window (sender: accepted sends; receiver:
    /// accepted arrivals, including those later overwritten by eviction).
    pub admitted: u64,
    /// Blocks delivered to `on_packet` through normal in-order drain.
    pub delivered: u64,
    /// Blocks dropped because they exceeded `max_delay_ms`.
    pub dropped_latency: u64,
    /// Blocks dropped to make room when the window was full.
    pub dropped_overflow: u64,
    /// Blocks or gaps dropped by an explicit forced `drop` call.
    pub dropped_forced: u64,
    /// Arrivals rejected because their slot was already occupied.
    pub duplicates: u64,
    /// Arrivals rejected because they fell outside the addressable window.
    pub out_of_window: u64,
    /// Blocks re-emitted through `retransmit`.
    pub retransmitted: u64,
    /// Structural invariant violations detected in release builds (fatal
    /// in debug builds instead, so this only ever increments in release).
    pub invariant_violations: u64,
}

/// Running counters for a [`DeadlineTimer`](crate::timer::DeadlineTimer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Entries scheduled via `schedule` or `schedule_at`.
    pub scheduled: u64,
    /// Entries that fired and ran their callback.
    pub fired: u64,
    /// Entries removed by `cancel` before they fired.
    pub cancelled: u64,
    /// Expiry callbacks that returned an error.
    pub callback_failures: u64,
    /// Number of times the heap was compacted to reclaim cancelled slots.
    pub compactions: u64,
}

impl AddAssign for WindowStats {
    fn add_assign(&mut self, rhs: Self) {
        self.admitted += rhs.admitted;
        self.delivered += rhs.delivered;
        self.dropped_latency += rhs.dropped_latency;
        self.dropped_overflow += rhs.dropped_overflow;
        self.dropped_forced += rhs.dropped_forced;
        self.duplicates += rhs.duplicates;
        self.out_of_window += rhs.out_of_window;
        self.retransmitted += rhs.retransmitted;
        self.invariant_violations += rhs.invariant_violations;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_assign_sums_fields() {
        let mut a = WindowStats {
            admitted: 1,
            ..WindowStats::default()
        };
        let b = WindowStats {
            admitted: 2,
            delivered: 3,
            ..WindowStats::default()
        };
        a += b;
        assert_eq!(3, a.admitted);
        assert_eq!(3, a.delivered);
    }
}
