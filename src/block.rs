//! The payload wrapper stored in every occupied window slot.

use web_time::Instant;

/// A single unit of data held by a [`SenderWindow`](crate::window::SenderWindow)
/// or [`ReceiverWindow`](crate::window::ReceiverWindow), tagged with the
/// bookkeeping the window needs to enforce ordering and latency bounds.
#[derive(Debug, Clone)]
pub struct Block<P> {
    /// Position of this block in the cyclic sequence space.
    pub sequence_number: u32,
    /// For a sender: when the block was first admitted. For a receiver:
    /// when the block arrived. Used as the baseline for latency-bounded
    /// dropping.
    pub submit_time: Instant,
    /// Set once a sender has re-emitted this block through `retransmit`.
    /// Always `false` for receiver-side blocks.
    pub is_retransmit: bool,
    /// The caller-supplied payload.
    pub payload: P,
}

impl<P> Block<P> {
    pub(crate) fn new(sequence_number: u32, submit_time: Instant, payload: P) -> Self {
        Self {
            sequence_number,
            submit_time,
            is_retransmit: false,
            payload,
        }
    }
}
