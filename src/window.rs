//! The sliding window: a fixed-capacity ring buffer of [`Block`]s addressed
//! by cyclic sequence number, specialized into a [`SenderWindow`] (always
//! contiguous, grows only at the tail) and a [`ReceiverWindow`] (may hold
//! gaps, accepts arrivals at any in-range offset).
//!
//! Both specializations share [`WindowCore`], which owns the pre-sized slot
//! storage. The storage is a `Box<[Option<Block<P>>]>` sized once at
//! construction and never reallocated — admission either occupies an
//! existing `None` slot or evicts whatever currently occupies the target
//! slot, it never grows the backing storage.

use std::time::Duration;

use web_time::Instant;

use crate::block::Block;
use crate::config::WindowConfig;
use crate::error::{ConfigError, WindowInvariantViolated};
use crate::seq;
use crate::stats::WindowStats;

type PacketCallback<P> = Box<dyn FnMut(&Block<P>)>;
type DropCallback = Box<dyn FnMut(u32, u32)>;

/// Shared ring-buffer storage and bookkeeping for both window
/// specializations.
struct WindowCore<P> {
    slots: Box<[Option<Block<P>>]>,
    /// Index of the slot holding `base_sequence`.
    start: usize,
    /// Number of slots from `start` up to (and not including) the first
    /// slot past the highest occupied offset. `0` when empty.
    span: usize,
    /// Number of currently-occupied slots. Distinguishes "empty" from
    /// "full" when `span` alone would be ambiguous.
    size: usize,
    /// Sequence number logically held at `start`: for a sender, the oldest
    /// not-yet-acknowledged block; for a receiver, the next sequence
    /// expected to be delivered, whether or not that slot is occupied.
    base_sequence: u32,
    initial_sequence: u32,
    max_sequence: u64,
    max_delay_ms: u64,
    cycled: bool,
    on_packet: Option<PacketCallback<P>>,
    on_drop_packet: Option<DropCallback>,
    on_invariant_violation: Option<Box<dyn FnMut(WindowInvariantViolated)>>,
    stats: WindowStats,
}

impl<P> WindowCore<P> {
    fn new(config: &WindowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let slots = (0..config.window_size).map(|_| None).collect();
        Ok(Self {
            slots,
            start: 0,
            span: 0,
            size: 0,
            base_sequence: config.initial_sequence,
            initial_sequence: config.initial_sequence,
            max_sequence: config.max_sequence,
            max_delay_ms: config.max_delay_ms,
            cycled: false,
            on_packet: None,
            on_drop_packet: None,
            on_invariant_violation: None,
            stats: WindowStats::default(),
        })
    }

    fn capacity(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)] // window_size was validated to fit u32
        let cap = self.slots.len() as u32;
        cap
    }

    fn end_index(&self) -> usize {
        (self.start + self.span) % self.slots.len()
    }

    fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.start = 0;
        self.span = 0;
        self.size = 0;
        self.base_sequence = self.initial_sequence;
        self.cycled = false;
    }

    /// Checks the structural invariants relating `start`, `span`, `size`
    /// and the slot storage, called after every mutating operation. A
    /// violation here means this crate has a bug, not that the caller did
    /// something wrong: in debug builds it panics immediately via
    /// `debug_assert!`-style abort, in release builds it is surfaced as a
    /// single structured [`WindowInvariantViolated`] through
    /// `on_invariant_violation` (and counted in
    /// [`WindowStats::invariant_violations`]) rather than silently
    /// discarded, and the window keeps running.
    /// [`WindowCore::try_check_invariants`] offers a non-panicking
    /// equivalent for callers such as the fuzz harness that want to keep
    /// running after recording the failure without installing a sink.
    fn check_invariants_after_mutation(&mut self) {
        if let Err(violated) = self.try_check_invariants() {
            #[cfg(debug_assertions)]
            {
                panic!("{violated}");
            }
            #[cfg(not(debug_assertions))]
            {
                self.stats.invariant_violations += 1;
                tracing::error!(error = %violated, "window invariant violated");
                let mut cb = self.on_invariant_violation.take();
                if let Some(cb) = cb.as_mut() {
                    cb(violated);
                }
                self.on_invariant_violation = cb;
            }
        }
    }

    /// Non-panicking form of [`WindowCore::check_invariants_after_mutation`].
    fn try_check_invariants(&self) -> Result<(), WindowInvariantViolated> {
        if self.size > self.slots.len() {
            return Err(WindowInvariantViolated::new("size exceeds capacity"));
        }
        if self.span > self.slots.len() {
            return Err(WindowInvariantViolated::new("span exceeds capacity"));
        }
        if self.size == 0 && (self.start != 0 || self.span != 0) {
            return Err(WindowInvariantViolated::new(
                "empty window must normalize start and span to zero",
            ));
        }
        let occupied = self.slots.iter().filter(|s| s.is_some()).count();
        if occupied != self.size {
            return Err(WindowInvariantViolated::new(
                "size does not match number of occupied slots",
            ));
        }
        Ok(())
    }

    fn advance_base(&mut self, steps: u64) {
        let new_base = seq::add(self.base_sequence, steps, self.max_sequence);
        if steps > 0 && seq::is_cycle(self.base_sequence, new_base, self.max_sequence) {
            self.cycled = true;
        }
        self.base_sequence = new_base;
    }

    /// Removes and returns the block at `start` if one is present, advancing
    /// `start`/`span`/`size`/`base_sequence` by one slot. Leaves the window
    /// untouched and returns `None` if `start` is a gap, which is exactly
    /// the behavior a receiver's in-order drain needs to stop at the first
    /// missing block.
    fn pop_occupied_head(&mut self) -> Option<Block<P>> {
        if self.size == 0 {
            return None;
        }
        let block = self.slots[self.start].take()?;
        self.start = (self.start + 1) % self.slots.len();
        self.span = self.span.saturating_sub(1);
        self.size -= 1;
        self.advance_base(1);
        if self.size == 0 {
            self.start = 0;
            self.span = 0;
        }
        Some(block)
    }

    fn emit_packet(&mut self, block: &Block<P>) {
        let mut cb = self.on_packet.take();
        if let Some(cb) = cb.as_mut() {
            cb(block);
        }
        self.on_packet = cb;
    }

    fn emit_packet_at(&mut self, idx: usize) {
        let mut cb = self.on_packet.take();
        if let Some(cb) = cb.as_mut() {
            if let Some(block) = self.slots[idx].as_ref() {
                cb(block);
            }
        }
        self.on_packet = cb;
    }

    fn emit_drop(&mut self, lo: u32, hi: u32) {
        let mut cb = self.on_drop_packet.take();
        if let Some(cb) = cb.as_mut() {
            cb(lo, hi);
        }
        self.on_drop_packet = cb;
    }

    /// Evicts every occupied slot whose block has sat in the window longer
    /// than `max_delay_ms`, starting from `start` and stopping at the first
    /// slot that is either fresh or a gap (a gap's age cannot be known).
    ///
    /// Used on the sender side, where the occupied region is always
    /// contiguous from `start`, so `start` itself is the only block whose
    /// age needs checking.
    fn advance_latency_sender(&mut self, now: Instant) {
        if self.max_delay_ms == 0 {
            return;
        }
        let max_delay = Duration::from_millis(self.max_delay_ms);
        loop {
            let Some(Some(block)) = self.slots.get(self.start) else {
                break;
            };
            if now.saturating_duration_since(block.submit_time) < max_delay {
                break;
            }
            let seq_no = block.sequence_number;
            self.pop_occupied_head();
            self.stats.dropped_latency += 1;
            tracing::debug!(seq = seq_no, "evicting stale block past latency bound");
            self.emit_drop(seq_no, seq_no);
        }
    }

    /// Removes and returns the block at `start`, unconditionally advancing
    /// `start`/`span`/`base_sequence` whether or not the slot was occupied.
    /// `size` only decrements when a block was actually present.
    fn advance_head_one(&mut self) -> Option<Block<P>> {
        let taken = self.slots[self.start].take();
        if taken.is_some() {
            self.size -= 1;
        }
        self.start = (self.start + 1) % self.slots.len();
        self.span = self.span.saturating_sub(1);
        self.advance_base(1);
        if self.size == 0 {
            self.start = 0;
            self.span = 0;
        }
        taken
    }

    /// Age of the oldest occupied slot currently held, scanning forward
    /// from `start`. Unlike the sender, the receiver's head may be a gap,
    /// so "the window has gone stale" is judged by the oldest block it is
    /// actually holding, not by the (possibly empty) head slot.
    fn oldest_occupied_submit_time(&self) -> Option<Instant> {
        (0..self.span).find_map(|offset| {
            let idx = (self.start + offset) % self.slots.len();
            self.slots[idx].as_ref().map(|b| b.submit_time)
        })
    }

    /// Latency-bound eviction for the receiver: once the oldest block held
    /// anywhere in the window has aged past `max_delay_ms`, the window
    /// stops waiting for whatever is blocking the head and advances one
    /// slot at a time — delivering the head late (TSBPD semantics) if it
    /// happens to be occupied, or declaring it lost if it is a gap.
    fn advance_latency_receiver(&mut self, now: Instant) {
        if self.max_delay_ms == 0 {
            return;
        }
        let max_delay = Duration::from_millis(self.max_delay_ms);
        loop {
            if self.size == 0 {
                break;
            }
            let Some(oldest) = self.oldest_occupied_submit_time() else {
                break;
            };
            if now.saturating_duration_since(oldest) < max_delay {
                break;
            }
            let head_seq = self.base_sequence;
            match self.advance_head_one() {
                Some(block) => {
                    self.stats.delivered += 1;
                    tracing::debug!(seq = head_seq, "delivering late block past latency bound");
                    self.emit_packet(&block);
                }
                None => {
                    self.stats.dropped_latency += 1;
                    tracing::debug!(seq = head_seq, "declaring stale gap lost");
                    self.emit_drop(head_seq, head_seq);
                }
            }
        }
    }

    /// Evicts every slot from `base_sequence` through `hi` inclusive,
    /// flushing occupied slots through `on_packet` and reporting
    /// contiguous runs of gaps through `on_drop_packet`, then advances
    /// `base_sequence` past `hi`.
    ///
    /// If `lo` no longer falls within the addressable window the call is
    /// ignored entirely: a ring buffer can only forget its range by moving
    /// its head forward, so dropping a sub-range that starts behind the
    /// current head is not representable and is treated as a no-op rather
    /// than silently evicting unrelated earlier entries.
    fn force_drop(&mut self, lo: u32, hi: u32) {
        let m = self.max_sequence;
        let w = self.slots.len() as u64;
        if seq::diff_forward(self.base_sequence, lo, m) >= w {
            return;
        }
        let span_to_hi = seq::diff_forward(self.base_sequence, hi, m) + 1;
        let walk = span_to_hi.min(w);

        let mut cur = self.base_sequence;
        let mut gap_start: Option<u32> = None;
        for _ in 0..walk {
            let offset = seq::diff_forward(self.base_sequence, cur, m) as usize;
            let idx = (self.start + offset) % self.slots.len();
            if let Some(block) = self.slots[idx].take() {
                self.size -= 1;
                if let Some(g0) = gap_start.take() {
                    let g1 = seq::prev(cur, m);
                    self.stats.dropped_forced += 1;
                    tracing::debug!(lo = g0, hi = g1, "forced drop");
                    self.emit_drop(g0, g1);
                }
                self.emit_packet(&block);
            } else if gap_start.is_none() {
                gap_start = Some(cur);
            }
            cur = seq::step(cur, m);
        }
        if let Some(g0) = gap_start {
            let g1 = seq::prev(cur, m);
            self.stats.dropped_forced += 1;
            tracing::debug!(lo = g0, hi = g1, "forced drop");
            self.emit_drop(g0, g1);
        }

        #[allow(clippy::cast_possible_truncation)] // walk <= w <= slots.len()
        let walk_usize = walk as usize;
        self.start = (self.start + walk_usize) % self.slots.len();
        self.span = self.span.saturating_sub(walk_usize);
        self.advance_base(walk);
    }

    fn pending_ranges(&self) -> Vec<(u32, u32)> {
        let mut ranges = Vec::new();
        let mut gap_start: Option<u32> = None;
        let mut seq_no = self.base_sequence;
        for offset in 0..self.span {
            let idx = (self.start + offset) % self.slots.len();
            if self.slots[idx].is_none() {
                if gap_start.is_none() {
                    gap_start = Some(seq_no);
                }
            } else if let Some(g0) = gap_start.take() {
                ranges.push((g0, seq::prev(seq_no, self.max_sequence)));
            }
            seq_no = seq::step(seq_no, self.max_sequence);
        }
        if let Some(g0) = gap_start {
            ranges.push((g0, seq::prev(seq_no, self.max_sequence)));
        }
        ranges
    }
}

/// The sending side of a sliding window: blocks are always admitted at the
/// tail and evicted from the head, so the occupied region is always
/// contiguous.
pub struct SenderWindow<P> {
    core: WindowCore<P>,
    /// Next sequence number this window will assign. Distinct from
    /// `core.base_sequence`, which tracks the oldest *unacknowledged*
    /// block; the two only coincide when every sent block is still
    /// outstanding.
    next_assign: u32,
}

impl<P> SenderWindow<P> {
    /// Creates a new sender window from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not pass
    /// [`WindowConfig::validate`].
    pub fn new(config: &WindowConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            core: WindowCore::new(config)?,
            next_assign: config.initial_sequence,
        })
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.core.capacity()
    }

    /// Number of currently-outstanding (unacknowledged) blocks.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // size <= capacity <= u32::MAX
    pub fn size(&self) -> u32 {
        self.core.size as u32
    }

    /// Whether the sequence counter has ever wrapped the sequence space.
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        self.core.cycled
    }

    /// Read-only access to the running counters.
    #[must_use]
    pub fn stats(&self) -> WindowStats {
        self.core.stats
    }

    /// Installs the callback invoked every time a block is delivered
    /// downstream, whether through ordinary flush, retransmission, or a
    /// forced [`drop`](Self::drop) flushing occupied slots before
    /// discarding a gap.
    pub fn set_on_packet<F>(&mut self, f: F)
    where
        F: FnMut(&Block<P>) + 'static,
    {
        self.core.on_packet = Some(Box::new(f));
    }

    /// Installs the callback invoked with the inclusive `(lo, hi)` range of
    /// every block or run of blocks discarded without delivery.
    pub fn set_on_drop_packet<F>(&mut self, f: F)
    where
        F: FnMut(u32, u32) + 'static,
    {
        self.core.on_drop_packet = Some(Box::new(f));
    }

    /// Installs the sink notified when a structural invariant is violated
    /// in a release build. If no sink is installed, violations are only
    /// reflected in [`WindowStats::invariant_violations`]. Has no effect
    /// on debug builds, where a violation panics immediately instead.
    pub fn set_on_invariant_violation<F>(&mut self, f: F)
    where
        F: FnMut(WindowInvariantViolated) + 'static,
    {
        self.core.on_invariant_violation = Some(Box::new(f));
    }

    /// Resets the window to its freshly-constructed state.
    pub fn clear(&mut self) {
        self.core.clear();
        self.next_assign = self.core.initial_sequence;
    }

    /// Checks the window's structural invariants without panicking.
    /// Exposed for fuzzing and for callers that want to assert on a
    /// `Window` received from elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`WindowInvariantViolated`] describing the first violation
    /// found.
    pub fn check_invariants(&self) -> Result<(), WindowInvariantViolated> {
        self.core.try_check_invariants()
    }

    /// Admits `payload` at the next sequence number, evicting the oldest
    /// outstanding block first if the window is full. Returns the assigned
    /// sequence number.
    ///
    /// Also runs the latency-bounded eviction sweep for `now` before
    /// admitting, so a window with `max_delay_ms` configured never holds a
    /// stale head block hostage against new admissions.
    pub fn send_in(&mut self, now: Instant, payload: P) -> u32 {
        self.core.advance_latency_sender(now);

        if self.core.size == self.core.slots.len() {
            if let Some(evicted) = self.core.pop_occupied_head() {
                self.core.stats.dropped_overflow += 1;
                tracing::debug!(
                    seq = evicted.sequence_number,
                    "evicting oldest outstanding block to admit new send"
                );
                self.core.emit_drop(evicted.sequence_number, evicted.sequence_number);
            }
        }

        let seq_no = self.next_assign;
        let idx = self.core.end_index();
        self.core.slots[idx] = Some(Block::new(seq_no, now, payload));
        self.core.span += 1;
        self.core.size += 1;
        if self.core.size == 1 {
            self.core.base_sequence = seq_no;
        }

        let new_next = seq::step(self.next_assign, self.core.max_sequence);
        if seq::is_cycle(self.next_assign, new_next, self.core.max_sequence) {
            self.core.cycled = true;
        }
        self.next_assign = new_next;
        self.core.stats.admitted += 1;
        tracing::trace!(seq = seq_no, "admitted block for sending");
        self.core.check_invariants_after_mutation();
        seq_no
    }

    /// Re-emits every currently-held block in the inclusive range
    /// `[lo, hi]` through `on_packet`, marking it as a retransmit, and
    /// reports any part of the range no longer held through
    /// `on_drop_packet`.
    pub fn retransmit(&mut self, lo: u32, hi: u32) {
        let m = self.core.max_sequence;
        if self.core.size == 0 {
            self.core.emit_drop(lo, hi);
            return;
        }
        let base = self.core.base_sequence;
        let count = seq::diff_forward(lo, hi, m) + 1;
        let mut cur = lo;
        let mut gap_start: Option<u32> = None;
        for _ in 0..count {
            let offset = seq::diff_forward(base, cur, m);
            let in_span = offset < self.core.span as u64;
            let idx = (self.core.start + offset as usize) % self.core.slots.len();
            let hit = in_span && self.core.slots[idx].is_some();
            if hit {
                if let Some(g0) = gap_start.take() {
                    self.core.emit_drop(g0, seq::prev(cur, m));
                }
                if let Some(block) = self.core.slots[idx].as_mut() {
                    block.is_retransmit = true;
                }
                self.core.emit_packet_at(idx);
                self.core.stats.retransmitted += 1;
            } else if gap_start.is_none() {
                gap_start = Some(cur);
            }
            cur = seq::step(cur, m);
        }
        if let Some(g0) = gap_start {
            self.core.emit_drop(g0, seq::prev(cur, m));
        }
    }

    /// Acknowledges every block before `ack_seq`, freeing its slot without
    /// delivering it through `on_packet` (it has already been
    /// acknowledged by the peer, there is nothing left to flush).
    pub fn sequence_to(&mut self, ack_seq: u32) {
        let m = self.core.max_sequence;
        while self.core.size > 0 && seq::is_before(self.core.base_sequence, ack_seq, m) {
            let _ = self.core.pop_occupied_head();
        }
        self.core.check_invariants_after_mutation();
    }

    /// Forces the window to give up on the range `[lo, hi]`: occupied
    /// slots are flushed through `on_packet`, gaps are reported through
    /// `on_drop_packet`, and the window's head advances past `hi`.
    pub fn drop(&mut self, lo: u32, hi: u32) {
        self.core.force_drop(lo, hi);
        self.core.check_invariants_after_mutation();
    }

    /// Sequence ranges the window expects but does not currently hold.
    /// Always empty for a sender, since admission never creates gaps; kept
    /// for interface symmetry with [`ReceiverWindow::pending_ranges`].
    #[must_use]
    pub fn pending_ranges(&self) -> Vec<(u32, u32)> {
        self.core.pending_ranges()
    }
}

/// The receiving side of a sliding window: arrivals may land at any offset
/// within the addressable range, so the occupied region may contain gaps
/// until the missing blocks arrive or are forcibly dropped.
pub struct ReceiverWindow<P> {
    core: WindowCore<P>,
}

impl<P> ReceiverWindow<P> {
    /// Creates a new receiver window from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not pass
    /// [`WindowConfig::validate`].
    pub fn new(config: &WindowConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            core: WindowCore::new(config)?,
        })
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.core.capacity()
    }

    /// Number of currently-held (arrived but not yet delivered) blocks.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // size <= capacity <= u32::MAX
    pub fn size(&self) -> u32 {
        self.core.size as u32
    }

    /// Whether the expected-sequence counter has ever wrapped the sequence
    /// space.
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        self.core.cycled
    }

    /// Read-only access to the running counters.
    #[must_use]
    pub fn stats(&self) -> WindowStats {
        self.core.stats
    }

    /// Installs the callback invoked every time a block is delivered
    /// in-order, or flushed by a forced [`drop`](Self::drop).
    pub fn set_on_packet<F>(&mut self, f: F)
    where
        F: FnMut(&Block<P>) + 'static,
    {
        self.core.on_packet = Some(Box::new(f));
    }

    /// Installs the callback invoked with the inclusive `(lo, hi)` range of
    /// every block or run of blocks discarded without delivery.
    pub fn set_on_drop_packet<F>(&mut self, f: F)
    where
        F: FnMut(u32, u32) + 'static,
    {
        self.core.on_drop_packet = Some(Box::new(f));
    }

    /// Installs the sink notified when a structural invariant is violated
    /// in a release build. If no sink is installed, violations are only
    /// reflected in [`WindowStats::invariant_violations`]. Has no effect
    /// on debug builds, where a violation panics immediately instead.
    pub fn set_on_invariant_violation<F>(&mut self, f: F)
    where
        F: FnMut(WindowInvariantViolated) + 'static,
    {
        self.core.on_invariant_violation = Some(Box::new(f));
    }

    /// Resets the window to its freshly-constructed state.
    pub fn clear(&mut self) {
        self.core.clear();
    }

    /// Checks the window's structural invariants without panicking.
    /// Exposed for fuzzing and for callers that want to assert on a
    /// `Window` received from elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`WindowInvariantViolated`] describing the first violation
    /// found.
    pub fn check_invariants(&self) -> Result<(), WindowInvariantViolated> {
        self.core.try_check_invariants()
    }

    /// Runs the latency-bounded eviction sweep for `now` without admitting
    /// anything. Intended to be driven by a periodic timer entry rather
    /// than relying solely on the implicit sweep inside
    /// [`arrived_packet`](Self::arrived_packet).
    pub fn advance(&mut self, now: Instant) {
        self.core.advance_latency_receiver(now);
    }

    /// Admits a packet that arrived with sequence number `seq_no` at
    /// `recv_ts`, delivering it (and any now-contiguous successors already
    /// held) in order through `on_packet`.
    ///
    /// Returns `false` without side effects other than counters if the
    /// packet fell outside the addressable window or duplicated an
    /// already-held slot.
    pub fn arrived_packet(&mut self, now: Instant, seq_no: u32, recv_ts: Instant, payload: P) -> bool {
        self.core.advance_latency_receiver(now);

        let m = self.core.max_sequence;
        let w = self.core.slots.len() as u64;
        let offset = seq::diff_forward(self.core.base_sequence, seq_no, m);
        if offset >= w {
            self.core.stats.out_of_window += 1;
            tracing::trace!(seq = seq_no, "dropping out-of-window arrival");
            return false;
        }
        #[allow(clippy::cast_possible_truncation)] // offset < w <= slots.len() <= u32::MAX
        let offset = offset as usize;
        let idx = (self.core.start + offset) % self.core.slots.len();
        if self.core.slots[idx].is_some() {
            self.core.stats.duplicates += 1;
            tracing::trace!(seq = seq_no, "dropping duplicate arrival");
            return false;
        }

        self.core.slots[idx] = Some(Block::new(seq_no, recv_ts, payload));
        self.core.size += 1;
        if offset + 1 > self.core.span {
            self.core.span = offset + 1;
        }
        self.core.stats.admitted += 1;

        if offset == 0 {
            while let Some(block) = self.core.pop_occupied_head() {
                self.core.stats.delivered += 1;
                self.core.emit_packet(&block);
            }
        }
        self.core.check_invariants_after_mutation();
        true
    }

    /// Forces the window to give up on the range `[lo, hi]`: occupied
    /// slots are flushed through `on_packet`, gaps are reported through
    /// `on_drop_packet`, and the window's expected-sequence pointer
    /// advances past `hi`.
    pub fn drop(&mut self, lo: u32, hi: u32) {
        self.core.force_drop(lo, hi);
        self.core.check_invariants_after_mutation();
    }

    /// Sequence ranges the window expects but does not currently hold,
    /// suitable for building a negative-acknowledgement message.
    #[must_use]
    pub fn pending_ranges(&self) -> Vec<(u32, u32)> {
        self.core.pending_ranges()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn cfg(window_size: u32, max_sequence: u64, initial_sequence: u32) -> WindowConfig {
        WindowConfig {
            window_size,
            initial_sequence,
            max_sequence,
            max_delay_ms: 0,
        }
    }

    fn now() -> Instant {
        Instant::now()
    }

    #[test]
    fn sender_assigns_increasing_sequence_numbers() {
        let mut w: SenderWindow<u8> = SenderWindow::new(&cfg(8, 64, 0)).unwrap();
        assert_eq!(0, w.send_in(now(), 1));
        assert_eq!(1, w.send_in(now(), 2));
        assert_eq!(2, w.size());
    }

    #[test]
    fn sender_wraps_and_sets_cycle_flag() {
        // window_size=8, M=16, initial_sequence=14; five sends wrap
        // the sequence counter.
        let mut w: SenderWindow<u8> = SenderWindow::new(&cfg(8, 16, 14)).unwrap();
        let seqs: Vec<u32> = (0..5).map(|i| w.send_in(now(), i)).collect();
        assert_eq!(vec![14, 15, 0, 1, 2], seqs);
        assert!(w.is_cycle());
    }

    #[test]
    fn sender_evicts_oldest_on_overflow() {
        let mut w: SenderWindow<u8> = SenderWindow::new(&cfg(2, 64, 0)).unwrap();
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let dropped_cb = dropped.clone();
        w.set_on_drop_packet(move |lo, hi| dropped_cb.borrow_mut().push((lo, hi)));

        w.send_in(now(), 1);
        w.send_in(now(), 2);
        w.send_in(now(), 3); // evicts seq 0
        assert_eq!(vec![(0, 0)], *dropped.borrow());
        assert_eq!(2, w.size());
    }

    #[test]
    fn sequence_to_frees_acknowledged_slots() {
        let mut w: SenderWindow<u8> = SenderWindow::new(&cfg(8, 64, 0)).unwrap();
        for i in 0..4 {
            w.send_in(now(), i);
        }
        w.sequence_to(2);
        assert_eq!(2, w.size());
    }

    #[test]
    fn retransmit_marks_held_blocks_and_reports_gaps() {
        let mut w: SenderWindow<u8> = SenderWindow::new(&cfg(8, 64, 0)).unwrap();
        for i in 0..4 {
            w.send_in(now(), i);
        }
        w.sequence_to(2); // frees 0, 1

        let sent = Rc::new(RefCell::new(Vec::new()));
        let sent_cb = sent.clone();
        w.set_on_packet(move |b| sent_cb.borrow_mut().push(b.sequence_number));
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let dropped_cb = dropped.clone();
        w.set_on_drop_packet(move |lo, hi| dropped_cb.borrow_mut().push((lo, hi)));

        w.retransmit(0, 3);
        assert_eq!(vec![2, 3], *sent.borrow());
        assert_eq!(vec![(0, 1)], *dropped.borrow());
    }

    #[test]
    fn receiver_delivers_in_order_after_gap_fills() {
        let mut w: ReceiverWindow<u32> = ReceiverWindow::new(&cfg(8, 64, 0)).unwrap();
        let delivered = Rc::new(RefCell::new(Vec::new()));
        let delivered_cb = delivered.clone();
        w.set_on_packet(move |b| delivered_cb.borrow_mut().push(b.sequence_number));

        let t = now();
        assert!(w.arrived_packet(t, 1, t, 100));
        assert!(delivered.borrow().is_empty());
        assert!(w.arrived_packet(t, 0, t, 200));
        assert_eq!(vec![0, 1], *delivered.borrow());
        assert_eq!(0, w.size());
    }

    #[test]
    fn receiver_rejects_duplicates_and_out_of_window() {
        let mut w: ReceiverWindow<u32> = ReceiverWindow::new(&cfg(4, 64, 0)).unwrap();
        let t = now();
        assert!(w.arrived_packet(t, 0, t, 1));
        assert!(!w.arrived_packet(t, 0, t, 2)); // duplicate
        assert!(!w.arrived_packet(t, 40, t, 3)); // out of window
        let stats = w.stats();
        assert_eq!(1, stats.duplicates);
        assert_eq!(1, stats.out_of_window);
    }

    #[test]
    fn receiver_pending_ranges_reports_gaps() {
        let mut w: ReceiverWindow<u32> = ReceiverWindow::new(&cfg(8, 64, 0)).unwrap();
        let t = now();
        w.arrived_packet(t, 1, t, 1);
        w.arrived_packet(t, 4, t, 4);
        assert_eq!(vec![(0, 0), (2, 3)], w.pending_ranges());
    }

    #[test]
    fn forced_drop_flushes_occupied_and_reports_gaps_then_advances() {
        let mut w: ReceiverWindow<u32> = ReceiverWindow::new(&cfg(8, 64, 0)).unwrap();
        let delivered = Rc::new(RefCell::new(Vec::new()));
        let delivered_cb = delivered.clone();
        w.set_on_packet(move |b| delivered_cb.borrow_mut().push(b.sequence_number));
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let dropped_cb = dropped.clone();
        w.set_on_drop_packet(move |lo, hi| dropped_cb.borrow_mut().push((lo, hi)));

        let t = now();
        w.arrived_packet(t, 2, t, 2);
        w.drop(0, 3);

        assert_eq!(vec![2], *delivered.borrow());
        assert_eq!(vec![(0, 1), (3, 3)], *dropped.borrow());
        assert_eq!(0, w.size());

        // window now expects sequence 4 next
        assert!(w.arrived_packet(t, 4, t, 4));
        assert_eq!(vec![2, 4], *delivered.borrow());
    }

    #[test]
    fn latency_bound_drop_evicts_stale_head_on_next_admission() {
        let mut cfg = cfg(8, 64, 0);
        cfg.max_delay_ms = 10;
        let mut w: SenderWindow<u32> = SenderWindow::new(&cfg).unwrap();
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let dropped_cb = dropped.clone();
        w.set_on_drop_packet(move |lo, hi| dropped_cb.borrow_mut().push((lo, hi)));

        let t0 = now();
        w.send_in(t0, 1);
        w.send_in(t0 + Duration::from_millis(50), 2);
        assert_eq!(vec![(0, 0)], *dropped.borrow());
        assert_eq!(1, w.size());
    }

    #[test]
    fn receiver_latency_drop_delivers_late_occupied_head() {
        // The head itself is occupied when it goes
        // stale: it must be flushed through on_packet, not on_drop_packet.
        let mut cfg = cfg(8, 64, 0);
        cfg.max_delay_ms = 100;
        let mut w: ReceiverWindow<u32> = ReceiverWindow::new(&cfg).unwrap();
        let delivered = Rc::new(RefCell::new(Vec::new()));
        let delivered_cb = delivered.clone();
        w.set_on_packet(move |b| delivered_cb.borrow_mut().push(b.sequence_number));
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let dropped_cb = dropped.clone();
        w.set_on_drop_packet(move |lo, hi| dropped_cb.borrow_mut().push((lo, hi)));

        let t0 = now();
        assert!(w.arrived_packet(t0, 0, t0, 10));
        assert_eq!(vec![0], *delivered.borrow());
        delivered.borrow_mut().clear();

        // seq 1 arrives but seq 2 is missing, so it sits in the window
        // rather than draining immediately.
        assert!(w.arrived_packet(t0, 2, t0, 12));
        assert!(delivered.borrow().is_empty());

        // past the deadline, the held seq=2 must be delivered late even
        // though seq=1 was never reported.
        w.advance(t0 + Duration::from_millis(150));
        assert_eq!(vec![2], *delivered.borrow());
        assert_eq!(vec![(1, 1)], *dropped.borrow());
        assert_eq!(0, w.size());
    }

    #[test]
    fn receiver_latency_drop_abandons_stale_gap_head() {
        let mut cfg = cfg(8, 64, 0);
        cfg.max_delay_ms = 100;
        let mut w: ReceiverWindow<u32> = ReceiverWindow::new(&cfg).unwrap();
        let delivered = Rc::new(RefCell::new(Vec::new()));
        let delivered_cb = delivered.clone();
        w.set_on_packet(move |b| delivered_cb.borrow_mut().push(b.sequence_number));
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let dropped_cb = dropped.clone();
        w.set_on_drop_packet(move |lo, hi| dropped_cb.borrow_mut().push((lo, hi)));

        let t0 = now();
        // seq 0 never arrives; seq 1 does, leaving a one-slot gap at the
        // head that has no age of its own.
        assert!(w.arrived_packet(t0, 1, t0, 11));
        assert!(delivered.borrow().is_empty());

        w.advance(t0 + Duration::from_millis(150));
        assert_eq!(vec![1], *delivered.borrow());
        assert_eq!(vec![(0, 0)], *dropped.borrow());
        assert_eq!(0, w.size());
    }

    #[test]
    fn clear_resets_to_initial_state() {
        let mut w: SenderWindow<u32> = SenderWindow::new(&cfg(8, 64, 5)).unwrap();
        w.send_in(now(), 1);
        w.send_in(now(), 2);
        w.clear();
        assert_eq!(0, w.size());
        assert!(!w.is_cycle());
        assert_eq!(5, w.send_in(now(), 3));
    }
}
