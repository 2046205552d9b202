//! A deadline-ordered timer queue backed by a binary heap, with lazy
//! cancellation.
//!
//! The heap stores `(deadline, insertion order, key, value)` tuples and
//! pops in deadline order; insertion order breaks ties between equal
//! deadlines (FIFO). Cancellation does not touch the heap directly — that
//! would cost `O(n)` — it instead retires the entry's id into a side set,
//! and the id is skipped the next time it is popped. This mirrors the
//! min-heap-via-reversed-`Ord` idiom used elsewhere in this codebase for
//! priority scheduling, generalized with the side-table trick so `cancel`
//! stays cheap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::hash::Hash;
use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use web_time::Instant;

use crate::error::TimerCallbackFailed;
use crate::stats::TimerStats;

/// Opaque handle to a scheduled entry, returned by `schedule`/`schedule_at`.
///
/// The timer's public cancellation API works by key, not by handle (see
/// [`DeadlineTimer::cancel`]); this handle exists for callers that want to
/// log or assert on which entry they just scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

struct HeapEntry<K, V> {
    deadline: Instant,
    order: u64,
    id: u64,
    key: K,
    value: V,
}

impl<K, V> PartialEq for HeapEntry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.order == other.order
    }
}
impl<K, V> Eq for HeapEntry<K, V> {}

impl<K, V> PartialOrd for HeapEntry<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, V> Ord for HeapEntry<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap`, a max-heap, pops the smallest deadline
        // (and, among equal deadlines, the earliest-inserted entry) first.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// A priority queue of `(key, value)` pairs ordered by an absolute
/// deadline, supporting `O(log n)` scheduling and cancellation.
pub struct DeadlineTimer<K, V>
where
    K: Eq + Hash + Clone,
{
    heap: BinaryHeap<HeapEntry<K, V>>,
    key_index: AHashMap<K, Vec<u64>>,
    cancelled: AHashSet<u64>,
    next_order: u64,
    next_id: u64,
    live_len: usize,
    compaction_threshold: usize,
    on_expired: Option<Box<dyn FnMut(&K, &V) -> Result<(), Box<dyn std::error::Error + Send + Sync>>>>,
    on_error: Option<Box<dyn FnMut(&K, TimerCallbackFailed)>>,
    stats: TimerStats,
}

impl<K, V> DeadlineTimer<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty timer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&crate::config::TimerConfig::default())
    }

    /// Creates an empty timer with the given configuration.
    #[must_use]
    pub fn with_config(config: &crate::config::TimerConfig) -> Self {
        Self {
            heap: BinaryHeap::new(),
            key_index: AHashMap::new(),
            cancelled: AHashSet::new(),
            next_order: 0,
            next_id: 0,
            live_len: 0,
            compaction_threshold: config.compaction_threshold,
            on_expired: None,
            on_error: None,
            stats: TimerStats::default(),
        }
    }

    /// Installs the callback invoked for every entry whose deadline has
    /// passed. Replaces any previously-installed callback.
    pub fn set_on_expired<F, E>(&mut self, mut f: F)
    where
        F: FnMut(&K, &V) -> Result<(), E> + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.on_expired = Some(Box::new(move |k, v| f(k, v).map_err(|e| Box::new(e) as _)));
    }

    /// Installs the sink notified when an expiry callback returns an error.
    /// If no sink is installed, failures are only reflected in
    /// [`TimerStats::callback_failures`].
    pub fn set_on_error<F>(&mut self, f: F)
    where
        F: FnMut(&K, TimerCallbackFailed) + 'static,
    {
        self.on_error = Some(Box::new(f));
    }

    /// Number of live (not yet fired or cancelled) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_len
    }

    /// Whether the timer has no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_len == 0
    }

    /// Read-only access to the running counters.
    #[must_use]
    pub fn stats(&self) -> TimerStats {
        self.stats
    }

    /// Deadline of the next entry due to fire, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap
            .iter()
            .filter(|e| !self.cancelled.contains(&e.id))
            .map(|e| e.deadline)
            .min()
    }

    /// Schedules `value` under `key` to fire `delay` after `now`.
    pub fn schedule(&mut self, now: Instant, delay: Duration, key: K, value: V) -> TimerHandle {
        self.schedule_at(now + delay, key, value)
    }

    /// Schedules `value` under `key` to fire at the absolute `deadline`.
    pub fn schedule_at(&mut self, deadline: Instant, key: K, value: V) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        let order = self.next_order;
        self.next_order += 1;

        self.key_index.entry(key.clone()).or_default().push(id);
        self.heap.push(HeapEntry {
            deadline,
            order,
            id,
            key,
            value,
        });
        self.live_len += 1;
        self.stats.scheduled += 1;
        TimerHandle(id)
    }

    /// Removes every live entry scheduled under `key`, returning how many
    /// were removed. Cancellation is lazy: the heap entries are retired
    /// into a side set and skipped on pop, rather than removed in place.
    pub fn cancel(&mut self, key: &K) -> usize {
        let Some(ids) = self.key_index.remove(key) else {
            return 0;
        };
        let count = ids.len();
        self.cancelled.extend(ids);
        self.live_len -= count;
        self.stats.cancelled += count as u64;

        if self.cancelled.len() > self.compaction_threshold && self.cancelled.len() * 2 > self.heap.len()
        {
            self.compact();
        }
        count
    }

    /// Rebuilds the heap, dropping every retired (cancelled) entry. Called
    /// automatically by `cancel` once cancelled entries pile up past the
    /// configured threshold; exposed so callers doing bursty
    /// schedule/cancel churn can force it at a convenient point instead.
    pub fn compact(&mut self) {
        if self.cancelled.is_empty() {
            return;
        }
        let retained: BinaryHeap<HeapEntry<K, V>> = self
            .heap
            .drain()
            .filter(|e| !self.cancelled.contains(&e.id))
            .collect();
        self.heap = retained;
        self.cancelled.clear();
        self.stats.compactions += 1;
    }

    /// Fires every live entry whose deadline is at or before `t`, in
    /// deadline order (ties broken by scheduling order).
    ///
    /// A callback that returns an error does not stop the sweep: the
    /// failure is reported (see [`set_on_error`](Self::set_on_error)) and
    /// the remaining due entries still fire.
    pub fn expire_up_to(&mut self, t: Instant) {
        // Temporarily take the callback out so firing it doesn't require
        // holding `&mut self` and a second mutable borrow simultaneously;
        // re-entrant scheduling from inside a callback is supported this
        // way (the new entry simply isn't visible to the in-progress sweep
        // unless its deadline is also <= t and hasn't been popped yet).
        let mut on_expired = self.on_expired.take();

        while let Some(top) = self.heap.peek() {
            if top.deadline > t {
                break;
            }
            let entry = self.heap.pop().expect("just peeked");
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            self.live_len -= 1;
            if let Some(ids) = self.key_index.get_mut(&entry.key) {
                ids.retain(|id| *id != entry.id);
                if ids.is_empty() {
                    self.key_index.remove(&entry.key);
                }
            }

            if let Some(cb) = on_expired.as_mut() {
                match cb(&entry.key, &entry.value) {
                    Ok(()) => {
                        self.stats.fired += 1;
                    }
                    Err(source) => {
                        self.stats.callback_failures += 1;
                        let failed = TimerCallbackFailed::new(source);
                        if let Some(sink) = self.on_error.as_mut() {
                            sink(&entry.key, failed);
                        } else {
                            tracing::warn!(
                                error = %failed,
                                "deadline timer callback failed with no error sink installed"
                            );
                        }
                    }
                }
            } else {
                self.stats.fired += 1;
            }
        }

        self.on_expired = on_expired;
    }

    /// Fires every live entry whose deadline has passed as of `now`.
    /// Equivalent to `expire_up_to(now)`.
    pub fn advance(&mut self, now: Instant) {
        self.expire_up_to(now);
    }
}

impl<K, V> Default for DeadlineTimer<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn t0() -> Instant {
        Instant::now()
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut timer: DeadlineTimer<u32, &'static str> = DeadlineTimer::new();
        let fired: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let fired_cb = fired.clone();
        timer.set_on_expired::<_, std::convert::Infallible>(move |_k, v| {
            fired_cb.borrow_mut().push(*v);
            Ok(())
        });

        let now = t0();
        timer.schedule(now, Duration::from_millis(30), 1, "third");
        timer.schedule(now, Duration::from_millis(10), 2, "first");
        timer.schedule(now, Duration::from_millis(20), 3, "second");

        timer.advance(now + Duration::from_millis(100));
        assert_eq!(vec!["first", "second", "third"], *fired.borrow());
        assert_eq!(3, timer.stats().fired);
        assert!(timer.is_empty());
    }

    #[test]
    fn cancel_prevents_firing() {
        let mut timer: DeadlineTimer<u32, ()> = DeadlineTimer::new();
        let fired = Rc::new(RefCell::new(0u32));
        let fired_cb = fired.clone();
        timer.set_on_expired::<_, std::convert::Infallible>(move |_k, ()| {
            *fired_cb.borrow_mut() += 1;
            Ok(())
        });

        let now = t0();
        timer.schedule(now, Duration::from_millis(10), 1, ());
        assert_eq!(1, timer.cancel(&1));
        assert_eq!(0, timer.cancel(&1));

        timer.advance(now + Duration::from_millis(100));
        assert_eq!(0, *fired.borrow());
        assert_eq!(1, timer.stats().cancelled);
    }

    #[test]
    fn reschedule_after_cancel_still_fires() {
        let mut timer: DeadlineTimer<u32, ()> = DeadlineTimer::new();
        let fired = Rc::new(RefCell::new(0u32));
        let fired_cb = fired.clone();
        timer.set_on_expired::<_, std::convert::Infallible>(move |_k, ()| {
            *fired_cb.borrow_mut() += 1;
            Ok(())
        });

        let now = t0();
        timer.schedule(now, Duration::from_millis(10), 1, ());
        timer.cancel(&1);
        timer.schedule(now, Duration::from_millis(20), 1, ());

        timer.advance(now + Duration::from_millis(100));
        assert_eq!(1, *fired.borrow());
    }

    #[test]
    fn callback_failure_is_isolated() {
        let mut timer: DeadlineTimer<u32, ()> = DeadlineTimer::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let fired_cb = fired.clone();
        timer.set_on_expired(move |k: &u32, ()| -> Result<(), std::io::Error> {
            if *k == 1 {
                return Err(std::io::Error::other("boom"));
            }
            fired_cb.borrow_mut().push(*k);
            Ok(())
        });

        let now = t0();
        timer.schedule(now, Duration::from_millis(10), 1, ());
        timer.schedule(now, Duration::from_millis(10), 2, ());

        timer.advance(now + Duration::from_millis(100));
        assert_eq!(vec![2], *fired.borrow());
        assert_eq!(1, timer.stats().callback_failures);
        assert_eq!(1, timer.stats().fired);
    }

    #[test]
    fn expire_up_to_only_fires_due_entries() {
        let mut timer: DeadlineTimer<u32, ()> = DeadlineTimer::new();
        let fired = Rc::new(RefCell::new(0u32));
        let fired_cb = fired.clone();
        timer.set_on_expired::<_, std::convert::Infallible>(move |_k, ()| {
            *fired_cb.borrow_mut() += 1;
            Ok(())
        });

        let now = t0();
        timer.schedule(now, Duration::from_millis(50), 1, ());
        timer.advance(now + Duration::from_millis(10));
        assert_eq!(0, *fired.borrow());
        assert_eq!(1, timer.len());

        timer.advance(now + Duration::from_millis(60));
        assert_eq!(1, *fired.borrow());
    }

    #[test]
    fn compaction_reclaims_cancelled_entries() {
        let mut timer: DeadlineTimer<u32, ()> = DeadlineTimer::with_config(
            &crate::config::TimerConfig { compaction_threshold: 2 },
        );
        let now = t0();
        for k in 0..10u32 {
            timer.schedule(now, Duration::from_millis(100), k, ());
        }
        for k in 0..8u32 {
            timer.cancel(&k);
        }
        assert!(timer.stats().compactions >= 1);
        assert_eq!(2, timer.len());
    }
}
