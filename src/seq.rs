//! Cyclic 32-bit sequence-number arithmetic.
//!
//! Every function here is a pure function of `(a, b, modulus)` — there is no
//! [`Seq`] type carrying its own modulus, because the same sequence number
//! means different things depending on which window it is read from (a
//! sender and a receiver sharing a connection both count up from `0`, but
//! their windows are unrelated ring buffers). Keeping the modulus explicit
//! avoids smuggling window-specific state into what is otherwise a
//! stateless numeric operation.
//!
//! The midpoint rule (see [`is_before`]) tolerates reordering and network
//! jitter up to half of the sequence space; anything further away from a
//! reference point is interpreted as having wrapped around.

/// Default modulus for a sequence space: `2^32`.
///
/// Stored as a [`u64`] since `2^32` does not fit in a [`u32`].
pub const DEFAULT_MAX_SEQUENCE: u64 = 1 << 32;

/// Advances `a` by one position in a sequence space of size `modulus`.
#[must_use]
pub fn step(a: u32, modulus: u64) -> u32 {
    add(a, 1, modulus)
}

/// Steps `a` backwards by one position in a sequence space of size
/// `modulus`.
#[must_use]
pub fn prev(a: u32, modulus: u64) -> u32 {
    add(a, modulus - 1, modulus)
}

/// Advances `a` forward by `delta` positions, wrapping at `modulus`.
#[must_use]
pub fn add(a: u32, delta: u64, modulus: u64) -> u32 {
    debug_assert!(modulus > 0, "modulus must be non-zero");
    #[allow(clippy::cast_possible_truncation)] // result is always < modulus <= u32::MAX + 1
    let out = (u64::from(a) + delta) % modulus;
    out as u32
}

/// Smallest non-negative `d` such that `(a + d) mod modulus == b`.
///
/// Equivalent to `(b - a) mod modulus`.
#[must_use]
pub fn diff_forward(a: u32, b: u32, modulus: u64) -> u64 {
    debug_assert!(modulus > 0, "modulus must be non-zero");
    let (a, b) = (u64::from(a), u64::from(b));
    (modulus + b - a) % modulus
}

/// Whether `a` logically precedes `b` in the cyclic sequence space, using
/// the midpoint rule: distances up to half the modulus are "forward",
/// anything further is considered to have wrapped.
#[must_use]
pub fn is_before(a: u32, b: u32, modulus: u64) -> bool {
    a != b && diff_forward(a, b, modulus) < modulus / 2
}

/// Smallest cyclic distance between `a` and `b`, in either direction.
#[must_use]
pub fn distance(a: u32, b: u32, modulus: u64) -> u64 {
    diff_forward(a, b, modulus).min(diff_forward(b, a, modulus))
}

/// Whether moving from `first` to `last` numerically (not cyclically)
/// crossed a wrap-around boundary of the sequence space.
///
/// This is a literal numeric comparison, not a midpoint-rule comparison: it
/// answers "did stepping forward from `first` to `last` wrap past the top of
/// the sequence space", which is exactly the condition a window needs to
/// flip its `is_cycle` flag.
#[must_use]
pub fn is_cycle(first: u32, last: u32, modulus: u64) -> bool {
    u64::from(first) > u64::from(last) && u64::from(first) - u64::from(last) > modulus / 2
}

/// Whether `x` lies in the inclusive cyclic range `[lo, hi]`.
#[must_use]
pub fn in_range(x: u32, lo: u32, hi: u32, modulus: u64) -> bool {
    diff_forward(lo, x, modulus) <= diff_forward(lo, hi, modulus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_wraps_at_modulus() {
        assert_eq!(1, step(0, 16));
        assert_eq!(0, step(15, 16));
    }

    #[test]
    fn diff_forward_basic() {
        assert_eq!(0, diff_forward(5, 5, 16));
        assert_eq!(3, diff_forward(5, 8, 16));
        assert_eq!(13, diff_forward(8, 5, 16));
    }

    #[test]
    fn is_before_midpoint_rule() {
        assert!(is_before(0, 1, 16));
        assert!(is_before(14, 15, 16));
        assert!(is_before(15, 0, 16));
        assert!(!is_before(0, 0, 16));
        // exactly half the space away: no guarantee either way, but the
        // implementation must be consistent / not panic
        let _ = is_before(0, 8, 16);
    }

    #[test]
    fn is_cycle_detects_wrap() {
        assert!(!is_cycle(14, 15, 16));
        assert!(is_cycle(15, 0, 16));
        assert!(is_cycle(15, 2, 16));
    }

    #[test]
    fn in_range_wraps() {
        assert!(in_range(15, 14, 2, 16));
        assert!(in_range(0, 14, 2, 16));
        assert!(!in_range(5, 14, 2, 16));
    }

    #[test]
    fn distance_is_symmetric_and_minimal() {
        assert_eq!(distance(0, 1, 16), distance(1, 0, 16));
        assert_eq!(1, distance(0, 15, 16));
    }
}
