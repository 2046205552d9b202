//! A sliding-window reliability engine and deadline timer for SRT-style
//! reliable streaming transports.
//!
//! This crate implements the two data structures a reliable, ordered
//! delivery layer is built on top of:
//!
//! - [`window`]: a fixed-capacity ring buffer of blocks addressed by cyclic
//!   sequence number, specialized into [`window::SenderWindow`] (tracks
//!   outstanding sends, drives retransmission) and
//!   [`window::ReceiverWindow`] (reorders arrivals, drains them in order).
//! - [`timer`]: a deadline-ordered queue ([`timer::DeadlineTimer`]) for
//!   scheduling retransmit timeouts and periodic sweeps without polling.
//!
//! Both are sans-IO: nothing here opens a socket, encodes a packet, or
//! spawns a task. Every operation takes the current time as an explicit
//! parameter and reports what happened through plain callbacks
//! (`on_packet`, `on_drop_packet`, `on_expired`) rather than pushing onto
//! an internal queue the caller has to separately drain. Wiring these
//! primitives to a transport's wire codec, its I/O loop, and its
//! congestion control is the embedding application's job.
//!
//! ## Sequence-number arithmetic
//!
//! [`seq`] holds the cyclic comparison functions every other module
//! builds on: sequence numbers wrap at a caller-chosen modulus rather than
//! a fixed integer width, since the size of the sequence space and the
//! size of the window are independent, validated, configuration values
//! (see [`config::WindowConfig`]).
//!
//! ## Configuration and errors
//!
//! Construction is fallible: [`config::WindowConfig::validate`] and
//! [`config::TimerConfig::validate`] reject configurations that would
//! otherwise surface as confusing runtime behavior (for example, a
//! sequence space too small to disambiguate "ahead" from "wrapped
//! around"). Everything else reported at runtime goes through
//! [`error`] and the `stats` modules rather than panicking, except for the
//! structural invariants documented on [`error::WindowInvariantViolated`],
//! which indicate a bug in this crate rather than a reachable condition.

#![warn(missing_docs)]

pub mod block;
pub mod config;
pub mod error;
pub mod seq;
pub mod stats;
pub mod timer;
pub mod window;

pub use block::Block;
pub use config::{TimerConfig, WindowConfig};
pub use error::{ConfigError, TimerCallbackFailed, WindowInvariantViolated};
pub use stats::{TimerStats, WindowStats};
pub use timer::{DeadlineTimer, TimerHandle};
pub use window::{ReceiverWindow, SenderWindow};
