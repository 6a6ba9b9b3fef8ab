//! Crash game engine.
//!
//! This crate contains the round state machine, the crash-point sampler, and
//! the animation loop that drives a live round in real time.
//!
//! ## Concurrency requirements
//! - All operations on one round (join, lock, cashout, advance) serialize on
//!   the round's own lock; there is no shared state between rounds.
//! - A ledger debit and the matching admission are both-or-neither: a player
//!   is never admitted without a reservation and never charged without being
//!   admitted.
//! - The animator checks for a terminal phase before every tick; no frames
//!   are produced after settlement except the single final one.
//!
//! The primary entrypoints are [`Round`] and [`animator::run`].

pub mod animator;
pub mod easing;
pub mod outcome;
pub mod registry;
pub mod round;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;


pub use animator::{run as animate, AnimatorConfig, FrameSink, RoundFrame};
pub use outcome::{CrashSampler, DEFAULT_HOUSE_EDGE, INSTANT_CRASH_PROB};
pub use registry::{RegistryError, RoundRegistry};
pub use round::{
    Cashout, GameConfig, LockOutcome, PlayerPosition, Round, RoundError, RoundPhase,
    RoundSnapshot, RoundState, Tick, MIN_MULTIPLIER,
};
