//! # Satoshi Net
//!
//! The async peer-protocol channel engine: one [`channel::Channel`] per
//! socket, a framed read pipeline driven off [`satoshi_wire`], a
//! single-write send path, heartbeat/timeout/revival [`timers::Timer`]s, and
//! a one-shot-per-command [`subscriber::ChannelSubscribers`] registry —
//! all serialized through a [`strand::Strand`] so callbacks never race on
//! one channel even when a shared [`context::Context`] thread pool drives
//! many channels at once.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod context;
pub mod error;
pub mod strand;
pub mod subscriber;
pub mod timers;

pub use channel::{Channel, ReadState};
pub use context::Context;
pub use error::NetError;
pub use strand::Strand;
pub use timers::Timer;
