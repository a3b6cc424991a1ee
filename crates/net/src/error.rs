//! Channel and connection-lifecycle errors.

use thiserror::Error;

/// Failures the channel engine and its surrounding connection machinery can
/// report to subscribers and callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    /// DNS/seed resolution did not produce a usable address.
    #[error("failed to resolve peer address")]
    ResolveFailed,
    /// The outbound connection attempt itself failed.
    #[error("failed to connect to peer")]
    ConnectFailed,
    /// Accepting an inbound connection failed.
    #[error("failed to accept inbound connection")]
    AcceptFailed,
    /// The idle-read deadline fired before a message arrived.
    #[error("channel timed out waiting for a message")]
    ChannelTimeout,
    /// The channel is in the `Stopped` state; this is the error code
    /// delivered when the cause is something other than a graceful close.
    #[error("channel has stopped")]
    ChannelStopped,
    /// The channel was stopped deliberately (`Channel::stop`), or a call was
    /// made against a channel that had already stopped.
    #[error("service has stopped")]
    ServiceStopped,
    /// A frame failed to parse, or its checksum did not match its payload.
    #[error("peer sent a malformed or corrupt stream")]
    BadStream,
    /// The peer's address matched a ban/block list entry.
    #[error("peer address is blocked")]
    AddressBlocked,
}
