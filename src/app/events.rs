//! Events delivered by the command transport.
//!
//! Transport callbacks run on the radio stack's own task; they only
//! translate what happened into a [`TransportEvent`] and push it onto a
//! queue.  The command loop drains that queue on its own schedule.

/// Largest single inbound write kept by the transport.
pub const MESSAGE_CAP: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A companion device connected.
    Connected,
    /// The companion device went away.
    Disconnected,
    /// One complete inbound message.
    Message(heapless::String<MESSAGE_CAP>),
}
