//! What the engine asks its embedding to do.
//!
//! Handlers never touch hardware directly; they return a list of
//! [`BridgeAction`] values. The embedding performs them after releasing
//! the instance lock, so no lock is ever held across a transmit that can
//! block. When an event frame leaves the hardware, the captured egress
//! timestamp comes back through
//! [`BridgeClock::handle_send_timestamp`](crate::clock::BridgeClock::handle_send_timestamp)
//! together with the [`TimestampContext`] that was attached to the send.

use crate::datastructures::messages::AnnounceMessage;
use crate::time::Duration;

/// Opaque tag correlating an event transmit with its egress timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampContext {
    pub(crate) inner: TimestampContextInner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimestampContextInner {
    /// A Sync re-emitted by the site relay on this port.
    RelaySync { port: u16 },
    /// A Sync generated by this port's own master logic.
    MasterSync { port: u16, id: u16 },
}

/// The per-port timers the embedding runs for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortTimer {
    Announce,
    Sync,
    DelayRequest,
    AnnounceReceipt,
    SyncReceipt,
    GptpCapable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerOp {
    /// (Re)arm the timer for one period.
    Start(Duration),
    /// Stop the timer; it must not fire afterwards.
    Stop,
}

/// Out-of-band conditions the embedding may want to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The slave port stopped tracking a master.
    LossOfAnnounce { port: u16 },
    /// The 1-PPS virtual reference was selected or deselected.
    VirtualPortReference { port: u16, selected: bool },
}

/// One instruction to the embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeAction {
    /// Transmit a general (untimestamped) frame on every port in the mask.
    SendGeneral { port_mask: u64, frame: Vec<u8> },
    /// Transmit an event frame. When a context is attached the hardware
    /// egress timestamp must be fed back with it; `None` means the
    /// hardware folds the correction itself (one-step) and no completion
    /// is expected.
    SendEvent {
        port_mask: u64,
        context: Option<TimestampContext>,
        frame: Vec<u8>,
    },
    /// Run a per-port timer.
    Timer {
        port: u16,
        timer: PortTimer,
        op: TimerOp,
    },
    /// Hand a qualified Announce to the BMCA.
    RegisterAnnounce { port: u16, message: AnnounceMessage },
    /// Hand a frame to the transparent-clock forwarding collaborator.
    TransparentForward { ingress_port: u16, frame: Vec<u8> },
    /// Surface a notification.
    Notify(Notification),
}

/// Builds a `Vec<BridgeAction>`; keeps handler returns terse.
macro_rules! actions {
    [] => { Vec::new() };
    [$($action:expr),* $(,)?] => { vec![$($action),*] };
}
pub(crate) use actions;
