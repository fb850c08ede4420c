//! Time-synchronization engine for a multi-port IEEE 1588 / 802.1AS bridge.
//!
//! The crate owns the protocol state of a boundary (or ordinary,
//! transparent, front-end) clock: one [`Port`](port::Port) state machine per
//! bridge port, the received-message dispatch pipeline, the 802.1AS
//! Sync/Follow_Up site relay and the TLV based message-interval
//! negotiation. Hardware timestamping, frame I/O, the BMCA dataset
//! comparison and the peer-delay measurement filter live outside; the
//! engine consumes them through the interfaces in [`actions`] and
//! [`peer_delay`].
//!
//! Every entry point takes `&mut BridgeClock` and runs to completion. The
//! exclusive borrow *is* the critical section: an embedding that feeds the
//! engine from several execution contexts (timer tick, receive path,
//! management) wraps the instance in its own mutex and never holds it
//! across a blocking transmit. Frames to send and timers to (re)arm come
//! back as [`actions::BridgeAction`] values which the embedding executes
//! after the borrow ends; the hardware egress timestamp of an event frame
//! re-enters through [`clock::BridgeClock::handle_send_timestamp`].

pub mod actions;
pub mod clock;
pub mod config;
pub mod datastructures;
mod dispatch;
pub mod peer_delay;
pub mod port;
mod site_sync;
pub mod time;

pub use actions::{BridgeAction, PortTimer, TimerOp, TimestampContext};
pub use clock::{BridgeClock, PortIndex, RecommendedPortState};
pub use config::{ConfigError, DeviceRole, InstanceConfig, PortConfig, Profile};
pub use datastructures::common::{ClockIdentity, PortIdentity, TimeInterval};
pub use peer_delay::PeerDelay;
pub use port::PortState;
pub use site_sync::RelayPhase;
pub use time::{Duration, Interval, Time};

/// Largest frame the engine will produce or accept.
pub const MAX_DATA_LEN: usize = 255;
