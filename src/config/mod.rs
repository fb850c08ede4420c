//! Configuration of a clock instance and its ports.
//!
//! These structs are filled in by whatever configuration frontend the
//! embedding uses and handed over at instance creation; the engine treats
//! them as read-only afterwards. Invalid values are rejected synchronously
//! with a [`ConfigError`] before any state is touched.

mod instance;
mod port;

pub use instance::{DeviceRole, InstanceConfig, Profile, TransportProtocol};
pub use port::{DelayMechanism, DestAddressSelect, GptpPortConfig, PortConfig};

/// Synchronously rejected configuration mistakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("port number out of range")]
    BadPortNumber,
    #[error("VLAN id out of range")]
    BadVlanId,
    #[error("log interval out of range")]
    BadInterval,
    #[error("too many ports for one instance")]
    TooManyPorts,
}
