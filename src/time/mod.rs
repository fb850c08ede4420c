//! Time representations used by the protocol arithmetic.
//!
//! [`Time`] is a point on the local timestamping timescale, [`Duration`] a
//! signed span between two of them, and [`Interval`] the log-base-2 second
//! encoding message rates travel as on the wire.

mod duration;
mod instant;
mod interval;

pub use duration::Duration;
pub use instant::Time;
pub use interval::Interval;
