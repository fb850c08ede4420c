//! The per-port peer-delay collaborator surface.
//!
//! The measurement state machine and its filter live outside the engine;
//! what the engine needs is the link's current status, a few knobs the
//! interval negotiation turns, and a sink for the link-local pdelay
//! messages the dispatcher routes regardless of port role.

use crate::datastructures::messages::{
    PDelayReqMessage, PDelayRespFollowUpMessage, PDelayRespMessage,
};
use crate::time::{Duration, Time};

pub trait PeerDelay {
    /// The measured mean link delay, when the link has one.
    fn mean_link_delay(&self) -> Option<Duration>;

    /// The ratio of the neighbor's clock frequency to the local one.
    fn neighbor_rate_ratio(&self) -> f64;

    /// Whether the link qualifies for gPTP operation.
    fn as_capable(&self) -> bool;

    fn log_pdelay_req_interval(&self) -> i8;
    fn set_log_pdelay_req_interval(&mut self, log_interval: i8);

    fn compute_neighbor_rate_ratio(&self) -> bool;
    fn set_compute_neighbor_rate_ratio(&mut self, enable: bool);

    fn compute_mean_link_delay(&self) -> bool;
    fn set_compute_mean_link_delay(&mut self, enable: bool);

    fn handle_pdelay_req(&mut self, message: PDelayReqMessage, ingress: Time);
    fn handle_pdelay_resp(&mut self, message: PDelayRespMessage, ingress: Time);
    fn handle_pdelay_resp_follow_up(&mut self, message: PDelayRespFollowUpMessage);
}
