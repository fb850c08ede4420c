/// Per-port receive and transmit counters.
///
/// Discards of messages that do not apply to the current port state, fail
/// loop detection or break a relay cycle all land in
/// `rx_ptp_packet_discard_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStatistics {
    pub rx_sync_count: u64,
    pub rx_follow_up_count: u64,
    pub rx_announce_count: u64,
    pub rx_delay_request_count: u64,
    pub rx_delay_response_count: u64,
    pub rx_pdelay_request_count: u64,
    pub rx_pdelay_response_count: u64,
    pub rx_pdelay_response_follow_up_count: u64,
    pub rx_ptp_packet_discard_count: u64,
    pub tx_sync_count: u64,
    pub tx_follow_up_count: u64,
    pub tx_announce_count: u64,
    pub tx_delay_response_count: u64,
}
