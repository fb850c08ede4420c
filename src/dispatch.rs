//! Classification and routing of received messages.
//!
//! Validation runs in a fixed order: frame length against the type's
//! minimum, protocol version, transport/domain match, self-origination,
//! then the alternate-master flag. Only a frame that survives all of it is
//! routed by message type crossed with the receiving port's state. A
//! malformed frame forces the port into `Faulty`; the periodic tick heals
//! it back.

use crate::actions::{actions, BridgeAction, PortTimer, TimerOp};
use crate::clock::{BridgeClock, PortIndex};
use crate::config::Profile;
use crate::datastructures::common::{tlv_walk, PortIdentity, TimeInterval, TlvType};
use crate::datastructures::messages::{
    parse_path_trace, signaling::SIGNALING_TLV_OFFSET, AnnounceMessage, Header,
    IntervalRequestFlags, Message, MessageType, SdoId, SignalingMessage, SyncMessage,
    ANNOUNCE_BODY_END,
};
use crate::peer_delay::PeerDelay;
use crate::port::PortState;
use crate::time::{Duration, Interval, Time};

/// Entry point for every received frame. `ingress` carries the hardware
/// timestamp of event frames; general frames have none.
pub(crate) fn incoming<P: PeerDelay>(
    clock: &mut BridgeClock<P>,
    index: PortIndex,
    frame: &[u8],
    ingress: Option<Time>,
) -> Vec<BridgeAction> {
    let port_number = index.port_number();

    let header = match Header::deserialize_header(frame) {
        Ok(header) => header,
        Err(error) => {
            log::error!("malformed message on port {port_number}: {error:?}");
            return clock.transition(index, PortState::Faulty);
        }
    };

    if frame.len() < header.message_type.min_message_length() {
        log::error!(
            "message of type {:?} shorter than its minimum on port {port_number}",
            header.message_type
        );
        return clock.transition(index, PortState::Faulty);
    }

    if header.header.version().major() != 2 {
        log::info!("ignoring message with protocol version {:?}", header.header.version());
        return actions![];
    }

    let is_gptp_tagged = header.header.sdo_id() == SdoId::GPTP;
    if clock.config.profile == Profile::Ieee802Dot1As && !is_gptp_tagged {
        log::info!("ignoring non-gPTP message on gPTP domain");
        return actions![];
    }
    if !clock.config.profile.is_802_1as() && is_gptp_tagged {
        log::info!("ignoring gPTP-tagged message on non-gPTP domain");
        return actions![];
    }

    let link_local = matches!(
        header.message_type,
        MessageType::PDelayReq | MessageType::PDelayResp | MessageType::PDelayRespFollowUp
    );
    if !link_local && header.header.domain_number() != clock.config.domain_number {
        log::info!(
            "ignoring message from domain {}",
            header.header.domain_number()
        );
        return actions![];
    }

    let self_origination_exempt = clock.config.profile.is_802_1as()
        && header.message_type == MessageType::PDelayRespFollowUp;
    if !self_origination_exempt
        && header.header.source_port_identity().clock_identity == clock.config.clock_identity
    {
        log::debug!("received message from this clock itself");
        if header.message_type == MessageType::Announce {
            clock.ports[index.0].statistics.rx_ptp_packet_discard_count += 1;
        }
        return actions![];
    }

    if header.header.alternate_master_flag() {
        log::debug!("alternate master not supported");
        return actions![];
    }

    let message = match Message::deserialize(frame) {
        Ok(message) => message,
        Err(error) => {
            log::error!("malformed {:?} on port {port_number}: {error:?}", header.message_type);
            return clock.transition(index, PortState::Faulty);
        }
    };

    match message {
        Message::Sync(sync) => handle_sync(clock, index, frame, sync, ingress),
        Message::DelayReq(request) => {
            clock.ports[index.0].statistics.rx_delay_request_count += 1;
            match clock.ports[index.0].state {
                PortState::Master => {
                    let Some(ingress) = ingress else {
                        log::warn!("delay request without ingress timestamp");
                        return actions![];
                    };
                    let default_ds = clock.default_ds;
                    let ctx = clock.master_context(index, &default_ds);
                    let log_min = clock.ports[index.0].config.log_min_delay_req_interval;
                    let Some(mut master) = clock.ports[index.0].master.take() else {
                        return actions![];
                    };
                    let result = master.handle_delay_req(&ctx, request, ingress, log_min);
                    clock.ports[index.0].master = Some(master);
                    if !result.is_empty() {
                        clock.ports[index.0].statistics.tx_delay_response_count += 1;
                    }
                    result
                }
                PortState::E2eTransparent => actions![BridgeAction::TransparentForward {
                    ingress_port: port_number,
                    frame: frame.to_vec(),
                }],
                _ => {
                    clock.ports[index.0].statistics.rx_ptp_packet_discard_count += 1;
                    actions![]
                }
            }
        }
        // peer delay is link-local and handled regardless of port role
        Message::PDelayReq(request) => {
            let port = &mut clock.ports[index.0];
            port.statistics.rx_pdelay_request_count += 1;
            port.peer_delay
                .handle_pdelay_req(request, ingress.unwrap_or_default());
            actions![]
        }
        Message::PDelayResp(response) => {
            let port = &mut clock.ports[index.0];
            port.statistics.rx_pdelay_response_count += 1;
            port.peer_delay
                .handle_pdelay_resp(response, ingress.unwrap_or_default());
            actions![]
        }
        Message::PDelayRespFollowUp(response) => {
            let port = &mut clock.ports[index.0];
            port.statistics.rx_pdelay_response_follow_up_count += 1;
            port.peer_delay.handle_pdelay_resp_follow_up(response);
            actions![]
        }
        Message::FollowUp(follow_up) => handle_follow_up(clock, index, frame, follow_up),
        Message::DelayResp(_) => {
            clock.ports[index.0].statistics.rx_delay_response_count += 1;
            match clock.ports[index.0].state {
                PortState::Slave | PortState::Uncalibrated => {
                    // end-to-end delay measurement is not used by the
                    // peer-delay profiles this engine serves
                    actions![]
                }
                PortState::E2eTransparent => actions![BridgeAction::TransparentForward {
                    ingress_port: port_number,
                    frame: frame.to_vec(),
                }],
                _ => {
                    clock.ports[index.0].statistics.rx_ptp_packet_discard_count += 1;
                    actions![]
                }
            }
        }
        Message::Announce(announce) => handle_announce(clock, index, frame, announce),
        Message::Signaling(signaling) => handle_signaling(clock, index, frame, signaling),
        Message::Management(_) => {
            log::debug!("management messages are not supported");
            actions![]
        }
    }
}

fn handle_sync<P: PeerDelay>(
    clock: &mut BridgeClock<P>,
    index: PortIndex,
    frame: &[u8],
    mut sync: SyncMessage,
    ingress: Option<Time>,
) -> Vec<BridgeAction> {
    let port_number = index.port_number();
    let port = &mut clock.ports[index.0];
    port.statistics.rx_sync_count += 1;
    port.last_sync_sequence_id = Some(sync.header.sequence_id);
    port.awaiting_follow_up = true;

    let Some(ingress) = ingress else {
        log::warn!("sync without ingress timestamp on port {port_number}");
        return actions![];
    };

    // announce is not used by the AED profile; the parent follows the sync
    if clock.config.profile == Profile::Aed802Dot1As
        && clock.ports[index.0].state == PortState::Slave
    {
        clock.parent_ds.parent_port_identity = sync.header.source_port_identity;
    }

    // in two-step mode the peer mean path delay is folded into the
    // correction in software
    if clock.config.two_step {
        let mean_link_delay = clock.ports[index.0]
            .peer_delay
            .mean_link_delay()
            .unwrap_or(Duration::ZERO);
        let delay = if clock.config.scale_residence_time {
            let rate_ratio = clock
                .site_sync
                .as_ref()
                .map(|site| site.rate_ratio)
                .unwrap_or(1.0);
            mean_link_delay * rate_ratio
        } else {
            mean_link_delay
        };
        sync.header.correction_field =
            TimeInterval(sync.header.correction_field.0 + TimeInterval::from(delay).0);
    }

    match clock.ports[index.0].state {
        PortState::Uncalibrated | PortState::Slave => {
            let mean_link_delay = clock.ports[index.0].peer_delay.mean_link_delay();
            if let Some(slave) = clock.slave.as_mut() {
                if slave.remote_master == PortIdentity::default() {
                    slave.remote_master = sync.header.source_port_identity;
                }
                if slave.remote_master == sync.header.source_port_identity {
                    slave.handle_sync(&sync, ingress, mean_link_delay);
                } else {
                    log::debug!("sync from a clock that is not the selected master");
                }
            }

            if clock.config.profile.is_802_1as() && clock.slave_port == port_number {
                return clock.relay_sync(index, frame, &sync, ingress);
            }
            actions![]
        }
        PortState::P2pTransparent | PortState::E2eTransparent => {
            actions![BridgeAction::TransparentForward {
                ingress_port: port_number,
                frame: frame.to_vec(),
            }]
        }
        _ => {
            log::debug!("ignoring sync in state {}", clock.ports[index.0].state);
            clock.ports[index.0].statistics.rx_ptp_packet_discard_count += 1;
            actions![]
        }
    }
}

fn handle_follow_up<P: PeerDelay>(
    clock: &mut BridgeClock<P>,
    index: PortIndex,
    frame: &[u8],
    follow_up: crate::datastructures::messages::FollowUpMessage,
) -> Vec<BridgeAction> {
    let port_number = index.port_number();
    let port = &mut clock.ports[index.0];
    port.statistics.rx_follow_up_count += 1;
    port.last_follow_up_sequence_id = Some(follow_up.header.sequence_id);
    port.awaiting_follow_up = false;

    match clock.ports[index.0].state {
        PortState::Uncalibrated | PortState::Slave => {
            // a follow-up that cannot belong to the last sync means the
            // upstream pairing broke down; fall back to master
            if clock.config.profile == Profile::Ieee802Dot1As
                && clock.ports[index.0].last_follow_up_sequence_id
                    != clock.ports[index.0].last_sync_sequence_id
            {
                log::warn!(
                    "follow-up sequence does not match last sync on port {port_number}"
                );
                return clock.transition(index, PortState::Master);
            }

            let mean_link_delay = clock.ports[index.0].peer_delay.mean_link_delay();
            if let Some(slave) = clock.slave.as_mut() {
                if slave.remote_master == follow_up.header.source_port_identity {
                    slave.handle_follow_up(&follow_up, mean_link_delay);
                }
            }

            if clock.config.profile.is_802_1as() && clock.slave_port == port_number {
                return clock.relay_follow_up(index, frame, &follow_up);
            }
            actions![]
        }
        PortState::P2pTransparent | PortState::E2eTransparent => {
            actions![BridgeAction::TransparentForward {
                ingress_port: port_number,
                frame: frame.to_vec(),
            }]
        }
        _ => {
            log::debug!("ignoring follow-up in state {}", clock.ports[index.0].state);
            clock.ports[index.0].statistics.rx_ptp_packet_discard_count += 1;
            actions![]
        }
    }
}

fn handle_announce<P: PeerDelay>(
    clock: &mut BridgeClock<P>,
    index: PortIndex,
    frame: &[u8],
    announce: AnnounceMessage,
) -> Vec<BridgeAction> {
    let port_number = index.port_number();
    clock.ports[index.0].statistics.rx_announce_count += 1;

    if clock.config.profile == Profile::Aed802Dot1As {
        log::debug!("announce ignored under the AED profile");
        return actions![];
    }

    // PortAnnounceReceive qualification: a message that lists this clock in
    // its path trace has looped and is not qualified
    let mut path = None;
    if clock.config.path_trace_enabled && frame.len() > ANNOUNCE_BODY_END {
        match parse_path_trace(&frame[ANNOUNCE_BODY_END..]) {
            Ok(parsed) => path = Some(parsed),
            Err(error) => {
                log::error!("malformed announce tlv chain on port {port_number}: {error:?}");
                return clock.transition(index, PortState::Faulty);
            }
        }
        if let Some(path) = &path {
            if path.contains(&clock.config.clock_identity) {
                log::warn!("loop detected in the announce path trace on port {port_number}");
                clock.ports[index.0].statistics.rx_ptp_packet_discard_count += 1;
                return actions![];
            }
        }
    }

    if announce.steps_removed() >= 255 {
        log::info!("ignoring announce with stepsRemoved {}", announce.steps_removed());
        clock.ports[index.0].statistics.rx_ptp_packet_discard_count += 1;
        return actions![];
    }

    match clock.ports[index.0].state {
        PortState::Faulty | PortState::Initializing | PortState::Disabled => {
            clock.ports[index.0].statistics.rx_ptp_packet_discard_count += 1;
            actions![]
        }
        PortState::P2pTransparent | PortState::E2eTransparent => {
            actions![BridgeAction::TransparentForward {
                ingress_port: port_number,
                frame: frame.to_vec(),
            }]
        }
        _ => {
            if let Some(path) = path {
                clock.path_trace = path;
            }
            actions![BridgeAction::RegisterAnnounce {
                port: port_number,
                message: announce,
            }]
        }
    }
}

fn handle_signaling<P: PeerDelay>(
    clock: &mut BridgeClock<P>,
    index: PortIndex,
    frame: &[u8],
    _signaling: SignalingMessage,
) -> Vec<BridgeAction> {
    let port_number = index.port_number();

    match clock.ports[index.0].state {
        PortState::Faulty
        | PortState::Initializing
        | PortState::Disabled
        | PortState::P2pTransparent
        | PortState::E2eTransparent => {
            log::debug!("ignoring signaling in state {}", clock.ports[index.0].state);
            clock.ports[index.0].statistics.rx_ptp_packet_discard_count += 1;
            return actions![];
        }
        _ => {}
    }

    let mut all = actions![];
    for tlv in tlv_walk(&frame[SIGNALING_TLV_OFFSET..]) {
        let tlv = match tlv {
            Ok(tlv) => tlv,
            Err(error) => {
                // never read past the end of a truncated tlv chain
                log::error!("signaling tlv walk overran the buffer on port {port_number}: {error:?}");
                return clock.transition(index, PortState::Faulty);
            }
        };

        if !matches!(
            tlv.tlv_type,
            TlvType::OrganizationExtension | TlvType::OrganizationExtensionDoNotPropagate
        ) {
            log::trace!("skipping signaling tlv {:?}", tlv.tlv_type);
            continue;
        }

        if !clock.config.profile.is_802_1as() {
            log::warn!("organization extension tlvs are only supported under gPTP profiles");
            continue;
        }

        use crate::datastructures::messages::OrganizationExtension;
        match OrganizationExtension::decode(&tlv) {
            Ok(OrganizationExtension::MessageIntervalRequest(request)) => {
                all.extend(apply_interval_request(clock, index, &request));
            }
            Ok(OrganizationExtension::GptpCapable(_)) => {
                let timeout_periods =
                    clock.ports[index.0].config.gptp.gptp_capable_receipt_timeout;
                let interval = clock.ports[index.0]
                    .intervals
                    .current_log_gptp_capable_interval;
                clock.ports[index.0].neighbor_gptp_capable = true;
                all.push(BridgeAction::Timer {
                    port: port_number,
                    timer: PortTimer::GptpCapable,
                    op: TimerOp::Start(
                        Interval::from_log_2(interval).as_duration() * timeout_periods as i64,
                    ),
                });
            }
            Ok(OrganizationExtension::GptpCapableIntervalRequest(request)) => {
                let profile = clock.config.profile;
                let port = &mut clock.ports[index.0];
                port.intervals.apply_gptp_capable_request(
                    &port.config,
                    profile,
                    request.log_gptp_capable_message_interval,
                );
            }
            Ok(_) => {}
            Err(error) => {
                log::error!("malformed organization extension tlv: {error:?}");
                return clock.transition(index, PortState::Faulty);
            }
        }
    }

    all
}

fn apply_interval_request<P: PeerDelay>(
    clock: &mut BridgeClock<P>,
    index: PortIndex,
    request: &crate::datastructures::messages::MessageIntervalRequest,
) -> Vec<BridgeAction> {
    let profile = clock.config.profile;
    let port = &mut clock.ports[index.0];
    let as2020 = port.config.gptp.as2020;

    port.intervals.apply_request(&port.config, profile, request);

    let flags = IntervalRequestFlags::from_byte(request.flags, as2020);
    port.peer_delay
        .set_compute_neighbor_rate_ratio(flags.compute_neighbor_rate_ratio);
    port.peer_delay
        .set_compute_mean_link_delay(flags.compute_mean_link_delay);
    port.peer_delay
        .set_log_pdelay_req_interval(port.intervals.current_log_pdelay_req_interval);

    // senders pick slower rates up after the grace period; faster rates
    // right away
    if let Some(master) = port.master.as_mut() {
        if !port.intervals.sync_slowdown {
            master.sync_log_msg_period = port.intervals.current_log_sync_interval;
        }
        if !port.intervals.announce_slowdown {
            master.announce_log_msg_period = port.intervals.current_log_announce_interval;
        }
    }

    actions![]
}
