use fixed::types::I48F16;

use super::*;
use crate::actions::Notification;
use crate::datastructures::common::{ClockIdentity, TimeInterval, Tlv, TlvType};
use crate::datastructures::common::tlv_walk;
use crate::datastructures::messages::{
    update_message_length, AnnounceMessage, FollowUpMessage, MessageIntervalRequest, MessageType,
    OrganizationExtension, SdoId, SignalingMessage, SyncMessage,
};
use crate::peer_delay::test::TestPeerDelay;
use crate::site_sync::RelayPhase;
use crate::time::Duration;

const LOCAL_ID: ClockIdentity = ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]);
const REMOTE_ID: ClockIdentity = ClockIdentity([9, 9, 9, 9, 9, 9, 9, 9]);

fn remote_master() -> PortIdentity {
    PortIdentity {
        clock_identity: REMOTE_ID,
        port_number: 2,
    }
}

fn gptp_clock(num_ports: usize) -> BridgeClock<TestPeerDelay> {
    let config = InstanceConfig::gptp_boundary(LOCAL_ID);
    BridgeClock::new(
        config,
        (0..num_ports).map(|_| (PortConfig::default(), TestPeerDelay::default())),
    )
    .unwrap()
}

fn bring_up(clock: &mut BridgeClock<TestPeerDelay>, port: u16) {
    clock.enable_port(port).unwrap();
    clock.set_link_state(port, true).unwrap();
    clock.tick();
    assert_eq!(
        clock.port(clock.port_index(port).unwrap()).state(),
        PortState::Listening
    );
}

fn make_master(clock: &mut BridgeClock<TestPeerDelay>, port: u16) -> Vec<BridgeAction> {
    let actions = clock
        .recommended_state(port, RecommendedPortState::Master)
        .unwrap();
    assert_eq!(
        clock.port(clock.port_index(port).unwrap()).state(),
        PortState::Master
    );
    actions
}

fn make_slave(clock: &mut BridgeClock<TestPeerDelay>, port: u16) {
    clock
        .recommended_state(port, RecommendedPortState::Slave)
        .unwrap();
    assert_eq!(
        clock.port(clock.port_index(port).unwrap()).state(),
        PortState::Uncalibrated
    );
}

fn gptp_header(sequence_id: u16) -> Header {
    Header {
        sdo_id: SdoId::GPTP,
        sequence_id,
        source_port_identity: remote_master(),
        ..Default::default()
    }
}

fn sync_frame(sequence_id: u16, two_step: bool, log_interval: i8) -> Vec<u8> {
    let mut header = gptp_header(sequence_id);
    header.two_step_flag = two_step;
    header.log_message_interval = log_interval;
    Message::Sync(SyncMessage {
        header,
        origin_timestamp: Time::from_micros(10).into(),
    })
    .serialize_vec()
    .unwrap()
}

fn follow_up_frame(sequence_id: u16) -> Vec<u8> {
    let mut header = gptp_header(sequence_id);
    header.log_message_interval = -3;
    Message::FollowUp(FollowUpMessage {
        header,
        precise_origin_timestamp: Time::from_micros(10).into(),
    })
    .serialize_vec()
    .unwrap()
}

fn signaling_frame(request: MessageIntervalRequest) -> Vec<u8> {
    let mut frame = Message::Signaling(SignalingMessage {
        header: gptp_header(1),
        target_port_identity: PortIdentity {
            clock_identity: ClockIdentity([0xff; 8]),
            port_number: 0xffff,
        },
    })
    .serialize_vec()
    .unwrap();

    let mut tlv = [0u8; 16];
    let n = request.serialize_tlv(&mut tlv).unwrap();
    frame.extend_from_slice(&tlv[..n]);
    update_message_length(&mut frame);
    frame
}

fn announce_frame(path: &[ClockIdentity], steps_removed: u16) -> Vec<u8> {
    let mut frame = Message::Announce(AnnounceMessage {
        header: gptp_header(5),
        origin_timestamp: Time::from_micros(10).into(),
        current_utc_offset: 37,
        grandmaster_priority_1: 128,
        grandmaster_clock_quality: Default::default(),
        grandmaster_priority_2: 128,
        grandmaster_identity: REMOTE_ID,
        steps_removed,
        time_source: 0xa0,
    })
    .serialize_vec()
    .unwrap();

    if !path.is_empty() {
        let mut value = Vec::new();
        for identity in path {
            value.extend_from_slice(&identity.0);
        }
        let tlv = Tlv {
            tlv_type: TlvType::PathTrace,
            value: &value,
        };
        let start = frame.len();
        frame.resize(start + tlv.wire_size(), 0);
        tlv.serialize(&mut frame[start..]).unwrap();
        update_message_length(&mut frame);
    }
    frame
}

fn boundary_with_three_masters() -> BridgeClock<TestPeerDelay> {
    let mut clock = gptp_clock(4);
    for port in 1..=4 {
        bring_up(&mut clock, port);
    }
    for port in 2..=4 {
        make_master(&mut clock, port);
    }
    make_slave(&mut clock, 1);
    clock
}

#[test]
fn link_down_forces_disabled() {
    let mut clock = gptp_clock(2);
    bring_up(&mut clock, 1);
    make_master(&mut clock, 1);

    clock.set_link_state(1, false).unwrap();
    assert_eq!(
        clock.port(clock.port_index(1).unwrap()).state(),
        PortState::Disabled
    );
}

#[test]
fn one_pps_protocol_ignores_link_state() {
    let mut config = InstanceConfig::gptp_boundary(LOCAL_ID);
    config.protocol = TransportProtocol::OnePps;
    let mut clock = BridgeClock::new(
        config,
        [(PortConfig::default(), TestPeerDelay::default())],
    )
    .unwrap();

    // enabling needs no link under 1-PPS
    clock.enable_port(1).unwrap();
    assert_eq!(
        clock.port(clock.port_index(1).unwrap()).state(),
        PortState::Initializing
    );

    // and a link-down report does not force the port down
    clock.set_link_state(1, false).unwrap();
    assert_eq!(
        clock.port(clock.port_index(1).unwrap()).state(),
        PortState::Initializing
    );
}

#[test]
fn internal_port_counts_as_down_while_clock_is_locking() {
    let mut port_config = PortConfig::default();
    port_config.internal = true;
    let mut clock = BridgeClock::new(
        InstanceConfig::gptp_boundary(LOCAL_ID),
        [(port_config, TestPeerDelay::default())],
    )
    .unwrap();

    clock.enable_port(1).unwrap();
    clock.set_link_state(1, true).unwrap();
    clock.tick();
    assert_eq!(
        clock.port(clock.port_index(1).unwrap()).state(),
        PortState::Listening
    );

    clock.set_clock_locking(true);
    assert_eq!(
        clock.port(clock.port_index(1).unwrap()).state(),
        PortState::Disabled
    );

    clock.set_clock_locking(false);
    assert_eq!(
        clock.port(clock.port_index(1).unwrap()).state(),
        PortState::Initializing
    );
}

#[test]
fn faulty_self_heals_on_tick() {
    let mut clock = gptp_clock(1);
    bring_up(&mut clock, 1);

    // a truncated frame is malformed and forces the faulty state
    let frame = sync_frame(1, true, -3);
    clock
        .handle_event_frame(1, &frame[..40], Time::from_micros(1))
        .unwrap();
    assert_eq!(
        clock.port(clock.port_index(1).unwrap()).state(),
        PortState::Faulty
    );

    clock.tick();
    assert_eq!(
        clock.port(clock.port_index(1).unwrap()).state(),
        PortState::Initializing
    );
}

#[test]
fn out_of_range_port_number_is_rejected() {
    let mut clock = gptp_clock(2);
    assert_eq!(clock.enable_port(0), Err(ConfigError::BadPortNumber));
    assert_eq!(clock.enable_port(3), Err(ConfigError::BadPortNumber));
    assert!(clock.port_index(2).is_ok());
}

#[test]
fn leaving_listening_sends_interval_request() {
    let mut clock = gptp_clock(1);
    bring_up(&mut clock, 1);

    let actions = make_master(&mut clock, 1);
    let frame = actions
        .iter()
        .find_map(|action| match action {
            BridgeAction::SendGeneral { frame, .. } => Some(frame.clone()),
            _ => None,
        })
        .expect("an interval request must go out");

    let parsed = Message::deserialize(&frame).unwrap();
    assert!(matches!(parsed, Message::Signaling(_)));

    let tlv = tlv_walk(&frame[44..]).next().unwrap().unwrap();
    let OrganizationExtension::MessageIntervalRequest(request) =
        OrganizationExtension::decode(&tlv).unwrap()
    else {
        panic!("expected a message interval request");
    };
    // first request after entering listening carries absolute values
    assert_eq!(request.announce_interval, 0);
    assert_eq!(request.time_sync_interval, -3);
    assert_eq!(request.link_delay_interval, 0);
}

#[test]
fn boundary_relay_forwards_sync_and_follow_up() {
    let mut clock = boundary_with_three_masters();
    // asymmetry on the receive link is added to every forwarded correction
    clock.ports[0].config.delay_asymmetry = TimeInterval(I48F16::from_num(50));

    let ingress = Time::from_millis(1);
    let actions = clock
        .handle_event_frame(1, &sync_frame(10, true, -3), ingress)
        .unwrap();

    let sends: Vec<_> = actions
        .iter()
        .filter_map(|action| match action {
            BridgeAction::SendEvent {
                port_mask,
                context: Some(context),
                frame,
            } => Some((*port_mask, *context, frame.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(sends.len(), 3);
    assert_eq!(clock.relay_phase(), RelayPhase::WaitTx);
    assert_eq!(clock.relay_port_mask(), 0b1110);

    // every master port re-emits the sync with its own identity and seq 10
    for (mask, _, frame) in &sends {
        let Message::Sync(sync) = Message::deserialize(frame).unwrap() else {
            panic!("expected a sync");
        };
        assert_eq!(sync.header.sequence_id, 10);
        let port_number = mask.trailing_zeros() as u16 + 1;
        assert_eq!(
            sync.header.source_port_identity,
            PortIdentity {
                clock_identity: LOCAL_ID,
                port_number,
            }
        );
    }

    // egress timestamps complete asynchronously, one port at a time
    for (i, (_, context, _)) in sends.iter().enumerate() {
        let egress = ingress + Duration::from_micros(10 * (i as i64 + 1));
        let follow_ups = clock.handle_send_timestamp(*context, egress);
        assert!(follow_ups.is_empty());
    }
    assert_eq!(clock.relay_phase(), RelayPhase::WaitReady);
    assert_eq!(clock.relay_port_mask(), 0b1110);

    // the upstream follow-up fans out with per-port corrections
    let actions = clock
        .handle_general_frame(1, &follow_up_frame(10))
        .unwrap();
    let forwarded: Vec<_> = actions
        .iter()
        .filter_map(|action| match action {
            BridgeAction::SendGeneral { port_mask, frame } => Some((*port_mask, frame.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(forwarded.len(), 3);
    assert_eq!(clock.relay_phase(), RelayPhase::NoAction);
    assert_eq!(clock.relay_port_mask(), 0);

    for (mask, frame) in &forwarded {
        let parsed = Header::deserialize_header(frame).unwrap();
        assert_eq!(parsed.message_type, MessageType::FollowUp);

        let port_number = mask.trailing_zeros() as u16 + 1;
        assert_eq!(
            parsed.header.source_port_identity,
            PortIdentity {
                clock_identity: LOCAL_ID,
                port_number,
            }
        );

        // correction = residence time + configured asymmetry
        let i = (port_number - 2) as i64;
        let residence_nanos = 10_000 * (i + 1);
        assert_eq!(
            parsed.header.correction_field,
            TimeInterval(I48F16::from_num(residence_nanos + 50))
        );
    }

    let stats = clock.port(clock.port_index(2).unwrap()).statistics();
    assert_eq!(stats.tx_sync_count, 1);
    assert_eq!(stats.tx_follow_up_count, 1);
}

#[test]
fn follow_up_before_egress_timestamp_is_buffered() {
    let mut clock = boundary_with_three_masters();

    let ingress = Time::from_millis(1);
    let actions = clock
        .handle_event_frame(1, &sync_frame(20, true, -3), ingress)
        .unwrap();
    let contexts: Vec<_> = actions
        .iter()
        .filter_map(|action| match action {
            BridgeAction::SendEvent {
                context: Some(context),
                ..
            } => Some(*context),
            _ => None,
        })
        .collect();
    assert_eq!(contexts.len(), 3);

    // the upstream follow-up beats every egress timestamp
    let actions = clock
        .handle_general_frame(1, &follow_up_frame(20))
        .unwrap();
    assert!(actions
        .iter()
        .all(|action| !matches!(action, BridgeAction::SendGeneral { .. })));
    assert_eq!(clock.relay_phase(), RelayPhase::WaitTxReady);
    assert_eq!(clock.relay_port_mask(), 0b1110);

    // now each timestamp completion releases one buffered follow-up
    for (i, context) in contexts.iter().enumerate() {
        let egress = ingress + Duration::from_micros(5);
        let actions = clock.handle_send_timestamp(*context, egress);
        let sent = actions
            .iter()
            .filter(|action| matches!(action, BridgeAction::SendGeneral { .. }))
            .count();
        assert_eq!(sent, 1, "completion {i} must release one follow-up");
    }
    assert_eq!(clock.relay_phase(), RelayPhase::NoAction);
    assert_eq!(clock.relay_port_mask(), 0);
}

#[test]
fn new_sync_while_cycle_pending_counts_a_discard() {
    let mut clock = boundary_with_three_masters();

    clock
        .handle_event_frame(1, &sync_frame(30, true, -3), Time::from_millis(1))
        .unwrap();
    assert_ne!(clock.relay_port_mask(), 0);
    let before = clock
        .port(clock.port_index(1).unwrap())
        .statistics()
        .rx_ptp_packet_discard_count;

    clock
        .handle_event_frame(1, &sync_frame(31, true, -3), Time::from_millis(2))
        .unwrap();
    let after = clock
        .port(clock.port_index(1).unwrap())
        .statistics()
        .rx_ptp_packet_discard_count;
    assert_eq!(after, before + 1);
    // the new cycle replaces the unfinished one
    assert_eq!(clock.relay_phase(), RelayPhase::WaitTx);
}

#[test]
fn mismatched_follow_up_is_dropped_by_the_relay() {
    // AED has no announce-based pairing watchdog in the dispatcher, so the
    // relay's own sequence guard handles the mismatch
    let mut config = InstanceConfig::gptp_boundary(LOCAL_ID);
    config.profile = Profile::Aed802Dot1As;
    let mut clock = BridgeClock::new(
        config,
        (0..2).map(|_| (PortConfig::default(), TestPeerDelay::default())),
    )
    .unwrap();
    for port in 1..=2 {
        bring_up(&mut clock, port);
    }
    make_master(&mut clock, 2);
    make_slave(&mut clock, 1);

    clock
        .handle_event_frame(1, &sync_frame(40, true, -3), Time::from_millis(1))
        .unwrap();
    let mask = clock.relay_port_mask();
    assert_ne!(mask, 0);

    let before = clock
        .port(clock.port_index(1).unwrap())
        .statistics()
        .rx_ptp_packet_discard_count;
    let actions = clock
        .handle_general_frame(1, &follow_up_frame(41))
        .unwrap();
    assert!(actions
        .iter()
        .all(|action| !matches!(action, BridgeAction::SendGeneral { .. })));
    let after = clock
        .port(clock.port_index(1).unwrap())
        .statistics()
        .rx_ptp_packet_discard_count;
    assert_eq!(after, before + 1);
    // the cycle stays armed for the matching follow-up
    assert_eq!(clock.relay_port_mask(), mask);
}

#[test]
fn mismatched_follow_up_forces_master_under_gptp() {
    let mut clock = boundary_with_three_masters();

    clock
        .handle_event_frame(1, &sync_frame(50, true, -3), Time::from_millis(1))
        .unwrap();
    clock
        .handle_general_frame(1, &follow_up_frame(51))
        .unwrap();
    assert_eq!(
        clock.port(clock.port_index(1).unwrap()).state(),
        PortState::Master
    );
    // tearing down the slave role also resets the relay
    assert_eq!(clock.relay_port_mask(), 0);
}

#[test]
fn one_step_sync_is_not_relayed_on_a_two_step_clock() {
    let mut clock = boundary_with_three_masters();

    let actions = clock
        .handle_event_frame(1, &sync_frame(60, false, -3), Time::from_millis(1))
        .unwrap();
    assert!(actions
        .iter()
        .all(|action| !matches!(action, BridgeAction::SendEvent { .. })));
    assert_eq!(clock.relay_phase(), RelayPhase::NoAction);
}

#[test]
fn announce_loop_is_discarded() {
    let mut clock = gptp_clock(1);
    bring_up(&mut clock, 1);

    let frame = announce_frame(&[REMOTE_ID, LOCAL_ID], 2);
    let before = clock
        .port(clock.port_index(1).unwrap())
        .statistics()
        .rx_ptp_packet_discard_count;
    let actions = clock.handle_general_frame(1, &frame).unwrap();

    assert!(actions
        .iter()
        .all(|action| !matches!(action, BridgeAction::RegisterAnnounce { .. })));
    let after = clock
        .port(clock.port_index(1).unwrap())
        .statistics()
        .rx_ptp_packet_discard_count;
    assert_eq!(after, before + 1);
}

#[test]
fn announce_with_too_many_steps_is_discarded() {
    let mut clock = gptp_clock(1);
    bring_up(&mut clock, 1);

    let actions = clock
        .handle_general_frame(1, &announce_frame(&[REMOTE_ID], 255))
        .unwrap();
    assert!(actions
        .iter()
        .all(|action| !matches!(action, BridgeAction::RegisterAnnounce { .. })));
    assert_eq!(
        clock
            .port(clock.port_index(1).unwrap())
            .statistics()
            .rx_ptp_packet_discard_count,
        1
    );
}

#[test]
fn clean_announce_reaches_the_bmca() {
    let mut clock = gptp_clock(1);
    bring_up(&mut clock, 1);

    let actions = clock
        .handle_general_frame(1, &announce_frame(&[REMOTE_ID], 2))
        .unwrap();
    assert!(actions
        .iter()
        .any(|action| matches!(action, BridgeAction::RegisterAnnounce { port: 1, .. })));
}

#[test]
fn signaling_unchanged_sentinel_leaves_sync_interval_alone() {
    let mut clock = gptp_clock(1);
    bring_up(&mut clock, 1);

    let before = clock
        .port(clock.port_index(1).unwrap())
        .intervals()
        .current_log_sync_interval;
    clock
        .handle_general_frame(
            1,
            &signaling_frame(MessageIntervalRequest {
                link_delay_interval: -128,
                time_sync_interval: -128,
                announce_interval: -128,
                flags: 0x03,
            }),
        )
        .unwrap();
    assert_eq!(
        clock
            .port(clock.port_index(1).unwrap())
            .intervals()
            .current_log_sync_interval,
        before
    );
}

#[test]
fn signaling_negotiates_a_new_pdelay_interval() {
    let mut clock = gptp_clock(1);
    bring_up(&mut clock, 1);

    clock
        .handle_general_frame(
            1,
            &signaling_frame(MessageIntervalRequest {
                link_delay_interval: 3,
                time_sync_interval: -128,
                announce_interval: -128,
                flags: 0x03,
            }),
        )
        .unwrap();

    let port = clock.port(clock.port_index(1).unwrap());
    assert_eq!(port.intervals().current_log_pdelay_req_interval, 3);
    assert_eq!(port.peer_delay().log_interval, 3);
}

#[test]
fn pdelay_messages_reach_the_collaborator_in_any_state() {
    let mut clock = gptp_clock(1);
    // the port is never brought past disabled
    let mut header = gptp_header(1);
    header.log_message_interval = 0x7f;
    let frame = Message::PDelayReq(crate::datastructures::messages::PDelayReqMessage {
        header,
        origin_timestamp: Default::default(),
    })
    .serialize_vec()
    .unwrap();

    clock
        .handle_event_frame(1, &frame, Time::from_micros(3))
        .unwrap();
    assert_eq!(
        clock.port(clock.port_index(1).unwrap()).peer_delay().req_count,
        1
    );
}

#[test]
fn slave_offset_measurement_completes() {
    let mut clock = boundary_with_three_masters();

    clock
        .handle_event_frame(1, &sync_frame(70, true, -3), Time::from_millis(1))
        .unwrap();
    assert!(clock.take_measurement().is_none());

    clock
        .handle_general_frame(1, &follow_up_frame(70))
        .unwrap();
    let measurement = clock.take_measurement().expect("measurement must complete");
    assert_eq!(measurement.event_time, Time::from_millis(1));
    // offset = t2 - t1 - mean link delay (100 ns from the collaborator),
    // with the link delay also folded into the relayed correction
    let expected =
        Time::from_millis(1) - Time::from_micros(10) - Duration::from_nanos(100) - Duration::from_nanos(100);
    assert_eq!(measurement.master_offset, expected);
}

#[test]
fn loss_of_announce_is_notified_when_slave_port_falls_back() {
    let mut clock = boundary_with_three_masters();

    let actions = clock
        .recommended_state(1, RecommendedPortState::Master)
        .unwrap();
    assert!(actions
        .iter()
        .any(|action| matches!(action, BridgeAction::Notify(Notification::LossOfAnnounce { port: 1 }))));
    assert_eq!(clock.slave_port(), 0);
}
