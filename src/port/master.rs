use super::SequenceIdGenerator;
use crate::actions::{
    actions, BridgeAction, PortTimer, TimerOp, TimestampContext, TimestampContextInner,
};
use crate::datastructures::common::PortIdentity;
use crate::datastructures::datasets::{CurrentDS, DefaultDS, ParentDS, TimePropertiesDS};
use crate::datastructures::messages::{
    AnnounceMessage, ControlField, DelayReqMessage, DelayRespMessage, FollowUpMessage,
    FollowUpTlvInfo, Header, Message, SyncMessage, SdoId,
};
use crate::time::{Interval, Time};

/// The message generation half of a MASTER port: its own Sync (plus
/// Follow_Up) and Announce senders, and the Delay_Req answering path.
///
/// Created when the port enters MASTER and dropped when it leaves, so
/// sequence numbering restarts with the role.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct MasterState {
    pub(crate) sync_seq_ids: SequenceIdGenerator,
    pub(crate) announce_seq_ids: SequenceIdGenerator,
    /// The rates the senders currently run at. During a slowdown these lag
    /// behind the negotiated rates until the grace period has passed.
    pub(crate) sync_log_msg_period: i8,
    pub(crate) announce_log_msg_period: i8,
    pub(crate) number_sync_transmissions: u8,
    pub(crate) number_announce_transmissions: u8,
}

pub(crate) struct MasterContext<'a> {
    pub port_number: u16,
    pub port_identity: PortIdentity,
    pub default_ds: &'a DefaultDS,
    pub sdo_id: SdoId,
    pub as2020: bool,
    pub two_step: bool,
}

fn port_mask(port_number: u16) -> u64 {
    1u64 << (port_number - 1)
}

impl MasterState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sends one Sync. The message advertises `advertised_log_interval`
    /// while the timer is re-armed for `restart_log_period`; the two only
    /// differ during an interval slowdown.
    pub(crate) fn send_sync(
        &mut self,
        ctx: &MasterContext<'_>,
        now: Time,
        advertised_log_interval: i8,
        restart_log_period: i8,
    ) -> Vec<BridgeAction> {
        log::trace!("sending sync message on port {}", ctx.port_number);

        let seq_id = self.sync_seq_ids.generate();
        let message = Message::Sync(SyncMessage {
            header: Header {
                sdo_id: ctx.sdo_id,
                domain_number: ctx.default_ds.domain_number,
                two_step_flag: ctx.two_step,
                sequence_id: seq_id,
                source_port_identity: ctx.port_identity,
                correction_field: now.subnano(),
                control_field: if ctx.as2020 {
                    ControlField::AllOthers
                } else {
                    ControlField::Sync
                },
                log_message_interval: advertised_log_interval,
                ..Default::default()
            },
            origin_timestamp: now.into(),
        });

        let frame = match message.serialize_vec() {
            Ok(frame) => frame,
            Err(error) => {
                log::error!("could not serialize sync: {error:?}");
                return actions![];
            }
        };

        actions![
            BridgeAction::Timer {
                port: ctx.port_number,
                timer: PortTimer::Sync,
                op: TimerOp::Start(Interval::from_log_2(restart_log_period).as_duration()),
            },
            BridgeAction::SendEvent {
                port_mask: port_mask(ctx.port_number),
                context: Some(TimestampContext {
                    inner: TimestampContextInner::MasterSync {
                        port: ctx.port_number,
                        id: seq_id,
                    },
                }),
                frame,
            }
        ]
    }

    pub(crate) fn handle_sync_timestamp(
        &mut self,
        ctx: &MasterContext<'_>,
        id: u16,
        timestamp: Time,
        follow_up_info: Option<&FollowUpTlvInfo>,
    ) -> Vec<BridgeAction> {
        let message = Message::FollowUp(FollowUpMessage {
            header: Header {
                sdo_id: ctx.sdo_id,
                domain_number: ctx.default_ds.domain_number,
                sequence_id: id,
                source_port_identity: ctx.port_identity,
                correction_field: timestamp.subnano(),
                control_field: if ctx.as2020 {
                    ControlField::AllOthers
                } else {
                    ControlField::FollowUp
                },
                log_message_interval: 0x7f,
                ..Default::default()
            },
            precise_origin_timestamp: timestamp.into(),
        });

        let mut frame = match message.serialize_vec() {
            Ok(frame) => frame,
            Err(error) => {
                log::error!("could not serialize sync follow up: {error:?}");
                return actions![];
            }
        };

        if let Some(info) = follow_up_info {
            if let Err(error) = info.append_tlv(&mut frame) {
                log::error!("could not append follow up information tlv: {error:?}");
                return actions![];
            }
        }

        actions![BridgeAction::SendGeneral {
            port_mask: port_mask(ctx.port_number),
            frame,
        }]
    }

    pub(crate) fn send_announce(
        &mut self,
        ctx: &MasterContext<'_>,
        now: Time,
        time_properties: &TimePropertiesDS,
        parent_ds: &ParentDS,
        current_ds: &CurrentDS,
        advertised_log_interval: i8,
        restart_log_period: i8,
    ) -> Vec<BridgeAction> {
        log::trace!("sending announce message on port {}", ctx.port_number);

        let message = Message::Announce(AnnounceMessage {
            header: Header {
                sdo_id: ctx.sdo_id,
                domain_number: ctx.default_ds.domain_number,
                leap59: time_properties.leap59,
                leap61: time_properties.leap61,
                current_utc_offset_valid: time_properties.current_utc_offset_valid,
                ptp_timescale: time_properties.ptp_timescale,
                time_tracable: time_properties.time_traceable,
                frequency_tracable: time_properties.frequency_traceable,
                sequence_id: self.announce_seq_ids.generate(),
                source_port_identity: ctx.port_identity,
                log_message_interval: advertised_log_interval,
                ..Default::default()
            },
            origin_timestamp: now.into(),
            current_utc_offset: time_properties.current_utc_offset,
            grandmaster_priority_1: parent_ds.grandmaster_priority_1,
            grandmaster_clock_quality: parent_ds.grandmaster_clock_quality,
            grandmaster_priority_2: parent_ds.grandmaster_priority_2,
            grandmaster_identity: parent_ds.grandmaster_identity,
            steps_removed: current_ds.steps_removed,
            time_source: time_properties.time_source,
        });

        let frame = match message.serialize_vec() {
            Ok(frame) => frame,
            Err(error) => {
                log::error!("could not serialize announce: {error:?}");
                return actions![];
            }
        };

        actions![
            BridgeAction::Timer {
                port: ctx.port_number,
                timer: PortTimer::Announce,
                op: TimerOp::Start(Interval::from_log_2(restart_log_period).as_duration()),
            },
            BridgeAction::SendGeneral {
                port_mask: port_mask(ctx.port_number),
                frame,
            }
        ]
    }

    pub(crate) fn handle_delay_req(
        &mut self,
        ctx: &MasterContext<'_>,
        message: DelayReqMessage,
        timestamp: Time,
        log_min_delay_req_interval: i8,
    ) -> Vec<BridgeAction> {
        log::debug!("received delay request on port {}", ctx.port_number);

        let mut header = message.header;
        header.two_step_flag = false;
        header.source_port_identity = ctx.port_identity;
        header.correction_field = crate::datastructures::common::TimeInterval(
            header.correction_field.0 + timestamp.subnano().0,
        );
        header.control_field = ControlField::DelayResp;
        header.log_message_interval = log_min_delay_req_interval;

        let response = Message::DelayResp(DelayRespMessage {
            header,
            receive_timestamp: timestamp.into(),
            requesting_port_identity: message.header.source_port_identity,
        });

        match response.serialize_vec() {
            Ok(frame) => actions![BridgeAction::SendGeneral {
                port_mask: port_mask(ctx.port_number),
                frame,
            }],
            Err(error) => {
                log::error!("could not serialize delay response: {error:?}");
                actions![]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use fixed::types::I48F16;

    use super::*;
    use crate::config::InstanceConfig;
    use crate::datastructures::common::{ClockIdentity, TimeInterval};

    fn context(default_ds: &DefaultDS) -> MasterContext<'_> {
        MasterContext {
            port_number: 1,
            port_identity: PortIdentity {
                clock_identity: default_ds.clock_identity,
                port_number: 1,
            },
            default_ds,
            sdo_id: SdoId::GPTP,
            as2020: true,
            two_step: true,
        }
    }

    fn default_ds() -> DefaultDS {
        DefaultDS::new(
            &InstanceConfig::gptp_boundary(ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8])),
            3,
        )
    }

    #[test]
    fn sync_and_follow_up_pair() {
        let default_ds = default_ds();
        let ctx = context(&default_ds);
        let mut state = MasterState::new();

        let mut actions = state
            .send_sync(&ctx, Time::from_micros(600), -3, -3)
            .into_iter();

        assert!(matches!(
            actions.next(),
            Some(BridgeAction::Timer {
                timer: PortTimer::Sync,
                op: TimerOp::Start(_),
                ..
            })
        ));
        let Some(BridgeAction::SendEvent {
            port_mask,
            context: Some(context),
            frame,
        }) = actions.next()
        else {
            panic!("expected an event send");
        };
        assert_eq!(port_mask, 0b1);
        assert!(actions.next().is_none());

        let sync = match Message::deserialize(&frame).unwrap() {
            Message::Sync(m) => m,
            other => panic!("unexpected message {other:?}"),
        };
        assert!(sync.header.two_step_flag);

        let TimestampContextInner::MasterSync { port, id } = context.inner else {
            panic!("unexpected context");
        };
        assert_eq!(port, 1);
        assert_eq!(id, sync.header.sequence_id);

        let egress = Time::from_fixed_nanos(600_100.5f64);
        let mut actions = state
            .handle_sync_timestamp(&ctx, id, egress, None)
            .into_iter();
        let Some(BridgeAction::SendGeneral { frame, .. }) = actions.next() else {
            panic!("expected a follow up");
        };
        assert!(actions.next().is_none());

        let follow_up = match Message::deserialize(&frame).unwrap() {
            Message::FollowUp(m) => m,
            other => panic!("unexpected message {other:?}"),
        };
        assert_eq!(follow_up.header.sequence_id, id);
        assert_eq!(
            Time::from(follow_up.precise_origin_timestamp),
            Time::from_fixed_nanos(600_100)
        );
        assert_eq!(
            follow_up.header.correction_field,
            TimeInterval(I48F16::from_num(0.5))
        );
    }

    #[test]
    fn delay_req_is_answered_in_kind() {
        let default_ds = default_ds();
        let ctx = context(&default_ds);
        let mut state = MasterState::new();

        let requester = PortIdentity {
            clock_identity: ClockIdentity([9; 8]),
            port_number: 4,
        };
        let request = DelayReqMessage {
            header: Header {
                sequence_id: 5123,
                source_port_identity: requester,
                correction_field: TimeInterval(I48F16::from_bits(400)),
                ..Default::default()
            },
            origin_timestamp: Time::from_micros(0).into(),
        };

        let mut actions = state
            .handle_delay_req(
                &ctx,
                request,
                Time::from_fixed_nanos(fixed::types::U96F32::from_bits(
                    (200_000u128 << 32) as u128 + ((500u128) << 16),
                )),
                2,
            )
            .into_iter();

        let Some(BridgeAction::SendGeneral { frame, .. }) = actions.next() else {
            panic!("expected a delay response");
        };
        assert!(actions.next().is_none());

        let response = match Message::deserialize(&frame).unwrap() {
            Message::DelayResp(m) => m,
            other => panic!("unexpected message {other:?}"),
        };
        assert_eq!(response.requesting_port_identity, requester);
        assert_eq!(response.header.sequence_id, 5123);
        assert_eq!(response.header.log_message_interval, 2);
        assert_eq!(
            response.header.correction_field,
            TimeInterval(I48F16::from_bits(900))
        );
    }
}
