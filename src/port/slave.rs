use super::Measurement;
use crate::datastructures::common::PortIdentity;
use crate::datastructures::messages::{FollowUpMessage, SyncMessage};
use crate::time::{Duration, Time};

/// The offset computation state bound to the slave port.
///
/// One per clock instance; re-initialized whenever the slave port changes
/// or leaves the slave role.
#[derive(Debug, Default, Clone)]
pub(crate) struct SlaveState {
    pub(crate) remote_master: PortIdentity,
    sync_id: Option<u16>,
    sync_recv_time: Option<Time>,
    sync_send_time: Option<Time>,
    sync_correction: Option<Duration>,
    pending_follow_up: Option<FollowUpMessage>,
    measurement: Option<Measurement>,
}

impl SlaveState {
    pub(crate) fn new(remote_master: PortIdentity) -> Self {
        Self {
            remote_master,
            ..Default::default()
        }
    }

    /// Takes in a Sync received on the slave port. `mean_link_delay` comes
    /// from the peer-delay collaborator of that port.
    pub(crate) fn handle_sync(
        &mut self,
        message: &SyncMessage,
        recv_time: Time,
        mean_link_delay: Option<Duration>,
    ) {
        log::debug!("handling sync, seq {}", message.header.sequence_id);

        self.sync_id = Some(message.header.sequence_id);
        self.sync_recv_time = Some(recv_time);

        if message.header.two_step_flag {
            self.sync_correction = Some(Duration::from(message.header.correction_field));
            self.sync_send_time = None;
        } else {
            self.sync_correction = None;
            self.sync_send_time = Some(
                Time::from(message.origin_timestamp)
                    + Duration::from(message.header.correction_field),
            );
        }

        if let Some(follow_up) = self.pending_follow_up.take() {
            self.handle_follow_up(&follow_up, mean_link_delay);
        }

        self.finish_offset_measurement(mean_link_delay);
    }

    /// Takes in the Follow_Up matching an earlier two-step Sync. A
    /// Follow_Up running ahead of its Sync is kept for one message.
    pub(crate) fn handle_follow_up(
        &mut self,
        message: &FollowUpMessage,
        mean_link_delay: Option<Duration>,
    ) {
        log::debug!("handling followup, seq {}", message.header.sequence_id);

        if self.sync_id != Some(message.header.sequence_id) {
            self.pending_follow_up = Some(*message);
            return;
        }

        self.pending_follow_up = None;

        let Some(sync_correction) = self.sync_correction.take() else {
            return;
        };
        self.sync_send_time = Some(
            Time::from(message.precise_origin_timestamp)
                + Duration::from(message.header.correction_field)
                + sync_correction,
        );

        self.finish_offset_measurement(mean_link_delay);
    }

    fn finish_offset_measurement(&mut self, mean_link_delay: Option<Duration>) {
        let (Some(recv), Some(send), Some(delay)) =
            (self.sync_recv_time, self.sync_send_time, mean_link_delay)
        else {
            return;
        };

        self.measurement = Some(Measurement {
            event_time: recv,
            master_offset: recv - send - delay,
        });
        self.sync_recv_time = None;
        self.sync_send_time = None;
        self.sync_id = None;
        self.sync_correction = None;
    }

    /// Hands out the completed measurement, once.
    pub(crate) fn extract_measurement(&mut self) -> Option<Measurement> {
        self.measurement.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::TimeInterval;
    use crate::datastructures::messages::Header;
    use fixed::types::I48F16;

    fn sync(seq: u16, two_step: bool, origin_nanos: u64, correction: i64) -> SyncMessage {
        SyncMessage {
            header: Header {
                sequence_id: seq,
                two_step_flag: two_step,
                correction_field: TimeInterval(I48F16::from_num(correction)),
                ..Default::default()
            },
            origin_timestamp: Time::from_nanos(origin_nanos).into(),
        }
    }

    fn follow_up(seq: u16, origin_nanos: u64, correction: i64) -> FollowUpMessage {
        FollowUpMessage {
            header: Header {
                sequence_id: seq,
                correction_field: TimeInterval(I48F16::from_num(correction)),
                ..Default::default()
            },
            precise_origin_timestamp: Time::from_nanos(origin_nanos).into(),
        }
    }

    #[test]
    fn one_step_sync_completes_directly() {
        let mut state = SlaveState::new(PortIdentity::default());
        let delay = Some(Duration::from_nanos(100));

        state.handle_sync(&sync(1, false, 1000, 10), Time::from_nanos(1500), delay);

        assert_eq!(
            state.extract_measurement(),
            Some(Measurement {
                event_time: Time::from_nanos(1500),
                master_offset: Duration::from_nanos(390),
            })
        );
        assert_eq!(state.extract_measurement(), None);
    }

    #[test]
    fn two_step_needs_the_follow_up() {
        let mut state = SlaveState::new(PortIdentity::default());
        let delay = Some(Duration::from_nanos(100));

        state.handle_sync(&sync(7, true, 0, 10), Time::from_nanos(2000), delay);
        assert_eq!(state.extract_measurement(), None);

        state.handle_follow_up(&follow_up(7, 1000, 5), delay);
        assert_eq!(
            state.extract_measurement(),
            Some(Measurement {
                event_time: Time::from_nanos(2000),
                master_offset: Duration::from_nanos(2000 - 1000 - 5 - 10 - 100),
            })
        );
    }

    #[test]
    fn early_follow_up_waits_for_its_sync() {
        let mut state = SlaveState::new(PortIdentity::default());
        let delay = Some(Duration::from_nanos(100));

        state.handle_follow_up(&follow_up(9, 1000, 5), delay);
        assert_eq!(state.extract_measurement(), None);

        state.handle_sync(&sync(9, true, 0, 10), Time::from_nanos(2000), delay);
        assert_eq!(
            state.extract_measurement(),
            Some(Measurement {
                event_time: Time::from_nanos(2000),
                master_offset: Duration::from_nanos(885),
            })
        );
    }

    #[test]
    fn mismatched_follow_up_is_not_matched() {
        let mut state = SlaveState::new(PortIdentity::default());
        let delay = Some(Duration::from_nanos(0));

        state.handle_sync(&sync(3, true, 0, 0), Time::from_nanos(100), delay);
        state.handle_follow_up(&follow_up(4, 50, 0), delay);
        assert_eq!(state.extract_measurement(), None);
    }
}
