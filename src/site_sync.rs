//! 802.1AS boundary Sync/Follow_Up forwarding ("site sync").
//!
//! Every two-step Sync taken in on the time-selected port is re-emitted on
//! every other MASTER port with that port's own identity. Once both the
//! per-port egress timestamp and the upstream Follow_Up are known, a
//! corrected Follow_Up goes out on the same port: the correction is the
//! port's residence time plus the receive link's delay asymmetry.

use crate::actions::{
    actions, BridgeAction, PortTimer, TimerOp, TimestampContext, TimestampContextInner,
};
use crate::clock::{BridgeClock, PortIndex, MAX_PORTS};
use crate::datastructures::common::{PortIdentity, TimeInterval};
use crate::datastructures::messages::{
    follow_up, header, ControlField, FollowUpMessage, FollowUpTlvInfo, Header, Message,
    PtpVersion, SyncMessage,
};
use crate::datastructures::WireFormatError;
use crate::peer_delay::PeerDelay;
use crate::port::PortState;
use crate::time::{Duration, Interval, Time};
use crate::MAX_DATA_LEN;

/// Everything remembered from a Sync ingress for the rest of its relay
/// cycle.
#[derive(Debug, Clone)]
pub(crate) struct SyncCycle {
    /// The upstream header; per-port fields are rewritten at egress.
    pub header: Header,
    pub ingress_time: Time,
    /// The receive link's configured delay asymmetry, folded into every
    /// forwarded correction.
    pub delay_asymmetry: TimeInterval,
    /// Bit set for a port exactly while a Sync went out on it and its
    /// Follow_Up has not been forwarded yet.
    pub port_mask: u64,
    pub residence_time: [Option<Duration>; MAX_PORTS],
}

impl SyncCycle {
    fn all_timestamps_in(&self) -> bool {
        (0..MAX_PORTS)
            .filter(|i| self.port_mask & (1 << i) != 0)
            .all(|i| self.residence_time[i].is_some())
    }
}

/// The relay's cycle state. Each variant carries exactly the data that is
/// valid in it, so a stale buffer cannot be read by construction.
#[derive(Debug, Clone, Default)]
pub(crate) enum SyncFollowUpAction {
    /// No cycle in progress. Holds exactly when the port mask is zero.
    #[default]
    NoAction,
    /// Syncs sent, awaiting egress timestamps; no Follow_Up seen yet.
    WaitTx { cycle: SyncCycle },
    /// The upstream Follow_Up arrived before some egress timestamps; it is
    /// buffered and goes out per port as the timestamps come in.
    WaitTxReady { cycle: SyncCycle, payload: Vec<u8> },
    /// All egress timestamps are in, awaiting the upstream Follow_Up.
    WaitReady { cycle: SyncCycle },
}

/// The observable phase of the relay, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    NoAction,
    WaitTx,
    WaitTxReady,
    WaitReady,
}

/// The per-instance site-sync state. Exclusively owned and mutated here;
/// no other component writes the mask, the saved header or the residence
/// times.
#[derive(Debug, Default)]
pub(crate) struct SiteSyncState {
    pub(crate) action: SyncFollowUpAction,
    /// Neighbor rate ratio of the time-selected port, sampled at Sync
    /// ingress.
    pub(crate) rate_ratio: f64,
}

impl SiteSyncState {
    pub(crate) fn new() -> Self {
        Self {
            action: SyncFollowUpAction::NoAction,
            rate_ratio: 1.0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.action = SyncFollowUpAction::NoAction;
    }

    pub(crate) fn port_mask(&self) -> u64 {
        match &self.action {
            SyncFollowUpAction::NoAction => 0,
            SyncFollowUpAction::WaitTx { cycle }
            | SyncFollowUpAction::WaitTxReady { cycle, .. }
            | SyncFollowUpAction::WaitReady { cycle } => cycle.port_mask,
        }
    }

    pub(crate) fn phase(&self) -> RelayPhase {
        match &self.action {
            SyncFollowUpAction::NoAction => RelayPhase::NoAction,
            SyncFollowUpAction::WaitTx { .. } => RelayPhase::WaitTx,
            SyncFollowUpAction::WaitTxReady { .. } => RelayPhase::WaitTxReady,
            SyncFollowUpAction::WaitReady { .. } => RelayPhase::WaitReady,
        }
    }
}

/// Copies a received Follow_Up and rewrites the per-port egress fields.
fn forwarded_follow_up(
    payload: &[u8],
    identity: PortIdentity,
    as2020: bool,
    correction: TimeInterval,
    cumulative_rate_offset: i32,
    gm_update: Option<&FollowUpTlvInfo>,
) -> Result<Vec<u8>, WireFormatError> {
    let mut frame = payload.to_vec();
    header::patch::set_source_port_identity(&mut frame, identity)?;
    header::patch::add_to_correction_field(&mut frame, correction)?;
    header::patch::set_minor_version(&mut frame, if as2020 { 1 } else { 0 })?;
    header::patch::set_control_field(
        &mut frame,
        if as2020 {
            ControlField::AllOthers
        } else {
            ControlField::FollowUp
        },
    )?;
    follow_up::patch::set_cumulative_rate_offset(&mut frame, cumulative_rate_offset);
    if let Some(info) = gm_update {
        follow_up::patch::set_gm_change(&mut frame, info);
    }
    Ok(frame)
}

impl<P: PeerDelay> BridgeClock<P> {
    /// Relays a Sync received on the time-selected port to every other
    /// MASTER port. Two-step operation records the cycle for the
    /// Follow_Up; one-step operation folds the correction into the frame
    /// and is done.
    pub(crate) fn relay_sync(
        &mut self,
        rx: PortIndex,
        frame: &[u8],
        sync: &SyncMessage,
        ingress: Time,
    ) -> Vec<BridgeAction> {
        if self.site_sync.is_none() {
            return actions![];
        }

        let mut all = actions![];
        let header = sync.header;
        let rx_number = rx.port_number();

        self.parent_ds.parent_log_sync_interval = header.log_message_interval;
        let rate_ratio = self.ports[rx.0].peer_delay.neighbor_rate_ratio();

        let receipt_periods = self.ports[rx.0].config.gptp.sync_receipt_timeout;
        let receipt_timeout = Interval::from_log_2(header.log_message_interval).as_duration()
            * receipt_periods as i64;

        if self.config.two_step {
            let site = self.site_sync.as_mut().expect("checked above");
            site.rate_ratio = rate_ratio;

            if !matches!(site.action, SyncFollowUpAction::WaitTx { .. }) {
                all.push(BridgeAction::Timer {
                    port: rx_number,
                    timer: PortTimer::SyncReceipt,
                    op: TimerOp::Start(receipt_timeout),
                });
            }

            if site.port_mask() != 0 {
                log::warn!(
                    "missed follow-up or unfinished sync relay cycle, seq {}",
                    header.sequence_id
                );
                if matches!(
                    site.action,
                    SyncFollowUpAction::WaitTx { .. } | SyncFollowUpAction::WaitReady { .. }
                ) {
                    self.ports[rx.0].statistics.rx_ptp_packet_discard_count += 1;
                }
                let site = self.site_sync.as_mut().expect("checked above");
                site.action = SyncFollowUpAction::NoAction;
            }

            if !header.two_step_flag {
                log::info!(
                    "received one-step sync on two-step configured port {rx_number}; not relayed"
                );
                return all;
            }

            let mut cycle = SyncCycle {
                header,
                ingress_time: ingress,
                delay_asymmetry: self.ports[rx.0].config.delay_asymmetry,
                port_mask: 0,
                residence_time: [None; MAX_PORTS],
            };

            all.extend(self.forward_sync_per_port(rx, &header, sync, &mut cycle, None));

            if cycle.port_mask != 0 {
                let site = self.site_sync.as_mut().expect("checked above");
                site.action = SyncFollowUpAction::WaitTx { cycle };
            }
        } else {
            // one-step: the hardware folds the residence time into the
            // correction field of the forwarded frame itself
            let site = self.site_sync.as_mut().expect("checked above");
            site.rate_ratio = rate_ratio;
            all.push(BridgeAction::Timer {
                port: rx_number,
                timer: PortTimer::SyncReceipt,
                op: TimerOp::Start(receipt_timeout),
            });

            let mut cycle = SyncCycle {
                header,
                ingress_time: ingress,
                delay_asymmetry: self.ports[rx.0].config.delay_asymmetry,
                port_mask: 0,
                residence_time: [None; MAX_PORTS],
            };
            all.extend(self.forward_sync_per_port(rx, &header, sync, &mut cycle, Some(frame)));
        }

        all
    }

    /// One forwarded Sync per eligible MASTER port. With `one_step_frame`
    /// set the received frame is copied and patched; otherwise a fresh
    /// two-step Sync is serialized and a timestamp context attached.
    fn forward_sync_per_port(
        &mut self,
        rx: PortIndex,
        header: &Header,
        sync: &SyncMessage,
        cycle: &mut SyncCycle,
        one_step_frame: Option<&[u8]>,
    ) -> Vec<BridgeAction> {
        let mut all = actions![];
        let parent_interval = header.log_message_interval;
        let cumulative_rate_offset = self.parent_ds.cumulative_rate_ratio;

        for i in 0..self.ports.len() {
            if i == rx.0 {
                continue;
            }
            let port = &mut self.ports[i];
            if port.state != PortState::Master || port.config.virtual_port {
                continue;
            }

            let prev_locked = port.sync_locked;
            port.sync_locked = port.intervals.current_log_sync_interval == parent_interval;
            let lost_lock = prev_locked && !port.sync_locked;
            if !port.sync_locked && !lost_lock {
                continue;
            }

            let advertised = if port.sync_locked {
                parent_interval
            } else {
                port.intervals.current_log_sync_interval
            };
            let as2020 = port.config.gptp.as2020;
            let port_number = port.identity.port_number;

            let frame = if let Some(received) = one_step_frame {
                let mut fwd = received.to_vec();
                let patched = header::patch::set_source_port_identity(&mut fwd, port.identity)
                    .and_then(|()| header::patch::set_log_message_interval(&mut fwd, advertised))
                    .and_then(|()| {
                        header::patch::set_minor_version(&mut fwd, if as2020 { 1 } else { 0 })
                    });
                if let Err(error) = patched {
                    log::error!("could not patch one-step sync for port {port_number}: {error:?}");
                    continue;
                }
                follow_up::patch::set_cumulative_rate_offset(&mut fwd, cumulative_rate_offset);
                fwd
            } else {
                let mut fwd_header = *header;
                fwd_header.source_port_identity = port.identity;
                fwd_header.log_message_interval = advertised;
                fwd_header.version = PtpVersion {
                    major: 2,
                    minor: if as2020 { 1 } else { 0 },
                };
                fwd_header.control_field = if as2020 {
                    ControlField::AllOthers
                } else {
                    ControlField::Sync
                };
                let message = Message::Sync(SyncMessage {
                    header: fwd_header,
                    origin_timestamp: sync.origin_timestamp,
                });
                match message.serialize_vec() {
                    Ok(frame) => frame,
                    Err(error) => {
                        log::error!("could not serialize relayed sync: {error:?}");
                        continue;
                    }
                }
            };

            let context = one_step_frame.is_none().then_some(TimestampContext {
                inner: TimestampContextInner::RelaySync { port: port_number },
            });
            if context.is_some() {
                cycle.port_mask |= 1 << i;
                cycle.residence_time[i] = None;
            }

            port.statistics.tx_sync_count += 1;
            all.push(BridgeAction::SendEvent {
                port_mask: 1u64 << i,
                context,
                frame,
            });
            log::debug!(
                "forwarded sync seq {} to port {port_number}",
                header.sequence_id
            );

            if lost_lock {
                // the port falls back to generating its own syncs
                all.push(BridgeAction::Timer {
                    port: port_number,
                    timer: PortTimer::Sync,
                    op: TimerOp::Start(
                        Interval::from_log_2(port.intervals.current_log_sync_interval)
                            .as_duration(),
                    ),
                });
            }
        }

        all
    }

    /// The hardware reported the egress timestamp of a relayed Sync. The
    /// port's residence time is now known; with the Follow_Up already
    /// buffered it goes out immediately, otherwise the relay keeps
    /// waiting.
    pub(crate) fn relay_sync_transmitted(
        &mut self,
        index: PortIndex,
        tx_time: Time,
    ) -> Vec<BridgeAction> {
        let port_number = index.port_number();
        if self.ports[index.0].state != PortState::Master {
            log::warn!("sync egress timestamp on port {port_number} that is not master");
            return actions![];
        }

        let Some(site) = self.site_sync.as_mut() else {
            return actions![];
        };
        let rate_ratio = site.rate_ratio;
        let scale = self.config.scale_residence_time;
        let action = core::mem::take(&mut site.action);

        let mut all = actions![];
        let new_action = match action {
            SyncFollowUpAction::NoAction => {
                log::debug!("stale sync egress timestamp on port {port_number}");
                SyncFollowUpAction::NoAction
            }
            SyncFollowUpAction::WaitTx { mut cycle } => {
                self.record_residence(&mut cycle, index, tx_time, rate_ratio, scale);
                if cycle.all_timestamps_in() {
                    SyncFollowUpAction::WaitReady { cycle }
                } else {
                    SyncFollowUpAction::WaitTx { cycle }
                }
            }
            SyncFollowUpAction::WaitReady { mut cycle } => {
                // a timestamp for a port whose bit is long handled
                self.record_residence(&mut cycle, index, tx_time, rate_ratio, scale);
                SyncFollowUpAction::WaitReady { cycle }
            }
            SyncFollowUpAction::WaitTxReady { mut cycle, payload } => {
                self.record_residence(&mut cycle, index, tx_time, rate_ratio, scale);

                if cycle.port_mask & (1 << index.0) != 0 {
                    if let Some(residence) = cycle.residence_time[index.0] {
                        let correction = TimeInterval(
                            TimeInterval::from(residence).0 + cycle.delay_asymmetry.0,
                        );
                        let port = &mut self.ports[index.0];
                        match forwarded_follow_up(
                            &payload,
                            port.identity,
                            port.config.gptp.as2020,
                            correction,
                            self.parent_ds.cumulative_rate_ratio,
                            self.local_gm_update.then_some(&self.follow_up_info),
                        ) {
                            Ok(frame) => {
                                cycle.port_mask &= !(1 << index.0);
                                port.statistics.tx_follow_up_count += 1;
                                all.push(BridgeAction::SendGeneral {
                                    port_mask: 1u64 << index.0,
                                    frame,
                                });
                                log::debug!("forwarded buffered follow-up to port {port_number}");
                            }
                            Err(error) => {
                                log::error!(
                                    "could not build forwarded follow-up for port {port_number}: {error:?}"
                                );
                            }
                        }
                    }
                }

                if cycle.port_mask == 0 {
                    SyncFollowUpAction::NoAction
                } else {
                    SyncFollowUpAction::WaitTxReady { cycle, payload }
                }
            }
        };

        if let Some(site) = self.site_sync.as_mut() {
            site.action = new_action;
        }
        all
    }

    fn record_residence(
        &mut self,
        cycle: &mut SyncCycle,
        index: PortIndex,
        tx_time: Time,
        rate_ratio: f64,
        scale: bool,
    ) {
        let mut residence = tx_time - cycle.ingress_time;
        if scale {
            // convert into the grandmaster time base
            residence = residence * rate_ratio;
        }
        // residence times above 50 ms are implausible for a
        // store-and-forward bridge; logged but never rejected
        if residence.abs() > Duration::from_millis(50) {
            log::warn!(
                "large residence time {residence} on port {}",
                index.port_number()
            );
        }
        cycle.residence_time[index.0] = Some(residence);
        log::debug!(
            "sync egress on port {}, residence {residence}",
            index.port_number()
        );
    }

    /// Relays the upstream Follow_Up: each MASTER port whose residence
    /// time is already known gets a corrected copy, the rest wait for
    /// their egress timestamps with the payload buffered.
    pub(crate) fn relay_follow_up(
        &mut self,
        rx: PortIndex,
        frame: &[u8],
        follow_up: &FollowUpMessage,
    ) -> Vec<BridgeAction> {
        if !self.config.two_step {
            log::info!("no forwarding of follow-up messages in one-step mode");
            return actions![];
        }
        let Some(site) = self.site_sync.as_mut() else {
            return actions![];
        };
        let action = core::mem::take(&mut site.action);

        let mut cycle = match action {
            SyncFollowUpAction::NoAction => {
                log::info!("follow-up received with no sync relay cycle in progress");
                return actions![];
            }
            SyncFollowUpAction::WaitTx { cycle } | SyncFollowUpAction::WaitReady { cycle } => cycle,
            SyncFollowUpAction::WaitTxReady { cycle, .. } => {
                // a second follow-up while one is already buffered
                cycle
            }
        };

        if follow_up.header.sequence_id != cycle.header.sequence_id {
            log::warn!(
                "follow-up seq {} does not match relayed sync seq {}; dropped",
                follow_up.header.sequence_id,
                cycle.header.sequence_id
            );
            self.ports[rx.0].statistics.rx_ptp_packet_discard_count += 1;
            // the cycle stays armed for the matching follow-up
            if let Some(site) = self.site_sync.as_mut() {
                site.action = if cycle.all_timestamps_in() {
                    SyncFollowUpAction::WaitReady { cycle }
                } else {
                    SyncFollowUpAction::WaitTx { cycle }
                };
            }
            return actions![];
        }

        let mut all = actions![];
        for i in 0..self.ports.len() {
            if cycle.port_mask & (1 << i) == 0 {
                continue;
            }
            if self.ports[i].state != PortState::Master {
                // the port left master mid-cycle; its bit cannot complete
                cycle.port_mask &= !(1 << i);
                continue;
            }
            let Some(residence) = cycle.residence_time[i] else {
                continue;
            };

            let correction =
                TimeInterval(TimeInterval::from(residence).0 + cycle.delay_asymmetry.0);
            let port = &mut self.ports[i];
            match forwarded_follow_up(
                frame,
                port.identity,
                port.config.gptp.as2020,
                correction,
                self.parent_ds.cumulative_rate_ratio,
                self.local_gm_update.then_some(&self.follow_up_info),
            ) {
                Ok(fwd) => {
                    cycle.port_mask &= !(1 << i);
                    port.statistics.tx_follow_up_count += 1;
                    log::debug!(
                        "forwarded follow-up seq {} to port {}",
                        follow_up.header.sequence_id,
                        port.identity.port_number
                    );
                    all.push(BridgeAction::SendGeneral {
                        port_mask: 1u64 << i,
                        frame: fwd,
                    });
                }
                Err(error) => {
                    log::error!("could not build forwarded follow-up: {error:?}");
                }
            }
        }

        let new_action = if cycle.port_mask == 0 {
            log::debug!("follow-up relay cycle complete");
            SyncFollowUpAction::NoAction
        } else if frame.len() <= MAX_DATA_LEN {
            SyncFollowUpAction::WaitTxReady {
                cycle,
                payload: frame.to_vec(),
            }
        } else {
            // nothing sensible to buffer; abandon the stragglers
            log::error!("oversized follow-up cannot be buffered; relay cycle abandoned");
            self.ports[rx.0].statistics.rx_ptp_packet_discard_count += 1;
            SyncFollowUpAction::NoAction
        };

        if let Some(site) = self.site_sync.as_mut() {
            site.action = new_action;
        }
        all
    }

    /// The relay phase, for diagnostics.
    pub fn relay_phase(&self) -> RelayPhase {
        self.site_sync
            .as_ref()
            .map(SiteSyncState::phase)
            .unwrap_or(RelayPhase::NoAction)
    }

    /// The relay's pending-port mask. Zero exactly while no cycle is in
    /// progress.
    pub fn relay_port_mask(&self) -> u64 {
        self.site_sync
            .as_ref()
            .map(SiteSyncState::port_mask)
            .unwrap_or(0)
    }
}
