//! The clock instance: port arena, datasets and the state transition
//! engine.

use arrayvec::ArrayVec;

use crate::actions::{
    actions, BridgeAction, Notification, PortTimer, TimerOp, TimestampContext,
    TimestampContextInner,
};
use crate::config::{
    ConfigError, DelayMechanism, DeviceRole, InstanceConfig, PortConfig, Profile,
    TransportProtocol,
};
use crate::datastructures::common::PortIdentity;
use crate::datastructures::datasets::{CurrentDS, DefaultDS, ParentDS, TimePropertiesDS};
use crate::datastructures::messages::{
    ControlField, FollowUpTlvInfo, Header, IntervalRequestFlags, Message, PathTrace,
    SignalingMessage,
};
use crate::peer_delay::PeerDelay;
use crate::port::{MasterState, Measurement, Port, PortState, SlaveState};
use crate::port::master::MasterContext;
use crate::site_sync::SiteSyncState;
use crate::time::{Interval, Time};

#[cfg(test)]
mod tests;

/// Upper bound on ports per instance; the relay's port mask has one bit
/// per port.
pub const MAX_PORTS: usize = 32;

/// A checked index into the port arena. Obtained from a 1-based port
/// number through [`BridgeClock::port_index`]; an out-of-range number is
/// rejected there instead of corrupting anything downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortIndex(pub(crate) usize);

impl PortIndex {
    pub fn port_number(self) -> u16 {
        self.0 as u16 + 1
    }
}

/// What the BMCA recommends a port become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendedPortState {
    /// The port should be master (any of the M1/M2/M3 decision points).
    Master,
    Uncalibrated,
    Slave,
    Passive,
    Unchanged,
}

/// One PTP domain instance of the bridge.
///
/// All entry points take `&mut self` and run to completion; the exclusive
/// borrow is the instance-wide critical section. Frames and timer
/// programming come back as [`BridgeAction`]s for the embedding to execute
/// once the borrow ends.
pub struct BridgeClock<P> {
    pub(crate) config: InstanceConfig,
    pub(crate) default_ds: DefaultDS,
    pub(crate) parent_ds: ParentDS,
    pub(crate) current_ds: CurrentDS,
    pub(crate) time_properties_ds: TimePropertiesDS,
    pub(crate) ports: ArrayVec<Port<P>, MAX_PORTS>,

    /// Port number of the current slave port; 0 when none is selected.
    pub(crate) slave_port: u16,
    /// Index into the embedding's unicast master table, when one is
    /// selected.
    pub(crate) selected_master: Option<u16>,
    pub(crate) slave: Option<SlaveState>,

    /// Only used by 802.1AS boundary operation.
    pub(crate) site_sync: Option<SiteSyncState>,
    pub(crate) follow_up_info: FollowUpTlvInfo,
    pub(crate) local_gm_update: bool,

    pub(crate) path_trace: PathTrace,
    /// True while the local clock servo is still locking; internal ports
    /// count as link-down for the duration.
    pub(crate) clock_locking: bool,
    pub(crate) virtual_port_selected: bool,
}

impl<P: PeerDelay> BridgeClock<P> {
    /// Creates the instance with one entry per port: its configuration and
    /// its peer-delay collaborator.
    pub fn new(
        config: InstanceConfig,
        port_setup: impl IntoIterator<Item = (PortConfig, P)>,
    ) -> Result<Self, ConfigError> {
        if let Some(vid) = config.vlan_id {
            if vid >= 4096 {
                return Err(ConfigError::BadVlanId);
            }
        }

        let mut ports = ArrayVec::new();
        for (port_config, peer_delay) in port_setup {
            let identity = PortIdentity {
                clock_identity: config.clock_identity,
                port_number: ports.len() as u16 + 1,
            };
            let mut port = Port::new(port_config, identity, peer_delay);
            port.intervals
                .reset_to_configured(&port.config, config.profile);
            ports.try_push(port).map_err(|_| ConfigError::TooManyPorts)?;
        }

        let default_ds = DefaultDS::new(&config, ports.len() as u16);
        let site_sync = config.profile.is_802_1as().then(SiteSyncState::new);

        Ok(Self {
            config,
            default_ds,
            parent_ds: ParentDS::default(),
            current_ds: CurrentDS::default(),
            time_properties_ds: TimePropertiesDS::default(),
            ports,
            slave_port: 0,
            selected_master: None,
            slave: None,
            site_sync,
            follow_up_info: FollowUpTlvInfo::default(),
            local_gm_update: false,
            path_trace: PathTrace::new(),
            clock_locking: false,
            virtual_port_selected: false,
        })
    }

    /// Resolves a 1-based port number to a checked index.
    pub fn port_index(&self, port_number: u16) -> Result<PortIndex, ConfigError> {
        if port_number >= 1 && (port_number as usize) <= self.ports.len() {
            Ok(PortIndex(port_number as usize - 1))
        } else {
            Err(ConfigError::BadPortNumber)
        }
    }

    pub fn port(&self, index: PortIndex) -> &Port<P> {
        &self.ports[index.0]
    }

    pub(crate) fn port_mut(&mut self, index: PortIndex) -> &mut Port<P> {
        &mut self.ports[index.0]
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port<P>> {
        self.ports.iter()
    }

    pub fn slave_port(&self) -> u16 {
        self.slave_port
    }

    pub fn default_ds(&self) -> &DefaultDS {
        &self.default_ds
    }

    pub fn parent_ds(&self) -> &ParentDS {
        &self.parent_ds
    }

    pub fn parent_ds_mut(&mut self) -> &mut ParentDS {
        &mut self.parent_ds
    }

    pub fn current_ds(&self) -> &CurrentDS {
        &self.current_ds
    }

    pub fn time_properties_ds_mut(&mut self) -> &mut TimePropertiesDS {
        &mut self.time_properties_ds
    }

    /// Installs new grandmaster change metadata; set `gm_update` while the
    /// phase/frequency fields must be stamped into forwarded Follow_Ups.
    pub fn set_follow_up_info(&mut self, info: FollowUpTlvInfo, gm_update: bool) {
        self.follow_up_info = info;
        self.local_gm_update = gm_update;
    }

    /// The path trace of the most recently qualified Announce.
    pub fn path_trace(&self) -> &PathTrace {
        &self.path_trace
    }

    /// Records which entry of the embedding's unicast master table the
    /// instance is tracking.
    pub fn set_selected_master(&mut self, selected: Option<u16>) {
        self.selected_master = selected;
    }

    pub fn selected_master(&self) -> Option<u16> {
        self.selected_master
    }

    /// Hands out the completed slave offset measurement, once.
    pub fn take_measurement(&mut self) -> Option<Measurement> {
        self.slave.as_mut()?.extract_measurement()
    }

    // ------------------------------------------------------------------
    // enable / disable / link state
    // ------------------------------------------------------------------

    pub fn enable_port(&mut self, port_number: u16) -> Result<Vec<BridgeAction>, ConfigError> {
        let index = self.port_index(port_number)?;
        let port = self.port_mut(index);
        if port.designated_enabled {
            return Ok(actions![]);
        }
        port.designated_enabled = true;

        let link_up = self.link_effectively_up(index);
        if self.port(index).state == PortState::Disabled && link_up {
            Ok(self.transition(index, PortState::Initializing))
        } else if self.port(index).state != PortState::Disabled && !link_up {
            Ok(self.transition(index, PortState::Disabled))
        } else {
            Ok(actions![])
        }
    }

    pub fn disable_port(&mut self, port_number: u16) -> Result<Vec<BridgeAction>, ConfigError> {
        let index = self.port_index(port_number)?;
        let port = self.port_mut(index);
        if !port.designated_enabled {
            return Ok(actions![]);
        }
        port.designated_enabled = false;

        if self.port(index).state != PortState::Disabled {
            log::info!("port {port_number} disabled");
            Ok(self.transition(index, PortState::Disabled))
        } else {
            Ok(actions![])
        }
    }

    /// Reports a physical link state change. Under the 1-PPS protocol the
    /// link state is recorded but never acted on.
    pub fn set_link_state(
        &mut self,
        port_number: u16,
        link_up: bool,
    ) -> Result<Vec<BridgeAction>, ConfigError> {
        let index = self.port_index(port_number)?;
        self.port_mut(index).link_up = link_up;
        log::info!("port {port_number} link state {link_up}");

        if self.config.protocol == TransportProtocol::OnePps {
            return Ok(actions![]);
        }

        Ok(self.evaluate_link(index))
    }

    /// Re-evaluates the internal-link-down condition after the local clock
    /// servo moved into or out of the locking phase.
    pub fn set_clock_locking(&mut self, locking: bool) -> Vec<BridgeAction> {
        self.clock_locking = locking;
        if self.config.protocol == TransportProtocol::OnePps {
            return actions![];
        }

        let mut all = actions![];
        for i in 0..self.ports.len() {
            all.extend(self.evaluate_link(PortIndex(i)));
        }
        all
    }

    /// Whether the port may operate: designated enabled, link up and not
    /// held down by the internal-port rule. Under the 1-PPS protocol the
    /// physical link state does not matter.
    fn link_effectively_up(&self, index: PortIndex) -> bool {
        let port = self.port(index);
        if !port.designated_enabled {
            return false;
        }
        if self.config.protocol == TransportProtocol::OnePps {
            return true;
        }
        let internal_link_down = self.clock_locking && port.config.internal;
        port.link_up && !internal_link_down
    }

    fn evaluate_link(&mut self, index: PortIndex) -> Vec<BridgeAction> {
        let effectively_up = self.link_effectively_up(index);

        if effectively_up && self.port(index).state == PortState::Disabled {
            self.transition(index, PortState::Initializing)
        } else if !effectively_up && self.port(index).state != PortState::Disabled {
            self.transition(index, PortState::Disabled)
        } else {
            actions![]
        }
    }

    // ------------------------------------------------------------------
    // BMCA recommendation
    // ------------------------------------------------------------------

    /// Applies a BMCA recommendation to one port.
    pub fn recommended_state(
        &mut self,
        port_number: u16,
        recommendation: RecommendedPortState,
    ) -> Result<Vec<BridgeAction>, ConfigError> {
        let index = self.port_index(port_number)?;
        let port = self.port(index);
        let current = port.state;
        log::debug!(
            "port {port_number} current state {current}, recommended {recommendation:?}"
        );

        let new_state = match recommendation {
            RecommendedPortState::Unchanged => return Ok(actions![]),
            RecommendedPortState::Master => {
                if port.config.virtual_port {
                    if current == PortState::Disabled {
                        PortState::Disabled
                    } else {
                        PortState::Listening
                    }
                } else if !matches!(
                    current,
                    PortState::Initializing | PortState::Faulty | PortState::Disabled
                ) {
                    if self.config.device_role != DeviceRole::SlaveOnly
                        && self.default_ds.clock_quality.clock_class != 255
                    {
                        PortState::Master
                    } else {
                        PortState::Listening
                    }
                } else {
                    current
                }
            }
            RecommendedPortState::Uncalibrated | RecommendedPortState::Slave => {
                PortState::Uncalibrated
            }
            RecommendedPortState::Passive => PortState::Passive,
        };

        if new_state != current {
            Ok(self.transition(index, new_state))
        } else {
            Ok(actions![])
        }
    }

    // ------------------------------------------------------------------
    // the transition engine
    // ------------------------------------------------------------------

    /// Moves a port to `new_state`, running the leave side effects of the
    /// old state first and the enter side effects of the new state after;
    /// enter effects may rely on the leave effects having completed.
    pub(crate) fn transition(&mut self, index: PortIndex, new_state: PortState) -> Vec<BridgeAction> {
        let port_number = index.port_number();
        let old_state = self.port(index).state;
        if old_state == new_state {
            return actions![];
        }
        log::info!("port {port_number}: {old_state} -> {new_state}");

        let mut all = actions![];

        // leave side effects
        match old_state {
            PortState::Master => {
                let port = self.port_mut(index);
                port.master = None;
                all.push(BridgeAction::Timer {
                    port: port_number,
                    timer: PortTimer::Sync,
                    op: TimerOp::Stop,
                });
                all.push(BridgeAction::Timer {
                    port: port_number,
                    timer: PortTimer::Announce,
                    op: TimerOp::Stop,
                });
            }
            PortState::Disabled => {
                let profile = self.config.profile;
                let port = self.port_mut(index);
                port.intervals.reset_to_configured(&port.config, profile);
            }
            PortState::Listening
                if matches!(
                    new_state,
                    PortState::Master | PortState::Uncalibrated | PortState::Passive
                ) =>
            {
                if !self.port(index).config.virtual_port {
                    if self.config.profile.is_802_1as() {
                        if self.port(index).config.delay_mechanism != DelayMechanism::CommonP2p {
                            all.extend(self.send_message_interval_request(index));
                        }
                    } else {
                        let profile = self.config.profile;
                        let port = self.port_mut(index);
                        port.intervals.reset_to_configured(&port.config, profile);
                    }
                }
            }
            PortState::Slave | PortState::Uncalibrated
                if !matches!(
                    new_state,
                    PortState::Slave | PortState::Uncalibrated | PortState::Passive
                ) =>
            {
                if self.slave_port == port_number || self.slave_port == 0 {
                    self.slave = None;
                    self.slave_port = 0;
                    if self.selected_master.take().is_some() {
                        log::info!("slave port {port_number} lost connection to master");
                    }
                    all.push(BridgeAction::Notify(Notification::LossOfAnnounce {
                        port: port_number,
                    }));
                    all.extend(self.set_relay_active(false));
                }
            }
            _ => {}
        }

        // enter side effects
        match new_state {
            PortState::Initializing | PortState::Faulty => {}
            PortState::Disabled => {
                // a timer firing against a disabled port must be impossible
                for timer in [
                    PortTimer::Announce,
                    PortTimer::Sync,
                    PortTimer::DelayRequest,
                    PortTimer::AnnounceReceipt,
                    PortTimer::SyncReceipt,
                    PortTimer::GptpCapable,
                ] {
                    all.push(BridgeAction::Timer {
                        port: port_number,
                        timer,
                        op: TimerOp::Stop,
                    });
                }
            }
            PortState::Listening => {}
            PortState::Master => {
                let is_virtual = self.port(index).config.virtual_port;
                let aed = self.config.profile == Profile::Aed802Dot1As;
                if !(is_virtual && aed) {
                    let relay_active = self.config.profile.is_802_1as() && self.slave_port != 0;
                    let intervals = self.port(index).intervals;

                    let mut master = MasterState::new();
                    master.sync_log_msg_period = intervals.current_log_sync_interval;
                    master.announce_log_msg_period = intervals.current_log_announce_interval;
                    self.port_mut(index).master = Some(master);

                    if !relay_active && intervals.current_log_sync_interval != Interval::STOPPED {
                        all.push(BridgeAction::Timer {
                            port: port_number,
                            timer: PortTimer::Sync,
                            op: TimerOp::Start(
                                Interval::from_log_2(intervals.current_log_sync_interval)
                                    .as_duration(),
                            ),
                        });
                    }
                    if !aed && !is_virtual {
                        all.push(BridgeAction::Timer {
                            port: port_number,
                            timer: PortTimer::Announce,
                            op: TimerOp::Start(
                                Interval::from_log_2(intervals.current_log_announce_interval)
                                    .as_duration(),
                            ),
                        });
                    }
                }
            }
            PortState::Passive => {}
            PortState::Uncalibrated => {
                self.slave = Some(SlaveState::new(self.parent_ds.parent_port_identity));
                self.slave_port = port_number;
                self.current_ds.delay_ok = false;

                let is_virtual = self.port(index).config.virtual_port;
                if is_virtual {
                    self.virtual_port_selected = true;
                    all.push(BridgeAction::Notify(Notification::VirtualPortReference {
                        port: port_number,
                        selected: true,
                    }));
                } else if self.virtual_port_selected {
                    self.virtual_port_selected = false;
                    all.push(BridgeAction::Notify(Notification::VirtualPortReference {
                        port: port_number,
                        selected: false,
                    }));
                }

                all.extend(self.set_relay_active(true));
            }
            PortState::Slave => {}
            PortState::P2pTransparent | PortState::E2eTransparent | PortState::FrontEnd => {}
        }

        self.port_mut(index).state = new_state;
        all
    }

    /// Activates or deactivates the site-sync relay: while relayed Syncs
    /// replace locally generated ones, MASTER ports stop their own sync
    /// senders.
    fn set_relay_active(&mut self, active: bool) -> Vec<BridgeAction> {
        if !self.config.profile.is_802_1as() {
            return actions![];
        }

        let mut all = actions![];
        for i in 0..self.ports.len() {
            let port = &self.ports[i];
            if !port.is_operational_master() || port.identity.port_number == self.slave_port {
                continue;
            }
            let port_number = port.identity.port_number;
            if active {
                all.push(BridgeAction::Timer {
                    port: port_number,
                    timer: PortTimer::Sync,
                    op: TimerOp::Stop,
                });
            } else if port.intervals.current_log_sync_interval != Interval::STOPPED {
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

        if !active {
            if let Some(site_sync) = self.site_sync.as_mut() {
                site_sync.reset();
            }
        }

        all
    }

    // ------------------------------------------------------------------
    // periodic housekeeping
    // ------------------------------------------------------------------

    /// The housekeeping tick. Faulty ports re-enter initialization (the
    /// self-heal path) and initializing ports settle into their
    /// operational state.
    pub fn tick(&mut self) -> Vec<BridgeAction> {
        let mut all = actions![];
        for i in 0..self.ports.len() {
            let index = PortIndex(i);
            match self.port(index).state {
                PortState::Faulty => {
                    all.extend(self.transition(index, PortState::Initializing));
                }
                PortState::Initializing => {
                    let target = match self.config.device_role {
                        DeviceRole::P2pTransparent => PortState::P2pTransparent,
                        DeviceRole::E2eTransparent => PortState::E2eTransparent,
                        DeviceRole::FrontEnd => PortState::FrontEnd,
                        _ => PortState::Listening,
                    };
                    all.extend(self.transition(index, target));
                }
                _ => {}
            }
        }
        all
    }

    // ------------------------------------------------------------------
    // timers
    // ------------------------------------------------------------------

    /// The per-port sync timer fired: a MASTER port generates its own
    /// Sync. Resolves a pending interval slowdown first, so a slower
    /// negotiated rate takes effect only after the grace period.
    pub fn handle_sync_timer(
        &mut self,
        port_number: u16,
        now: Time,
    ) -> Result<Vec<BridgeAction>, ConfigError> {
        let index = self.port_index(port_number)?;
        if self.port(index).state != PortState::Master {
            log::debug!("sync timer fired on non-master port {port_number}");
            return Ok(actions![]);
        }

        let sync_receipt_timeout = self.port(index).config.gptp.sync_receipt_timeout;
        let current = self.port(index).intervals.current_log_sync_interval;
        let slowdown = self.port(index).intervals.sync_slowdown;

        let Some(mut master) = self.port_mut(index).master.take() else {
            return Ok(actions![]);
        };

        if slowdown {
            if master.number_sync_transmissions >= sync_receipt_timeout {
                master.sync_log_msg_period = current;
                master.number_sync_transmissions = 0;
                self.port_mut(index).intervals.sync_slowdown = false;
            } else {
                master.number_sync_transmissions += 1;
            }
        } else {
            master.number_sync_transmissions = 0;
            master.sync_log_msg_period = current;
        }
        let period = master.sync_log_msg_period;

        if period == Interval::STOPPED {
            // check again in a second whether the period changed
            self.port_mut(index).master = Some(master);
            return Ok(actions![BridgeAction::Timer {
                port: port_number,
                timer: PortTimer::Sync,
                op: TimerOp::Start(Interval::ONE_SECOND.as_duration()),
            }]);
        }

        let advertised = if self.port(index).intervals.sync_slowdown {
            current
        } else {
            period
        };

        let default_ds = self.default_ds;
        let ctx = self.master_context(index, &default_ds);
        let result = master.send_sync(&ctx, now, advertised, period);
        self.port_mut(index).master = Some(master);
        if !result.is_empty() {
            self.port_mut(index).statistics.tx_sync_count += 1;
        }
        Ok(result)
    }

    /// The per-port announce timer fired.
    pub fn handle_announce_timer(
        &mut self,
        port_number: u16,
        now: Time,
    ) -> Result<Vec<BridgeAction>, ConfigError> {
        let index = self.port_index(port_number)?;
        if self.port(index).state != PortState::Master {
            return Ok(actions![]);
        }

        let announce_receipt_timeout = self.port(index).config.announce_receipt_timeout;
        let current = self.port(index).intervals.current_log_announce_interval;
        let slowdown = self.port(index).intervals.announce_slowdown;

        let Some(mut master) = self.port_mut(index).master.take() else {
            return Ok(actions![]);
        };

        if slowdown {
            if master.number_announce_transmissions >= announce_receipt_timeout {
                master.announce_log_msg_period = current;
                master.number_announce_transmissions = 0;
                self.port_mut(index).intervals.announce_slowdown = false;
            } else {
                master.number_announce_transmissions += 1;
            }
        } else {
            master.number_announce_transmissions = 0;
            master.announce_log_msg_period = current;
        }
        let period = master.announce_log_msg_period;

        let advertised = if self.port(index).intervals.announce_slowdown {
            current
        } else {
            period
        };

        let default_ds = self.default_ds;
        let ctx = self.master_context(index, &default_ds);
        let time_properties = self.time_properties_ds;
        let parent_ds = self.parent_ds;
        let current_ds = self.current_ds;
        let result = master.send_announce(
            &ctx,
            now,
            &time_properties,
            &parent_ds,
            &current_ds,
            advertised,
            period,
        );
        self.port_mut(index).master = Some(master);
        if !result.is_empty() {
            self.port_mut(index).statistics.tx_announce_count += 1;
        }
        Ok(result)
    }

    /// The gPTP-capable receipt timeout fired: the neighbor stopped
    /// confirming it speaks gPTP.
    pub fn handle_gptp_capable_timeout(
        &mut self,
        port_number: u16,
    ) -> Result<Vec<BridgeAction>, ConfigError> {
        let index = self.port_index(port_number)?;
        if self.port(index).neighbor_gptp_capable {
            log::info!("port {port_number}: neighbor no longer gPTP capable");
            self.port_mut(index).neighbor_gptp_capable = false;
        }
        Ok(actions![])
    }

    // ------------------------------------------------------------------
    // egress timestamps
    // ------------------------------------------------------------------

    /// Feeds back the hardware egress timestamp of an earlier event
    /// transmit. This is the only asynchronous completion in the system;
    /// the embedding must serialize it through the same instance lock as
    /// everything else.
    pub fn handle_send_timestamp(
        &mut self,
        context: TimestampContext,
        timestamp: Time,
    ) -> Vec<BridgeAction> {
        match context.inner {
            TimestampContextInner::RelaySync { port } => {
                let Ok(index) = self.port_index(port) else {
                    log::warn!("egress timestamp for unknown port {port}");
                    return actions![];
                };
                self.relay_sync_transmitted(index, timestamp)
            }
            TimestampContextInner::MasterSync { port, id } => {
                let Ok(index) = self.port_index(port) else {
                    log::warn!("egress timestamp for unknown port {port}");
                    return actions![];
                };
                if self.port(index).state != PortState::Master {
                    log::debug!("sync egress timestamp on non-master port {port}");
                    return actions![];
                }
                let default_ds = self.default_ds;
                let ctx = self.master_context(index, &default_ds);
                let follow_up_info = self
                    .config
                    .profile
                    .is_802_1as()
                    .then_some(self.follow_up_info);
                let Some(mut master) = self.port_mut(index).master.take() else {
                    return actions![];
                };
                let result =
                    master.handle_sync_timestamp(&ctx, id, timestamp, follow_up_info.as_ref());
                self.port_mut(index).master = Some(master);
                if !result.is_empty() {
                    self.port_mut(index).statistics.tx_follow_up_count += 1;
                }
                result
            }
        }
    }

    // ------------------------------------------------------------------
    // message-interval request emission
    // ------------------------------------------------------------------

    /// Builds and sends the message-interval request Signaling message for
    /// a port, per the first-request/unchanged-sentinel rules.
    pub(crate) fn send_message_interval_request(&mut self, index: PortIndex) -> Vec<BridgeAction> {
        let port_number = index.port_number();
        if self.port(index).config.delay_mechanism == DelayMechanism::CommonP2p {
            return actions![];
        }

        let as2020 = self.port(index).config.gptp.as2020;
        let flags = IntervalRequestFlags {
            compute_neighbor_rate_ratio: self.port(index).peer_delay.compute_neighbor_rate_ratio(),
            compute_mean_link_delay: self.port(index).peer_delay.compute_mean_link_delay(),
            one_step_receive_capable: !self.config.two_step,
        }
        .to_byte(as2020);

        let port = self.port_mut(index);
        let request = port.intervals.build_request(&port.config, flags);
        let sequence_id = port.signaling_seq_ids.generate();
        let identity = port.identity;

        let message = Message::Signaling(SignalingMessage {
            header: Header {
                sdo_id: self.config.sdo_id,
                domain_number: self.default_ds.domain_number,
                sequence_id,
                source_port_identity: identity,
                control_field: if as2020 {
                    ControlField::AllOthers
                } else {
                    ControlField::Management
                },
                log_message_interval: 0x7f,
                ..Default::default()
            },
            // all-ones: any port of any clock on the link
            target_port_identity: PortIdentity {
                clock_identity: crate::datastructures::common::ClockIdentity([0xff; 8]),
                port_number: 0xffff,
            },
        });

        let mut frame = match message.serialize_vec() {
            Ok(frame) => frame,
            Err(error) => {
                log::error!("could not serialize signaling message: {error:?}");
                return actions![];
            }
        };

        let mut tlv = [0u8; 16];
        let tlv_len = match request.serialize_tlv(&mut tlv) {
            Ok(len) => len,
            Err(error) => {
                log::error!("could not serialize interval request tlv: {error:?}");
                return actions![];
            }
        };
        frame.extend_from_slice(&tlv[..tlv_len]);
        crate::datastructures::messages::update_message_length(&mut frame);

        log::debug!(
            "port {port_number}: interval request anv={} syv={} mpr={}",
            request.announce_interval,
            request.time_sync_interval,
            request.link_delay_interval,
        );

        actions![BridgeAction::SendGeneral {
            port_mask: 1u64 << (port_number - 1),
            frame,
        }]
    }

    pub(crate) fn master_context<'a>(
        &self,
        index: PortIndex,
        default_ds: &'a DefaultDS,
    ) -> MasterContext<'a> {
        let port = self.port(index);
        MasterContext {
            port_number: port.identity.port_number,
            port_identity: port.identity,
            default_ds,
            sdo_id: self.config.sdo_id,
            as2020: port.config.gptp.as2020,
            two_step: self.config.two_step,
        }
    }

    // ------------------------------------------------------------------
    // received frames
    // ------------------------------------------------------------------

    /// Takes in an event frame with its hardware ingress timestamp.
    pub fn handle_event_frame(
        &mut self,
        port_number: u16,
        frame: &[u8],
        ingress: Time,
    ) -> Result<Vec<BridgeAction>, ConfigError> {
        let index = self.port_index(port_number)?;
        Ok(crate::dispatch::incoming(self, index, frame, Some(ingress)))
    }

    /// Takes in a general frame.
    pub fn handle_general_frame(
        &mut self,
        port_number: u16,
        frame: &[u8],
    ) -> Result<Vec<BridgeAction>, ConfigError> {
        let index = self.port_index(port_number)?;
        Ok(crate::dispatch::incoming(self, index, frame, None))
    }
}
