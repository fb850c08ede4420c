use crate::config::{PortConfig, Profile};
use crate::datastructures::messages::MessageIntervalRequest;
use crate::time::Interval;

/// Resolves a configured log interval against the 126/127 sentinels.
fn configured_or_default(configured: i8, profile_default: i8) -> i8 {
    if configured == Interval::INITIAL || configured == Interval::STOPPED {
        profile_default
    } else {
        configured
    }
}

/// The operational message rates of one port, as negotiated with the link
/// peer, next to the administrative configuration they started from.
///
/// A rate only ever gets *slower* through the slowdown path: the old rate
/// is kept for one more period before the new one takes effect, so the
/// peer's receipt timeout (armed for the old rate) cannot fire in the gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageIntervalState {
    pub current_log_announce_interval: i8,
    pub current_log_sync_interval: i8,
    pub current_log_pdelay_req_interval: i8,
    pub current_log_gptp_capable_interval: i8,

    pub announce_slowdown: bool,
    pub sync_slowdown: bool,
    pub gptp_capable_slowdown: bool,

    transmitted_log_announce_interval: i8,
    transmitted_log_sync_interval: i8,
    transmitted_log_pdelay_req_interval: i8,
    first_request: bool,
}

impl Default for MessageIntervalState {
    fn default() -> Self {
        Self {
            current_log_announce_interval: 0,
            current_log_sync_interval: -3,
            current_log_pdelay_req_interval: 0,
            current_log_gptp_capable_interval: 3,
            announce_slowdown: false,
            sync_slowdown: false,
            gptp_capable_slowdown: false,
            transmitted_log_announce_interval: 0,
            transmitted_log_sync_interval: 0,
            transmitted_log_pdelay_req_interval: 0,
            first_request: true,
        }
    }
}

impl MessageIntervalState {
    /// Re-derives the operational intervals from configuration: the
    /// administrative pins win, the 126/127 sentinels select the profile
    /// defaults, and the AED profile always takes its initial values.
    /// Under a gPTP profile this also re-arms the first-request latch of
    /// the emission side.
    pub(crate) fn reset_to_configured(&mut self, config: &PortConfig, profile: Profile) {
        let (announce_default, sync_default, pdelay_default) = profile.default_log_intervals();

        if profile.is_802_1as() {
            self.first_request = true;
        }

        self.current_log_announce_interval = match config.gptp.mgt_settable_log_announce_interval {
            Some(pinned) => pinned,
            None => configured_or_default(config.log_announce_interval, announce_default),
        };

        self.current_log_sync_interval = if profile == Profile::Aed802Dot1As {
            config.gptp.initial_log_sync_interval
        } else {
            match config.gptp.mgt_settable_log_sync_interval {
                Some(pinned) => pinned,
                None => configured_or_default(config.log_sync_interval, sync_default),
            }
        };

        self.current_log_pdelay_req_interval = if profile == Profile::Aed802Dot1As {
            config.gptp.initial_log_pdelay_req_interval
        } else {
            match config.gptp.mgt_settable_log_pdelay_req_interval {
                Some(pinned) => pinned,
                None => configured_or_default(config.log_min_pdelay_req_interval, pdelay_default),
            }
        };

        self.current_log_gptp_capable_interval =
            match config.gptp.mgt_settable_log_gptp_capable_message_interval {
                Some(pinned) => pinned,
                None => configured_or_default(
                    config.gptp.initial_log_gptp_capable_message_interval,
                    profile.default_log_gptp_capable_interval(),
                ),
            };

        self.announce_slowdown = false;
        self.sync_slowdown = false;
        self.gptp_capable_slowdown = false;
    }

    /// Applies a received message-interval request (organization subtype
    /// 2) to the announce, sync and pdelay rates. Sentinel -128 leaves a
    /// rate alone, 126 selects the configured value, and an
    /// administratively pinned rate ignores the request entirely.
    pub(crate) fn apply_request(
        &mut self,
        config: &PortConfig,
        profile: Profile,
        request: &MessageIntervalRequest,
    ) {
        if !profile.is_802_1as() {
            return;
        }

        if request.announce_interval != Interval::UNCHANGED
            && config.gptp.mgt_settable_log_announce_interval.is_none()
        {
            let old = self.current_log_announce_interval;
            self.current_log_announce_interval = if request.announce_interval == Interval::INITIAL {
                config.log_announce_interval
            } else {
                request.announce_interval
            };
            self.announce_slowdown = self.current_log_announce_interval > old;
        }

        if request.time_sync_interval != Interval::UNCHANGED
            && config.gptp.mgt_settable_log_sync_interval.is_none()
        {
            let old = self.current_log_sync_interval;
            self.current_log_sync_interval = if request.time_sync_interval == Interval::INITIAL {
                config.log_sync_interval
            } else {
                request.time_sync_interval
            };
            self.sync_slowdown = self.current_log_sync_interval > old;
        }

        if request.link_delay_interval != Interval::UNCHANGED
            && config.gptp.mgt_settable_log_pdelay_req_interval.is_none()
        {
            self.current_log_pdelay_req_interval = if request.link_delay_interval
                == Interval::INITIAL
            {
                config.log_min_pdelay_req_interval
            } else {
                request.link_delay_interval
            };
        }
    }

    /// Applies a received gPTP-capable message-interval request (subtype
    /// 5). Evaluated completely independently of [`Self::apply_request`].
    pub(crate) fn apply_gptp_capable_request(
        &mut self,
        config: &PortConfig,
        profile: Profile,
        requested: i8,
    ) {
        if !profile.is_802_1as() {
            return;
        }
        if requested == Interval::UNCHANGED
            || config
                .gptp
                .mgt_settable_log_gptp_capable_message_interval
                .is_some()
        {
            return;
        }

        let old = self.current_log_gptp_capable_interval;
        self.current_log_gptp_capable_interval = if requested == Interval::INITIAL {
            config.gptp.initial_log_gptp_capable_message_interval
        } else {
            requested
        };
        self.gptp_capable_slowdown = self.current_log_gptp_capable_interval > old;
    }

    /// Builds the next request to send to the peer. The first request
    /// after the latch was armed carries the absolute configured values;
    /// later ones carry the -128 sentinel for anything unchanged since the
    /// last successful send.
    pub(crate) fn build_request(&mut self, config: &PortConfig, flags: u8) -> MessageIntervalRequest {
        let request = if self.first_request {
            MessageIntervalRequest {
                link_delay_interval: config.log_min_pdelay_req_interval,
                time_sync_interval: config.log_sync_interval,
                announce_interval: config.log_announce_interval,
                flags,
            }
        } else {
            let sentinel_if_same = |configured: i8, transmitted: i8| {
                if configured == transmitted {
                    Interval::UNCHANGED
                } else {
                    configured
                }
            };
            MessageIntervalRequest {
                link_delay_interval: sentinel_if_same(
                    config.log_min_pdelay_req_interval,
                    self.transmitted_log_pdelay_req_interval,
                ),
                time_sync_interval: sentinel_if_same(
                    config.log_sync_interval,
                    self.transmitted_log_sync_interval,
                ),
                announce_interval: sentinel_if_same(
                    config.log_announce_interval,
                    self.transmitted_log_announce_interval,
                ),
                flags,
            }
        };

        self.transmitted_log_announce_interval = config.log_announce_interval;
        self.transmitted_log_sync_interval = config.log_sync_interval;
        self.transmitted_log_pdelay_req_interval = config.log_min_pdelay_req_interval;
        self.first_request = false;

        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gptp_state_and_config() -> (MessageIntervalState, PortConfig) {
        let config = PortConfig {
            log_announce_interval: 0,
            log_sync_interval: -3,
            log_min_pdelay_req_interval: 0,
            ..Default::default()
        };
        let mut state = MessageIntervalState::default();
        state.reset_to_configured(&config, Profile::Ieee802Dot1As);
        (state, config)
    }

    #[test]
    fn first_request_carries_absolute_values() {
        let (mut state, config) = gptp_state_and_config();

        let first = state.build_request(&config, 0x03);
        assert_eq!(first.announce_interval, 0);
        assert_eq!(first.time_sync_interval, -3);
        assert_eq!(first.link_delay_interval, 0);

        let second = state.build_request(&config, 0x03);
        assert_eq!(second.announce_interval, Interval::UNCHANGED);
        assert_eq!(second.time_sync_interval, Interval::UNCHANGED);
        assert_eq!(second.link_delay_interval, Interval::UNCHANGED);
    }

    #[test]
    fn changed_configuration_resends_absolute_value() {
        let (mut state, mut config) = gptp_state_and_config();
        let _ = state.build_request(&config, 0);

        config.log_sync_interval = -2;
        let request = state.build_request(&config, 0);
        assert_eq!(request.time_sync_interval, -2);
        assert_eq!(request.announce_interval, Interval::UNCHANGED);
    }

    #[test]
    fn unchanged_sentinel_leaves_rate_alone() {
        let (mut state, config) = gptp_state_and_config();
        let before = state.current_log_sync_interval;

        state.apply_request(
            &config,
            Profile::Ieee802Dot1As,
            &MessageIntervalRequest {
                link_delay_interval: -128,
                time_sync_interval: -128,
                announce_interval: -128,
                flags: 0,
            },
        );

        assert_eq!(state.current_log_sync_interval, before);
        assert!(!state.sync_slowdown);
    }

    #[test]
    fn slower_rate_enters_slowdown_once() {
        let (mut state, config) = gptp_state_and_config();
        assert_eq!(state.current_log_sync_interval, -3);

        let request = MessageIntervalRequest {
            link_delay_interval: -128,
            time_sync_interval: 0,
            announce_interval: -128,
            flags: 0,
        };

        state.apply_request(&config, Profile::Ieee802Dot1As, &request);
        assert_eq!(state.current_log_sync_interval, 0);
        assert!(state.sync_slowdown);

        // the identical request again: same rate, no second slowdown
        state.apply_request(&config, Profile::Ieee802Dot1As, &request);
        assert_eq!(state.current_log_sync_interval, 0);
        assert!(!state.sync_slowdown);
    }

    #[test]
    fn faster_rate_applies_immediately() {
        let (mut state, config) = gptp_state_and_config();

        state.apply_request(
            &config,
            Profile::Ieee802Dot1As,
            &MessageIntervalRequest {
                link_delay_interval: -128,
                time_sync_interval: -5,
                announce_interval: -128,
                flags: 0,
            },
        );
        assert_eq!(state.current_log_sync_interval, -5);
        assert!(!state.sync_slowdown);
    }

    #[test]
    fn initial_sentinel_restores_configured_value() {
        let (mut state, config) = gptp_state_and_config();

        state.apply_request(
            &config,
            Profile::Ieee802Dot1As,
            &MessageIntervalRequest {
                link_delay_interval: -128,
                time_sync_interval: -6,
                announce_interval: -128,
                flags: 0,
            },
        );
        assert_eq!(state.current_log_sync_interval, -6);

        state.apply_request(
            &config,
            Profile::Ieee802Dot1As,
            &MessageIntervalRequest {
                link_delay_interval: -128,
                time_sync_interval: 126,
                announce_interval: -128,
                flags: 0,
            },
        );
        assert_eq!(state.current_log_sync_interval, config.log_sync_interval);
    }

    #[test]
    fn pinned_interval_ignores_requests() {
        let mut config = PortConfig::default();
        config.gptp.mgt_settable_log_sync_interval = Some(-4);
        let mut state = MessageIntervalState::default();
        state.reset_to_configured(&config, Profile::Ieee802Dot1As);
        assert_eq!(state.current_log_sync_interval, -4);

        state.apply_request(
            &config,
            Profile::Ieee802Dot1As,
            &MessageIntervalRequest {
                link_delay_interval: -128,
                time_sync_interval: 2,
                announce_interval: -128,
                flags: 0,
            },
        );
        assert_eq!(state.current_log_sync_interval, -4);
    }

    #[test]
    fn gptp_capable_request_is_independent() {
        let (mut state, config) = gptp_state_and_config();
        let sync_before = state.current_log_sync_interval;

        state.apply_gptp_capable_request(&config, Profile::Ieee802Dot1As, 5);
        assert_eq!(state.current_log_gptp_capable_interval, 5);
        assert!(state.gptp_capable_slowdown);
        assert_eq!(state.current_log_sync_interval, sync_before);
        assert!(!state.sync_slowdown);
    }

    #[test]
    fn non_gptp_profile_never_negotiates() {
        let config = PortConfig::default();
        let mut state = MessageIntervalState::default();
        state.reset_to_configured(&config, Profile::Ieee1588);
        let before = state;

        state.apply_request(
            &config,
            Profile::Ieee1588,
            &MessageIntervalRequest {
                link_delay_interval: 4,
                time_sync_interval: 4,
                announce_interval: 4,
                flags: 0,
            },
        );
        assert_eq!(state, before);
    }
}
