use serde::{Deserialize, Serialize};

/// Configuration of a PCEP session, sent to the PCE in the Open message
/// and used to judge the PCE's own Open proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum period in seconds between two consecutive messages this PCC
    /// sends. Advertised in the Open message.
    pub keep_alive_seconds: u8,
    /// Seconds of silence after which the peer should consider this PCC
    /// dead. Advertised in the Open message.
    pub dead_timer_seconds: u8,
    /// Seconds to wait for a PCRep after sending a PCReq
    pub request_time_seconds: u16,
    /// Replies to requests this PCC never issued are tolerated this many
    /// times before the session is closed
    pub max_unknown_requests: u32,
    /// Messages that fail to decode are tolerated this many times before
    /// the session is closed
    pub max_unknown_messages: u32,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// A remote Open is only acceptable when its dead timer is at least
    /// this multiple of its keepalive
    pub min_dead_timer_factor: u8,
    /// Seconds to wait for the PCE's Open after the TCP connection is up
    /// (RFC 5440 recommends 60)
    pub open_keep_wait_seconds: u16,
    /// TLV types that must be present in the remote Open for the session
    /// to be acceptable
    pub required_capabilities: Vec<u16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keep_alive_seconds: 30,
            dead_timer_seconds: 120,
            request_time_seconds: 30,
            max_unknown_requests: 5,
            max_unknown_messages: 5,
            connect_timeout_ms: 10000,
            min_dead_timer_factor: 2,
            open_keep_wait_seconds: 60,
            required_capabilities: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SessionConfig;

    #[test]
    pub fn test_config_serde_round_trip() {
        crate::tests::init();
        let config = SessionConfig {
            keep_alive_seconds: 10,
            required_capabilities: vec![16],
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
