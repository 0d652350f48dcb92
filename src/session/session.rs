use std::collections::HashSet;

use super::config::SessionConfig;
use super::counters::SessionCounters;
use super::{SessionId, SessionState};
use crate::message::Message;
use crate::socket::SocketComm;
use crate::tools::error::Result;

/// Per-session protocol state, owned by the session engine
#[derive(Debug)]
pub(crate) struct Session {
    pub id: SessionId,
    pub state: SessionState,
    /// Configuration this PCC advertises to the PCE
    pub config: SessionConfig,
    /// Session id byte this PCC put in its Open
    pub local_sid: u8,
    /// Keepalive the PCE advertised in its Open
    pub remote_keepalive: Option<u8>,
    /// Dead timer the PCE advertised in its Open
    pub remote_dead_timer: Option<u8>,
    /// Session id byte from the PCE's Open
    pub remote_sid: Option<u8>,

    pub timer_open_keep_wait: Option<i32>,
    pub timer_pc_req_wait: Option<i32>,
    pub timer_dead_timer: Option<i32>,
    pub timer_keep_alive: Option<i32>,

    /// Remote Open proposals this PCC found unacceptable
    pub open_rejections: u32,
    /// Messages that failed to decode on this session
    pub erroneous_messages: u32,
    /// PCReps with a request id this PCC never issued
    pub unknown_requests: u32,
    /// Request ids sent and not yet answered
    pub pending_requests: HashSet<u32>,

    pub counters: SessionCounters,
}

impl Session {
    pub fn new(id: SessionId, config: SessionConfig) -> Self {
        Self {
            id,
            state: SessionState::Initialized,
            config,
            // low byte of the engine-issued session id, RFC 5440 only asks
            // for a per-peer increasing number
            local_sid: (id & 0xff) as u8,
            remote_keepalive: None,
            remote_dead_timer: None,
            remote_sid: None,
            timer_open_keep_wait: None,
            timer_pc_req_wait: None,
            timer_dead_timer: None,
            timer_keep_alive: None,
            open_rejections: 0,
            erroneous_messages: 0,
            unknown_requests: 0,
            pending_requests: HashSet::new(),
            counters: SessionCounters::default(),
        }
    }

    /// Encode and hand a message to the socket service, accounting it
    pub fn send(&mut self, socket: &SocketComm, message: &Message) -> Result<()> {
        log::debug!(
            "Session {} tx {} ({} objects)",
            self.id,
            message.msg_type.to_str(),
            message.objects.len()
        );
        self.counters.record_tx(message);
        socket.send(self.id, message.to_bytes())
    }

    /// KeepAlive transmit period: the lower of both advertised keepalives,
    /// never below one second
    pub fn keep_alive_period(&self) -> u64 {
        let local = self.config.keep_alive_seconds;
        let period = match self.remote_keepalive {
            Some(remote) => local.min(remote),
            None => local,
        };
        (period as u64).max(1)
    }

    pub fn all_timer_ids(&self) -> [Option<i32>; 4] {
        [
            self.timer_open_keep_wait,
            self.timer_pc_req_wait,
            self.timer_dead_timer,
            self.timer_keep_alive,
        ]
    }
}
