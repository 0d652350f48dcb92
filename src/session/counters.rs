use std::collections::HashMap;

use crate::message::{Message, MessageType};

/// Per-session traffic and event counters.
///
/// A snapshot can be fetched at any time through
/// [`SessionLogic::session_counters`](crate::session::engine::SessionLogic::session_counters).
#[derive(Debug, Clone, Default)]
pub struct SessionCounters {
    /// sessions reaching the Opened state
    pub connect: u64,
    /// session teardowns
    pub disconnect: u64,
    /// KeepAlive transmit timer expirations
    pub timer_keep_alive: u64,
    /// DeadTimer expirations
    pub timer_dead_timer: u64,
    /// OpenKeepWait expirations
    pub timer_open_keep_wait: u64,
    /// PCReqWait expirations
    pub timer_pc_req_wait: u64,
    /// messages that failed to decode
    pub unknown_messages: u64,
    /// PCReps carrying a request id this PCC never issued
    pub unknown_requests: u64,
    tx_by_type: HashMap<u8, u64>,
    rx_by_type: HashMap<u8, u64>,
    rx_by_object_class: HashMap<u8, u64>,
}

impl SessionCounters {
    /// Account one transmitted message
    pub fn record_tx(&mut self, message: &Message) {
        *self.tx_by_type.entry(message.msg_type as u8).or_insert(0) += 1;
    }

    /// Account one received message and its object classes
    pub fn record_rx(&mut self, message: &Message) {
        *self.rx_by_type.entry(message.msg_type as u8).or_insert(0) += 1;
        for object in &message.objects {
            *self
                .rx_by_object_class
                .entry(object.object_class())
                .or_insert(0) += 1;
        }
    }

    /// Messages of `msg_type` sent so far
    pub fn tx_count(&self, msg_type: MessageType) -> u64 {
        *self.tx_by_type.get(&(msg_type as u8)).unwrap_or(&0)
    }

    /// Messages of `msg_type` received so far
    pub fn rx_count(&self, msg_type: MessageType) -> u64 {
        *self.rx_by_type.get(&(msg_type as u8)).unwrap_or(&0)
    }

    /// Objects of `class` received so far
    pub fn rx_object_count(&self, class: u8) -> u64 {
        *self.rx_by_object_class.get(&class).unwrap_or(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::object::OBJECT_CLASS_OPEN;

    #[test]
    pub fn test_counters() {
        crate::tests::init();
        let mut counters = SessionCounters::default();
        let open = Message::open(
            crate::message::object::OpenObject {
                version: 1,
                keepalive: 30,
                dead_timer: 120,
                sid: 0,
            },
            vec![],
        );
        counters.record_tx(&open);
        counters.record_rx(&open);
        counters.record_rx(&Message::keepalive());

        assert_eq!(counters.tx_count(MessageType::Open), 1);
        assert_eq!(counters.rx_count(MessageType::Open), 1);
        assert_eq!(counters.rx_count(MessageType::KeepAlive), 1);
        assert_eq!(counters.rx_count(MessageType::PcReq), 0);
        assert_eq!(counters.rx_object_count(OBJECT_CLASS_OPEN), 1);
    }
}
