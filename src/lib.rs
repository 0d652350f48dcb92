//! # PCEP - Path Computation Element Protocol
//!
//! PCC-side implementation of the PCEP protocol in pure RUST: wire codec,
//! session state machine, keepalive regime and request/response correlation
//! for long-lived sessions with one or more PCEs.
//!
//! # RFC
//!
//! | RFC      | Title      | Link       |
//! | ------------- | ------------- | ------------- |
//! | RFC 5440 | Path Computation Element (PCE) Communication Protocol (PCEP) | <https://www.rfc-editor.org/rfc/rfc5440.html> |
//! | RFC 8231 | PCEP Extensions for Stateful PCE | <https://www.rfc-editor.org/rfc/rfc8231.html> |
//! | RFC 8281 | PCE-Initiated LSP Setup in a Stateful PCE Model | <https://www.rfc-editor.org/rfc/rfc8281.html> |
//! | draft-ietf-pce-segment-routing-16 | PCEP Extensions for Segment Routing | <https://datatracker.ietf.org/doc/draft-ietf-pce-segment-routing/> |
//!

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(test, deny(warnings))]

mod message;
mod session;
mod socket;
mod timer;
mod tools;

///
/// Message codec: encode and decode PCEP messages, objects, TLVs and route
/// sub-objects to and from the RFC 5440 wire format
///
pub mod messages {
    pub use crate::message::declared_message_length;
    pub use crate::message::error::DecodeError;
    pub use crate::message::object;
    pub use crate::message::subobj;
    pub use crate::message::tlv;
    pub use crate::message::Message;
    pub use crate::message::MessageType;
    pub use crate::message::COMMON_HEADER_SIZE;
    pub use crate::message::MAX_MESSAGE_SIZE;
    pub use crate::message::PCEP_VERSION;
}

///
/// Path Computation Client: session engine, Open negotiation, liveness
/// timers and PCReq/PCRep correlation
///
pub mod pcc {
    pub use crate::session::config::SessionConfig;
    pub use crate::session::counters::SessionCounters;
    pub use crate::session::engine::AppEvent;
    pub use crate::session::engine::SessionLogic;
    pub use crate::session::request::RequestResponse;
    pub use crate::session::request::ResponseStatus;
    pub use crate::session::SessionId;
    pub use crate::session::SessionState;
}

pub use crate::tools::error;

#[cfg(test)]
mod tests {
    pub fn init() {
        std::env::set_var("RUST_LOG", "debug");
        env_logger::builder().is_test(true).try_init().ok();
    }
}
