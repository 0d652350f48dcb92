pub mod config;
pub mod counters;
pub mod engine;
pub mod request;
mod session;
mod states;

/// Engine-issued session identifier
pub type SessionId = i32;

/// State of a PCEP session.
///
/// A torn-down session is removed from the engine; there is no terminal
/// variant, lookups simply stop resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, TCP connect not completed yet
    Initialized,
    /// TCP is up, Open sent, waiting for the PCE's Open
    TcpConnected,
    /// Open negotiation completed, keepalive regime running
    Opened,
    /// A PCReq is outstanding
    WaitPcReq,
    /// Post-Open steady state, currently an alias of `Opened` kept for
    /// API completeness
    Idle,
}

/// Which of the four per-session timers fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionTimer {
    OpenKeepWait,
    PcReqWait,
    DeadTimer,
    KeepAlive,
}
