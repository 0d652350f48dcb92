use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::SessionId;
use crate::message::Message;

/// State of a registered request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// No response yet
    Waiting,
    /// A PCRep with the matching request id arrived
    Ready,
    /// The wait deadline or the PCReqWait timer elapsed first
    TimedOut,
    /// The session was torn down while waiting
    Error,
}

#[derive(Debug)]
struct ResponseState {
    status: ResponseStatus,
    responses: Vec<Message>,
    received_at: Option<Instant>,
}

/// Correlation handle for one outstanding PCReq.
///
/// Register the request id before sending the PCReq, then either poll with
/// [`RequestResponse::query`] or block in [`RequestResponse::wait`]. The
/// status moves away from `Waiting` exactly once and never changes again.
#[derive(Debug)]
pub struct RequestResponse {
    session_id: SessionId,
    request_id: u32,
    max_wait: Duration,
    registered_at: Instant,
    state: Mutex<ResponseState>,
    cond: Condvar,
}

impl RequestResponse {
    pub(crate) fn new(session_id: SessionId, request_id: u32, max_wait: Duration) -> Self {
        Self {
            session_id,
            request_id,
            max_wait,
            registered_at: Instant::now(),
            state: Mutex::new(ResponseState {
                status: ResponseStatus::Waiting,
                responses: Vec::new(),
                received_at: None,
            }),
            cond: Condvar::new(),
        }
    }

    /// Session the request was sent on
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Registered request id
    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Current status, non-blocking
    pub fn status(&self) -> ResponseStatus {
        self.state.lock().unwrap().status
    }

    /// true once the status moved away from `Waiting`, non-blocking
    pub fn query(&self) -> bool {
        self.status() != ResponseStatus::Waiting
    }

    /// Block until a response arrives or the deadline registered with the
    /// request elapses. Returns true iff the final status is `Ready`.
    pub fn wait(&self) -> bool {
        let deadline = self.registered_at + self.max_wait;
        let mut state = self.state.lock().unwrap();
        loop {
            if state.status != ResponseStatus::Waiting {
                return state.status == ResponseStatus::Ready;
            }

            let now = Instant::now();
            if now >= deadline {
                log::warn!("Request {} timed out", self.request_id);
                state.status = ResponseStatus::TimedOut;
                self.cond.notify_all();
                return false;
            }

            let (next, _) = self.cond.wait_timeout(state, deadline - now).unwrap();
            state = next;
        }
    }

    /// Time between registration and the response, once Ready
    pub fn response_time(&self) -> Option<Duration> {
        self.state
            .lock()
            .unwrap()
            .received_at
            .map(|at| at - self.registered_at)
    }

    /// Responses received for this request, usually a single PCRep
    pub fn responses(&self) -> Vec<Message> {
        self.state.lock().unwrap().responses.clone()
    }

    /// One-shot transition away from `Waiting`. false when the request was
    /// already resolved.
    pub(crate) fn resolve(&self, status: ResponseStatus, responses: Vec<Message>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.status != ResponseStatus::Waiting {
            return false;
        }
        state.status = status;
        state.responses = responses;
        state.received_at = Some(Instant::now());
        self.cond.notify_all();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    pub fn test_wait_deadline() {
        crate::tests::init();
        let rr = RequestResponse::new(1, 7, Duration::from_millis(100));
        assert!(!rr.query());
        assert!(!rr.wait());
        assert_eq!(rr.status(), ResponseStatus::TimedOut);
        // one-shot: a late response does not change the outcome
        assert!(!rr.resolve(ResponseStatus::Ready, vec![Message::keepalive()]));
        assert_eq!(rr.status(), ResponseStatus::TimedOut);
        assert!(rr.responses().is_empty());
    }

    #[test]
    pub fn test_wait_observes_resolution() {
        crate::tests::init();
        let rr = Arc::new(RequestResponse::new(1, 7, Duration::from_secs(5)));

        let resolver = rr.clone();
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            assert!(resolver.resolve(ResponseStatus::Ready, vec![Message::keepalive()]));
        });

        assert!(rr.wait());
        assert_eq!(rr.status(), ResponseStatus::Ready);
        assert_eq!(rr.responses().len(), 1);
        assert!(rr.response_time().is_some());
        thread.join().unwrap();
    }
}
