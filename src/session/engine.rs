use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use super::config::SessionConfig;
use super::counters::SessionCounters;
use super::request::{RequestResponse, ResponseStatus};
use super::session::Session;
use super::{states, SessionId, SessionState, SessionTimer};
use crate::message::object::OpenObject;
use crate::message::{Message, MessageType};
use crate::socket::{EventSink, SocketComm, SocketEvent};
use crate::timer::TimerService;
use crate::tools::error::{PcepError, Result};

/// Event delivered to the embedding application
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Open negotiation completed, the session reached the Opened state
    PccConnectedToPce(
        /// session
        SessionId,
    ),
    /// The session was torn down on this side (timeout, error budget,
    /// explicit destroy)
    PccDisconnected(
        /// session
        SessionId,
    ),
    /// The PCE sent a Close message
    PceClosed {
        /// session
        session_id: SessionId,
        /// close reason from the Close object
        reason: u8,
    },
    /// The TCP connection failed or broke
    ConnectionFailure {
        /// session
        session_id: SessionId,
        /// failure description
        error: String,
    },
    /// A message the engine does not consume itself
    MessageReceived {
        /// session
        session_id: SessionId,
        /// the decoded message
        message: Message,
    },
}

/// State shared between the engine thread, the service callbacks and the
/// application-facing API
#[derive(Debug)]
pub(crate) struct Shared {
    pub active: AtomicBool,
    pub sessions: Mutex<HashMap<SessionId, Session>>,
    pub responses: Mutex<HashMap<u32, Weak<RequestResponse>>>,
    next_session_id: AtomicI32,
    app_events: Mutex<VecDeque<AppEvent>>,
    app_cond: Condvar,
}

impl Shared {
    pub fn post_app_event(&self, event: AppEvent) {
        if !self.active.load(Ordering::SeqCst) {
            log::warn!("Drop application event, engine is stopping");
            return;
        }
        self.app_events.lock().unwrap().push_back(event);
        self.app_cond.notify_all();
    }

    /// Resolve the registered request, if any. true when a waiter was fed.
    pub fn resolve_response(
        &self,
        request_id: u32,
        status: ResponseStatus,
        responses: Vec<Message>,
    ) -> bool {
        let weak = self.responses.lock().unwrap().remove(&request_id);
        match weak.and_then(|weak| weak.upgrade()) {
            Some(request) => request.resolve(status, responses),
            None => false,
        }
    }
}

/// Handles the engine thread and state-machine code act through
#[derive(Debug, Clone)]
pub(crate) struct Services {
    pub shared: Arc<Shared>,
    pub socket: Arc<SocketComm>,
    pub timers: Arc<TimerService<(SessionId, SessionTimer)>>,
}

enum EngineEvent {
    Socket(SocketEvent),
    Timer {
        session_id: SessionId,
        timer: SessionTimer,
        timer_id: i32,
    },
    Stop,
}

///
/// The PCEP session engine: owns the sessions, the socket service and the
/// timer service, runs the per-session state machine on a dedicated thread
/// and exposes the application-facing event queue.
///
/// ```no_run
/// use pcep::pcc::{SessionConfig, SessionLogic};
///
/// let logic = SessionLogic::run().unwrap();
/// let config = SessionConfig::default();
/// let session = logic
///     .create_session(&config, "192.0.2.10:4189".parse().unwrap())
///     .unwrap();
/// // ... exchange messages ...
/// logic.destroy_session(session);
/// logic.stop();
/// ```
///
#[derive(Debug)]
pub struct SessionLogic {
    services: Services,
    tx: mpsc::Sender<EngineEvent>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl SessionLogic {
    /// Start the engine: spawns the session-logic thread and brings up the
    /// socket and timer services it drives.
    pub fn run() -> Result<SessionLogic> {
        let (tx, rx) = mpsc::channel();

        let shared = Arc::new(Shared {
            active: AtomicBool::new(true),
            sessions: Mutex::new(HashMap::new()),
            responses: Mutex::new(HashMap::new()),
            next_session_id: AtomicI32::new(0),
            app_events: Mutex::new(VecDeque::new()),
            app_cond: Condvar::new(),
        });

        let socket = Arc::new(SocketComm::start());

        let timer_tx = Mutex::new(tx.clone());
        let timers = Arc::new(TimerService::start(
            move |timer_id, (session_id, timer): (SessionId, SessionTimer)| {
                timer_tx
                    .lock()
                    .unwrap()
                    .send(EngineEvent::Timer {
                        session_id,
                        timer,
                        timer_id,
                    })
                    .ok();
            },
        ));

        let services = Services {
            shared,
            socket,
            timers,
        };

        let loop_services = services.clone();
        let thread = std::thread::Builder::new()
            .name("pcep-session-logic".to_owned())
            .spawn(move || engine_loop(loop_services, rx))
            .map_err(|e| PcepError::new(format!("Fail to spawn the engine thread: {}", e)))?;

        Ok(SessionLogic {
            services,
            tx,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Block until the engine thread exits, i.e. until another thread calls
    /// [`SessionLogic::stop`]
    pub fn wait_for_completion(&self) {
        if let Some(thread) = self.thread.lock().unwrap().take() {
            thread.join().ok();
        }
    }

    /// Stop the engine and its services. Remaining sessions are torn down,
    /// their outstanding requests resolve to `Error`. Teardown order is
    /// engine, then socket service, then timer service.
    pub fn stop(&self) {
        if !self.services.shared.active.swap(false, Ordering::SeqCst) {
            return;
        }

        log::info!("Stopping the session engine");
        self.tx.send(EngineEvent::Stop).ok();
        if let Some(thread) = self.thread.lock().unwrap().take() {
            thread.join().ok();
        }

        let sessions: Vec<Session> = {
            let mut map = self.services.shared.sessions.lock().unwrap();
            map.drain().map(|(_, session)| session).collect()
        };
        for session in sessions {
            for request_id in &session.pending_requests {
                self.services.shared.resolve_response(
                    *request_id,
                    ResponseStatus::Error,
                    Vec::new(),
                );
            }
        }

        self.services.socket.stop();
        self.services.timers.stop();
    }

    /// Connect to a PCE and create the session around the connection. The
    /// Open handshake starts as soon as the connect completes; watch for
    /// [`AppEvent::PccConnectedToPce`].
    pub fn create_session(&self, config: &SessionConfig, pce: SocketAddr) -> Result<SessionId> {
        if !self.services.shared.active.load(Ordering::SeqCst) {
            return Err(PcepError::new("Session engine is not running"));
        }

        let session_id = self
            .services
            .shared
            .next_session_id
            .fetch_add(1, Ordering::SeqCst);

        self.services
            .shared
            .sessions
            .lock()
            .unwrap()
            .insert(session_id, Session::new(session_id, config.clone()));

        let sink_tx = Mutex::new(self.tx.clone());
        let sink: EventSink = Arc::new(move |event| {
            sink_tx.lock().unwrap().send(EngineEvent::Socket(event)).ok();
        });

        let connect = self.services.socket.connect(
            session_id,
            pce,
            Duration::from_millis(config.connect_timeout_ms),
            sink,
        );
        if let Err(e) = connect {
            self.services
                .shared
                .sessions
                .lock()
                .unwrap()
                .remove(&session_id);
            return Err(e);
        }

        Ok(session_id)
    }

    /// Tear a session down. Safe from any thread, idempotent.
    pub fn destroy_session(&self, session_id: SessionId) {
        if states::teardown(&self.services, session_id, false) {
            self.services
                .shared
                .post_app_event(AppEvent::PccDisconnected(session_id));
        }
    }

    /// Send a message on an established session. A PCReq arms the PCReqWait
    /// timer and moves the session to `WaitPcReq`; register the response
    /// with [`SessionLogic::register_response`] before calling this.
    pub fn send_message(&self, session_id: SessionId, message: Message) -> Result<()> {
        let mut sessions = self.services.shared.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| PcepError::new(format!("Unknown session {}", session_id)))?;

        match session.state {
            SessionState::Opened | SessionState::WaitPcReq | SessionState::Idle => {}
            state => {
                return Err(PcepError::new(format!(
                    "Session {} is not established (state {:?})",
                    session_id, state
                )))
            }
        }

        session.send(&self.services.socket, &message)?;

        if message.msg_type == MessageType::PcReq {
            if let Some(request_id) = message.request_id() {
                session.pending_requests.insert(request_id);
            }
            match session.timer_pc_req_wait {
                Some(timer_id) => {
                    self.services.timers.reset_timer(timer_id);
                }
                None => {
                    session.timer_pc_req_wait = self
                        .services
                        .timers
                        .create_timer(
                            Duration::from_secs(session.config.request_time_seconds as u64),
                            (session_id, SessionTimer::PcReqWait),
                        )
                        .ok();
                }
            }
            session.state = SessionState::WaitPcReq;
        }

        Ok(())
    }

    /// Register a request id about to be sent in a PCReq. The returned
    /// handle resolves to `Ready` when the matching PCRep arrives, to
    /// `TimedOut` after `max_wait`, or to `Error` on session teardown.
    pub fn register_response(
        &self,
        session_id: SessionId,
        request_id: u32,
        max_wait: Duration,
    ) -> Result<Arc<RequestResponse>> {
        if !self
            .services
            .shared
            .sessions
            .lock()
            .unwrap()
            .contains_key(&session_id)
        {
            return Err(PcepError::new(format!("Unknown session {}", session_id)));
        }

        let mut responses = self.services.shared.responses.lock().unwrap();
        responses.retain(|_, weak| weak.upgrade().is_some());
        if let Some(existing) = responses.get(&request_id).and_then(|weak| weak.upgrade()) {
            if existing.status() == ResponseStatus::Waiting {
                return Err(PcepError::new(format!(
                    "Request id {} is already registered",
                    request_id
                )));
            }
        }

        let request = Arc::new(RequestResponse::new(session_id, request_id, max_wait));
        responses.insert(request_id, Arc::downgrade(&request));
        Ok(request)
    }

    /// Look up a still-registered request by id
    pub fn get_registered_response(&self, request_id: u32) -> Option<Arc<RequestResponse>> {
        self.services
            .shared
            .responses
            .lock()
            .unwrap()
            .get(&request_id)
            .and_then(|weak| weak.upgrade())
    }

    /// Open parameters the PCE advertised, `None` until its Open was
    /// accepted
    pub fn remote_open(&self, session_id: SessionId) -> Option<OpenObject> {
        let sessions = self.services.shared.sessions.lock().unwrap();
        let session = sessions.get(&session_id)?;
        match (
            session.remote_keepalive,
            session.remote_dead_timer,
            session.remote_sid,
        ) {
            (Some(keepalive), Some(dead_timer), Some(sid)) => Some(OpenObject {
                version: crate::message::PCEP_VERSION,
                keepalive,
                dead_timer,
                sid,
            }),
            _ => None,
        }
    }

    /// Current state of a session, `None` once it is torn down
    pub fn session_state(&self, session_id: SessionId) -> Option<SessionState> {
        self.services
            .shared
            .sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|session| session.state)
    }

    /// Snapshot of a session's counters
    pub fn session_counters(&self, session_id: SessionId) -> Option<SessionCounters> {
        self.services
            .shared
            .sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|session| session.counters.clone())
    }

    /// Next queued application event, non-blocking
    pub fn poll_event(&self) -> Option<AppEvent> {
        self.services.shared.app_events.lock().unwrap().pop_front()
    }

    /// Wait up to `timeout` for an application event
    pub fn wait_event(&self, timeout: Duration) -> Option<AppEvent> {
        let deadline = std::time::Instant::now() + timeout;
        let mut events = self.services.shared.app_events.lock().unwrap();
        loop {
            if let Some(event) = events.pop_front() {
                return Some(event);
            }

            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }

            let (next, _) = self
                .services
                .shared
                .app_cond
                .wait_timeout(events, deadline - now)
                .unwrap();
            events = next;
        }
    }
}

impl Drop for SessionLogic {
    fn drop(&mut self) {
        self.stop();
    }
}

fn engine_loop(services: Services, rx: mpsc::Receiver<EngineEvent>) {
    log::debug!("Session logic thread started");
    while services.shared.active.load(Ordering::SeqCst) {
        let event = match rx.recv() {
            Ok(event) => event,
            Err(_) => break,
        };

        match event {
            EngineEvent::Stop => break,
            EngineEvent::Socket(event) => states::handle_socket_event(&services, event),
            EngineEvent::Timer {
                session_id,
                timer,
                timer_id,
            } => states::handle_timer_event(&services, session_id, timer, timer_id),
        }
    }
    log::debug!("Session logic thread stopped");
}
