use std::time::Duration;

use super::engine::{AppEvent, Services};
use super::request::ResponseStatus;
use super::session::Session;
use super::{SessionId, SessionState, SessionTimer};
use crate::message::error::DecodeError;
use crate::message::object::{
    self, ObjectBody, OpenObject, CLOSE_REASON_DEADTIMER, CLOSE_REASON_FORMAT, CLOSE_REASON_NO,
    CLOSE_REASON_UNKNOWN_REQ, CLOSE_REASON_UNREC_MSG, ERROR_TYPE_SESSION_FAILURE,
    ERROR_VALUE_INVALID_OPEN, ERROR_VALUE_OPENWAIT_TIMED_OUT, ERROR_VALUE_RECEIVED_PCERR,
    ERROR_VALUE_SECOND_OPEN_UNACCEPTABLE, ERROR_VALUE_UNACCEPTABLE_OPEN_NEG,
};
use crate::message::tlv::{self, Tlv};
use crate::message::{Message, MessageType};
use crate::socket::{SocketEvent, SocketEventKind};

pub(crate) fn handle_socket_event(services: &Services, event: SocketEvent) {
    let session_id = event.session_id;
    match event.kind {
        SocketEventKind::Connected => handle_connected(services, session_id),
        SocketEventKind::Messages(messages) => {
            for message in messages {
                handle_message(services, session_id, message);
            }
        }
        SocketEventKind::DecodeFailure(error) => handle_decode_failure(services, session_id, error),
        SocketEventKind::Closed => {
            log::info!("Session {} socket closed by peer", session_id);
            if teardown(services, session_id, false) {
                services
                    .shared
                    .post_app_event(AppEvent::PccDisconnected(session_id));
            }
        }
        SocketEventKind::Exception(error) => {
            log::warn!("Session {} socket exception: {}", session_id, error);
            if teardown(services, session_id, false) {
                services.shared.post_app_event(AppEvent::ConnectionFailure {
                    session_id,
                    error: error.to_string(),
                });
            }
        }
    }
}

/// TCP is up: advertise our Open and arm OpenKeepWait
fn handle_connected(services: &Services, session_id: SessionId) {
    let mut sessions = services.shared.sessions.lock().unwrap();
    let session = match sessions.get_mut(&session_id) {
        Some(session) => session,
        None => return,
    };

    let open = create_local_open(session);
    if session.send(&services.socket, &open).is_err() {
        drop(sessions);
        teardown(services, session_id, false);
        services.shared.post_app_event(AppEvent::ConnectionFailure {
            session_id,
            error: "Fail to send Open".to_owned(),
        });
        return;
    }

    let wait = Duration::from_secs(session.config.open_keep_wait_seconds as u64);
    session.timer_open_keep_wait = services
        .timers
        .create_timer(wait, (session_id, SessionTimer::OpenKeepWait))
        .ok();
    session.state = SessionState::TcpConnected;
}

fn create_local_open(session: &Session) -> Message {
    // a capability we require from the PCE is a capability we support
    let tlvs: Vec<Tlv> = session
        .config
        .required_capabilities
        .iter()
        .map(|&tlv_type| match tlv_type {
            tlv::TLV_STATEFUL_PCE_CAPABILITY => Tlv::StatefulPceCapability { flags: 0x01 },
            tlv::TLV_SR_PCE_CAPABILITY => Tlv::SrPceCapability { msd: 10 },
            _ => Tlv::Unknown {
                tlv_type,
                data: Vec::new(),
            },
        })
        .collect();

    Message::open(
        OpenObject {
            version: crate::message::PCEP_VERSION,
            keepalive: session.config.keep_alive_seconds,
            dead_timer: session.config.dead_timer_seconds,
            sid: session.local_sid,
        },
        tlvs,
    )
}

fn handle_message(services: &Services, session_id: SessionId, message: Message) {
    let mut sessions = services.shared.sessions.lock().unwrap();
    let session = match sessions.get_mut(&session_id) {
        Some(session) => session,
        None => {
            log::debug!("Drop message for unknown session {}", session_id);
            return;
        }
    };

    log::debug!(
        "Session {} rx {} in state {:?}",
        session_id,
        message.msg_type.to_str(),
        session.state
    );
    session.counters.record_rx(&message);

    // any traffic proves the peer alive
    if let Some(timer_id) = session.timer_dead_timer {
        services.timers.reset_timer(timer_id);
    }

    match message.msg_type {
        MessageType::Open => handle_open(services, sessions, session_id, message),
        MessageType::KeepAlive => {}
        MessageType::PcRep => handle_pcrep(services, sessions, session_id, message),
        MessageType::Close => {
            let reason = match message.first_object(object::OBJECT_CLASS_CLOSE) {
                Some(object) => match &object.body {
                    ObjectBody::Close(close) => close.reason,
                    _ => CLOSE_REASON_NO,
                },
                None => CLOSE_REASON_NO,
            };
            log::info!("Session {} closed by PCE, reason {}", session_id, reason);
            drop(sessions);
            if teardown(services, session_id, true) {
                services.shared.post_app_event(AppEvent::PceClosed {
                    session_id,
                    reason,
                });
            }
        }
        MessageType::Error => {
            log::warn!("Session {} received PCErr", session_id);
            drop(sessions);
            services.shared.post_app_event(AppEvent::MessageReceived {
                session_id,
                message,
            });
        }
        // notifications and stateful messages are the application's business
        MessageType::PcNtf
        | MessageType::PcReq
        | MessageType::Report
        | MessageType::Update
        | MessageType::Initiate => {
            drop(sessions);
            services.shared.post_app_event(AppEvent::MessageReceived {
                session_id,
                message,
            });
        }
    }
}

type SessionGuard<'a> =
    std::sync::MutexGuard<'a, std::collections::HashMap<SessionId, Session>>;

fn handle_open(
    services: &Services,
    mut sessions: SessionGuard,
    session_id: SessionId,
    message: Message,
) {
    let session = sessions.get_mut(&session_id).unwrap();
    let (open, tlvs) = match message.first_object(object::OBJECT_CLASS_OPEN) {
        Some(obj) => match &obj.body {
            ObjectBody::Open(open) => (open.clone(), obj.tlvs.clone()),
            _ => unreachable!(),
        },
        None => {
            log::warn!("Session {} Open message without Open object", session_id);
            let error =
                Message::error(ERROR_TYPE_SESSION_FAILURE, ERROR_VALUE_INVALID_OPEN);
            session.send(&services.socket, &error).ok();
            return;
        }
    };

    if session.state != SessionState::TcpConnected {
        log::warn!(
            "Session {} unexpected Open in state {:?}",
            session_id,
            session.state
        );
        let error = Message::error(ERROR_TYPE_SESSION_FAILURE, ERROR_VALUE_INVALID_OPEN);
        session.send(&services.socket, &error).ok();
        return;
    }

    if open_is_acceptable(session, &open, &tlvs) {
        session.remote_keepalive = Some(open.keepalive);
        session.remote_dead_timer = Some(open.dead_timer);
        session.remote_sid = Some(open.sid);

        session.send(&services.socket, &Message::keepalive()).ok();

        if let Some(timer_id) = session.timer_open_keep_wait.take() {
            services.timers.cancel_timer(timer_id);
        }
        session.timer_dead_timer = services
            .timers
            .create_timer(
                Duration::from_secs(open.dead_timer as u64),
                (session_id, SessionTimer::DeadTimer),
            )
            .ok();
        session.timer_keep_alive = services
            .timers
            .create_timer(
                Duration::from_secs(session.keep_alive_period()),
                (session_id, SessionTimer::KeepAlive),
            )
            .ok();

        session.state = SessionState::Opened;
        session.counters.connect += 1;
        log::info!(
            "Session {} opened, keepalive {}s, dead timer {}s",
            session_id,
            session.keep_alive_period(),
            open.dead_timer
        );
        drop(sessions);
        services
            .shared
            .post_app_event(AppEvent::PccConnectedToPce(session_id));
        return;
    }

    session.open_rejections += 1;
    if session.open_rejections == 1 {
        log::warn!(
            "Session {} remote Open unacceptable, counter-proposing",
            session_id
        );
        let error =
            Message::error(ERROR_TYPE_SESSION_FAILURE, ERROR_VALUE_UNACCEPTABLE_OPEN_NEG);
        session.send(&services.socket, &error).ok();
        let proposal = create_local_open(session);
        session.send(&services.socket, &proposal).ok();
        return;
    }

    log::error!(
        "Session {} second remote Open still unacceptable, closing",
        session_id
    );
    let error = Message::error(
        ERROR_TYPE_SESSION_FAILURE,
        ERROR_VALUE_SECOND_OPEN_UNACCEPTABLE,
    );
    session.send(&services.socket, &error).ok();
    session
        .send(&services.socket, &Message::close(CLOSE_REASON_NO))
        .ok();
    drop(sessions);
    if teardown(services, session_id, true) {
        services
            .shared
            .post_app_event(AppEvent::PccDisconnected(session_id));
    }
}

fn open_is_acceptable(session: &Session, open: &OpenObject, tlvs: &[Tlv]) -> bool {
    if open.keepalive == 0 {
        log::warn!("Session {} remote keepalive is zero", session.id);
        return false;
    }

    let floor = (open.keepalive as u32) * (session.config.min_dead_timer_factor as u32);
    if (open.dead_timer as u32) < floor {
        log::warn!(
            "Session {} remote dead timer {} below {} x keepalive {}",
            session.id,
            open.dead_timer,
            session.config.min_dead_timer_factor,
            open.keepalive
        );
        return false;
    }

    for required in &session.config.required_capabilities {
        if !tlvs.iter().any(|tlv| tlv.tlv_type() == *required) {
            log::warn!(
                "Session {} remote Open lacks required capability TLV {}",
                session.id,
                required
            );
            return false;
        }
    }

    true
}

fn handle_pcrep(
    services: &Services,
    mut sessions: SessionGuard,
    session_id: SessionId,
    message: Message,
) {
    let session = sessions.get_mut(&session_id).unwrap();
    let request_id = match message.request_id() {
        Some(request_id) => request_id,
        None => {
            log::warn!("Session {} PCRep without RP object", session_id);
            let error = Message::error(object::ERROR_TYPE_MANDATORY_OBJECT_MISSING, 1);
            session.send(&services.socket, &error).ok();
            return;
        }
    };

    if session.pending_requests.remove(&request_id) {
        if session.pending_requests.is_empty() {
            if let Some(timer_id) = session.timer_pc_req_wait.take() {
                services.timers.cancel_timer(timer_id);
            }
            if session.state == SessionState::WaitPcReq {
                session.state = SessionState::Opened;
            }
        }
        drop(sessions);
        if !services
            .shared
            .resolve_response(request_id, ResponseStatus::Ready, vec![message.clone()])
        {
            // answered but nobody registered: hand it to the application
            services.shared.post_app_event(AppEvent::MessageReceived {
                session_id,
                message,
            });
        }
        return;
    }

    log::warn!(
        "Session {} PCRep for unknown request id {}",
        session_id,
        request_id
    );
    session.unknown_requests += 1;
    session.counters.unknown_requests += 1;
    if session.unknown_requests > session.config.max_unknown_requests {
        session
            .send(&services.socket, &Message::close(CLOSE_REASON_UNKNOWN_REQ))
            .ok();
        drop(sessions);
        if teardown(services, session_id, true) {
            services
                .shared
                .post_app_event(AppEvent::PccDisconnected(session_id));
        }
        return;
    }
    drop(sessions);
    services.shared.post_app_event(AppEvent::MessageReceived {
        session_id,
        message,
    });
}

fn handle_decode_failure(services: &Services, session_id: SessionId, error: DecodeError) {
    let mut sessions = services.shared.sessions.lock().unwrap();
    let session = match sessions.get_mut(&session_id) {
        Some(session) => session,
        None => return,
    };

    log::warn!("Session {} failed to decode a message: {}", session_id, error);
    session.erroneous_messages += 1;
    session.counters.unknown_messages += 1;

    if error.is_framing_fatal() {
        session
            .send(&services.socket, &Message::close(CLOSE_REASON_FORMAT))
            .ok();
        drop(sessions);
        if teardown(services, session_id, true) {
            services
                .shared
                .post_app_event(AppEvent::PccDisconnected(session_id));
        }
        return;
    }

    // the PCErr naming the violation is sent before any teardown
    if let Some((error_type, error_value)) = error.to_error_type_value() {
        let pcerr = Message::error(error_type, error_value);
        session.send(&services.socket, &pcerr).ok();
    }

    if session.erroneous_messages > session.config.max_unknown_messages {
        let reason = match error {
            DecodeError::UnknownMessageType(_) => {
                // unknown message types carry no per-message PCErr, the
                // session failure is reported here instead (RFC 5440 A.1)
                let pcerr =
                    Message::error(ERROR_TYPE_SESSION_FAILURE, ERROR_VALUE_RECEIVED_PCERR);
                session.send(&services.socket, &pcerr).ok();
                CLOSE_REASON_UNREC_MSG
            }
            _ => CLOSE_REASON_NO,
        };
        session.send(&services.socket, &Message::close(reason)).ok();
        drop(sessions);
        if teardown(services, session_id, true) {
            services
                .shared
                .post_app_event(AppEvent::PccDisconnected(session_id));
        }
    }
}

pub(crate) fn handle_timer_event(
    services: &Services,
    session_id: SessionId,
    timer: SessionTimer,
    timer_id: i32,
) {
    let mut sessions = services.shared.sessions.lock().unwrap();
    let session = match sessions.get_mut(&session_id) {
        Some(session) => session,
        None => return,
    };

    // a timer cancelled or re-armed after this expiration was queued is stale
    let current = match timer {
        SessionTimer::OpenKeepWait => &mut session.timer_open_keep_wait,
        SessionTimer::PcReqWait => &mut session.timer_pc_req_wait,
        SessionTimer::DeadTimer => &mut session.timer_dead_timer,
        SessionTimer::KeepAlive => &mut session.timer_keep_alive,
    };
    if *current != Some(timer_id) {
        log::debug!("Session {} stale {:?} timer {}", session_id, timer, timer_id);
        return;
    }
    *current = None;

    match timer {
        SessionTimer::OpenKeepWait => {
            log::warn!("Session {} OpenKeepWait expired", session_id);
            session.counters.timer_open_keep_wait += 1;
            let error =
                Message::error(ERROR_TYPE_SESSION_FAILURE, ERROR_VALUE_OPENWAIT_TIMED_OUT);
            session.send(&services.socket, &error).ok();
            session
                .send(&services.socket, &Message::close(CLOSE_REASON_NO))
                .ok();
            drop(sessions);
            if teardown(services, session_id, true) {
                services
                    .shared
                    .post_app_event(AppEvent::PccDisconnected(session_id));
            }
        }
        SessionTimer::DeadTimer => {
            log::warn!("Session {} DeadTimer expired", session_id);
            session.counters.timer_dead_timer += 1;
            session
                .send(&services.socket, &Message::close(CLOSE_REASON_DEADTIMER))
                .ok();
            drop(sessions);
            if teardown(services, session_id, true) {
                services
                    .shared
                    .post_app_event(AppEvent::PccDisconnected(session_id));
            }
        }
        SessionTimer::KeepAlive => {
            session.counters.timer_keep_alive += 1;
            session.send(&services.socket, &Message::keepalive()).ok();
            session.timer_keep_alive = services
                .timers
                .create_timer(
                    Duration::from_secs(session.keep_alive_period()),
                    (session_id, SessionTimer::KeepAlive),
                )
                .ok();
        }
        SessionTimer::PcReqWait => {
            log::warn!("Session {} PCReqWait expired", session_id);
            session.counters.timer_pc_req_wait += 1;
            let pending: Vec<u32> = session.pending_requests.drain().collect();
            if session.state == SessionState::WaitPcReq {
                session.state = SessionState::Opened;
            }
            drop(sessions);
            for request_id in pending {
                services
                    .shared
                    .resolve_response(request_id, ResponseStatus::TimedOut, Vec::new());
            }
        }
    }
}

/// Remove the session, cancel its timers and fail its outstanding requests.
/// `graceful` flushes queued writes (the Close just sent) before the socket
/// goes down. Returns false when the session was already gone.
pub(crate) fn teardown(services: &Services, session_id: SessionId, graceful: bool) -> bool {
    let removed = services.shared.sessions.lock().unwrap().remove(&session_id);
    let mut session = match removed {
        Some(session) => session,
        None => return false,
    };

    log::info!("Teardown session {}", session_id);
    session.counters.disconnect += 1;
    for timer_id in session.all_timer_ids().into_iter().flatten() {
        services.timers.cancel_timer(timer_id);
    }

    match graceful {
        true => services.socket.close_after_write(session_id),
        false => services.socket.teardown_session(session_id),
    }

    for request_id in session.pending_requests {
        services
            .shared
            .resolve_response(request_id, ResponseStatus::Error, Vec::new());
    }

    true
}
