use std::collections::{HashMap, VecDeque};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::message::{self, error::DecodeError, Message};
use crate::tools::error::{PcepError, Result};

/// Bounded sleep of the event-loop thread when no socket moved any byte
const POLL_PERIOD: Duration = Duration::from_millis(50);
/// A send is abandoned and the session torn down after this many failed
/// write attempts
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Callback used by the socket service to hand events upward. Implementations
/// only post to a queue, they never call back down into the service.
pub type EventSink = Arc<dyn Fn(SocketEvent) + Send + Sync>;

/// Event delivered by the socket event loop
#[derive(Debug)]
pub struct SocketEvent {
    /// session the event belongs to
    pub session_id: i32,
    /// what happened
    pub kind: SocketEventKind,
}

/// Kind of socket event
#[derive(Debug)]
pub enum SocketEventKind {
    /// The TCP connection is established
    Connected,
    /// Fully framed messages were received and decoded, in arrival order
    Messages(Vec<Message>),
    /// A complete frame failed to decode
    DecodeFailure(DecodeError),
    /// The remote side shut the connection down
    Closed,
    /// A local I/O failure, the session is already unregistered
    Exception(std::io::Error),
}

struct SocketSession {
    stream: TcpStream,
    rx_buf: Vec<u8>,
    write_queue: VecDeque<Vec<u8>>,
    write_offset: usize,
    write_failures: u32,
    close_after_write: bool,
    /* set after an unrecoverable framing error: the byte stream cannot be
     * trusted anymore, but the write path stays up so the session layer can
     * still send PCErr and Close */
    paused_read: bool,
    sink: EventSink,
}

struct SocketCommInner {
    active: AtomicBool,
    sessions: Mutex<HashMap<i32, SocketSession>>,
}

///
/// TCP session manager: owns the connected sockets and a single event-loop
/// thread that drains readable bytes, re-frames them on the 4-byte PCEP
/// common header and flushes pending writes.
///
/// Partial frames stay in a per-session receive buffer and never reach the
/// decoder; one `read` may carry any number of complete frames.
///
pub struct SocketComm {
    inner: Arc<SocketCommInner>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl std::fmt::Debug for SocketComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketComm")
            .field("active", &self.inner.active.load(Ordering::Relaxed))
            .field("sessions", &self.inner.sessions.lock().unwrap().len())
            .finish()
    }
}

impl SocketComm {
    /// Start the socket service and its event-loop thread
    pub fn start() -> SocketComm {
        let inner = Arc::new(SocketCommInner {
            active: AtomicBool::new(true),
            sessions: Mutex::new(HashMap::new()),
        });

        let loop_inner = inner.clone();
        let thread = std::thread::Builder::new()
            .name("pcep-socket".to_owned())
            .spawn(move || socket_loop(loop_inner))
            .expect("Fail to spawn the socket thread");

        SocketComm {
            inner,
            thread: Mutex::new(Some(thread)),
        }
    }

    /// Connect to `dest` within `timeout`, register the socket with the event
    /// loop and post a `Connected` event through `sink`.
    pub fn connect(
        &self,
        session_id: i32,
        dest: SocketAddr,
        timeout: Duration,
        sink: EventSink,
    ) -> Result<()> {
        if !self.inner.active.load(Ordering::SeqCst) {
            return Err(PcepError::new("Socket service is not running"));
        }

        log::info!("Connect session {} to {}", session_id, dest);
        let stream = TcpStream::connect_timeout(&dest, timeout)?;
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true).ok();

        let notify = sink.clone();
        self.inner.sessions.lock().unwrap().insert(
            session_id,
            SocketSession {
                stream,
                rx_buf: Vec::new(),
                write_queue: VecDeque::new(),
                write_offset: 0,
                write_failures: 0,
                close_after_write: false,
                paused_read: false,
                sink,
            },
        );

        notify(SocketEvent {
            session_id,
            kind: SocketEventKind::Connected,
        });
        Ok(())
    }

    /// Queue `data` for transmission, flushing as much as the socket accepts
    /// right away
    pub fn send(&self, session_id: i32, data: Vec<u8>) -> Result<()> {
        let mut sessions = self.inner.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| PcepError::new(format!("Unknown socket session {}", session_id)))?;

        session.write_queue.push_back(data);
        service_writes(session);
        Ok(())
    }

    /// Shut the connection down once every queued byte has been written
    pub fn close_after_write(&self, session_id: i32) {
        let mut sessions = self.inner.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(&session_id) {
            session.close_after_write = true;
            if session.write_queue.is_empty() {
                session.stream.shutdown(Shutdown::Both).ok();
                sessions.remove(&session_id);
            }
        }
    }

    /// Unregister and shut a session down immediately. Idempotent.
    pub fn teardown_session(&self, session_id: i32) {
        let mut sessions = self.inner.sessions.lock().unwrap();
        if let Some(session) = sessions.remove(&session_id) {
            log::info!("Teardown socket session {}", session_id);
            session.stream.shutdown(Shutdown::Both).ok();
        }
    }

    /// Stop the service: shut every session down and join the thread
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(thread) = self.thread.lock().unwrap().take() {
            thread.join().ok();
        }

        let mut sessions = self.inner.sessions.lock().unwrap();
        for (_, session) in sessions.drain() {
            session.stream.shutdown(Shutdown::Both).ok();
        }
    }
}

impl Drop for SocketComm {
    fn drop(&mut self) {
        self.stop();
    }
}

enum SessionVerdict {
    Keep,
    Remove,
}

fn socket_loop(inner: Arc<SocketCommInner>) {
    log::debug!("Socket thread started");
    while inner.active.load(Ordering::SeqCst) {
        let mut posts: Vec<(EventSink, SocketEvent)> = Vec::new();
        let mut idle = true;

        {
            let mut sessions = inner.sessions.lock().unwrap();
            let mut remove: Vec<i32> = Vec::new();

            for (&session_id, session) in sessions.iter_mut() {
                let before = posts.len();
                if let SessionVerdict::Remove =
                    service_session(session_id, session, &mut posts)
                {
                    remove.push(session_id);
                }
                if posts.len() > before {
                    idle = false;
                }
            }

            for session_id in remove {
                if let Some(session) = sessions.remove(&session_id) {
                    session.stream.shutdown(Shutdown::Both).ok();
                }
            }
        }

        // events are posted without the registry lock held
        for (sink, event) in posts {
            sink(event);
        }

        if idle {
            std::thread::sleep(POLL_PERIOD);
        }
    }
    log::debug!("Socket thread stopped");
}

fn service_session(
    session_id: i32,
    session: &mut SocketSession,
    posts: &mut Vec<(EventSink, SocketEvent)>,
) -> SessionVerdict {
    service_writes(session);
    if session.write_failures >= MAX_WRITE_ATTEMPTS {
        posts.push((
            session.sink.clone(),
            SocketEvent {
                session_id,
                kind: SocketEventKind::Exception(std::io::Error::new(
                    ErrorKind::BrokenPipe,
                    "send failed after retries",
                )),
            },
        ));
        return SessionVerdict::Remove;
    }

    if session.close_after_write && session.write_queue.is_empty() {
        session.stream.shutdown(Shutdown::Both).ok();
        return SessionVerdict::Remove;
    }

    if session.paused_read {
        return SessionVerdict::Keep;
    }

    let mut closed = false;
    let mut exception: Option<std::io::Error> = None;
    let mut chunk = [0u8; 4096];
    loop {
        match session.stream.read(&mut chunk) {
            Ok(0) => {
                closed = true;
                break;
            }
            Ok(n) => session.rx_buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                exception = Some(e);
                break;
            }
        }
    }

    let mut fatal_frame = false;
    let mut messages = Vec::new();
    while let Some(frame_len) = message::declared_message_length(&session.rx_buf) {
        if frame_len < message::COMMON_HEADER_SIZE || frame_len > message::MAX_MESSAGE_SIZE {
            // the stream cannot be re-synchronized past a lying length field
            if !messages.is_empty() {
                posts.push((
                    session.sink.clone(),
                    SocketEvent {
                        session_id,
                        kind: SocketEventKind::Messages(std::mem::take(&mut messages)),
                    },
                ));
            }
            posts.push((
                session.sink.clone(),
                SocketEvent {
                    session_id,
                    kind: SocketEventKind::DecodeFailure(DecodeError::BadMessageLength(
                        frame_len as u16,
                    )),
                },
            ));
            fatal_frame = true;
            break;
        }

        if session.rx_buf.len() < frame_len {
            break;
        }

        let frame: Vec<u8> = session.rx_buf.drain(..frame_len).collect();
        match Message::decode(&frame) {
            Ok(message) => messages.push(message),
            Err(e) => {
                if !messages.is_empty() {
                    posts.push((
                        session.sink.clone(),
                        SocketEvent {
                            session_id,
                            kind: SocketEventKind::Messages(std::mem::take(&mut messages)),
                        },
                    ));
                }
                let stop = e.is_framing_fatal();
                posts.push((
                    session.sink.clone(),
                    SocketEvent {
                        session_id,
                        kind: SocketEventKind::DecodeFailure(e),
                    },
                ));
                if stop {
                    fatal_frame = true;
                    break;
                }
            }
        }
    }

    if !messages.is_empty() {
        posts.push((
            session.sink.clone(),
            SocketEvent {
                session_id,
                kind: SocketEventKind::Messages(messages),
            },
        ));
    }

    if fatal_frame {
        // the session layer decides how to close
        session.paused_read = true;
        session.rx_buf.clear();
        return SessionVerdict::Keep;
    }

    if let Some(e) = exception {
        log::warn!("Socket exception on session {}: {}", session_id, e);
        posts.push((
            session.sink.clone(),
            SocketEvent {
                session_id,
                kind: SocketEventKind::Exception(e),
            },
        ));
        return SessionVerdict::Remove;
    }

    if closed {
        log::info!("Remote shutdown on session {}", session_id);
        posts.push((
            session.sink.clone(),
            SocketEvent {
                session_id,
                kind: SocketEventKind::Closed,
            },
        ));
        return SessionVerdict::Remove;
    }

    SessionVerdict::Keep
}

fn service_writes(session: &mut SocketSession) {
    while let Some(front) = session.write_queue.front() {
        match session.stream.write(&front[session.write_offset..]) {
            Ok(n) => {
                session.write_offset += n;
                session.write_failures = 0;
                if session.write_offset >= front.len() {
                    session.write_queue.pop_front();
                    session.write_offset = 0;
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                session.write_failures += 1;
                log::warn!(
                    "Write failure {}/{}: {}",
                    session.write_failures,
                    MAX_WRITE_ATTEMPTS,
                    e
                );
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn channel_sink() -> (EventSink, mpsc::Receiver<SocketEvent>) {
        let (tx, rx) = mpsc::channel();
        let sink: EventSink = Arc::new(move |event| {
            tx.send(event).ok();
        });
        (sink, rx)
    }

    fn expect_connected(rx: &mpsc::Receiver<SocketEvent>) {
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event.kind, SocketEventKind::Connected));
    }

    #[test]
    pub fn test_split_frame_is_reassembled() {
        crate::tests::init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let comm = SocketComm::start();
        let (sink, rx) = channel_sink();

        comm.connect(1, addr, Duration::from_secs(2), sink).unwrap();
        let (mut peer, _) = listener.accept().unwrap();
        expect_connected(&rx);

        let data = Message::keepalive().to_bytes();
        peer.write_all(&data[..2]).unwrap();
        peer.flush().unwrap();
        std::thread::sleep(Duration::from_millis(200));
        peer.write_all(&data[2..]).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match event.kind {
            SocketEventKind::Messages(messages) => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].msg_type, message::MessageType::KeepAlive);
            }
            other => panic!("expected messages, got {:?}", other),
        }
        comm.stop();
    }

    #[test]
    pub fn test_coalesced_frames_are_split() {
        crate::tests::init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let comm = SocketComm::start();
        let (sink, rx) = channel_sink();

        comm.connect(2, addr, Duration::from_secs(2), sink).unwrap();
        let (mut peer, _) = listener.accept().unwrap();
        expect_connected(&rx);

        let mut data = Message::keepalive().to_bytes();
        data.extend(Message::close(1).to_bytes());
        peer.write_all(&data).unwrap();

        let mut received = Vec::new();
        while received.len() < 2 {
            let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            match event.kind {
                SocketEventKind::Messages(messages) => received.extend(messages),
                other => panic!("expected messages, got {:?}", other),
            }
        }
        assert_eq!(received[0].msg_type, message::MessageType::KeepAlive);
        assert_eq!(received[1].msg_type, message::MessageType::Close);
        comm.stop();
    }

    #[test]
    pub fn test_remote_shutdown_is_reported() {
        crate::tests::init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let comm = SocketComm::start();
        let (sink, rx) = channel_sink();

        comm.connect(3, addr, Duration::from_secs(2), sink).unwrap();
        let (peer, _) = listener.accept().unwrap();
        expect_connected(&rx);
        drop(peer);

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event.kind, SocketEventKind::Closed));
        comm.stop();
    }

    #[test]
    pub fn test_oversize_frame_is_rejected() {
        crate::tests::init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let comm = SocketComm::start();
        let (sink, rx) = channel_sink();

        comm.connect(4, addr, Duration::from_secs(2), sink).unwrap();
        let (mut peer, _) = listener.accept().unwrap();
        expect_connected(&rx);

        // declared length 8000 exceeds the frame cap
        peer.write_all(&[0x20, 2, 0x1f, 0x40]).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match event.kind {
            SocketEventKind::DecodeFailure(e) => assert!(e.is_framing_fatal()),
            other => panic!("expected decode failure, got {:?}", other),
        }
        comm.stop();
    }
}
