mod tests {
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
    use std::time::Duration;

    use pcep::messages::object::{
        self, EndpointsIpv4Object, ObjectBody, OpenObject, RouteObject, RpObject,
    };
    use pcep::messages::subobj::RouteSubobject;
    use pcep::messages::{Message, MessageType};
    use pcep::pcc::{AppEvent, ResponseStatus, SessionConfig, SessionLogic, SessionState};

    pub fn init() {
        env_logger::builder().is_test(true).try_init().ok();
    }

    fn spawn_pce<F>(script: F) -> (SocketAddr, std::thread::JoinHandle<()>)
    where
        F: FnOnce(TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let thread = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(20)))
                .unwrap();
            script(stream);
        });
        (addr, thread)
    }

    fn read_message(stream: &mut TcpStream) -> Message {
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).unwrap();
        let length = u16::from_be_bytes([header[2], header[3]]) as usize;
        let mut buf = vec![0u8; length];
        buf[..4].copy_from_slice(&header);
        stream.read_exact(&mut buf[4..]).unwrap();
        Message::decode(&buf).unwrap()
    }

    /// Read messages, skipping KeepAlives, until one of `msg_type` arrives
    fn read_until(stream: &mut TcpStream, msg_type: MessageType) -> Message {
        loop {
            let message = read_message(stream);
            if message.msg_type == msg_type {
                return message;
            }
            assert_eq!(
                message.msg_type,
                MessageType::KeepAlive,
                "unexpected {} while waiting for {}",
                message.msg_type.to_str(),
                msg_type.to_str()
            );
        }
    }

    fn send(stream: &mut TcpStream, message: &Message) {
        stream.write_all(&message.to_bytes()).unwrap();
    }

    /// Accept the PCC's Open, answer with our own and swallow its KeepAlive
    fn pce_handshake(stream: &mut TcpStream, keepalive: u8, dead_timer: u8) -> OpenObject {
        let open_msg = read_until(stream, MessageType::Open);
        let pcc_open = match &open_msg.first_object(object::OBJECT_CLASS_OPEN).unwrap().body {
            ObjectBody::Open(open) => open.clone(),
            other => panic!("expected Open object, got {:?}", other),
        };

        send(
            stream,
            &Message::open(
                OpenObject {
                    version: 1,
                    keepalive,
                    dead_timer,
                    sid: 1,
                },
                vec![],
            ),
        );
        read_until(stream, MessageType::KeepAlive);
        pcc_open
    }

    fn wait_for_opened(logic: &SessionLogic) {
        match logic.wait_event(Duration::from_secs(10)) {
            Some(AppEvent::PccConnectedToPce(_)) => {}
            other => panic!("session did not open: {:?}", other),
        }
    }

    #[test]
    pub fn test_open_handshake() {
        init();
        let (addr, pce) = spawn_pce(|mut stream| {
            let pcc_open = pce_handshake(&mut stream, 30, 120);
            assert_eq!(pcc_open.keepalive, 30);
            assert_eq!(pcc_open.dead_timer, 120);
            assert_eq!(pcc_open.version, 1);
            // keep the socket up while the other side runs its assertions
            std::thread::sleep(Duration::from_secs(2));
        });

        let logic = SessionLogic::run().unwrap();
        let config = SessionConfig::default();
        let session = logic.create_session(&config, addr).unwrap();

        wait_for_opened(&logic);
        assert_eq!(logic.session_state(session), Some(SessionState::Opened));
        assert_eq!(
            logic.remote_open(session),
            Some(OpenObject {
                version: 1,
                keepalive: 30,
                dead_timer: 120,
                sid: 1,
            })
        );

        let counters = logic.session_counters(session).unwrap();
        assert_eq!(counters.tx_count(MessageType::Open), 1);
        assert_eq!(counters.tx_count(MessageType::KeepAlive), 1);
        assert_eq!(counters.rx_count(MessageType::Open), 1);
        assert_eq!(counters.rx_object_count(object::OBJECT_CLASS_OPEN), 1);
        assert_eq!(counters.connect, 1);

        logic.destroy_session(session);
        assert_eq!(logic.session_state(session), None);
        pce.join().unwrap();
        logic.stop();
    }

    #[test]
    pub fn test_open_keep_wait_timeout() {
        init();
        let (addr, pce) = spawn_pce(|mut stream| {
            // swallow the PCC's Open and stay silent
            read_until(&mut stream, MessageType::Open);

            let error = read_until(&mut stream, MessageType::Error);
            match &error.first_object(object::OBJECT_CLASS_ERROR).unwrap().body {
                ObjectBody::Error(err) => {
                    assert_eq!(err.error_type, object::ERROR_TYPE_SESSION_FAILURE);
                    assert_eq!(err.error_value, object::ERROR_VALUE_OPENWAIT_TIMED_OUT);
                }
                other => panic!("expected Error object, got {:?}", other),
            }

            let close = read_until(&mut stream, MessageType::Close);
            match &close.first_object(object::OBJECT_CLASS_CLOSE).unwrap().body {
                ObjectBody::Close(close) => assert_eq!(close.reason, object::CLOSE_REASON_NO),
                other => panic!("expected Close object, got {:?}", other),
            }
        });

        let logic = SessionLogic::run().unwrap();
        let config = SessionConfig {
            open_keep_wait_seconds: 2,
            ..Default::default()
        };
        let session = logic.create_session(&config, addr).unwrap();

        match logic.wait_event(Duration::from_secs(10)) {
            Some(AppEvent::PccDisconnected(id)) => assert_eq!(id, session),
            other => panic!("expected disconnect, got {:?}", other),
        }
        assert_eq!(logic.session_state(session), None);

        pce.join().unwrap();
        logic.stop();
    }

    #[test]
    pub fn test_dead_timer_expiry() {
        init();
        let (addr, pce) = spawn_pce(|mut stream| {
            // advertise a 4 second dead timer, then go silent
            pce_handshake(&mut stream, 2, 4);

            let close = read_until(&mut stream, MessageType::Close);
            match &close.first_object(object::OBJECT_CLASS_CLOSE).unwrap().body {
                ObjectBody::Close(close) => {
                    assert_eq!(close.reason, object::CLOSE_REASON_DEADTIMER)
                }
                other => panic!("expected Close object, got {:?}", other),
            }
        });

        let logic = SessionLogic::run().unwrap();
        let config = SessionConfig::default();
        let session = logic.create_session(&config, addr).unwrap();
        wait_for_opened(&logic);

        match logic.wait_event(Duration::from_secs(10)) {
            Some(AppEvent::PccDisconnected(id)) => assert_eq!(id, session),
            other => panic!("expected disconnect, got {:?}", other),
        }
        assert_eq!(logic.session_state(session), None);

        let counters_gone = logic.session_counters(session);
        assert!(counters_gone.is_none());

        pce.join().unwrap();
        logic.stop();
    }

    #[test]
    pub fn test_pcreq_pcrep_correlation() {
        init();
        let (addr, pce) = spawn_pce(|mut stream| {
            pce_handshake(&mut stream, 30, 120);

            let request = read_until(&mut stream, MessageType::PcReq);
            let rp = match &request.first_object(object::OBJECT_CLASS_RP).unwrap().body {
                ObjectBody::Rp(rp) => rp.clone(),
                other => panic!("expected RP object, got {:?}", other),
            };
            assert_eq!(rp.request_id, 7);
            assert_eq!(rp.priority, 3);
            match &request
                .first_object(object::OBJECT_CLASS_ENDPOINTS)
                .unwrap()
                .body
            {
                ObjectBody::EndpointsIpv4(ep) => {
                    assert_eq!(ep.src, Ipv4Addr::new(10, 0, 0, 1));
                    assert_eq!(ep.dst, Ipv4Addr::new(10, 0, 0, 2));
                }
                other => panic!("expected IPv4 endpoints, got {:?}", other),
            }

            let reply = Message::new(
                MessageType::PcRep,
                vec![
                    object::Object::new(ObjectBody::Rp(rp)),
                    object::Object::new(ObjectBody::Ero(RouteObject {
                        subobjects: vec![RouteSubobject::Ipv4 {
                            loose: true,
                            addr: Ipv4Addr::new(10, 0, 0, 5),
                            prefix_length: 32,
                            flag_local_protection: false,
                        }],
                    })),
                ],
            );
            send(&mut stream, &reply);
            // keep the socket up while the other side runs its assertions
            std::thread::sleep(Duration::from_secs(2));
        });

        let logic = SessionLogic::run().unwrap();
        let config = SessionConfig::default();
        let session = logic.create_session(&config, addr).unwrap();
        wait_for_opened(&logic);

        let response = logic
            .register_response(session, 7, Duration::from_secs(5))
            .unwrap();
        assert_eq!(response.status(), ResponseStatus::Waiting);
        assert!(logic.get_registered_response(7).is_some());

        let request = Message::request(
            RpObject {
                priority: 3,
                flag_reoptimization: false,
                flag_bidirectional: false,
                flag_loose_path: true,
                request_id: 7,
            },
            ObjectBody::EndpointsIpv4(EndpointsIpv4Object {
                src: Ipv4Addr::new(10, 0, 0, 1),
                dst: Ipv4Addr::new(10, 0, 0, 2),
            }),
            Vec::new(),
        );
        logic.send_message(session, request).unwrap();
        assert_eq!(logic.session_state(session), Some(SessionState::WaitPcReq));

        assert!(response.wait());
        assert_eq!(response.status(), ResponseStatus::Ready);

        let responses = response.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].msg_type, MessageType::PcRep);
        assert_eq!(responses[0].request_id(), Some(7));
        match &responses[0]
            .first_object(object::OBJECT_CLASS_ERO)
            .unwrap()
            .body
        {
            ObjectBody::Ero(route) => {
                assert_eq!(route.subobjects.len(), 1);
                assert!(matches!(
                    route.subobjects[0],
                    RouteSubobject::Ipv4 { loose: true, .. }
                ));
            }
            other => panic!("expected ERO object, got {:?}", other),
        }

        // the reply releases the WaitPCReq state
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(logic.session_state(session), Some(SessionState::Opened));

        logic.destroy_session(session);
        pce.join().unwrap();
        logic.stop();
    }

    #[test]
    pub fn test_pcreq_timeout() {
        init();
        let (addr, pce) = spawn_pce(|mut stream| {
            pce_handshake(&mut stream, 30, 120);
            // swallow the request, never answer while the wait times out
            read_until(&mut stream, MessageType::PcReq);
            std::thread::sleep(Duration::from_secs(1));
        });

        let logic = SessionLogic::run().unwrap();
        let config = SessionConfig {
            request_time_seconds: 60,
            ..Default::default()
        };
        let session = logic.create_session(&config, addr).unwrap();
        wait_for_opened(&logic);

        // the wait deadline fires long before the PCReqWait timer
        let response = logic
            .register_response(session, 13, Duration::from_millis(300))
            .unwrap();
        let request = Message::request(
            RpObject {
                priority: 0,
                flag_reoptimization: false,
                flag_bidirectional: false,
                flag_loose_path: true,
                request_id: 13,
            },
            ObjectBody::EndpointsIpv4(EndpointsIpv4Object {
                src: Ipv4Addr::new(10, 0, 0, 1),
                dst: Ipv4Addr::new(10, 0, 0, 2),
            }),
            Vec::new(),
        );
        logic.send_message(session, request).unwrap();

        assert!(!response.wait());
        assert_eq!(response.status(), ResponseStatus::TimedOut);

        logic.destroy_session(session);
        pce.join().unwrap();
        logic.stop();
    }

    #[test]
    pub fn test_unknown_object_budget() {
        init();

        // a PCNtf carrying a single object of the unimplemented class 99
        let unknown_class_message: Vec<u8> = vec![
            0x20, 5, 0, 12, // common header, length 12
            99, 0x10, 0, 8, // object class 99, type 1, length 8
            0, 0, 0, 0,
        ];

        let (addr, pce) = spawn_pce(move |mut stream| {
            pce_handshake(&mut stream, 30, 120);

            for _ in 0..3 {
                stream.write_all(&unknown_class_message).unwrap();
                let error = read_until(&mut stream, MessageType::Error);
                match &error.first_object(object::OBJECT_CLASS_ERROR).unwrap().body {
                    ObjectBody::Error(err) => {
                        assert_eq!(err.error_type, object::ERROR_TYPE_UNKNOWN_OBJECT);
                        assert_eq!(err.error_value, object::ERROR_VALUE_UNREC_OBJECT_CLASS);
                    }
                    other => panic!("expected Error object, got {:?}", other),
                }
            }

            // leave room for the liveness check on the other side
            std::thread::sleep(Duration::from_secs(2));

            // the budget is spent: the fourth unknown message closes the session
            stream.write_all(&unknown_class_message).unwrap();
            read_until(&mut stream, MessageType::Error);
            read_until(&mut stream, MessageType::Close);
        });

        let logic = SessionLogic::run().unwrap();
        let config = SessionConfig {
            max_unknown_messages: 3,
            ..Default::default()
        };
        let session = logic.create_session(&config, addr).unwrap();
        wait_for_opened(&logic);

        // the first three violations leave the session up
        std::thread::sleep(Duration::from_secs(1));
        assert_eq!(logic.session_state(session), Some(SessionState::Opened));

        match logic.wait_event(Duration::from_secs(10)) {
            Some(AppEvent::PccDisconnected(id)) => assert_eq!(id, session),
            other => panic!("expected disconnect, got {:?}", other),
        }
        assert_eq!(logic.session_state(session), None);

        pce.join().unwrap();
        logic.stop();
    }

    #[test]
    pub fn test_unknown_message_type_budget() {
        init();

        // a header-only message of the undefined type 50
        let unknown_type_message: Vec<u8> = vec![0x20, 50, 0, 4];

        let (addr, pce) = spawn_pce(move |mut stream| {
            pce_handshake(&mut stream, 30, 120);

            // tolerated: counted against the budget, no PCErr is owed yet
            stream.write_all(&unknown_type_message).unwrap();
            std::thread::sleep(Duration::from_millis(500));

            // over budget: the session failure is reported before the Close
            stream.write_all(&unknown_type_message).unwrap();
            let error = read_until(&mut stream, MessageType::Error);
            match &error.first_object(object::OBJECT_CLASS_ERROR).unwrap().body {
                ObjectBody::Error(err) => {
                    assert_eq!(err.error_type, object::ERROR_TYPE_SESSION_FAILURE);
                    assert_eq!(err.error_value, object::ERROR_VALUE_RECEIVED_PCERR);
                }
                other => panic!("expected Error object, got {:?}", other),
            }

            let close = read_until(&mut stream, MessageType::Close);
            match &close.first_object(object::OBJECT_CLASS_CLOSE).unwrap().body {
                ObjectBody::Close(close) => {
                    assert_eq!(close.reason, object::CLOSE_REASON_UNREC_MSG)
                }
                other => panic!("expected Close object, got {:?}", other),
            }
        });

        let logic = SessionLogic::run().unwrap();
        let config = SessionConfig {
            max_unknown_messages: 1,
            ..Default::default()
        };
        let session = logic.create_session(&config, addr).unwrap();
        wait_for_opened(&logic);

        match logic.wait_event(Duration::from_secs(10)) {
            Some(AppEvent::PccDisconnected(id)) => assert_eq!(id, session),
            other => panic!("expected disconnect, got {:?}", other),
        }
        assert_eq!(logic.session_state(session), None);

        pce.join().unwrap();
        logic.stop();
    }

    #[test]
    pub fn test_pce_close_is_reported() {
        init();
        let (addr, pce) = spawn_pce(|mut stream| {
            pce_handshake(&mut stream, 30, 120);
            send(&mut stream, &Message::close(object::CLOSE_REASON_NO));
        });

        let logic = SessionLogic::run().unwrap();
        let config = SessionConfig::default();
        let session = logic.create_session(&config, addr).unwrap();
        wait_for_opened(&logic);

        match logic.wait_event(Duration::from_secs(10)) {
            Some(AppEvent::PceClosed { session_id, reason }) => {
                assert_eq!(session_id, session);
                assert_eq!(reason, object::CLOSE_REASON_NO);
            }
            other => panic!("expected close event, got {:?}", other),
        }

        // a torn down session never comes back
        assert_eq!(logic.session_state(session), None);
        assert!(logic.send_message(session, Message::keepalive()).is_err());
        logic.destroy_session(session);
        assert_eq!(logic.session_state(session), None);

        pce.join().unwrap();
        logic.stop();
    }

    #[test]
    pub fn test_open_negotiation_counter_proposal() {
        init();
        let (addr, pce) = spawn_pce(|mut stream| {
            read_until(&mut stream, MessageType::Open);

            // first proposal: dead timer below twice the keepalive
            send(
                &mut stream,
                &Message::open(
                    OpenObject {
                        version: 1,
                        keepalive: 30,
                        dead_timer: 10,
                        sid: 1,
                    },
                    vec![],
                ),
            );

            let error = read_until(&mut stream, MessageType::Error);
            match &error.first_object(object::OBJECT_CLASS_ERROR).unwrap().body {
                ObjectBody::Error(err) => {
                    assert_eq!(err.error_type, object::ERROR_TYPE_SESSION_FAILURE);
                    assert_eq!(err.error_value, object::ERROR_VALUE_UNACCEPTABLE_OPEN_NEG);
                }
                other => panic!("expected Error object, got {:?}", other),
            }
            // the PCC counter-proposes acceptable values
            read_until(&mut stream, MessageType::Open);

            // second proposal is acceptable
            send(
                &mut stream,
                &Message::open(
                    OpenObject {
                        version: 1,
                        keepalive: 30,
                        dead_timer: 120,
                        sid: 1,
                    },
                    vec![],
                ),
            );
            read_until(&mut stream, MessageType::KeepAlive);
            std::thread::sleep(Duration::from_secs(2));
        });

        let logic = SessionLogic::run().unwrap();
        let config = SessionConfig::default();
        let session = logic.create_session(&config, addr).unwrap();

        wait_for_opened(&logic);
        assert_eq!(logic.session_state(session), Some(SessionState::Opened));

        logic.destroy_session(session);
        pce.join().unwrap();
        logic.stop();
    }
}
