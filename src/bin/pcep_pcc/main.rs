use std::time::Duration;

use clap::Parser;
use pcep::messages::object::{EndpointsIpv4Object, ObjectBody, RpObject};
use pcep::messages::Message;
use pcep::pcc::{AppEvent, SessionConfig, SessionLogic};

#[derive(Parser, Debug)]
#[command(
    name = "pcep-pcc",
    about = "Open a PCEP session with a PCE and issue one path computation request"
)]
struct Args {
    /// PCE address, e.g. 192.0.2.10:4189
    pce: std::net::SocketAddr,
    /// Source endpoint of the requested path
    #[arg(long, default_value = "10.0.0.1")]
    src: std::net::Ipv4Addr,
    /// Destination endpoint of the requested path
    #[arg(long, default_value = "10.0.0.2")]
    dst: std::net::Ipv4Addr,
    /// Keepalive period advertised to the PCE, in seconds
    #[arg(long, default_value_t = 30)]
    keep_alive: u8,
    /// Dead timer advertised to the PCE, in seconds
    #[arg(long, default_value_t = 120)]
    dead_timer: u8,
    /// Seconds to wait for the path computation reply
    #[arg(long, default_value_t = 30)]
    request_time: u16,
}

fn main() {
    env_logger::builder().try_init().ok();
    let args = Args::parse();

    let config = SessionConfig {
        keep_alive_seconds: args.keep_alive,
        dead_timer_seconds: args.dead_timer,
        request_time_seconds: args.request_time,
        ..Default::default()
    };

    log::info!("Start the PCEP session engine");
    let logic = SessionLogic::run().expect("Fail to start the session engine");

    log::info!("Connect to PCE {}", args.pce);
    let session = match logic.create_session(&config, args.pce) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Fail to connect to {}: {}", args.pce, e);
            std::process::exit(-1);
        }
    };

    // wait for the Open handshake to complete
    let deadline = Duration::from_secs(config.open_keep_wait_seconds as u64 + 5);
    match logic.wait_event(deadline) {
        Some(AppEvent::PccConnectedToPce(_)) => log::info!("Session opened"),
        other => {
            log::error!("Session did not open: {:?}", other);
            logic.stop();
            std::process::exit(-1);
        }
    }

    let request_id = 1;
    let response = logic
        .register_response(
            session,
            request_id,
            Duration::from_secs(args.request_time as u64),
        )
        .expect("Fail to register the request");

    let request = Message::request(
        RpObject {
            priority: 0,
            flag_reoptimization: false,
            flag_bidirectional: false,
            flag_loose_path: true,
            request_id,
        },
        ObjectBody::EndpointsIpv4(EndpointsIpv4Object {
            src: args.src,
            dst: args.dst,
        }),
        Vec::new(),
    );

    log::info!("Request a path from {} to {}", args.src, args.dst);
    logic
        .send_message(session, request)
        .expect("Fail to send the request");

    if response.wait() {
        for message in response.responses() {
            println!("Received {}:", message.msg_type.to_str());
            for obj in &message.objects {
                println!("  {:?}", obj.body);
            }
        }
    } else {
        log::error!("No reply within {}s", args.request_time);
    }

    logic.destroy_session(session);
    logic.stop();
}
