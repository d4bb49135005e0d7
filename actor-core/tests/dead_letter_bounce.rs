//! Dead-letter bounce.
//!
//! N=1. S1 sends to a non-existent address with session=9. S1 must
//! receive an `error`-typed envelope whose session has been flipped back
//! to +9 (negated once by `Router::send`, negated again by the
//! dead-letter path to restore the original sign) and whose header
//! begins with `"worker::handle_one"`.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use actor_core::buffer::Buffer;
use actor_core::{Envelope, MessageType, Service, ServiceContext, Supervisor};

const DEAD_ADDR: u32 = 0x0100_0099;

struct Pinger {
    tx: mpsc::Sender<(MessageType, i32, String)>,
}

impl Service for Pinger {
    fn init(&mut self, _ctx: &ServiceContext, _config: &[u8]) -> bool {
        true
    }

    fn start(&mut self, ctx: &ServiceContext) {
        let mut buf = Buffer::with_capacity(4);
        buf.write_back(b"ping");
        ctx.router().send(ctx.id(), DEAD_ADDR, buf, "", 9, MessageType::TEXT);
    }

    fn dispatch(&mut self, _ctx: &ServiceContext, envelope: &Envelope) {
        let _ = self
            .tx
            .send((envelope.msg_type(), envelope.session(), envelope.header().to_string()));
    }
}

#[test]
fn send_to_nonexistent_service_bounces_an_error_with_restored_session_sign() {
    let sup = Arc::new(Supervisor::boot(1).expect("boot"));

    let (tx, rx) = mpsc::channel();
    sup.router().register_service("pinger", move || Box::new(Pinger { tx: tx.clone() }));
    sup.router().new_service("pinger", "", Vec::new(), false, 1, 0, 0);

    let runner = {
        let sup = sup.clone();
        thread::spawn(move || sup.run())
    };

    let (msg_type, session, header) = rx.recv_timeout(Duration::from_secs(2)).expect("dead-letter bounce");
    sup.stop();
    runner.join().unwrap();

    assert_eq!(msg_type, MessageType::ERROR);
    assert_eq!(session, 9);
    assert!(header.starts_with("worker::handle_one"));
}
