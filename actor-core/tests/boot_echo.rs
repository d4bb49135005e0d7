//! Boot + echo round trip.
//!
//! N=2 workers. An "echo" service lives on worker 1 and replies to every
//! direct message with its payload reversed. A "client" service on
//! worker 2 sends `("hello", session=7)` once started and records the
//! reply it gets back, proving the session round-trip law: the caller
//! observes `|session| == 7` regardless of the sign actually on the wire.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use actor_core::buffer::Buffer;
use actor_core::{Envelope, MessageType, Service, ServiceContext, Supervisor};

const ECHO_ADDR: u32 = 0x0100_0001;

struct Echo;

impl Service for Echo {
    fn init(&mut self, _ctx: &ServiceContext, _config: &[u8]) -> bool {
        true
    }

    fn dispatch(&mut self, ctx: &ServiceContext, envelope: &Envelope) {
        let reversed: Vec<u8> = envelope.data().iter().rev().copied().collect();
        ctx.router()
            .response(envelope.sender(), "", &reversed, envelope.session(), MessageType::TEXT);
    }
}

struct Client {
    tx: mpsc::Sender<(i32, Vec<u8>)>,
}

impl Service for Client {
    fn init(&mut self, _ctx: &ServiceContext, _config: &[u8]) -> bool {
        true
    }

    fn start(&mut self, ctx: &ServiceContext) {
        let mut buf = Buffer::with_capacity(5);
        buf.write_back(b"hello");
        ctx.router().send(ctx.id(), ECHO_ADDR, buf, "", 7, MessageType::TEXT);
    }

    fn dispatch(&mut self, _ctx: &ServiceContext, envelope: &Envelope) {
        let _ = self.tx.send((envelope.session(), envelope.data().to_vec()));
    }
}

#[test]
fn echo_round_trip_reverses_payload_and_preserves_session() {
    let sup = Arc::new(Supervisor::boot(2).expect("boot"));
    sup.router().register_service("echo", || Box::new(Echo));

    let (tx, rx) = mpsc::channel();
    sup.router().register_service("client", move || Box::new(Client { tx: tx.clone() }));

    sup.router().new_service("echo", "", Vec::new(), false, 1, 0, 0);
    sup.router().new_service("client", "", Vec::new(), false, 2, 0, 0);

    let runner = {
        let sup = sup.clone();
        thread::spawn(move || sup.run())
    };

    let (session, body) = rx.recv_timeout(Duration::from_secs(2)).expect("echo reply");
    sup.stop();
    runner.join().unwrap();

    assert_eq!(session.abs(), 7);
    assert_eq!(body, b"olleh");
}
