//! Broadcast excludes sender.
//!
//! N=1. Three "listener" services (S1, S2, S3) share one channel. S2
//! broadcasts a `"ping"` header message from its own `start()`. Exactly
//! S1 and S3 must observe it — never S2 itself.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use actor_core::buffer::Buffer;
use actor_core::{Envelope, MessageType, Service, ServiceContext, Supervisor};

struct Listener {
    tx: mpsc::Sender<u32>,
    broadcaster: bool,
}

impl Service for Listener {
    fn init(&mut self, _ctx: &ServiceContext, _config: &[u8]) -> bool {
        true
    }

    fn start(&mut self, ctx: &ServiceContext) {
        if self.broadcaster {
            let mut buf = Buffer::with_capacity(4);
            buf.write_back(b"ping");
            ctx.router().broadcast(ctx.id(), buf.into_shared(), "ping", MessageType::SYSTEM);
        }
    }

    fn dispatch(&mut self, ctx: &ServiceContext, _envelope: &Envelope) {
        let _ = self.tx.send(ctx.id());
    }
}

#[test]
fn broadcast_reaches_every_live_service_but_the_sender() {
    let sup = Arc::new(Supervisor::boot(1).expect("boot"));

    let (tx, rx) = mpsc::channel();
    {
        let tx = tx.clone();
        sup.router().register_service("listener-plain", move || {
            Box::new(Listener { tx: tx.clone(), broadcaster: false })
        });
    }
    sup.router()
        .register_service("listener-broadcaster", move || Box::new(Listener { tx: tx.clone(), broadcaster: true }));

    // S1, S2 (the broadcaster), S3 — created in that order, all on worker 1.
    sup.router().new_service("listener-plain", "", Vec::new(), false, 1, 0, 0);
    sup.router().new_service("listener-broadcaster", "", Vec::new(), false, 1, 0, 0);
    sup.router().new_service("listener-plain", "", Vec::new(), false, 1, 0, 0);

    let runner = {
        let sup = sup.clone();
        thread::spawn(move || sup.run())
    };

    let mut receivers = Vec::new();
    for _ in 0..2 {
        receivers.push(rx.recv_timeout(Duration::from_secs(2)).expect("broadcast receipt"));
    }
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err(), "a third receipt means the sender saw its own broadcast");

    sup.stop();
    runner.join().unwrap();

    let broadcaster_addr = 0x0100_0002u32; // S2, second service created on worker 1
    assert_eq!(receivers.len(), 2);
    assert!(!receivers.contains(&broadcaster_addr));
}
