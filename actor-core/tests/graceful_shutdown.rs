//! Graceful shutdown across many services and workers.
//!
//! N=3 workers host 10 "worker" services, spread by the router's
//! shared-first round robin. `stop()` is issued once every service has
//! recorded that it started; each must observe `exit()` exactly once
//! (the default `exit()` hook calls `ServiceContext::quit`, which issues
//! `remove_service` on itself), every worker's services map must drain to
//! empty, and `run()` must return with every worker reporting stopped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use actor_core::{Envelope, Service, ServiceContext, State, Supervisor};

const SERVICE_COUNT: usize = 10;

struct Counter {
    started: Arc<AtomicUsize>,
    exited: Arc<AtomicUsize>,
}

impl Service for Counter {
    fn init(&mut self, _ctx: &ServiceContext, _config: &[u8]) -> bool {
        true
    }

    fn start(&mut self, _ctx: &ServiceContext) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn dispatch(&mut self, _ctx: &ServiceContext, _envelope: &Envelope) {}

    fn exit(&mut self, ctx: &ServiceContext) {
        self.exited.fetch_add(1, Ordering::SeqCst);
        ctx.quit();
    }
}

#[test]
fn stop_drains_every_worker_and_every_service() {
    let sup = Arc::new(Supervisor::boot(3).expect("boot"));

    let started = Arc::new(AtomicUsize::new(0));
    let exited = Arc::new(AtomicUsize::new(0));
    {
        let started = started.clone();
        let exited = exited.clone();
        sup.router().register_service("counter", move || {
            Box::new(Counter { started: started.clone(), exited: exited.clone() })
        });
    }

    for _ in 0..SERVICE_COUNT {
        sup.router().new_service("counter", "", Vec::new(), false, 0, 0, 0);
    }
    assert_eq!(sup.service_count(), SERVICE_COUNT as u32);

    let runner = {
        let sup = sup.clone();
        thread::spawn(move || sup.run())
    };

    while started.load(Ordering::SeqCst) < SERVICE_COUNT {
        thread::sleep(Duration::from_millis(5));
    }

    sup.stop();
    runner.join().unwrap();

    assert_eq!(exited.load(Ordering::SeqCst), SERVICE_COUNT);
    assert_eq!(sup.service_count(), 0);
    assert_eq!(sup.state(), State::Exited);
}
