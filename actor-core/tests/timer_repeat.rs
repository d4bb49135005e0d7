//! Timer repeat.
//!
//! A service arms `repeat_timer(10ms, 3)` from its own `start()`. It must
//! observe exactly three `on_timer` firings, with `is_last` set only on
//! the third, and nothing further after that.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use actor_core::{Envelope, Service, ServiceContext, Supervisor, TimerId};

struct Ticker {
    tx: mpsc::Sender<bool>,
    timer_id: Option<TimerId>,
}

impl Service for Ticker {
    fn init(&mut self, _ctx: &ServiceContext, _config: &[u8]) -> bool {
        true
    }

    fn start(&mut self, ctx: &ServiceContext) {
        self.timer_id = Some(ctx.repeat_timer(10, 3));
    }

    fn dispatch(&mut self, _ctx: &ServiceContext, _envelope: &Envelope) {}

    fn on_timer(&mut self, _ctx: &ServiceContext, timer_id: TimerId, is_last: bool) {
        if self.timer_id == Some(timer_id) {
            let _ = self.tx.send(is_last);
        }
    }
}

#[test]
fn timer_fires_exactly_three_times_with_is_last_on_the_third() {
    let sup = Arc::new(Supervisor::boot(1).expect("boot"));

    let (tx, rx) = mpsc::channel();
    sup.router()
        .register_service("ticker", move || Box::new(Ticker { tx: tx.clone(), timer_id: None }));
    sup.router().new_service("ticker", "", Vec::new(), false, 1, 0, 0);

    let runner = {
        let sup = sup.clone();
        thread::spawn(move || sup.run())
    };

    let firings: Vec<bool> = (0..3)
        .map(|_| rx.recv_timeout(Duration::from_secs(2)).expect("timer firing"))
        .collect();

    // A fourth firing must never arrive.
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    sup.stop();
    runner.join().unwrap();

    assert_eq!(firings, vec![false, false, true]);
}
