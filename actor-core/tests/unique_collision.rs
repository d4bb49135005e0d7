//! Unique-name collision.
//!
//! Two services are both created with `unique=true`, and both attempt to
//! claim the name `"db"` from their own `init()` via
//! `Router::set_unique_service`. The first succeeds; the second observes
//! `set_unique_service` returning `false` and fails its own `init`. An
//! init failure from a service marked `unique` is treated as a
//! critical-singleton failure: the whole
//! runtime begins shutting down on its own, so `run()` returns without an
//! external `stop()` call, and the one service that *did* start ends up
//! torn down too.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actor_core::{Service, ServiceContext, State, Supervisor};

struct Db {
    claimed: Arc<AtomicUsize>,
}

impl Service for Db {
    fn init(&mut self, ctx: &ServiceContext, _config: &[u8]) -> bool {
        if ctx.router().set_unique_service("db", ctx.id()) {
            self.claimed.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

#[test]
fn second_unique_claimant_fails_init_and_triggers_critical_shutdown() {
    let sup = Supervisor::boot(1).expect("boot");
    let claimed = Arc::new(AtomicUsize::new(0));

    {
        let claimed = claimed.clone();
        sup.router()
            .register_service("db", move || Box::new(Db { claimed: claimed.clone() }));
    }

    // Submitted back-to-back, so they're processed serially in this order
    // by worker 1's single task queue.
    sup.router().new_service("db", "", Vec::new(), true, 1, 0, 0);
    sup.router().new_service("db", "", Vec::new(), true, 1, 0, 0);

    sup.run();

    assert_eq!(claimed.load(Ordering::SeqCst), 1, "only the first claimant's init ran to success");
    assert_eq!(sup.router().get_unique_service("db"), 0x0100_0001);
    assert_eq!(sup.service_count(), 0, "the surviving service was torn down along with the runtime");
    assert_eq!(sup.state(), State::Exited);
}
