//! The service abstraction: a capability set `{init, start, dispatch,
//! on_timer, exit, destroy}` implemented as a trait with dynamic
//! dispatch. The runtime never downcasts a `Box<dyn Service>` back to a
//! concrete type — everything it needs crosses the trait boundary.

use std::sync::Arc;

use crate::envelope::Envelope;
use crate::router::Router;
use crate::timer::TimerId;

/// Non-owning handle a service uses to call back into the runtime:
/// sending messages, arming timers, registering itself, or quitting.
///
/// A service never outlives its worker, and a worker never outlives the
/// supervisor; `ServiceContext` only needs to reach the process-wide
/// `Router`, which is itself scoped to the supervisor's lifetime.
#[derive(Clone)]
pub struct ServiceContext {
    router: Arc<Router>,
    id: u32,
}

impl ServiceContext {
    pub(crate) fn new(router: Arc<Router>, id: u32) -> Self {
        ServiceContext { router, id }
    }

    /// This service's own address.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Requests removal of this service. The default `exit()` hook calls
    /// this; services overriding `exit()` for a graceful drain should
    /// call it once they're done.
    pub fn quit(&self) {
        self.router.remove_service(self.id, 0, 0);
    }

    /// Arms a timer owned by this service, firing `on_timer` after
    /// `duration_ms`. `times < 0` repeats forever; `times == 1` fires
    /// once; each firing after the last sets `is_last`.
    pub fn repeat_timer(&self, duration_ms: i64, times: i32) -> TimerId {
        self.router.arm_timer(self.id, duration_ms, times)
    }

    /// Cancels a timer previously armed by this service. Returns `false`
    /// if it already fired for the last time or was never armed.
    pub fn cancel_timer(&self, timer_id: TimerId) -> bool {
        self.router.cancel_timer(self.id, timer_id)
    }
}

/// The trait every user-written service implements.
///
/// Methods run on the single worker thread that owns the service; none
/// of them may block, and the runtime guarantees they never run
/// concurrently with each other for the same service.
pub trait Service: Send {
    /// Called once on the owning worker. Returning `false` discards the
    /// service (it never receives `start`/`dispatch`/`destroy`).
    fn init(&mut self, ctx: &ServiceContext, config: &[u8]) -> bool;

    /// Called once per envelope addressed to this service (or, for a
    /// broadcast, once per live service other than the sender). Must not
    /// block.
    fn dispatch(&mut self, ctx: &ServiceContext, envelope: &Envelope);

    /// Called once, after the runtime reaches the `ready` state, or
    /// immediately if the service is created after that point.
    fn start(&mut self, _ctx: &ServiceContext) {}

    /// Called by the owning worker's timer callback when a timer armed
    /// by this service fires.
    fn on_timer(&mut self, _ctx: &ServiceContext, _timer_id: TimerId, _is_last: bool) {}

    /// Graceful shutdown hook. The default requests self-removal.
    fn exit(&mut self, ctx: &ServiceContext) {
        ctx.quit();
    }

    /// Final cleanup, called once `remove_service` has decided to erase
    /// this service. `ok` is cleared by the caller immediately after.
    fn destroy(&mut self, _ctx: &ServiceContext) {}
}

/// Per-worker bookkeeping the runtime keeps about a service, alongside
/// the boxed trait object itself.
pub struct ServiceRecord {
    pub id: u32,
    pub name: String,
    pub unique: bool,
    /// `true` once `init` has returned `true`; cleared by `destroy`.
    /// Messages to a service with `ok == false` are dropped (broadcast)
    /// or bounced as an error (direct send).
    pub ok: bool,
    /// `true` once `start` has run; guards re-entry.
    pub started: bool,
    pub service: Box<dyn Service>,
}

impl ServiceRecord {
    pub fn new(id: u32, service: Box<dyn Service>) -> Self {
        ServiceRecord {
            id,
            name: String::new(),
            unique: false,
            ok: false,
            started: false,
            service,
        }
    }
}
