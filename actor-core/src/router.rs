//! The process-wide router: the one object every worker and every
//! service reaches through, and the only place that knows about all
//! workers at once.
//!
//! Creates and destroys services, routes envelopes to the worker that
//! owns their receiver, fans broadcasts out to every worker, and hosts
//! the three process-global tables (service-type factory registry, env
//! KV store, unique-name registry).

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use fnv::FnvHashMap;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::address;
use crate::buffer::{Buffer, Payload, SharedBuffer};
use crate::envelope::{Envelope, MessageType};
use crate::environments::{EnvTable, UniqueTable};
use crate::error::RuntimeError;
use crate::service::Service;
use crate::state::{SharedState, State};
use crate::worker::Worker;

/// A registered service-type constructor. Boxed behind `Arc` so
/// `register_service` callers (typically closures capturing nothing, or
/// a bare function pointer) can be cloned cheaply out of the registry
/// while the registry's read lock is held only briefly.
pub type Factory = Arc<dyn Fn() -> Box<dyn Service> + Send + Sync>;

pub struct Router {
    workers: Vec<Arc<Worker>>,
    factories: RwLock<FnvHashMap<String, Factory>>,
    env: EnvTable,
    unique: UniqueTable,
    runtime_state: SharedState,
    /// Last tick timestamp sampled by the supervisor; read by workers to
    /// advance their timer wheels. Last-value-wins is fine here.
    now_ms: AtomicI64,
    next_shared: AtomicU32,
    next_round_robin: AtomicU32,
}

impl Router {
    /// Builds the router and its fixed pool of `worker_count` workers in
    /// one shot. Uses `Arc::new_cyclic` so each worker can hold a `Weak`
    /// back-reference to this same router without any two-phase
    /// "attach workers after the fact" dance.
    pub(crate) fn new(worker_count: u8, runtime_state: SharedState) -> Arc<Router> {
        Arc::new_cyclic(|weak_router| {
            let workers = (1..=worker_count)
                .map(|id| Worker::new(id, weak_router.clone(), runtime_state.clone()))
                .collect();
            Router {
                workers,
                factories: RwLock::new(FnvHashMap::default()),
                env: EnvTable::new(),
                unique: UniqueTable::new(),
                runtime_state,
                now_ms: AtomicI64::new(0),
                next_shared: AtomicU32::new(0),
                next_round_robin: AtomicU32::new(0),
            }
        })
    }

    pub(crate) fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    pub fn worker_count(&self) -> u8 {
        self.workers.len() as u8
    }

    pub(crate) fn set_now(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::Relaxed);
    }

    /// Last tick timestamp the supervisor sampled; never calls the clock
    /// itself.
    pub fn now(&self) -> i64 {
        self.now_ms.load(Ordering::Relaxed)
    }

    pub fn service_count(&self) -> u32 {
        self.workers.iter().map(|w| w.service_count()).sum()
    }

    // ---- service-type factory registry -------------------------------

    /// Registers a constructor under `name`. Returns `false` if the name
    /// is already taken — the registry itself, unlike the unique-name
    /// table, is meant to be populated once at startup, but callers
    /// shouldn't silently clobber an existing entry.
    pub fn register_service<F>(&self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn() -> Box<dyn Service> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut guard = self.factories.write();
        if guard.contains_key(&name) {
            return false;
        }
        guard.insert(name, Arc::new(factory));
        true
    }

    pub(crate) fn make_service(&self, name: &str) -> Option<Box<dyn Service>> {
        let factory = self.factories.read().get(name).cloned()?;
        Some(factory())
    }

    // ---- env / unique-name tables -------------------------------------

    pub fn get_env(&self, name: &str) -> Option<String> {
        self.env.get(name)
    }

    pub fn set_env(&self, name: impl Into<String>, value: impl Into<String>) {
        self.env.set(name.into(), value.into());
    }

    pub fn get_unique_service(&self, name: &str) -> u32 {
        self.unique.get(name)
    }

    /// Succeeds iff `name` had no prior entry; the canonical way a
    /// service marked `unique` claims its singleton slot from `init`.
    pub fn set_unique_service(&self, name: impl Into<String>, addr: u32) -> bool {
        self.unique.set(name.into(), addr)
    }

    // ---- lifecycle ------------------------------------------------------

    /// Places a new service on `worker_hint` if it names a valid worker,
    /// else on a currently-`shared` (idle) worker chosen round-robin,
    /// else falls back to plain round-robin over every worker.
    pub fn new_service(
        &self,
        service_type: &str,
        name: &str,
        config: Vec<u8>,
        unique: bool,
        worker_hint: u8,
        creator: u32,
        session: i32,
    ) {
        if !self.factories.read().contains_key(service_type) {
            error!(service_type, "new_service: type not registered");
            if session != 0 {
                self.response(creator, "", b"0", session, MessageType::TEXT);
            }
            return;
        }

        let worker = if worker_hint != 0 && address::worker_valid(worker_hint, self.worker_count()) {
            self.workers[(worker_hint - 1) as usize].clone()
        } else {
            self.next_worker()
        };
        worker.add_service(service_type.to_string(), name.to_string(), config, unique, creator, session);
    }

    /// Shared-first, then global, round robin. A worker hosting zero
    /// services is preferred so load spreads out before any worker ends
    /// up hosting more than one.
    fn next_worker(&self) -> Arc<Worker> {
        let n = self.workers.len() as u32;
        let start = self.next_shared.fetch_add(1, Ordering::Relaxed) % n;
        for i in 0..n {
            let idx = ((start + i) % n) as usize;
            if self.workers[idx].shared() {
                return self.workers[idx].clone();
            }
        }
        let idx = (self.next_round_robin.fetch_add(1, Ordering::Relaxed) % n) as usize;
        self.workers[idx].clone()
    }

    pub fn remove_service(&self, id: u32, sender: u32, session: i32) {
        let wid = address::worker_id(id);
        if !address::worker_valid(wid, self.worker_count()) {
            self.response(
                sender,
                "router::remove_service ",
                RuntimeError::InvalidWorker(wid as u32, self.worker_count())
                    .to_string()
                    .as_bytes(),
                session,
                MessageType::ERROR,
            );
            return;
        }
        self.workers[(wid - 1) as usize].remove_service(id, sender, session);
    }

    // ---- messaging ------------------------------------------------------

    /// Sends a one-shot or correlated message. `session > 0` asks for a
    /// reply; the session carried on the wire is negated here, and the
    /// receiving service's eventual `response()` call forwards that
    /// negated value unchanged, so the original caller sees `|session|`
    /// match what it passed in regardless of the sign it actually
    /// observes on the wire.
    pub fn send(
        &self,
        sender: u32,
        receiver: u32,
        buf: Buffer,
        header: impl Into<String>,
        session: i32,
        msg_type: MessageType,
    ) {
        self.send_payload(sender, receiver, Payload::Owned(buf), header.into(), -session, msg_type);
    }

    pub(crate) fn send_shared(
        &self,
        sender: u32,
        receiver: u32,
        buf: SharedBuffer,
        header: impl Into<String>,
        session: i32,
        msg_type: MessageType,
    ) {
        self.send_payload(sender, receiver, Payload::Shared(buf), header.into(), -session, msg_type);
    }

    fn send_payload(
        &self,
        sender: u32,
        receiver: u32,
        payload: Payload,
        header: String,
        session: i32,
        msg_type: MessageType,
    ) {
        let wid = address::worker_id(receiver);
        if !address::worker_valid(wid, self.worker_count()) {
            error!(receiver, "send: receiver names no valid worker, dropping");
            return;
        }
        let mut envelope = Envelope::new(payload);
        envelope
            .set_sender(sender)
            .set_receiver(receiver)
            .set_session(session)
            .set_header(header)
            .set_type(msg_type);
        self.workers[(wid - 1) as usize].enqueue(envelope);
    }

    /// Sends a correlated reply, forwarding `session` exactly as given
    /// (see [`Router::send`] for why no further negation happens here).
    /// A reply with no recipient or no session is simply dropped, except
    /// once the runtime is `Ready`: an undeliverable `ERROR` with a
    /// non-empty body is logged so it isn't silently lost during normal
    /// operation (startup noise before `Ready` is expected and not
    /// logged).
    pub fn response(&self, to: u32, header: impl Into<String>, content: &[u8], session: i32, msg_type: MessageType) {
        if to == 0 || session == 0 {
            if self.runtime_state.load() == State::Ready
                && msg_type == MessageType::ERROR
                && !content.is_empty()
            {
                debug!(
                    to,
                    content = %String::from_utf8_lossy(content),
                    "response: dropped, no recipient/session to deliver to"
                );
            }
            return;
        }
        let mut buf = Buffer::with_capacity(content.len());
        buf.write_back(content);
        self.send_payload(0, to, Payload::Owned(buf), header.into(), session, msg_type);
    }

    /// Broadcasts one shared payload to every worker; each worker
    /// delivers it to every live service other than `sender`.
    pub fn broadcast(&self, sender: u32, buf: SharedBuffer, header: impl Into<String>, msg_type: MessageType) {
        let header = header.into();
        for worker in &self.workers {
            let mut envelope = Envelope::shared(buf.clone());
            envelope
                .set_sender(sender)
                .set_header(header.clone())
                .set_type(msg_type)
                .set_broadcast(true);
            worker.enqueue(envelope);
        }
    }

    /// Caches `buf` on `owner`'s worker and returns a small id other
    /// services can use with `send_prefab` to resend it without copying.
    /// Cleared at the start of every supervisor tick.
    pub fn make_prefab(&self, owner: u32, buf: SharedBuffer) -> u32 {
        let wid = address::worker_id(owner);
        if !address::worker_valid(wid, self.worker_count()) {
            return 0;
        }
        self.workers[(wid - 1) as usize].make_prefab(buf)
    }

    pub fn send_prefab(
        &self,
        sender: u32,
        receiver: u32,
        prefab_owner: u32,
        prefab_id: u32,
        header: impl Into<String>,
        session: i32,
        msg_type: MessageType,
    ) {
        let wid = address::worker_id(prefab_owner);
        if !address::worker_valid(wid, self.worker_count()) {
            return;
        }
        let header = header.into();
        self.workers[(wid - 1) as usize].send_prefab(sender, receiver, prefab_id, &header, session, msg_type);
    }

    // ---- timers -----------------------------------------------------------

    /// Arms a repeating (or one-shot, `times == 1`) timer owned by
    /// `owner`. Safe to call synchronously from inside a service's own
    /// `dispatch`/`start`/`on_timer`: the timer wheel has its own lock on
    /// each worker, separate from the services-map lock such a callback
    /// runs under.
    pub fn arm_timer(&self, owner: u32, duration_ms: i64, times: i32) -> crate::timer::TimerId {
        let wid = address::worker_id(owner);
        debug_assert!(address::worker_valid(wid, self.worker_count()));
        self.workers[(wid - 1) as usize].arm_timer(owner, duration_ms, times)
    }

    pub fn cancel_timer(&self, owner: u32, timer_id: crate::timer::TimerId) -> bool {
        let wid = address::worker_id(owner);
        if !address::worker_valid(wid, self.worker_count()) {
            return false;
        }
        self.workers[(wid - 1) as usize].cancel_timer(timer_id)
    }

    // ---- runcmd ---------------------------------------------------------

    /// Routes a dotted command path. Only the `worker.<id>.<verb>` scope
    /// is implemented; anything else is an error.
    pub fn runcmd(&self, sender: u32, cmd: String, session: i32) {
        let mut parts = cmd.splitn(3, '.');
        let scope = parts.next().unwrap_or_default();
        let id = parts.next().and_then(|s| s.parse::<u8>().ok());

        match (scope, id) {
            ("worker", Some(wid)) if address::worker_valid(wid, self.worker_count()) => {
                self.workers[(wid - 1) as usize].runcmd(sender, cmd, session);
            }
            _ => {
                self.response(
                    sender,
                    "router::runcmd ",
                    format!("invalid cmd: {}", cmd).as_bytes(),
                    session,
                    MessageType::ERROR,
                );
            }
        }
    }

    // ---- shutdown ---------------------------------------------------------

    /// Flags the runtime as stopping and asks every worker to begin its
    /// own graceful shutdown. Idempotent: a second call is a no-op.
    /// Also the escape hatch a critical-singleton init failure uses to
    /// bring the whole runtime down (see `worker::reply_new_service_failure`).
    pub(crate) fn begin_shutdown(&self) {
        if !self.runtime_state.try_begin_stopping() {
            return;
        }
        for worker in &self.workers {
            worker.stop();
        }
    }

    pub(crate) fn start_all(&self) {
        for worker in &self.workers {
            worker.start();
        }
    }

    pub(crate) fn boot_all(&self) {
        for worker in &self.workers {
            worker.boot();
        }
    }

    pub(crate) fn join_all(&self) {
        for worker in self.workers.iter().rev() {
            worker.join();
        }
    }

    pub(crate) fn all_stopped(&self) -> bool {
        self.workers.iter().all(|w| w.stopped())
    }
}
