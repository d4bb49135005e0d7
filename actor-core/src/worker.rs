//! A worker: one OS thread, one mailbox, one task queue, one timer wheel,
//! and the set of services it hosts.
//!
//! Everything a worker does — adding a service, delivering a message,
//! firing a timer, shutting down — happens as a task popped off its own
//! queue and run on its own thread. Nothing above this module ever
//! touches a worker's services directly; it only ever enqueues a task.
//!
//! The services map, timer wheel, and prefab cache each sit behind their
//! own `Mutex` rather than one shared lock. A service callback
//! (`dispatch`, `start`, ...) runs while the services map is locked, and
//! that same callback is free to arm a timer or cache a prefab on its
//! own worker through the router — giving those two a separate lock
//! keeps that the common case, not a reentrant-mutex deadlock.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::address::{self, local_id, MAX_LOCAL_ID};
use crate::buffer::SharedBuffer;
use crate::container::ServiceContainer;
use crate::envelope::{Envelope, MessageType};
use crate::mailbox::Mailbox;
use crate::router::Router;
use crate::service::{Service, ServiceContext, ServiceRecord};
use crate::state::{SharedState, State};
use crate::taskqueue::TaskQueue;
use crate::timer::{Firing, TimerId, TimerWheel};
use crate::util::hex_dump;

/// A worker's own lifecycle, distinct from the process-wide [`State`]:
/// every worker starts at `Init` independently and only leaves `Ready`
/// once its own services have all drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum WorkerState {
    Init = 0,
    Ready = 1,
    Stopping = 2,
    Exited = 3,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Init,
            1 => WorkerState::Ready,
            2 => WorkerState::Stopping,
            _ => WorkerState::Exited,
        }
    }
}

pub struct Worker {
    id: u8,
    state: AtomicU8,
    update_pending: AtomicBool,
    count: AtomicU32,
    cpu_time_ms: AtomicI64,
    uuid_counter: AtomicU32,
    mailbox: Mailbox,
    tasks: TaskQueue,
    router: Weak<Router>,
    runtime_state: SharedState,
    services: Mutex<ServiceContainer>,
    timer: Mutex<TimerWheel>,
    prefabs: Mutex<FnvHashMap<u32, SharedBuffer>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub(crate) fn new(id: u8, router: Weak<Router>, runtime_state: SharedState) -> Arc<Worker> {
        Arc::new(Worker {
            id,
            state: AtomicU8::new(WorkerState::Init as u8),
            update_pending: AtomicBool::new(false),
            count: AtomicU32::new(0),
            cpu_time_ms: AtomicI64::new(0),
            uuid_counter: AtomicU32::new(0),
            mailbox: Mailbox::new(),
            tasks: TaskQueue::new(),
            router,
            runtime_state,
            services: Mutex::new(ServiceContainer::new()),
            timer: Mutex::new(TimerWheel::new()),
            prefabs: Mutex::new(FnvHashMap::default()),
            thread: Mutex::new(None),
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn service_count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub fn shared(&self) -> bool {
        self.services.lock().shared()
    }

    fn worker_state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_worker_state(&self, s: WorkerState) {
        self.state.store(s as u8, Ordering::Release);
    }

    /// `true` once this worker's event loop has exited for good.
    pub fn stopped(&self) -> bool {
        self.worker_state() == WorkerState::Exited
    }

    fn router(&self) -> Arc<Router> {
        self.router
            .upgrade()
            .expect("a worker never outlives the router that owns it")
    }

    /// Spawns the dedicated thread and blocks the caller until the new
    /// thread reports ready, so boot is synchronous from the caller's
    /// point of view.
    pub(crate) fn boot(self: &Arc<Self>) {
        let worker = self.clone();
        let handle = thread::Builder::new()
            .name(format!("actor-worker-{}", worker.id))
            .spawn(move || {
                worker.set_worker_state(WorkerState::Ready);
                info!(worker = worker.id, "worker started");
                loop {
                    if worker.worker_state() == WorkerState::Exited {
                        break;
                    }
                    match worker.tasks.pop() {
                        Some(task) => task(),
                        None => thread::sleep(Duration::from_millis(1)),
                    }
                }
                info!(worker = worker.id, "worker stopped");
            })
            .expect("failed to spawn worker thread");
        *self.thread.lock() = Some(handle);

        while self.worker_state() == WorkerState::Init {
            thread::yield_now();
        }
    }

    pub(crate) fn join(&self) {
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }

    /// `counter % 65535 + 1`, OR'd into this worker's high byte. The
    /// 16-bit counter leaves 8 bits of unused headroom in the 24-bit
    /// local id space; two different generators (services and prefabs)
    /// share it, which is harmless since they live in separate maps.
    fn next_uuid(&self) -> u32 {
        let raw = self.uuid_counter.fetch_add(1, Ordering::Relaxed);
        let local = (raw % MAX_LOCAL_ID as u32) + 1;
        address::encode(self.id, local)
    }

    /// Enqueues the envelope for delivery, posting exactly one drain task
    /// the moment the mailbox transitions from empty to non-empty.
    pub(crate) fn enqueue(self: &Arc<Self>, envelope: Envelope) {
        if self.mailbox.push(envelope) == 1 {
            let worker = self.clone();
            self.tasks.push(Box::new(move || worker.drain_mailbox()));
        }
    }

    fn drain_mailbox(self: &Arc<Self>) {
        let start = Instant::now();
        let mut scratch = Vec::new();
        self.mailbox.swap_into(&mut scratch);
        if scratch.is_empty() {
            return;
        }
        let router = self.router();
        let queued = scratch.len();
        for envelope in scratch.drain(..) {
            self.handle_one(&router, envelope);
        }

        let elapsed_ms = start.elapsed().as_millis() as i64;
        self.cpu_time_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        if elapsed_ms > 1000 {
            warn!(worker = self.id, elapsed_ms, queued, "worker handle cost too long");
        }
    }

    fn handle_one(self: &Arc<Self>, router: &Arc<Router>, envelope: Envelope) {
        if envelope.is_broadcast() {
            let sender = envelope.sender();
            let targets: Vec<u32> = {
                let services = self.services.lock();
                services
                    .iter()
                    .filter(|(_, r)| r.ok && r.id != sender)
                    .map(|(_, r)| r.id)
                    .collect()
            };
            for id in targets {
                let mut services = self.services.lock();
                if let Some(record) = services.get_mut(local_id(id)) {
                    let ctx = ServiceContext::new(router.clone(), record.id);
                    record.service.dispatch(&ctx, &envelope);
                }
            }
            return;
        }

        let target = local_id(envelope.receiver());
        let found = {
            let mut services = self.services.lock();
            if let Some(record) = services.get_mut(target) {
                let ctx = ServiceContext::new(router.clone(), record.id);
                record.service.dispatch(&ctx, &envelope);
                true
            } else {
                false
            }
        };

        if !found {
            if envelope.sender() != 0 {
                let msg = format!(
                    "[{:X}] attempt send to dead service [{:X}]: {}.",
                    envelope.sender(),
                    envelope.receiver(),
                    hex_dump(envelope.data())
                );
                router.response(
                    envelope.sender(),
                    "worker::handle_one ",
                    msg.as_bytes(),
                    -envelope.session(),
                    MessageType::ERROR,
                );
            }
            return;
        }

        let now = router.now();
        let fired = self.timer.lock().update(now);
        self.dispatch_timer_firings(router, fired);
    }

    fn dispatch_timer_firings(self: &Arc<Self>, router: &Arc<Router>, firings: Vec<Firing>) {
        for f in firings {
            let local = local_id(f.owner);
            let mut services = self.services.lock();
            let live = matches!(services.get(local), Some(r) if r.ok);
            if live {
                let record = services.get_mut(local).unwrap();
                let ctx = ServiceContext::new(router.clone(), record.id);
                record.service.on_timer(&ctx, f.timer_id, f.is_last);
            } else {
                drop(services);
                self.timer.lock().remove(f.timer_id);
            }
        }
    }

    /// Arms a timer owned by one of this worker's own services. Safe to
    /// call synchronously from inside a service callback (`start`,
    /// `dispatch`, ...) since the timer wheel has its own lock,
    /// independent of the services-map lock such a callback runs under.
    pub(crate) fn arm_timer(&self, owner: u32, duration_ms: i64, times: i32) -> TimerId {
        self.timer.lock().repeat(duration_ms, times, owner)
    }

    pub(crate) fn cancel_timer(&self, timer_id: TimerId) -> bool {
        self.timer.lock().remove(timer_id)
    }

    /// Posted by the supervisor's tick loop. Debounced by
    /// `update_pending` so at most one update task is ever queued per
    /// worker at a time, regardless of tick cadence.
    pub(crate) fn request_update(self: &Arc<Self>, now_ms: i64) {
        if self.update_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let worker = self.clone();
        self.tasks.push(Box::new(move || {
            let router = worker.router();
            let fired = worker.timer.lock().update(now_ms);
            worker.dispatch_timer_firings(&router, fired);
            worker.prefabs.lock().clear();
            worker.update_pending.store(false, Ordering::Release);
        }));
    }

    pub(crate) fn start(self: &Arc<Self>) {
        let worker = self.clone();
        self.tasks.push(Box::new(move || {
            let router = worker.router();
            let mut services = worker.services.lock();
            for (_, record) in services.iter_mut() {
                if record.ok && !record.started {
                    let ctx = ServiceContext::new(router.clone(), record.id);
                    record.service.start(&ctx);
                    record.started = true;
                }
            }
        }));
    }

    /// Begins graceful shutdown: if no services are hosted, the worker
    /// exits immediately; otherwise every live service gets `exit()` and
    /// the worker waits for them to self-remove via `ServiceContext::quit`.
    pub(crate) fn stop(self: &Arc<Self>) {
        let worker = self.clone();
        self.tasks.push(Box::new(move || {
            if matches!(worker.worker_state(), WorkerState::Stopping | WorkerState::Exited) {
                return;
            }
            let router = worker.router();
            let ids: Vec<u32> = {
                let services = worker.services.lock();
                services.iter().map(|(_, r)| r.id).collect()
            };
            if ids.is_empty() {
                worker.set_worker_state(WorkerState::Exited);
                return;
            }
            worker.set_worker_state(WorkerState::Stopping);
            for id in ids {
                let mut services = worker.services.lock();
                if let Some(record) = services.get_mut(local_id(id)) {
                    let ctx = ServiceContext::new(router.clone(), record.id);
                    record.service.exit(&ctx);
                }
            }
        }));
    }

    pub(crate) fn add_service(
        self: &Arc<Self>,
        service_type: String,
        name: String,
        config: Vec<u8>,
        unique: bool,
        creator: u32,
        session: i32,
    ) {
        let worker = self.clone();
        self.tasks.push(Box::new(move || {
            worker.add_service_task(service_type, name, config, unique, creator, session);
        }));
    }

    fn add_service_task(
        self: &Arc<Self>,
        service_type: String,
        name: String,
        config: Vec<u8>,
        unique: bool,
        creator: u32,
        session: i32,
    ) {
        let router = self.router();

        if self.worker_state() != WorkerState::Ready {
            error!(worker = self.id, "new service rejected: worker not ready");
            self.reply_new_service_failure(&router, creator, session, unique);
            return;
        }

        let Some(mut service) = router.make_service(&service_type) else {
            error!(worker = self.id, service_type = %service_type, "new service failed: type not registered");
            self.reply_new_service_failure(&router, creator, session, unique);
            return;
        };

        let mut services = self.services.lock();
        let mut addr = 0u32;
        for _ in 0..MAX_LOCAL_ID {
            let candidate = self.next_uuid();
            if !services.contains(local_id(candidate)) {
                addr = candidate;
                break;
            }
        }
        if addr == 0 {
            error!(worker = self.id, "new service failed: local id space exhausted");
            drop(services);
            self.reply_new_service_failure(&router, creator, session, unique);
            return;
        }

        let ctx = ServiceContext::new(router.clone(), addr);
        if !service.init(&ctx, &config) {
            drop(services);
            warn!(worker = self.id, service_type = %service_type, unique, "service init failed");
            self.reply_new_service_failure(&router, creator, session, unique);
            return;
        }

        let mut record = ServiceRecord::new(addr, service);
        record.ok = true;
        record.unique = unique;
        record.name = if name.is_empty() { service_type } else { name };

        if self.runtime_state.load() != State::Init {
            record.service.start(&ctx);
            record.started = true;
        }

        services.insert(local_id(addr), record);
        self.count.fetch_add(1, Ordering::Release);
        drop(services);

        if session != 0 {
            router.response(
                creator,
                "",
                format!("{:X}", addr).as_bytes(),
                session,
                MessageType::TEXT,
            );
        }
    }

    /// Replies `"0"` for a failed `add_service`. A failure in a service
    /// marked `unique` is treated as an unrecoverable critical-singleton
    /// failure: the whole runtime begins shutting down. The core never
    /// aborts on message-level errors, only on this one class of
    /// boot-time failure.
    fn reply_new_service_failure(
        self: &Arc<Self>,
        router: &Arc<Router>,
        creator: u32,
        session: i32,
        unique: bool,
    ) {
        if session != 0 {
            router.response(creator, "", b"0", session, MessageType::TEXT);
        }
        if unique {
            error!(worker = self.id, "critical singleton failed to start, shutting down runtime");
            router.begin_shutdown();
        }
    }

    pub(crate) fn remove_service(self: &Arc<Self>, addr: u32, sender: u32, session: i32) {
        let worker = self.clone();
        self.tasks.push(Box::new(move || {
            worker.remove_service_task(addr, sender, session);
        }));
    }

    fn remove_service_task(self: &Arc<Self>, addr: u32, sender: u32, session: i32) {
        let router = self.router();
        let local = local_id(addr);

        let removed = self.services.lock().remove(local);

        match removed {
            Some(mut record) => {
                self.count.fetch_sub(1, Ordering::Release);
                let ctx = ServiceContext::new(router.clone(), record.id);
                record.service.destroy(&ctx);
                record.ok = false;

                let content = format!(
                    r#"{{"name":"{}","serviceid":"{:X}","errmsg":"service destroy"}}"#,
                    record.name, record.id
                );
                router.response(sender, "service destroy", content.as_bytes(), session, MessageType::TEXT);

                let mut buf = crate::buffer::Buffer::with_capacity(content.len());
                buf.write_back(content.as_bytes());
                router.broadcast(record.id, buf.into_shared(), "exit", MessageType::SYSTEM);
            }
            None => {
                router.response(
                    sender,
                    "worker::remove_service ",
                    format!("service [{:X}] not found", addr).as_bytes(),
                    session,
                    MessageType::ERROR,
                );
            }
        }

        let empty = self.services.lock().is_empty();
        if empty && self.worker_state() == WorkerState::Stopping {
            self.set_worker_state(WorkerState::Exited);
        }
    }

    pub(crate) fn make_prefab(&self, buf: SharedBuffer) -> u32 {
        let id = self.next_uuid();
        self.prefabs.lock().insert(id, buf);
        id
    }

    pub(crate) fn send_prefab(
        self: &Arc<Self>,
        sender: u32,
        receiver: u32,
        prefab_id: u32,
        header: &str,
        session: i32,
        msg_type: MessageType,
    ) {
        let buf = self.prefabs.lock().get(&prefab_id).cloned();
        match buf {
            Some(buf) => self.router().send_shared(sender, receiver, buf, header, session, msg_type),
            None => debug!(worker = self.id, prefab_id, "send_prefab: prefab not found"),
        }
    }

    pub(crate) fn runcmd(self: &Arc<Self>, sender: u32, cmd: String, session: i32) {
        let worker = self.clone();
        self.tasks.push(Box::new(move || worker.runcmd_task(sender, cmd, session)));
    }

    fn runcmd_task(self: &Arc<Self>, sender: u32, cmd: String, session: i32) {
        let router = self.router();
        let verb = cmd.splitn(3, '.').nth(2);

        let body = match verb {
            Some("stat") => {
                let cpu = self.cpu_time_ms.swap(0, Ordering::AcqRel);
                Some(format!(r#"{{"work_time":{},"service_num":{}}}"#, cpu, self.service_count()))
            }
            Some("services") => {
                let services = self.services.lock();
                let entries: Vec<String> = services
                    .iter()
                    .map(|(_, r)| format!(r#"{{"name":"{}","serviceid":"{:X}"}}"#, r.name, r.id))
                    .collect();
                Some(format!("[{}]", entries.join(",")))
            }
            _ => None,
        };

        match body {
            Some(body) => router.response(sender, "", body.as_bytes(), session, MessageType::TEXT),
            None => router.response(
                sender,
                "worker::runcmd ",
                format!("unknown cmd: {}", cmd).as_bytes(),
                session,
                MessageType::ERROR,
            ),
        }
    }
}
