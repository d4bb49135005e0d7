//! The supervisor: owns the router (and, through it, every worker),
//! drives the global 10ms tick, and orchestrates boot and shutdown.
//!
//! This is the only thread that advances the clock every worker's timer
//! wheel reads. It samples elapsed time since boot, not the epoch: a
//! timer wheel starts at `now_ms = 0` (timer.rs) and a wheel's `update`
//! walks forward one millisecond at a time, so feeding it raw epoch
//! milliseconds would mean scanning from `0` to ~10^12 on the very first
//! tick. Every worker reads `now` through the router, which always
//! returns the last value the supervisor sampled — never freshly read —
//! so a whole tick's worth of timer work observes one coherent timestamp.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::{AnyResult, RuntimeError};
use crate::router::Router;
use crate::state::{SharedState, State};

const TICK: Duration = Duration::from_millis(10);

pub struct Supervisor {
    router: Arc<Router>,
    state: SharedState,
    boot_instant: Instant,
}

impl Supervisor {
    /// Creates `worker_count` workers (clamped to the `1..=255` the
    /// address codec's 8-bit worker field can express), boots each
    /// worker's thread, and leaves global state at `Init` — the caller
    /// is expected to submit any startup `new_service` calls through
    /// [`Supervisor::router`] before calling [`Supervisor::run`], since
    /// services created while still `Init` are queued without `start`.
    pub fn boot(worker_count: u8) -> AnyResult<Self> {
        if worker_count == 0 {
            return Err(RuntimeError::TooManyWorkers(0).into());
        }
        let state = SharedState::new();
        let router = Router::new(worker_count, state.clone());
        router.boot_all();
        state.store(State::Init);
        info!(worker_count, "supervisor booted");
        Ok(Supervisor { router, state, boot_instant: Instant::now() })
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn state(&self) -> State {
        self.state.load()
    }

    pub fn now(&self) -> i64 {
        self.router.now()
    }

    pub fn service_count(&self) -> u32 {
        self.router.service_count()
    }

    /// Transitions to `stopping` (a no-op if already stopping or past
    /// it) and asks every worker to begin its own graceful shutdown.
    /// Idempotent: a second call has the same effect as the first.
    pub fn stop(&self) {
        self.router.begin_shutdown();
    }

    /// Transitions to `ready` (a no-op if a critical-singleton init
    /// failure during boot already drove the state to `stopping` or past
    /// it — the monotonic state machine never moves backwards), starts
    /// every already-initialized service, then runs the tick loop until
    /// every worker reports stopped. Blocks the calling thread for the
    /// runtime's whole lifetime.
    pub fn run(&self) {
        self.state.try_begin_ready();
        self.router.start_all();

        let mut prev_sleep = TICK;
        loop {
            let tick_start = Instant::now();
            let now_ms = self.boot_instant.elapsed().as_millis() as i64;
            self.router.set_now(now_ms);

            let mut all_stopped = true;
            for worker in self.router.workers() {
                if worker.stopped() {
                    continue;
                }
                all_stopped = false;
                worker.request_update(now_ms);
            }
            if all_stopped {
                break;
            }

            let elapsed = tick_start.elapsed();
            let sleep = TICK
                .checked_add(prev_sleep)
                .unwrap_or(TICK)
                .checked_sub(elapsed)
                .unwrap_or(Duration::ZERO);
            if !sleep.is_zero() {
                thread::sleep(sleep);
            }
            prev_sleep = sleep;
        }

        self.router.join_all();
        self.state.store(State::Exited);
        info!("supervisor exited");
    }
}
