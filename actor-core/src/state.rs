//! The supervisor-wide runtime state machine, shared (by cheap clone)
//! between the supervisor, the router, and every worker.
//!
//! `unknown → init → ready → stopping → exited`, strictly monotonic: the
//! only allowed transition backwards is none at all.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum State {
    Unknown = 0,
    Init = 1,
    Ready = 2,
    Stopping = 3,
    Exited = 4,
}

impl State {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => State::Unknown,
            1 => State::Init,
            2 => State::Ready,
            3 => State::Stopping,
            _ => State::Exited,
        }
    }
}

/// A cheaply cloneable handle onto one shared `AtomicU8`.
#[derive(Clone)]
pub struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub fn new() -> Self {
        SharedState(Arc::new(AtomicU8::new(State::Unknown as u8)))
    }

    pub fn load(&self) -> State {
        State::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: State) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Transitions to `Stopping`, but only if the current state is at
    /// most `Ready`. Returns `true` iff this call performed the
    /// transition — callers use that to make `stop()` idempotent.
    pub fn try_begin_stopping(&self) -> bool {
        loop {
            let cur = self.0.load(Ordering::Acquire);
            if cur > State::Ready as u8 {
                return false;
            }
            match self.0.compare_exchange(
                cur,
                State::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }

    /// Transitions to `Ready`, but only if the current state is strictly
    /// before `Ready`. Returns `true` iff this call performed the
    /// transition — keeps a critical-singleton init failure during boot
    /// (which drives state straight to `Stopping`) from being clobbered
    /// back to `Ready` once `run()` reaches its own boot-to-ready step.
    pub fn try_begin_ready(&self) -> bool {
        loop {
            let cur = self.0.load(Ordering::Acquire);
            if cur >= State::Ready as u8 {
                return false;
            }
            match self.0.compare_exchange(
                cur,
                State::Ready as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        SharedState::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_stopping_is_idempotent() {
        let state = SharedState::new();
        state.store(State::Ready);
        assert!(state.try_begin_stopping());
        assert_eq!(state.load(), State::Stopping);
        assert!(!state.try_begin_stopping());
    }

    #[test]
    fn begin_stopping_refuses_once_exited() {
        let state = SharedState::new();
        state.store(State::Exited);
        assert!(!state.try_begin_stopping());
        assert_eq!(state.load(), State::Exited);
    }
}
