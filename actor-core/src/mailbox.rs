//! Per-worker mailbox: a multi-producer, single-consumer queue of owned
//! envelopes, drained in bulk by the owning worker.

use parking_lot::Mutex;

use crate::envelope::Envelope;

/// A spin-lock-guarded vector with bulk swap-drain.
///
/// `push` is the hot path and many threads may call it concurrently; the
/// guard is held only long enough to push one element, so `parking_lot`'s
/// adaptive mutex (which spins briefly before parking) behaves like a
/// short spin lock. The single consumer — always the owning worker thread
/// — swaps the whole vector out under the lock, then iterates it lock-free.
pub struct Mailbox {
    inner: Mutex<Vec<Envelope>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Mailbox {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Pushes an envelope and returns the mailbox's length *after* the
    /// push. Callers use the value `1` to detect the empty→non-empty
    /// transition and schedule exactly one drain task for it.
    pub fn push(&self, envelope: Envelope) -> usize {
        let mut guard = self.inner.lock();
        guard.push(envelope);
        guard.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swaps the mailbox contents into `scratch`, leaving the mailbox
    /// empty. `scratch` is cleared first so callers can reuse the same
    /// buffer call after call without reallocating.
    pub fn swap_into(&self, scratch: &mut Vec<Envelope>) {
        scratch.clear();
        let mut guard = self.inner.lock();
        std::mem::swap(&mut *guard, scratch);
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Mailbox::new()
    }
}
