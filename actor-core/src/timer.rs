//! Per-worker timer wheel.
//!
//! A fixed-slot, millisecond-keyed wheel adapted from a tick-counted
//! kernel timer wheel design: entries live in `deadline % NUM_SLOTS`,
//! cancellation is a tombstone flag swept lazily, and a single `update`
//! call bounds how many timers it will fire so a worker that falls
//! behind doesn't dump an unbounded burst of callbacks in one go.
//!
//! The wheel knows nothing about services. It is the worker's job to map
//! a fired timer's `owner` back to a live service and call `on_timer`; if
//! the owner is gone, the worker removes the timer instead, which is the
//! "lazy eviction on next fire" policy: cheaper than sweeping every
//! timer when a service is destroyed.

const NUM_SLOTS: usize = 4096;
const MAX_FIRES_PER_UPDATE: usize = 4096;

pub type TimerId = u64;

struct Entry {
    id: TimerId,
    deadline_ms: i64,
    period_ms: i64,
    /// `None` = fires forever until cancelled; `Some(n)` = `n` firings
    /// remain, including the upcoming one.
    remaining: Option<u32>,
    owner: u32,
    cancelled: bool,
}

/// One expired timer, ready to be dispatched to its owner.
#[derive(Debug, Clone, Copy)]
pub struct Firing {
    pub timer_id: TimerId,
    pub owner: u32,
    pub is_last: bool,
}

pub struct TimerWheel {
    slots: Vec<Vec<Entry>>,
    now_ms: i64,
    next_id: TimerId,
}

impl TimerWheel {
    pub fn new() -> Self {
        TimerWheel {
            slots: (0..NUM_SLOTS).map(|_| Vec::new()).collect(),
            now_ms: 0,
            next_id: 1,
        }
    }

    /// Schedules a timer firing `times` times, every `duration_ms`.
    /// `times <= 0` means "forever, until `remove`d". `duration_ms` is
    /// clamped to at least 1ms.
    pub fn repeat(&mut self, duration_ms: i64, times: i32, owner: u32) -> TimerId {
        let duration_ms = duration_ms.max(1);
        let id = self.next_id;
        self.next_id += 1;
        let remaining = if times <= 0 { None } else { Some(times as u32) };
        let deadline_ms = self.now_ms + duration_ms;
        self.schedule(Entry {
            id,
            deadline_ms,
            period_ms: duration_ms,
            remaining,
            owner,
            cancelled: false,
        });
        id
    }

    fn schedule(&mut self, entry: Entry) {
        let idx = (entry.deadline_ms.rem_euclid(NUM_SLOTS as i64)) as usize;
        self.slots[idx].push(entry);
    }

    /// Idempotent cancel: returns `true` the first time, `false` on every
    /// subsequent call or if the id never existed / already fired for
    /// the last time.
    pub fn remove(&mut self, id: TimerId) -> bool {
        for slot in self.slots.iter_mut() {
            for entry in slot.iter_mut() {
                if entry.id == id && !entry.cancelled {
                    entry.cancelled = true;
                    return true;
                }
            }
        }
        false
    }

    /// Advances to `now_ms`, one millisecond at a time, collecting every
    /// firing due along the way (bounded by `MAX_FIRES_PER_UPDATE`; any
    /// remainder is picked up on the next `update` call).
    pub fn update(&mut self, now_ms: i64) -> Vec<Firing> {
        let mut fired = Vec::new();
        while self.now_ms < now_ms && fired.len() < MAX_FIRES_PER_UPDATE {
            self.now_ms += 1;
            let idx = (self.now_ms.rem_euclid(NUM_SLOTS as i64)) as usize;

            let mut i = 0;
            while i < self.slots[idx].len() {
                if fired.len() >= MAX_FIRES_PER_UPDATE {
                    break;
                }
                if self.slots[idx][i].cancelled {
                    self.slots[idx].swap_remove(i);
                    continue;
                }
                if self.slots[idx][i].deadline_ms > self.now_ms {
                    i += 1;
                    continue;
                }

                let mut entry = self.slots[idx].swap_remove(i);
                let is_last = matches!(entry.remaining, Some(n) if n <= 1);
                fired.push(Firing {
                    timer_id: entry.id,
                    owner: entry.owner,
                    is_last,
                });
                if !is_last {
                    entry.remaining = entry.remaining.map(|n| n - 1);
                    entry.deadline_ms += entry.period_ms;
                    self.schedule(entry);
                }
            }
        }
        fired
    }

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn pending_count(&self) -> usize {
        self.slots
            .iter()
            .map(|s| s.iter().filter(|e| !e.cancelled).count())
            .sum()
    }
}

impl Default for TimerWheel {
    fn default() -> Self {
        TimerWheel::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_three_times_last_flagged() {
        let mut wheel = TimerWheel::new();
        let owner = 0x0100_0001;
        let id = wheel.repeat(10, 3, owner);

        let f1 = wheel.update(10);
        assert_eq!(f1.len(), 1);
        assert_eq!(f1[0].timer_id, id);
        assert!(!f1[0].is_last);

        let f2 = wheel.update(20);
        assert_eq!(f2.len(), 1);
        assert!(!f2[0].is_last);

        let f3 = wheel.update(30);
        assert_eq!(f3.len(), 1);
        assert!(f3[0].is_last);

        let f4 = wheel.update(40);
        assert!(f4.is_empty());
    }

    #[test]
    fn forever_keeps_firing_until_removed() {
        let mut wheel = TimerWheel::new();
        let id = wheel.repeat(5, 0, 42);
        for _ in 0..10 {
            let fired = wheel.update(wheel.now_ms() + 5);
            assert_eq!(fired.len(), 1);
            assert!(!fired[0].is_last);
        }
        assert!(wheel.remove(id));
        assert!(!wheel.remove(id));
        let fired = wheel.update(wheel.now_ms() + 5);
        assert!(fired.is_empty());
    }

    #[test]
    fn zero_duration_clamped_to_one_ms() {
        let mut wheel = TimerWheel::new();
        wheel.repeat(0, 1, 7);
        let fired = wheel.update(1);
        assert_eq!(fired.len(), 1);
    }
}
