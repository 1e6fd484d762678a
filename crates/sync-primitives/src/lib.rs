//! Mutex and counting semaphore, each with a blocking FIFO wait queue.
//!
//! Release is a **direct hand-off**: the next waiter becomes the owner
//! (or is released, for a semaphore) without re-contending for the
//! resource. Neither primitive pushes the woken PCB onto the scheduler's
//! ready queue itself — that would require depending on `process-scheduler`
//! from here, which isn't needed for the primitives' own invariants. Both
//! `unlock`/`signal` instead report who was woken so the tick driver can
//! make that hand-off's `READY` transition explicit on the scheduler side
//! (see the open question on this in `DESIGN.md`).

use pcb_core::{Fifo, MutexId, Pid, ProcessState, Roster, SemId};

/// Result of releasing a mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockOutcome {
    /// `false` if the mutex was already unlocked — no state changed.
    pub released: bool,
    /// The waiter that was handed ownership, if any.
    pub handed_off_to: Option<Pid>,
}

/// Result of signaling a semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalOutcome {
    /// The waiter that was released, if the wait queue was nonempty.
    pub released: Option<Pid>,
}

#[derive(Debug)]
pub struct Mutex {
    id: MutexId,
    locked: bool,
    owner: Option<Pid>,
    wait_queue: Fifo,
}

impl Mutex {
    pub fn new(id: MutexId) -> Self {
        Self { id, locked: false, owner: None, wait_queue: Fifo::new() }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn owner(&self) -> Option<Pid> {
        self.owner
    }

    pub fn wait_queue_len(&self) -> usize {
        self.wait_queue.len()
    }

    /// Attempt to lock on behalf of `pid`. Returns `true` if acquired
    /// immediately; otherwise `pid` is queued and moved to `BLOCKED`.
    pub fn lock(&mut self, roster: &mut Roster, pid: Pid) -> bool {
        if !self.locked {
            self.locked = true;
            self.owner = Some(pid);
            if let Some(pcb) = roster.get_mut(pid) {
                pcb.mutex_held = Some(self.id);
            }
            true
        } else {
            self.wait_queue.enqueue(pid);
            if let Some(pcb) = roster.get_mut(pid) {
                pcb.set_state(ProcessState::Blocked);
            }
            false
        }
    }

    /// Release the mutex. Returns `released: false` (no state change) if
    /// it was already unlocked. On success, hands ownership directly to
    /// the next waiter if one exists.
    pub fn unlock(&mut self, roster: &mut Roster) -> UnlockOutcome {
        if !self.locked {
            return UnlockOutcome { released: false, handed_off_to: None };
        }

        if let Some(prev_owner) = self.owner.take() {
            if let Some(pcb) = roster.get_mut(prev_owner) {
                pcb.mutex_held = None;
            }
        }
        self.locked = false;

        let handed_off_to = self.wait_queue.dequeue();
        if let Some(next) = handed_off_to {
            self.locked = true;
            self.owner = Some(next);
            if let Some(pcb) = roster.get_mut(next) {
                pcb.mutex_held = Some(self.id);
                pcb.set_state(ProcessState::Ready);
            }
        }

        UnlockOutcome { released: true, handed_off_to }
    }
}

#[derive(Debug)]
pub struct Semaphore {
    id: SemId,
    count: u32,
    max_count: u32,
    wait_queue: Fifo,
}

impl Semaphore {
    pub fn new(id: SemId, initial_count: u32) -> Self {
        Self { id, count: initial_count, max_count: initial_count, wait_queue: Fifo::new() }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn wait_queue_len(&self) -> usize {
        self.wait_queue.len()
    }

    /// Attempt to acquire a token on behalf of `pid`. Returns `true` if a
    /// token was available immediately; otherwise `pid` is queued and
    /// moved to `BLOCKED`.
    pub fn wait(&mut self, roster: &mut Roster, pid: Pid) -> bool {
        if self.count > 0 {
            self.count -= 1;
            if let Some(pcb) = roster.get_mut(pid) {
                pcb.semaphore_id = Some(self.id);
            }
            true
        } else {
            self.wait_queue.enqueue(pid);
            if let Some(pcb) = roster.get_mut(pid) {
                pcb.set_state(ProcessState::Blocked);
                pcb.semaphore_id = Some(self.id);
            }
            false
        }
    }

    /// Release a token. If the wait queue is nonempty, wakes its head
    /// directly rather than incrementing `count`; otherwise increments
    /// `count`, never past `max_count`.
    pub fn signal(&mut self, roster: &mut Roster) -> SignalOutcome {
        if let Some(pid) = self.wait_queue.dequeue() {
            if let Some(pcb) = roster.get_mut(pid) {
                pcb.set_state(ProcessState::Ready);
                pcb.semaphore_id = None;
            }
            SignalOutcome { released: Some(pid) }
        } else {
            if self.count < self.max_count {
                self.count += 1;
            }
            SignalOutcome { released: None }
        }
    }
}
