//! Process control block and the FIFO queue substrate shared by every
//! ready/wait list in the simulator (scheduler ready queue, I/O wait
//! queue, mutex and semaphore wait queues).
//!
//! PCBs live in a [`Roster`], an arena indexed by [`Pid`]. Every queue in
//! the system stores `Pid` values rather than the PCB itself, so multiple
//! queues can name the same process without aliasing hazards — the
//! roster is the one place a `Pcb` is mutated.

use std::collections::VecDeque;

/// Fixed size of the simulated per-PCB context-save region. Reserved for
/// future context-switch experiments; the core never reads it.
pub const STACK_SIZE: usize = 4096;

/// Process identifier. Positive by convention (assigned starting at 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

/// I/O device slot identifier, `0..MAX_IO_DEVICES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

/// Mutex identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutexId(pub usize);

/// Counting semaphore identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemId(pub usize);

/// Lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Blocked,
    Terminated,
}

impl ProcessState {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessState::New => "NEW",
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Blocked => "BLOCKED",
            ProcessState::Terminated => "TERMINATED",
        }
    }
}

/// Per-process state and accounting.
#[derive(Debug, Clone)]
pub struct Pcb {
    pub pid: Pid,
    pub state: ProcessState,
    pub priority: u8,

    pub arrival_time: u64,
    pub start_time: Option<u64>,
    pub finish_time: Option<u64>,
    pub total_time: u64,
    pub remaining_time: u64,
    pub wait_time: u64,
    pub blocked_time: u64,

    pub io_device: Option<DeviceId>,
    pub io_end_time: Option<u64>,
    pub mutex_held: Option<MutexId>,
    pub semaphore_id: Option<SemId>,

    pub context_switches: u32,
    pub last_run_time: u64,

    /// Simulated context-save stack. Never read by the core.
    stack: Box<[u8; STACK_SIZE]>,
}

impl Pcb {
    /// Create a PCB in state `NEW`. `arrival_time` defaults to 0, matching
    /// the original factory — callers set it explicitly afterward.
    pub fn create(pid: Pid, priority: u8, total_time: u64) -> Self {
        Self {
            pid,
            state: ProcessState::New,
            priority,
            arrival_time: 0,
            start_time: None,
            finish_time: None,
            total_time,
            remaining_time: total_time,
            wait_time: 0,
            blocked_time: 0,
            io_device: None,
            io_end_time: None,
            mutex_held: None,
            semaphore_id: None,
            context_switches: 0,
            last_run_time: 0,
            stack: Box::new([0u8; STACK_SIZE]),
        }
    }

    /// Mutate `state` directly. Transition legality is enforced by callers,
    /// not here — mirrors the original `pcb_set_state`.
    pub fn set_state(&mut self, state: ProcessState) {
        self.state = state;
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ProcessState::Terminated
    }
}

/// Owning arena of every PCB in the simulation, indexed by [`Pid`].
/// Queues elsewhere in the system hold `Pid`, never a `Pcb` itself.
#[derive(Debug, Default)]
pub struct Roster {
    pcbs: Vec<Pcb>,
}

impl Roster {
    pub fn new() -> Self {
        Self { pcbs: Vec::new() }
    }

    /// Register a new PCB. Returns its `Pid` for convenience.
    pub fn insert(&mut self, pcb: Pcb) -> Pid {
        let pid = pcb.pid;
        self.pcbs.push(pcb);
        pid
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.pcbs.iter().find(|p| p.pid == pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.pcbs.iter_mut().find(|p| p.pid == pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.pcbs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pcb> {
        self.pcbs.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.pcbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcbs.is_empty()
    }

    /// Count of PCBs not yet `TERMINATED`.
    pub fn live_count(&self) -> usize {
        self.pcbs.iter().filter(|p| !p.is_terminated()).count()
    }
}

/// FIFO queue of PCB references (by `Pid`). Shared substrate for the
/// scheduler's ready queue, the I/O wait queue, and every mutex/semaphore
/// wait queue. Stores references only — it never owns a `Pcb`.
#[derive(Debug, Clone, Default)]
pub struct Fifo {
    items: VecDeque<Pid>,
}

impl Fifo {
    pub fn new() -> Self {
        Self { items: VecDeque::new() }
    }

    pub fn enqueue(&mut self, pid: Pid) {
        self.items.push_back(pid);
    }

    pub fn dequeue(&mut self) -> Option<Pid> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<Pid> {
        self.items.front().copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove the first matching entry by identity (pid equality, since
    /// pids are unique). Returns whether an entry was removed.
    pub fn remove(&mut self, pid: Pid) -> bool {
        if let Some(idx) = self.items.iter().position(|&p| p == pid) {
            self.items.remove(idx);
            true
        } else {
            false
        }
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<Pid> {
        self.items.iter().find(|&&p| p == pid).copied()
    }
}
