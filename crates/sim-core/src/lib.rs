//! The tick-driven simulation loop: wires the scheduler, allocator, I/O
//! manager, sync primitives, and trace recorder together over a shared
//! [`Roster`], advancing virtual time one tick at a time.
//!
//! Grounded in `original_source/src/main.c`'s simulation loop
//! (admission → unblock-check → dispatch → execute → bookkeeping →
//! accounting), with one deliberate deviation recorded in `DESIGN.md`:
//! every dispatched PCB executes exactly one tick of work per pass
//! through the loop, for every policy — not the C original's "FCFS and
//! Priority hand out the PCB's entire remaining burst in a single
//! call" shortcut. The spec's own worked scenarios (S1's five separate
//! `EXECUTE` events for a five-tick burst, S3's mid-burst priority
//! preemption) only hold under this granularity.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use free_list_alloc::Heap;
use io_manager::IoManager;
use pcb_core::{MutexId, Pcb, Pid, ProcessState, Roster, SemId};
use process_scheduler::{Scheduler, SchedulingPolicy};
use sync_primitives::{Mutex, Semaphore};
use trace_recorder::{AggregateStats, EventType, ProcessSummary, TraceError, TraceRecorder};

pub const MAX_PROCESSES: usize = 20;
pub const MAX_MUTEXES: usize = 8;
pub const MAX_SEMAPHORES: usize = 8;
pub const DEFAULT_HEAP_SIZE: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("heap size must be nonzero")]
    HeapSizeZero,
    #[error("process count {got} out of range 1..={MAX_PROCESSES}")]
    ProcessCountOutOfRange { got: usize },
    #[error("device count {got} exceeds the fixed maximum of {max}")]
    DeviceCountExceedsMax { got: usize, max: usize },
    #[error("mutex count {got} exceeds the fixed maximum of {max}")]
    MutexCountExceedsMax { got: usize, max: usize },
    #[error("semaphore count {got} exceeds the fixed maximum of {max}")]
    SemaphoreCountExceedsMax { got: usize, max: usize },
    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// Parses a scheduling policy name, falling back to `Fcfs` on anything
/// unrecognized — matching `parse_scheduler` in
/// `original_source/src/main.c`, which never rejects a bad `-a` value.
pub fn parse_policy(name: &str) -> SchedulingPolicy {
    match name.to_ascii_lowercase().as_str() {
        "rr" | "round-robin" | "roundrobin" => SchedulingPolicy::RoundRobin,
        "priority" => SchedulingPolicy::Priority,
        _ => SchedulingPolicy::Fcfs,
    }
}

/// A PCB's birth parameters, independent of how they were produced
/// (generated workload or a hand-authored test fixture).
#[derive(Debug, Clone, Copy)]
pub struct PcbSpec {
    pub priority: u8,
    pub total_time: u64,
    pub arrival_time: u64,
}

/// Generate `count` process specs with a seeded RNG, matching the
/// ranges in `original_source/src/main.c::create_processes`: priority
/// uniform in `1..=5`, total time in `10..=39`, arrival in `0..=9`.
pub fn generate_workload(count: usize, seed: u64) -> Vec<PcbSpec> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| PcbSpec {
            priority: rng.gen_range(1..=5),
            total_time: rng.gen_range(10..=39),
            arrival_time: rng.gen_range(0..=9),
        })
        .collect()
}

/// Simulation-wide parameters. Construction clamps out-of-range values
/// rather than erroring — `SimError` is reserved for `Simulation::new`,
/// which still re-validates against the fixed caps defensively (a
/// `SimConfig` can be built directly, bypassing the clamp helpers).
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    pub policy: SchedulingPolicy,
    pub process_count: usize,
    pub quantum: u64,
    pub max_time: u64,
    pub seed: u64,
    pub heap_size: usize,
    pub device_count: usize,
    pub mutex_count: usize,
    pub semaphore_count: usize,
    pub semaphore_initial: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::Fcfs,
            process_count: 5,
            quantum: 5,
            max_time: 100,
            seed: 0,
            heap_size: DEFAULT_HEAP_SIZE,
            device_count: io_manager::MAX_IO_DEVICES,
            mutex_count: 3,
            semaphore_count: 2,
            semaphore_initial: 2,
        }
    }
}

impl SimConfig {
    /// Build a config from raw (possibly out-of-range) CLI-shaped
    /// values, clamping each to its valid span instead of failing.
    pub fn clamped(
        policy: SchedulingPolicy,
        process_count: i64,
        quantum: i64,
        max_time: i64,
        seed: u64,
    ) -> Self {
        let defaults = Self::default();
        Self {
            policy,
            process_count: if process_count < 1 { defaults.process_count } else { (process_count as usize).min(MAX_PROCESSES) },
            quantum: if quantum < 1 { defaults.quantum } else { quantum as u64 },
            max_time: if max_time < 1 { defaults.max_time } else { max_time as u64 },
            seed,
            ..defaults
        }
    }
}

/// Everything a completed simulation run reports back.
#[derive(Debug, Clone, Copy)]
pub struct SimSummary {
    pub ticks_run: u64,
    pub total_context_switches: u64,
    pub event_count: usize,
    pub stats: AggregateStats,
}

/// Owns every subsystem and the PCB roster, and drives the tick loop.
pub struct Simulation {
    roster: Roster,
    scheduler: Scheduler,
    heap: Heap,
    io: IoManager,
    mutexes: Vec<Mutex>,
    semaphores: Vec<Semaphore>,
    trace: TraceRecorder,
    rng: StdRng,
    now: u64,
    max_time: u64,
}

impl Simulation {
    pub fn new(config: SimConfig, workload: &[PcbSpec], traces_dir: &Path, trace_filename: &str) -> Result<Self, SimError> {
        if config.heap_size == 0 {
            return Err(SimError::HeapSizeZero);
        }
        if workload.is_empty() || workload.len() > MAX_PROCESSES {
            return Err(SimError::ProcessCountOutOfRange { got: workload.len() });
        }
        if config.device_count > io_manager::MAX_IO_DEVICES {
            return Err(SimError::DeviceCountExceedsMax { got: config.device_count, max: io_manager::MAX_IO_DEVICES });
        }
        if config.mutex_count > MAX_MUTEXES {
            return Err(SimError::MutexCountExceedsMax { got: config.mutex_count, max: MAX_MUTEXES });
        }
        if config.semaphore_count > MAX_SEMAPHORES {
            return Err(SimError::SemaphoreCountExceedsMax { got: config.semaphore_count, max: MAX_SEMAPHORES });
        }

        let mut roster = Roster::new();
        for (i, spec) in workload.iter().enumerate() {
            let pid = Pid((i + 1) as u32);
            let mut pcb = Pcb::create(pid, spec.priority, spec.total_time);
            pcb.arrival_time = spec.arrival_time;
            roster.insert(pcb);
        }

        let mutexes = (0..config.mutex_count).map(|i| Mutex::new(MutexId(i))).collect();
        let semaphores = (0..config.semaphore_count)
            .map(|i| Semaphore::new(SemId(i), config.semaphore_initial))
            .collect();

        Ok(Self {
            roster,
            scheduler: Scheduler::new(config.policy, config.quantum),
            heap: Heap::new(config.heap_size),
            io: IoManager::new(config.device_count),
            mutexes,
            semaphores,
            trace: TraceRecorder::init(traces_dir, trace_filename)?,
            rng: StdRng::seed_from_u64(config.seed),
            now: 0,
            max_time: config.max_time,
        })
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn io(&self) -> &IoManager {
        &self.io
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Run the tick loop to completion: `now >= max_time` or no live
    /// PCBs remain. Finalizes the trace file and computes the summary.
    pub fn run(&mut self) -> Result<SimSummary, SimError> {
        while self.now < self.max_time && self.roster.live_count() > 0 {
            self.admit_arrivals()?;
            self.poll_io()?;

            let dispatched = self.scheduler.get_next(&mut self.roster, self.now);
            if let Some(pid) = dispatched {
                self.execute_tick(pid)?;
                self.post_run_bookkeeping(pid)?;
            }

            self.accrue_wait_and_blocked_time();
            self.now += 1;
        }

        self.trace.finalize()?;

        let completed: Vec<ProcessSummary> = self
            .roster
            .iter()
            .filter(|p| p.is_terminated())
            .map(|p| ProcessSummary {
                pid: p.pid,
                arrival_time: p.arrival_time,
                start_time: p.start_time.unwrap_or(p.arrival_time),
                finish_time: p.finish_time.unwrap_or(self.now),
                wait_time: p.wait_time,
            })
            .collect();
        let stats = self.trace.summarize(&completed);

        log::info!("simulation finished at tick {} ({} events recorded)", self.now, self.trace.event_count());

        Ok(SimSummary {
            ticks_run: self.now,
            total_context_switches: self.scheduler.total_context_switches(),
            event_count: self.trace.event_count(),
            stats,
        })
    }

    fn admit_arrivals(&mut self) -> Result<(), SimError> {
        let arriving: Vec<Pid> = self
            .roster
            .iter()
            .filter(|p| p.state == ProcessState::New && p.arrival_time <= self.now)
            .map(|p| p.pid)
            .collect();

        for pid in arriving {
            self.roster.get_mut(pid).unwrap().set_state(ProcessState::Ready);
            self.scheduler.add_process(&self.roster, pid);
            self.trace_event(pid, EventType::Arrival)?;
        }
        Ok(())
    }

    fn poll_io(&mut self) -> Result<(), SimError> {
        let completed = self.io.tick_update(&mut self.roster, self.now);
        for pid in completed {
            self.scheduler.add_process(&self.roster, pid);
            self.trace_event(pid, EventType::IoComplete)?;
        }
        Ok(())
    }

    fn execute_tick(&mut self, pid: Pid) -> Result<(), SimError> {
        {
            let pcb = self.roster.get_mut(pid).unwrap();
            pcb.remaining_time = pcb.remaining_time.saturating_sub(1);
            pcb.last_run_time += 1;
        }
        self.scheduler.record_execution(1);

        // `simulate_process_execution` in `original_source/src/main.c` raises
        // (and traces) the random event before `main`'s own `EXECUTE` trace
        // call — match that ordering rather than tracing EXECUTE first.
        let still_has_work = self.roster.get(pid).map(|p| p.remaining_time > 0).unwrap_or(false);
        if still_has_work {
            self.maybe_trigger_random_event(pid)?;
        }

        self.trace_event(pid, EventType::Execute)?;
        Ok(())
    }

    /// Mirrors `simulate_process_execution`'s `rand() % 100` dispatch:
    /// ~20% I/O request, ~10% mutex attempt, ~10% semaphore wait.
    fn maybe_trigger_random_event(&mut self, pid: Pid) -> Result<(), SimError> {
        let action: u32 = self.rng.gen_range(0..100);

        if action < 20 {
            let device = self.rng.gen_range(0..self.io.device_count().max(1));
            let duration = self.rng.gen_range(5..=14);
            self.io.request(&mut self.roster, pid, device, duration, self.now);
            self.trace_event(pid, EventType::IoRequest)?;
        } else if action < 30 && !self.mutexes.is_empty() {
            let mutex_id = self.rng.gen_range(0..self.mutexes.len());
            // Only attempt (and only trace) when the mutex is already
            // unlocked, matching the guaranteed-success-only trace in
            // `main.c::simulate_process_execution`.
            if !self.mutexes[mutex_id].is_locked() {
                self.mutexes[mutex_id].lock(&mut self.roster, pid);
                self.trace_event(pid, EventType::MutexLock)?;
            }
        } else if action < 40 && !self.semaphores.is_empty() {
            let sem_id = self.rng.gen_range(0..self.semaphores.len());
            self.semaphores[sem_id].wait(&mut self.roster, pid);
            // Traces unconditionally, whether or not the wait blocked.
            self.trace_event(pid, EventType::SemWait)?;
        }
        Ok(())
    }

    fn post_run_bookkeeping(&mut self, pid: Pid) -> Result<(), SimError> {
        let (remaining, state) = {
            let pcb = self.roster.get(pid).unwrap();
            (pcb.remaining_time, pcb.state)
        };

        if remaining == 0 {
            let pcb = self.roster.get_mut(pid).unwrap();
            pcb.set_state(ProcessState::Terminated);
            pcb.finish_time = Some(self.now + 1);
            self.scheduler.clear_current();
            // `main.c:260` traces TERMINATE at `current_time + 1`, the same
            // tick `finish_time` is stamped with, not at `current_time`.
            self.trace_event_at(pid, EventType::Terminate, self.now + 1)?;
        } else if state == ProcessState::Blocked {
            self.scheduler.clear_current();
        } else if self.scheduler.policy() == SchedulingPolicy::RoundRobin && self.scheduler.quantum_remaining() == 0 {
            self.scheduler.preempt(&mut self.roster);
        }
        Ok(())
    }

    fn accrue_wait_and_blocked_time(&mut self) {
        for pcb in self.roster.iter_mut() {
            match pcb.state {
                ProcessState::Ready => pcb.wait_time += 1,
                ProcessState::Blocked => pcb.blocked_time += 1,
                _ => {}
            }
        }
    }

    fn trace_event(&mut self, pid: Pid, event_type: EventType) -> Result<(), SimError> {
        self.trace_event_at(pid, event_type, self.now)
    }

    fn trace_event_at(&mut self, pid: Pid, event_type: EventType, time: u64) -> Result<(), SimError> {
        let pcb = self.roster.get(pid).unwrap();
        self.trace
            .record(time, pid, event_type, pcb.state.label(), pcb.remaining_time, pcb.wait_time)?;
        Ok(())
    }
}
