//! Append-only trace log: one line per simulated event, flushed
//! immediately, plus the end-of-run per-process summary statistics.
//!
//! Grounded in `original_source/src/trace.c`: the header/footer text,
//! the `time | pid | event | state | remaining | wait` line format, and
//! the flush-after-every-write discipline are all carried over exactly.
//! The event buffer (`tm->events`, a manually-`realloc`'d array in the
//! C original) is just a `Vec<TraceEvent>` here.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use pcb_core::Pid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to create trace file at {path}: {source}")]
    Create { path: PathBuf, source: std::io::Error },
    #[error("failed to write trace event: {0}")]
    Write(#[from] std::io::Error),
}

/// The exhaustive vocabulary of traced event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Arrival,
    Execute,
    IoRequest,
    IoComplete,
    MutexLock,
    SemWait,
    Terminate,
}

impl EventType {
    pub fn label(&self) -> &'static str {
        match self {
            EventType::Arrival => "ARRIVAL",
            EventType::Execute => "EXECUTE",
            EventType::IoRequest => "IO_REQUEST",
            EventType::IoComplete => "IO_COMPLETE",
            EventType::MutexLock => "MUTEX_LOCK",
            EventType::SemWait => "SEM_WAIT",
            EventType::Terminate => "TERMINATE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TraceEvent {
    pub time: u64,
    pub pid: Pid,
    pub event_type: EventType,
    pub state_label: &'static str,
    pub remaining_time: u64,
    pub wait_time: u64,
}

/// Per-process statistics fed into the end-of-run summary.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSummary {
    pub pid: Pid,
    pub arrival_time: u64,
    pub start_time: u64,
    pub finish_time: u64,
    pub wait_time: u64,
}

impl ProcessSummary {
    pub fn turnaround(&self) -> u64 {
        self.finish_time - self.arrival_time
    }

    pub fn response(&self) -> u64 {
        self.start_time - self.arrival_time
    }
}

/// Aggregate statistics across every completed process, as printed by
/// `trace_print_summary` in the original.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateStats {
    pub completed: usize,
    pub avg_turnaround: f64,
    pub avg_response: f64,
    pub avg_wait: f64,
}

/// Owns the trace file handle and the in-memory event buffer.
pub struct TraceRecorder {
    file: BufWriter<File>,
    events: Vec<TraceEvent>,
}

impl TraceRecorder {
    /// Create the trace file at `traces_dir/filename`, writing the
    /// header immediately. `traces_dir` is created if missing.
    pub fn init(traces_dir: &Path, filename: &str) -> Result<Self, TraceError> {
        std::fs::create_dir_all(traces_dir).map_err(|source| TraceError::Create {
            path: traces_dir.to_path_buf(),
            source,
        })?;
        let path = traces_dir.join(filename);
        let file = File::create(&path).map_err(|source| TraceError::Create { path: path.clone(), source })?;
        let mut file = BufWriter::new(file);

        writeln!(file, "=== MiniOS Trace File ===")?;
        writeln!(file, "Format: Time | PID | Event | State | Remaining | Wait")?;
        writeln!(file, "==========================================")?;
        file.flush()?;

        Ok(Self { file, events: Vec::new() })
    }

    /// Record one event: append to the buffer, write its line, and flush.
    pub fn record(
        &mut self,
        time: u64,
        pid: Pid,
        event_type: EventType,
        state_label: &'static str,
        remaining_time: u64,
        wait_time: u64,
    ) -> Result<(), TraceError> {
        let event = TraceEvent { time, pid, event_type, state_label, remaining_time, wait_time };
        writeln!(
            self.file,
            "{} | {} | {} | {} | {} | {}",
            event.time, event.pid.0, event.event_type.label(), event.state_label, event.remaining_time, event.wait_time
        )?;
        self.file.flush()?;
        self.events.push(event);
        Ok(())
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Write the footer. Call once, after the simulation loop ends.
    pub fn finalize(&mut self) -> Result<(), TraceError> {
        writeln!(self.file, "==========================================")?;
        writeln!(self.file, "Total events: {}", self.events.len())?;
        self.file.flush()?;
        log::info!("trace finalized with {} events", self.events.len());
        Ok(())
    }

    /// Compute averages over every completed process, matching
    /// `trace_print_summary`'s arithmetic (simple mean over `completed`).
    pub fn summarize(&self, completed: &[ProcessSummary]) -> AggregateStats {
        if completed.is_empty() {
            return AggregateStats::default();
        }
        let n = completed.len() as f64;
        let total_turnaround: u64 = completed.iter().map(|p| p.turnaround()).sum();
        let total_response: u64 = completed.iter().map(|p| p.response()).sum();
        let total_wait: u64 = completed.iter().map(|p| p.wait_time).sum();

        AggregateStats {
            completed: completed.len(),
            avg_turnaround: total_turnaround as f64 / n,
            avg_response: total_response as f64 / n,
            avg_wait: total_wait as f64 / n,
        }
    }
}
