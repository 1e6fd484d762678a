//! Device table and the single global I/O wait queue.
//!
//! **Known limitation, preserved on purpose** (see `DESIGN.md`): when a
//! device finishes and pops the head of the wait queue, a popped PCB
//! whose requested device doesn't match the one that just freed up is
//! simply dropped — it is not reassigned anywhere, not requeued, and
//! stays `BLOCKED` forever. This mirrors `io_update` in
//! `original_source/src/io.c` exactly. A corrected implementation would
//! route by a per-device wait list instead of one global queue.

use pcb_core::{DeviceId, Fifo, Pid, ProcessState, Roster};

/// Hard cap on the number of device slots, matching `MAX_IO_DEVICES`.
pub const MAX_IO_DEVICES: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
struct DeviceSlot {
    busy: bool,
    current: Option<Pid>,
    end_time: Option<u64>,
}

/// Fixed device table plus the one global wait queue for busy devices.
#[derive(Debug)]
pub struct IoManager {
    devices: Vec<DeviceSlot>,
    wait_queue: Fifo,
}

impl IoManager {
    /// `device_count` is clamped to `MAX_IO_DEVICES`.
    pub fn new(device_count: usize) -> Self {
        let device_count = device_count.min(MAX_IO_DEVICES);
        Self {
            devices: vec![DeviceSlot::default(); device_count],
            wait_queue: Fifo::new(),
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_device_busy(&self, device_id: usize) -> bool {
        self.devices.get(device_id).map(|d| d.busy).unwrap_or(false)
    }

    pub fn wait_queue_len(&self) -> usize {
        self.wait_queue.len()
    }

    /// Request `duration` ticks of I/O on `device_id` for `pid`, starting
    /// at `now`. Always records `io_device`/`io_end_time` on the PCB and
    /// moves it to `BLOCKED`, whether or not the device is free. Returns
    /// `true` if the device picked it up immediately, `false` if it was
    /// queued (or the device id is out of range, in which case no state
    /// changes at all).
    pub fn request(&mut self, roster: &mut Roster, pid: Pid, device_id: usize, duration: u64, now: u64) -> bool {
        if device_id >= self.devices.len() {
            return false;
        }
        let Some(pcb) = roster.get_mut(pid) else { return false };
        pcb.io_device = Some(DeviceId(device_id));
        pcb.io_end_time = Some(now + duration);
        pcb.set_state(ProcessState::Blocked);

        if !self.devices[device_id].busy {
            self.devices[device_id].busy = true;
            self.devices[device_id].current = Some(pid);
            self.devices[device_id].end_time = Some(now + duration);
            true
        } else {
            self.wait_queue.enqueue(pid);
            false
        }
    }

    /// Advance device completions to `now`. Returns the PIDs that
    /// completed I/O this tick (now `READY`) so the caller can re-add
    /// them to the scheduler and trace `IO_COMPLETE`.
    pub fn tick_update(&mut self, roster: &mut Roster, now: u64) -> Vec<Pid> {
        let mut completed = Vec::new();

        for device_id in 0..self.devices.len() {
            let Some(end_time) = self.devices[device_id].end_time else { continue };
            if !self.devices[device_id].busy || end_time > now {
                continue;
            }

            if let Some(holder) = self.devices[device_id].current {
                if let Some(pcb) = roster.get_mut(holder) {
                    pcb.io_device = None;
                    pcb.io_end_time = None;
                    pcb.set_state(ProcessState::Ready);
                }
                completed.push(holder);
            }

            self.devices[device_id].busy = false;
            self.devices[device_id].current = None;
            self.devices[device_id].end_time = None;

            if let Some(next) = self.wait_queue.dequeue() {
                let targets_this_device = roster.get(next).and_then(|p| p.io_device) == Some(DeviceId(device_id));
                if targets_this_device {
                    let end = roster.get(next).and_then(|p| p.io_end_time).unwrap_or(now);
                    self.devices[device_id].busy = true;
                    self.devices[device_id].current = Some(next);
                    self.devices[device_id].end_time = Some(end);
                }
                // else: the popped PCB targeted a different device and is
                // lost by the implemented policy — see module docs.
            }
        }

        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_with(n: u32) -> (Roster, Vec<Pid>) {
        let mut roster = Roster::new();
        let mut pids = Vec::new();
        for i in 1..=n {
            let pid = Pid(i);
            pids.push(roster.insert(pcb_core::Pcb::create(pid, 1, 20)));
        }
        (roster, pids)
    }

    mod requesting {
        use super::*;

        #[test]
        fn idle_device_accepts_request_immediately() {
            let (mut roster, pids) = roster_with(1);
            let mut io = IoManager::new(2);
            assert!(io.request(&mut roster, pids[0], 0, 5, 0));
            assert!(io.is_device_busy(0));
            assert_eq!(roster.get(pids[0]).unwrap().state, ProcessState::Blocked);
        }

        #[test]
        fn out_of_range_device_request_returns_false_and_leaves_pcb_unchanged() {
            let (mut roster, pids) = roster_with(1);
            let mut io = IoManager::new(2);
            assert!(!io.request(&mut roster, pids[0], 7, 5, 0));
            assert_eq!(roster.get(pids[0]).unwrap().state, ProcessState::New);
        }

        #[test]
        fn device_count_is_clamped_to_max_devices() {
            let io = IoManager::new(99);
            assert_eq!(io.device_count(), MAX_IO_DEVICES);
        }

        /// S6 from the spec: two PCBs request device 0 in the same tick.
        #[test]
        fn s6_second_requester_queues_behind_the_first() {
            let (mut roster, pids) = roster_with(2);
            let mut io = IoManager::new(1);
            assert!(io.request(&mut roster, pids[0], 0, 10, 0));
            assert!(!io.request(&mut roster, pids[1], 0, 3, 0));
            assert_eq!(io.wait_queue_len(), 1);
            assert_eq!(roster.get(pids[1]).unwrap().state, ProcessState::Blocked);
        }
    }

    mod completion {
        use super::*;

        #[test]
        fn completed_io_returns_pcb_to_ready_and_clears_backrefs() {
            let (mut roster, pids) = roster_with(1);
            let mut io = IoManager::new(1);
            io.request(&mut roster, pids[0], 0, 5, 0);
            let completed = io.tick_update(&mut roster, 5);
            assert_eq!(completed, vec![pids[0]]);
            let pcb = roster.get(pids[0]).unwrap();
            assert_eq!(pcb.state, ProcessState::Ready);
            assert_eq!(pcb.io_device, None);
            assert_eq!(pcb.io_end_time, None);
        }

        #[test]
        fn not_yet_due_completion_leaves_device_busy() {
            let (mut roster, pids) = roster_with(1);
            let mut io = IoManager::new(1);
            io.request(&mut roster, pids[0], 0, 5, 0);
            assert!(io.tick_update(&mut roster, 4).is_empty());
            assert!(io.is_device_busy(0));
        }

        /// S6 continued: on completion, the first holder frees the device
        /// and the waiting second PCB becomes the new holder with its own
        /// pre-stored `io_end_time`.
        #[test]
        fn s6_waiter_becomes_new_holder_on_completion() {
            let (mut roster, pids) = roster_with(2);
            let mut io = IoManager::new(1);
            io.request(&mut roster, pids[0], 0, 5, 0);
            io.request(&mut roster, pids[1], 0, 9, 0);

            let completed = io.tick_update(&mut roster, 5);
            assert_eq!(completed, vec![pids[0]]);
            assert!(io.is_device_busy(0));
            assert_eq!(roster.get(pids[1]).unwrap().state, ProcessState::Blocked);

            // The second request was for 9 ticks starting at t=0, so it
            // completes at t=9, not t=5 + 9.
            assert!(io.tick_update(&mut roster, 8).is_empty());
            let completed2 = io.tick_update(&mut roster, 9);
            assert_eq!(completed2, vec![pids[1]]);
        }

        #[test]
        fn waiter_targeting_a_different_device_is_lost_on_pop() {
            // Known-bug scenario: device 0 completes, pops the queue head,
            // but that PCB actually wanted device 1. It is dropped rather
            // than requeued or reassigned.
            let (mut roster, pids) = roster_with(3);
            let mut io = IoManager::new(2);
            io.request(&mut roster, pids[0], 0, 5, 0); // holds device 0
            io.request(&mut roster, pids[1], 0, 3, 0); // queued, wants device 0
            // Manually retarget pids[1] to device 1 after queueing, as the
            // wait queue only stores the pid, not the device id at enqueue
            // time in the original either.
            roster.get_mut(pids[1]).unwrap().io_device = Some(DeviceId(1));

            let completed = io.tick_update(&mut roster, 5);
            assert_eq!(completed, vec![pids[0]]);
            // Device 0 did not pick up pids[1] since it targets device 1.
            assert!(!io.is_device_busy(0));
            // pids[1] is still BLOCKED and stuck in no queue: the known bug.
            assert_eq!(roster.get(pids[1]).unwrap().state, ProcessState::Blocked);
            assert_eq!(io.wait_queue_len(), 0);
        }
    }
}
