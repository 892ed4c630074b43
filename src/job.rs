//! The job table (spec.md §3).
//!
//! A job owns one process group and one or more process records (one per
//! pipeline stage). Slot 0 is reserved for whichever job currently holds
//! the foreground and is never exposed to `jobs`/`fg`/`bg`/`kill`;
//! background jobs occupy the smallest free slot at index 1 or above, so
//! ids get reused the way a fixed-size slot table does.

pub type Pid = libc::pid_t;

/// Lifecycle state of a single process within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Stopped,
    Finished,
}

/// One pipeline stage's process, tracked independently because a
/// pipeline's stages can finish or stop at different times.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub state: ProcessState,
    pub raw_status: Option<libc::c_int>,
}

impl ProcessRecord {
    pub fn new(pid: Pid) -> Self {
        ProcessRecord {
            pid,
            state: ProcessState::Running,
            raw_status: None,
        }
    }
}

/// Aggregate state of a job, derived from its process records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Finished,
}

/// A job: one process group spanning one or more pipeline stages.
#[derive(Debug, Clone)]
pub struct Job {
    pub pgid: Pid,
    pub processes: Vec<ProcessRecord>,
    pub command: String,
}

impl Job {
    pub fn new(pgid: Pid, command: String) -> Self {
        Job {
            pgid,
            processes: Vec::new(),
            command,
        }
    }

    pub fn push_process(&mut self, pid: Pid) {
        self.processes.push(ProcessRecord::new(pid));
    }

    /// Aggregate state (spec.md §3 invariants): finished only once every
    /// process has finished; running if any process is still running;
    /// stopped otherwise (no process running, at least one not finished).
    pub fn state(&self) -> JobState {
        if self
            .processes
            .iter()
            .all(|p| p.state == ProcessState::Finished)
        {
            JobState::Finished
        } else if self
            .processes
            .iter()
            .any(|p| p.state == ProcessState::Running)
        {
            JobState::Running
        } else {
            JobState::Stopped
        }
    }

    /// Exit status reported for a finished job: the last stage's, per
    /// spec.md §3 ("the pipeline's exit status is the last stage's").
    pub fn exit_status(&self) -> Option<libc::c_int> {
        self.processes.last().and_then(|p| p.raw_status)
    }

    fn find_process_mut(&mut self, pid: Pid) -> Option<&mut ProcessRecord> {
        self.processes.iter_mut().find(|p| p.pid == pid)
    }
}

/// The dense, slot-reusing job table. Slot 0 is the reserved foreground
/// slot; slots 1.. are background jobs, smallest-free-index allocated.
#[derive(Default)]
pub struct JobTable {
    slots: Vec<Option<Job>>,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            slots: vec![None],
        }
    }

    pub fn foreground(&self) -> Option<&Job> {
        self.slots[0].as_ref()
    }

    pub fn set_foreground(&mut self, job: Job) {
        self.slots[0] = Some(job);
    }

    pub fn take_foreground(&mut self) -> Option<Job> {
        self.slots[0].take()
    }

    /// Insert a background job at the smallest free slot (1-based ids),
    /// growing the table if every existing slot is occupied.
    pub fn insert_background(&mut self, job: Job) -> usize {
        for (id, slot) in self.slots.iter_mut().enumerate().skip(1) {
            if slot.is_none() {
                *slot = Some(job);
                return id;
            }
        }
        self.slots.push(Some(job));
        self.slots.len() - 1
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.slots.get(id).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.slots.get_mut(id).and_then(|s| s.as_mut())
    }

    /// Removes and returns the job at `id`. Id 0 routes to the
    /// foreground slot.
    pub fn remove(&mut self, id: usize) -> Option<Job> {
        if id == 0 {
            return self.take_foreground();
        }
        self.slots.get_mut(id).and_then(|s| s.take())
    }

    /// Background job ids in ascending order, skipping empty slots.
    pub fn ids(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, s)| s.is_some())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn jobs_sorted(&self) -> Vec<(usize, &Job)> {
        self.ids()
            .into_iter()
            .map(|id| (id, self.slots[id].as_ref().unwrap()))
            .collect()
    }

    /// The highest-id background job that isn't finished, used by `fg`/
    /// `bg` with no argument (spec.md §4.2: "most recently backgrounded
    /// or stopped job").
    pub fn most_recent_active(&self) -> Option<usize> {
        self.ids()
            .into_iter()
            .filter(|&id| self.slots[id].as_ref().unwrap().state() != JobState::Finished)
            .max()
    }

    /// Finds the process record for `pid` across every slot, used by the
    /// reaper to route a `waitpid` result to its owning job.
    pub fn find_process_mut(&mut self, pid: Pid) -> Option<&mut ProcessRecord> {
        self.slots
            .iter_mut()
            .filter_map(|s| s.as_mut())
            .find_map(|job| job.find_process_mut(pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with(pids: &[Pid]) -> Job {
        let mut job = Job::new(pids[0], "test".to_string());
        for &pid in pids {
            job.push_process(pid);
        }
        job
    }

    #[test]
    fn new_job_state_is_running() {
        let job = job_with(&[100]);
        assert_eq!(job.state(), JobState::Running);
    }

    #[test]
    fn all_finished_is_finished() {
        let mut job = job_with(&[100, 101]);
        for p in &mut job.processes {
            p.state = ProcessState::Finished;
            p.raw_status = Some(0);
        }
        assert_eq!(job.state(), JobState::Finished);
        assert_eq!(job.exit_status(), Some(0));
    }

    #[test]
    fn any_running_beats_stopped() {
        let mut job = job_with(&[100, 101]);
        job.processes[0].state = ProcessState::Stopped;
        job.processes[1].state = ProcessState::Running;
        assert_eq!(job.state(), JobState::Running);
    }

    #[test]
    fn no_running_and_not_all_finished_is_stopped() {
        let mut job = job_with(&[100, 101]);
        job.processes[0].state = ProcessState::Finished;
        job.processes[0].raw_status = Some(0);
        job.processes[1].state = ProcessState::Stopped;
        assert_eq!(job.state(), JobState::Stopped);
    }

    #[test]
    fn slot_zero_is_reserved_for_foreground() {
        let table = JobTable::new();
        assert!(table.foreground().is_none());
        assert!(table.ids().is_empty());
    }

    #[test]
    fn background_insertion_uses_smallest_free_index() {
        let mut table = JobTable::new();
        let id1 = table.insert_background(job_with(&[10]));
        let id2 = table.insert_background(job_with(&[20]));
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);

        table.remove(id1);
        let id3 = table.insert_background(job_with(&[30]));
        assert_eq!(id3, 1, "freed slot 1 should be reused before growing");
        assert_eq!(table.ids(), vec![1, 2]);
    }

    #[test]
    fn remove_zero_takes_foreground() {
        let mut table = JobTable::new();
        table.set_foreground(job_with(&[42]));
        let removed = table.remove(0);
        assert_eq!(removed.unwrap().pgid, 42);
        assert!(table.foreground().is_none());
    }

    #[test]
    fn most_recent_active_skips_finished_jobs() {
        let mut table = JobTable::new();
        table.insert_background(job_with(&[1]));
        let mut finished = job_with(&[2]);
        finished.processes[0].state = ProcessState::Finished;
        finished.processes[0].raw_status = Some(0);
        table.insert_background(finished);
        let active = job_with(&[3]);
        table.insert_background(active);

        assert_eq!(table.most_recent_active(), Some(3));
    }

    #[test]
    fn find_process_mut_locates_pid_across_slots() {
        let mut table = JobTable::new();
        table.insert_background(job_with(&[1, 2]));
        table.insert_background(job_with(&[3]));

        let record = table.find_process_mut(3).expect("pid 3 should be found");
        record.state = ProcessState::Finished;
        record.raw_status = Some(0);

        assert_eq!(table.get(2).unwrap().state(), JobState::Finished);
    }
}
