use std::time::Duration;

use crate::timer::duration_ns;

/// Identifies one scheduled task. Ids are never reused, so a handle to a
/// cancelled or fired task can not reach a task scheduled later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

#[derive(Debug)]
struct Entry<T> {
    id: u64,
    deadline_ns: u64,
    period_ns: Option<u64>,
    task: T,
}

/// Cooperative table of delayed and periodic tasks.
///
/// Nothing runs on its own: the owner calls [`Scheduler::fire_due`] with the
/// current time and acts on what comes back.
#[derive(Debug)]
pub struct Scheduler<T> {
    entries: Vec<Entry<T>>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once(&mut self, at_ns: u64, task: T) -> TaskHandle {
        self.push(at_ns, None, task)
    }

    /// Schedules `task` at `first_ns`, then every `period` after that.
    pub fn schedule_every(&mut self, first_ns: u64, period: Duration, task: T) -> TaskHandle {
        let period_ns = duration_ns(period).max(1);
        self.push(first_ns, Some(period_ns), task)
    }

    fn push(&mut self, deadline_ns: u64, period_ns: Option<u64>, task: T) -> TaskHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            deadline_ns,
            period_ns,
            task,
        });
        TaskHandle(id)
    }

    /// Returns `false` when the task already fired (one-shot) or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != handle.0);
        before != self.entries.len()
    }

    pub fn is_live(&self, handle: TaskHandle) -> bool {
        self.entries.iter().any(|e| e.id == handle.0)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.deadline_ns).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pops every task due at `now_ns`, earliest first.
    ///
    /// A periodic task fires at most once per call; missed periods are
    /// skipped and it is re-armed on its own cadence.
    pub fn fire_due(&mut self, now_ns: u64) -> Vec<(TaskHandle, T)> {
        let mut due: Vec<(u64, u64, T)> = Vec::new();

        self.entries.retain_mut(|e| {
            if e.deadline_ns > now_ns {
                return true;
            }
            due.push((e.deadline_ns, e.id, e.task.clone()));
            match e.period_ns {
                Some(period) => {
                    let missed = (now_ns - e.deadline_ns) / period;
                    e.deadline_ns = e
                        .deadline_ns
                        .saturating_add(missed.saturating_add(1).saturating_mul(period));
                    true
                }
                None => false,
            }
        });

        due.sort_by_key(|(deadline, id, _)| (*deadline, *id));
        due.into_iter()
            .map(|(_, id, task)| (TaskHandle(id), task))
            .collect()
    }
}

/// Holds at most one live task for a single purpose.
#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Option<TaskHandle>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels whatever the slot held, then keeps `handle`.
    pub fn replace<T: Clone>(&mut self, scheduler: &mut Scheduler<T>, handle: TaskHandle) {
        self.clear(scheduler);
        self.handle = Some(handle);
    }

    pub fn clear<T: Clone>(&mut self, scheduler: &mut Scheduler<T>) -> bool {
        match self.handle.take() {
            Some(h) => scheduler.cancel(h),
            None => false,
        }
    }

    pub fn holds(&self, handle: TaskHandle) -> bool {
        self.handle == Some(handle)
    }

    /// Forgets `handle` if it is the one held; used once a one-shot has fired.
    pub fn take_if(&mut self, handle: TaskHandle) -> bool {
        if self.holds(handle) {
            self.handle = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    #[derive(Debug, Clone, PartialEq)]
    enum Job {
        Hide,
        Tick,
    }

    #[test]
    fn one_shot_fires_once_at_its_deadline() {
        let mut s = Scheduler::new();
        let h = s.schedule_once(1000 * MS, Job::Hide);
        assert!(s.fire_due(999 * MS).is_empty());
        assert_eq!(s.fire_due(1000 * MS), vec![(h, Job::Hide)]);
        assert!(s.fire_due(5000 * MS).is_empty());
        assert!(!s.is_live(h));
    }

    #[test]
    fn cancelled_task_never_fires() {
        let mut s = Scheduler::new();
        let h = s.schedule_once(10, Job::Hide);
        assert!(s.cancel(h));
        assert!(!s.cancel(h));
        assert!(s.fire_due(u64::MAX).is_empty());
    }

    #[test]
    fn periodic_task_skips_missed_periods() {
        let mut s = Scheduler::new();
        let h = s.schedule_every(0, Duration::from_millis(250), Job::Tick);
        assert_eq!(s.fire_due(0).len(), 1);
        assert_eq!(s.next_deadline(), Some(250 * MS));
        // suspended for a second: one tick, next one on the 250ms grid
        assert_eq!(s.fire_due(1010 * MS), vec![(h, Job::Tick)]);
        assert_eq!(s.next_deadline(), Some(1250 * MS));
    }

    #[test]
    fn due_tasks_come_back_in_deadline_order() {
        let mut s = Scheduler::new();
        let late = s.schedule_once(20, Job::Hide);
        let early = s.schedule_once(10, Job::Tick);
        let fired: Vec<_> = s.fire_due(30).into_iter().map(|(h, _)| h).collect();
        assert_eq!(fired, vec![early, late]);
    }

    #[test]
    fn slot_cancels_previous_handle_on_replace() {
        let mut s = Scheduler::new();
        let mut slot = TimerSlot::new();
        let first = s.schedule_once(10, Job::Hide);
        slot.replace(&mut s, first);
        let second = s.schedule_once(20, Job::Hide);
        slot.replace(&mut s, second);

        assert!(!s.is_live(first));
        assert!(slot.holds(second));
        assert_eq!(s.len(), 1);

        assert!(!slot.take_if(first));
        assert!(slot.take_if(second));
        assert!(!slot.holds(second));
    }

    #[test]
    fn stale_handle_does_not_touch_new_task() {
        let mut s = Scheduler::new();
        let old = s.schedule_once(10, Job::Hide);
        s.fire_due(10);
        let new = s.schedule_once(20, Job::Hide);
        assert!(!s.cancel(old));
        assert!(s.is_live(new));
    }
}
