use crate::heap::HeapRef;
use crate::keys::ThreadId;
use crate::thread::{ThreadState, VmThread};
use std::collections::VecDeque;

/// Single-executor cooperative scheduler. Threads sit in a FIFO ready list;
/// `take_next` hands out at most one thread at a time, which the driver
/// parks back after its quantum.
#[derive(Default)]
pub struct Scheduler {
    slots: Vec<Option<VmThread>>,
    order: VecDeque<ThreadId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a thread; the builder receives its id so frames can refer to
    /// it.
    pub fn spawn(&mut self, build: impl FnOnce(ThreadId) -> VmThread) -> ThreadId {
        let id = ThreadId::from_usize(self.slots.len());
        self.slots.push(Some(build(id)));
        self.order.push_back(id);
        id
    }

    /// Select the next runnable thread, promoting elapsed timed-waits. The
    /// chosen thread rotates to the back of the list and is taken out of its
    /// slot until parked again.
    pub fn take_next(&mut self, now: u64) -> Option<VmThread> {
        for i in 0..self.order.len() {
            let id = self.order[i];
            let Some(thread) = self.slots[id.as_usize()].as_mut() else {
                continue;
            };
            match thread.state {
                ThreadState::Runnable => {}
                ThreadState::TimedWaiting if thread.wake_at.is_some_and(|t| t <= now) => {
                    thread.state = ThreadState::Runnable;
                    thread.wake_at = None;
                    thread.waiting_on = None;
                }
                _ => continue,
            }
            self.order.remove(i);
            self.order.push_back(id);
            return self.slots[id.as_usize()].take();
        }
        None
    }

    pub fn park(&mut self, thread: VmThread) {
        let index = thread.id.as_usize();
        self.slots[index] = Some(thread);
    }

    /// Promote at most one thread waiting on `monitor`.
    pub fn notify(&mut self, monitor: HeapRef) {
        for id in &self.order {
            if let Some(thread) = self.slots[id.as_usize()].as_mut()
                && matches!(thread.state, ThreadState::Waiting | ThreadState::TimedWaiting)
                && thread.waiting_on == Some(monitor)
            {
                thread.state = ThreadState::Runnable;
                thread.waiting_on = None;
                thread.wake_at = None;
                return;
            }
        }
    }

    /// Promote every thread waiting on `monitor`.
    pub fn notify_all(&mut self, monitor: HeapRef) {
        for id in &self.order {
            if let Some(thread) = self.slots[id.as_usize()].as_mut()
                && matches!(thread.state, ThreadState::Waiting | ThreadState::TimedWaiting)
                && thread.waiting_on == Some(monitor)
            {
                thread.state = ThreadState::Runnable;
                thread.waiting_on = None;
                thread.wake_at = None;
            }
        }
    }

    /// Reap terminated threads. A dying thread with a heap-level thread
    /// object notifies everything waiting on it, which is what unblocks
    /// join.
    pub fn remove_finished(&mut self) -> Vec<VmThread> {
        let mut finished = Vec::new();
        let mut i = 0;
        while i < self.order.len() {
            let id = self.order[i];
            let is_finished = self.slots[id.as_usize()]
                .as_ref()
                .is_some_and(|t| t.is_finished());
            if is_finished {
                self.order.remove(i);
                if let Some(thread) = self.slots[id.as_usize()].take() {
                    finished.push(thread);
                }
            } else {
                i += 1;
            }
        }
        for thread in &finished {
            if let Some(obj) = thread.java_object {
                self.notify_all(obj);
            }
        }
        finished
    }

    /// Threads currently parked in the list (a taken-out running thread is
    /// not counted).
    pub fn live_count(&self) -> usize {
        self.order.len()
    }

    pub fn thread_id_by_object(&self, obj: HeapRef) -> Option<ThreadId> {
        self.order.iter().copied().find(|id| {
            self.slots[id.as_usize()]
                .as_ref()
                .is_some_and(|t| t.java_object == Some(obj))
        })
    }

    pub fn is_alive(&self, obj: HeapRef) -> bool {
        self.thread_id_by_object(obj).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::VmThread;

    fn spawn_idle(scheduler: &mut Scheduler) -> ThreadId {
        scheduler.spawn(VmThread::new)
    }

    #[test]
    fn round_robin_rotates_fairly() {
        let mut scheduler = Scheduler::new();
        let a = spawn_idle(&mut scheduler);
        let b = spawn_idle(&mut scheduler);

        let first = scheduler.take_next(0).unwrap();
        assert_eq!(first.id, a);
        scheduler.park(first);
        let second = scheduler.take_next(0).unwrap();
        assert_eq!(second.id, b);
        scheduler.park(second);
        let third = scheduler.take_next(0).unwrap();
        assert_eq!(third.id, a);
        scheduler.park(third);
    }

    #[test]
    fn timed_waiting_promotes_after_deadline() {
        let mut scheduler = Scheduler::new();
        let id = spawn_idle(&mut scheduler);
        let mut thread = scheduler.take_next(0).unwrap();
        thread.sleep_until(50);
        scheduler.park(thread);

        assert!(scheduler.take_next(49).is_none());
        let woken = scheduler.take_next(50).unwrap();
        assert_eq!(woken.id, id);
        assert_eq!(woken.state, ThreadState::Runnable);
        assert_eq!(woken.wake_at, None);
        scheduler.park(woken);
    }

    #[test]
    fn notify_wakes_one_notify_all_wakes_every_waiter() {
        let mut scheduler = Scheduler::new();
        let monitor: HeapRef = 7;
        for _ in 0..3 {
            let id = spawn_idle(&mut scheduler);
            let mut thread = scheduler.take_next(0).unwrap();
            assert_eq!(thread.id, id);
            thread.wait_on(monitor, None);
            scheduler.park(thread);
        }
        assert!(scheduler.take_next(0).is_none());

        scheduler.notify(monitor);
        let woken = scheduler.take_next(0).unwrap();
        scheduler.park(woken);
        // the other two still wait
        let mut runnable = 0;
        for _ in 0..3 {
            if let Some(t) = scheduler.take_next(0) {
                runnable += 1;
                scheduler.park(t);
            }
        }
        assert_eq!(runnable, 1);

        scheduler.notify_all(monitor);
        let mut woken_now = 0;
        for _ in 0..3 {
            if let Some(t) = scheduler.take_next(0) {
                woken_now += 1;
                scheduler.park(t);
            }
        }
        assert_eq!(woken_now, 3);
    }

    #[test]
    fn remove_finished_reaps_and_notifies_joiners() {
        let mut scheduler = Scheduler::new();
        let dying = spawn_idle(&mut scheduler);
        let _waiter = spawn_idle(&mut scheduler);

        let mut thread = scheduler.take_next(0).unwrap();
        assert_eq!(thread.id, dying);
        thread.java_object = Some(99);
        thread.state = ThreadState::Terminated;
        scheduler.park(thread);

        let mut waiter = scheduler.take_next(0).unwrap();
        waiter.wait_on(99, None);
        scheduler.park(waiter);

        let finished = scheduler.remove_finished();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].id, dying);
        assert_eq!(scheduler.live_count(), 1);
        // joiner was promoted by the implicit notify-all
        assert!(scheduler.take_next(0).is_some());
    }

    #[test]
    fn ready_list_holds_each_thread_at_most_once() {
        let mut scheduler = Scheduler::new();
        for _ in 0..4 {
            spawn_idle(&mut scheduler);
        }
        let mut seen = std::collections::HashSet::new();
        for id in &scheduler.order {
            assert!(seen.insert(*id));
        }
    }
}
