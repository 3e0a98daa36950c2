//! Delayed, cancellable keystroke execution.
//!
//! A single worker thread owns the host injector and every timer. Callers
//! talk to it through a [`SchedulerHandle`]; each submission gets a task id
//! that only ever increases, and tasks whose fire time has passed run in id
//! order.

use crate::consts::IDLE_WAIT;
use crate::error::SchedulerError;
use crate::io::KeyInjector;
use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use evdev::KeyCode;
use log::{debug, error, info};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub type TaskId = u64;

/// Deferred work executed on the worker thread.
pub struct Job(Box<dyn FnOnce() -> Result<()> + Send>);

impl Job {
    pub fn new(f: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn run(self) -> Result<()> {
        (self.0)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Job")
    }
}

#[derive(Debug)]
pub enum Operation {
    Press(KeyCode),
    Release(KeyCode),
    /// Press then release as one step.
    Tap(KeyCode),
    Run(Job),
}

#[derive(Debug)]
enum Message {
    Submit {
        id: TaskId,
        fire_at: Instant,
        operation: Operation,
    },
    Cancel(TaskId),
    Sync(Sender<()>),
    Shutdown,
}

/// Invalidates one or more submitted tasks.
///
/// Cancelling a task that already ran, or was already cancelled, does nothing.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    tx: Option<Sender<Message>>,
    tasks: Vec<TaskId>,
}

impl CancelHandle {
    /// A handle that cancels nothing, for actions with no scheduled work.
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    pub fn merge(&mut self, other: CancelHandle) {
        if self.tx.is_none() {
            self.tx = other.tx;
        }
        self.tasks.extend(other.tasks);
    }

    pub fn cancel(self) {
        let Some(tx) = self.tx else {
            return;
        };
        for id in self.tasks {
            // A stopped worker has nothing left to cancel.
            let _ = tx.send(Message::Cancel(id));
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: Sender<Message>,
    next_id: Arc<AtomicU64>,
}

impl SchedulerHandle {
    /// Queues `operation` to run after `delay`. A zero delay runs as soon as
    /// the worker picks it up, after any zero delay work submitted before it.
    pub fn submit(
        &self,
        operation: Operation,
        delay: Duration,
    ) -> Result<CancelHandle, SchedulerError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let fire_at = Instant::now() + delay;
        self.tx
            .send(Message::Submit {
                id,
                fire_at,
                operation,
            })
            .map_err(|_| SchedulerError::Stopped)?;

        Ok(CancelHandle {
            tx: Some(self.tx.clone()),
            tasks: vec![id],
        })
    }

    /// Blocks until every task that is already due has run, including work
    /// those tasks submit while running.
    pub fn sync(&self) -> Result<(), SchedulerError> {
        let (tx, rx) = bounded(1);
        self.tx
            .send(Message::Sync(tx))
            .map_err(|_| SchedulerError::Stopped)?;
        rx.recv().map_err(|_| SchedulerError::Stopped)
    }
}

/// Owns the worker thread. Dropping it stops the worker and discards
/// whatever is still pending.
pub struct Scheduler {
    handle: SchedulerHandle,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(injector: impl KeyInjector + 'static) -> Result<Self> {
        let (tx, rx) = unbounded();
        let worker = Worker::new(rx, Box::new(injector));
        let join = thread::Builder::new()
            .name("scheduler".into())
            .spawn(move || worker.run())
            .map_err(|e| anyhow!("Failed to spawn scheduler worker: {e}"))?;

        Ok(Self {
            handle: SchedulerHandle {
                tx,
                next_id: Arc::new(AtomicU64::new(0)),
            },
            worker: Some(join),
        })
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    /// Lets everything due within `grace` run, then shuts down. Work scheduled
    /// further out is discarded.
    pub fn finish(self, grace: Duration) -> Result<(), SchedulerError> {
        thread::sleep(grace);
        self.handle.sync()?;
        self.shutdown();
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.handle.tx.send(Message::Shutdown);
            if worker.join().is_err() {
                error!("Scheduler worker panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    rx: Receiver<Message>,
    injector: Box<dyn KeyInjector>,
    queue: BinaryHeap<Reverse<(Instant, TaskId)>>,
    tasks: HashMap<TaskId, Operation>,
}

impl Worker {
    fn new(rx: Receiver<Message>, injector: Box<dyn KeyInjector>) -> Self {
        Self {
            rx,
            injector,
            queue: BinaryHeap::new(),
            tasks: HashMap::new(),
        }
    }

    fn run(mut self) {
        info!("Scheduler worker started");
        let rx = self.rx.clone();

        loop {
            let wait = self
                .next_deadline()
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_WAIT);

            let mut syncs = Vec::new();
            let mut stop = false;

            select! {
                recv(rx) -> msg => match msg {
                    Ok(msg) => stop |= self.apply(msg, &mut syncs),
                    Err(_) => stop = true,
                },
                default(wait) => {},
            }

            // `now` is taken before draining so a cancel sent ahead of a
            // task's fire time is always applied before that task is checked.
            while !stop {
                let now = Instant::now();
                stop |= self.drain(&mut syncs);
                if stop {
                    break;
                }
                let fired = self.fire_due(now);
                if fired == 0 && !self.is_due(Instant::now()) {
                    break;
                }
            }

            for sync in syncs {
                let _ = sync.send(());
            }

            if stop {
                if !self.tasks.is_empty() {
                    info!(
                        "Scheduler stopped, discarding {} pending tasks",
                        self.tasks.len()
                    );
                }
                return;
            }
        }
    }

    /// Applies every queued message. Returns true once shutdown was requested.
    fn drain(&mut self, syncs: &mut Vec<Sender<()>>) -> bool {
        let mut stop = false;
        while let Ok(msg) = self.rx.try_recv() {
            stop |= self.apply(msg, syncs);
        }
        stop
    }

    fn apply(&mut self, msg: Message, syncs: &mut Vec<Sender<()>>) -> bool {
        match msg {
            Message::Submit {
                id,
                fire_at,
                operation,
            } => {
                self.queue.push(Reverse((fire_at, id)));
                self.tasks.insert(id, operation);
            }
            Message::Cancel(id) => {
                if self.tasks.remove(&id).is_some() {
                    debug!("Cancelled task {id}");
                }
            }
            Message::Sync(tx) => syncs.push(tx),
            Message::Shutdown => return true,
        }
        false
    }

    fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((at, id))) = self.queue.peek().copied() {
            if self.tasks.contains_key(&id) {
                return Some(at);
            }
            // Cancelled, drop the stale heap entry.
            self.queue.pop();
        }
        None
    }

    fn is_due(&mut self, now: Instant) -> bool {
        self.next_deadline().is_some_and(|at| at <= now)
    }

    /// Runs every task due at `now` in task id order, returns how many ran.
    fn fire_due(&mut self, now: Instant) -> usize {
        let mut due = Vec::new();
        while let Some(Reverse((at, id))) = self.queue.peek().copied() {
            if at > now {
                break;
            }
            self.queue.pop();
            if let Some(operation) = self.tasks.remove(&id) {
                due.push((id, operation));
            }
        }
        due.sort_by_key(|(id, _)| *id);

        let fired = due.len();
        for (id, operation) in due {
            if let Err(e) = self.execute(operation) {
                error!("Task {id} failed: {e:#}");
            }
        }
        fired
    }

    fn execute(&mut self, operation: Operation) -> Result<()> {
        match operation {
            Operation::Press(key) => self.injector.press(key),
            Operation::Release(key) => self.injector.release(key),
            Operation::Tap(key) => self.injector.tap(key),
            Operation::Run(job) => job.run(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingInjector, Stroke, press_release};
    use std::sync::Mutex;

    const MS: Duration = Duration::from_millis(1);

    fn started() -> (Scheduler, RecordingInjector) {
        let injector = RecordingInjector::new();
        let scheduler = Scheduler::start(injector.clone()).unwrap();
        (scheduler, injector)
    }

    #[test]
    fn test_immediate_tasks_run_in_submission_order() {
        let (scheduler, injector) = started();
        let handle = scheduler.handle();

        handle.submit(Operation::Press(KeyCode::KEY_A), Duration::ZERO).unwrap();
        handle.submit(Operation::Tap(KeyCode::KEY_B), Duration::ZERO).unwrap();
        handle.submit(Operation::Release(KeyCode::KEY_A), Duration::ZERO).unwrap();
        handle.sync().unwrap();

        assert_eq!(
            injector.strokes(),
            vec![
                Stroke::Press(KeyCode::KEY_A),
                Stroke::Press(KeyCode::KEY_B),
                Stroke::Release(KeyCode::KEY_B),
                Stroke::Release(KeyCode::KEY_A),
            ]
        );
    }

    #[test]
    fn test_delayed_task_waits_for_its_fire_time() {
        let (scheduler, injector) = started();
        let handle = scheduler.handle();

        handle.submit(Operation::Tap(KeyCode::KEY_A), 60 * MS).unwrap();
        handle.sync().unwrap();
        assert!(injector.strokes().is_empty(), "task fired early");

        thread::sleep(100 * MS);
        handle.sync().unwrap();
        assert_eq!(injector.strokes(), press_release(KeyCode::KEY_A));
    }

    #[test]
    fn test_due_tasks_run_by_id_not_by_fire_time() {
        let (_tx, rx) = unbounded();
        let injector = RecordingInjector::new();
        let mut worker = Worker::new(rx, Box::new(injector.clone()));
        let now = Instant::now();
        let mut syncs = Vec::new();

        // Task 1 was due later than task 2, but both are overdue.
        for (id, offset, key) in [(1, 5, KeyCode::KEY_A), (2, 10, KeyCode::KEY_B)] {
            worker.apply(
                Message::Submit {
                    id,
                    fire_at: now - Duration::from_millis(offset),
                    operation: Operation::Press(key),
                },
                &mut syncs,
            );
        }
        worker.apply(
            Message::Submit {
                id: 3,
                fire_at: now + Duration::from_secs(10),
                operation: Operation::Press(KeyCode::KEY_C),
            },
            &mut syncs,
        );

        assert_eq!(worker.fire_due(now), 2);
        assert_eq!(
            injector.strokes(),
            vec![Stroke::Press(KeyCode::KEY_A), Stroke::Press(KeyCode::KEY_B)]
        );
        assert_eq!(worker.next_deadline(), Some(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let (scheduler, injector) = started();
        let handle = scheduler.handle();

        let cancel = handle.submit(Operation::Tap(KeyCode::KEY_A), 40 * MS).unwrap();
        handle.submit(Operation::Tap(KeyCode::KEY_B), 40 * MS).unwrap();
        cancel.cancel();

        thread::sleep(80 * MS);
        handle.sync().unwrap();
        assert_eq!(injector.strokes(), press_release(KeyCode::KEY_B));
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let (scheduler, injector) = started();
        let handle = scheduler.handle();

        let cancel = handle.submit(Operation::Tap(KeyCode::KEY_A), Duration::ZERO).unwrap();
        handle.sync().unwrap();
        cancel.clone().cancel();
        cancel.cancel();

        handle.submit(Operation::Tap(KeyCode::KEY_B), Duration::ZERO).unwrap();
        handle.sync().unwrap();
        assert_eq!(
            injector.strokes(),
            [press_release(KeyCode::KEY_A), press_release(KeyCode::KEY_B)].concat()
        );
    }

    #[test]
    fn test_merged_handle_cancels_every_task() {
        let (scheduler, injector) = started();
        let handle = scheduler.handle();

        let mut cancel = CancelHandle::noop();
        for key in [KeyCode::KEY_A, KeyCode::KEY_B, KeyCode::KEY_C] {
            cancel.merge(handle.submit(Operation::Tap(key), 40 * MS).unwrap());
        }
        assert_eq!(cancel.tasks().len(), 3);
        cancel.cancel();

        thread::sleep(80 * MS);
        handle.sync().unwrap();
        assert!(injector.strokes().is_empty());
    }

    #[test]
    fn test_injector_failure_does_not_stop_worker() {
        let injector = RecordingInjector::failing_on(KeyCode::KEY_X);
        let scheduler = Scheduler::start(injector.clone()).unwrap();
        let handle = scheduler.handle();

        handle.submit(Operation::Press(KeyCode::KEY_X), Duration::ZERO).unwrap();
        handle.submit(Operation::Press(KeyCode::KEY_A), Duration::ZERO).unwrap();
        handle.sync().unwrap();

        assert_eq!(injector.strokes(), vec![Stroke::Press(KeyCode::KEY_A)]);
    }

    #[test]
    fn test_jobs_can_submit_follow_up_work() {
        let (scheduler, injector) = started();
        let handle = scheduler.handle();
        let ran = Arc::new(Mutex::new(false));

        let inner = handle.clone();
        let flag = ran.clone();
        handle
            .submit(
                Operation::Run(Job::new(move || {
                    *flag.lock().unwrap() = true;
                    inner.submit(Operation::Tap(KeyCode::KEY_Z), Duration::ZERO)?;
                    Ok(())
                })),
                Duration::ZERO,
            )
            .unwrap();
        handle.sync().unwrap();

        assert!(*ran.lock().unwrap());
        assert_eq!(injector.strokes(), press_release(KeyCode::KEY_Z));
    }

    #[test]
    fn test_failing_job_is_contained() {
        let (scheduler, injector) = started();
        let handle = scheduler.handle();

        handle
            .submit(
                Operation::Run(Job::new(|| Err(anyhow!("boom")))),
                Duration::ZERO,
            )
            .unwrap();
        handle.submit(Operation::Tap(KeyCode::KEY_A), Duration::ZERO).unwrap();
        handle.sync().unwrap();

        assert_eq!(injector.strokes(), press_release(KeyCode::KEY_A));
    }

    #[test]
    fn test_finish_runs_work_due_within_grace() {
        let (scheduler, injector) = started();
        let handle = scheduler.handle();

        handle.submit(Operation::Tap(KeyCode::KEY_A), 30 * MS).unwrap();
        handle.submit(Operation::Tap(KeyCode::KEY_B), 10_000 * MS).unwrap();
        scheduler.finish(60 * MS).unwrap();

        assert_eq!(injector.strokes(), press_release(KeyCode::KEY_A));
        assert_eq!(handle.sync(), Err(SchedulerError::Stopped));
    }

    #[test]
    fn test_shutdown_discards_pending_and_rejects_new_work() {
        let (scheduler, injector) = started();
        let handle = scheduler.handle();

        handle.submit(Operation::Tap(KeyCode::KEY_A), 30 * MS).unwrap();
        scheduler.shutdown();
        thread::sleep(60 * MS);

        assert!(injector.strokes().is_empty());
        assert_eq!(
            handle
                .submit(Operation::Tap(KeyCode::KEY_B), Duration::ZERO)
                .unwrap_err(),
            SchedulerError::Stopped
        );
        assert_eq!(handle.sync(), Err(SchedulerError::Stopped));
    }
}
