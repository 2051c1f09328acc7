use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::thread::{StdThreads, ThreadControl, ThreadPriority};
use crate::worker::status::WorkerStatus;

/// Default predicate polling interval for `suspend_until`.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One unit of repeatable work. Returning `true` keeps the loop going,
/// `false` ends it naturally.
pub type WorkUnit = Box<dyn FnMut() -> bool + Send>;

/// Invoked once, on the worker thread, when the work unit reports completion.
pub type FinishedHook = Box<dyn FnMut() + Send>;

type WaitPredicate = Box<dyn Fn() -> bool + Send>;

/// Lifecycle fields guarded by the worker's one mutex.
struct LifecycleState {
    status: WorkerStatus,
    wait_predicate: Option<WaitPredicate>,
    poll_interval: Duration,
}

impl LifecycleState {
    /// Apply `next` if the transition table allows it.
    fn transition(&mut self, next: WorkerStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        trace!(from = ?self.status, to = ?next, "worker status transition");
        self.status = next;
        true
    }
}

struct Shared {
    state: Mutex<LifecycleState>,
    resume: Condvar,
    /// The work unit lives here between runs; the loop takes it at entry and
    /// puts it back on exit so a stopped worker can be started again.
    work: Mutex<Option<WorkUnit>>,
    finished_hook: Mutex<Option<FinishedHook>>,
}

/// A worker thread with an explicit lifecycle: start, stop, suspend, and
/// predicate-based resumption.
///
/// All control operations take `&self` and may be called from any thread,
/// concurrently with each other and with the work loop; one mutex per worker
/// serializes them. Illegal requests are not errors: they leave the state
/// unchanged and hand the unchanged status back to the caller.
///
/// `stop()` joins the owned thread, so it must never be called from inside
/// the work unit itself.
pub struct ControllableWorker<T: ThreadControl = StdThreads> {
    name: String,
    priority: ThreadPriority,
    control: Arc<T>,
    shared: Arc<Shared>,
    handle: Mutex<Option<T::Handle>>,
}

impl ControllableWorker<StdThreads> {
    /// Create a worker driving `work` on a `std::thread` with the given name
    /// and priority hint. The thread is not spawned until [`start`].
    ///
    /// [`start`]: ControllableWorker::start
    pub fn new(
        name: impl Into<String>,
        priority: ThreadPriority,
        work: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        Self::with_thread_control(Arc::new(StdThreads), name, priority, work)
    }
}

impl<T: ThreadControl> ControllableWorker<T> {
    /// Create a worker on a caller-supplied raw-thread capability.
    pub fn with_thread_control(
        control: Arc<T>,
        name: impl Into<String>,
        priority: ThreadPriority,
        work: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            control,
            shared: Arc::new(Shared {
                state: Mutex::new(LifecycleState {
                    status: WorkerStatus::Idle,
                    wait_predicate: None,
                    poll_interval: DEFAULT_POLL_INTERVAL,
                }),
                resume: Condvar::new(),
                work: Mutex::new(Some(Box::new(work))),
                finished_hook: Mutex::new(None),
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> ThreadPriority {
        self.priority
    }

    /// Install the hook invoked when the work unit returns `false`.
    pub fn set_work_finished_hook(&self, hook: impl FnMut() + Send + 'static) {
        *self.shared.finished_hook.lock() = Some(Box::new(hook));
    }

    /// Spawn the owned thread and enter the work loop.
    ///
    /// Rejected unless the worker is `Idle`; on success the returned status
    /// is `Running`. Failure to spawn the OS thread is fatal.
    pub fn start(&self) -> WorkerStatus {
        let mut state = self.shared.state.lock();
        if !state.transition(WorkerStatus::Starting) {
            return state.status;
        }

        let shared = Arc::clone(&self.shared);
        let control = Arc::clone(&self.control);
        let priority = self.priority;
        let name = self.name.clone();
        let entry = Box::new(move || {
            control.set_current_name(&name);
            if !control.set_current_priority(priority) && priority != ThreadPriority::Normal {
                debug!(worker = %name, ?priority, "thread priority hint not applied");
            }
            run_work_loop(&name, &shared);
        });
        let handle = self
            .control
            .spawn(&self.name, entry)
            .expect("failed to spawn worker thread");
        *self.handle.lock() = Some(handle);

        state.transition(WorkerStatus::Running);
        debug!(worker = %self.name, "worker started");
        state.status
    }

    /// Wake any outstanding wait, demand loop exit, and join the owned
    /// thread. Returns `Idle` on success, or the unchanged status when the
    /// worker is already idle or another `stop()` is in flight.
    pub fn stop(&self) -> WorkerStatus {
        // End any wait first so the loop can observe the stop promptly.
        self.wake_up();
        {
            let mut state = self.shared.state.lock();
            if !state.transition(WorkerStatus::Stopping) {
                return state.status;
            }
        }
        // A suspend() racing between the wake and the transition may have
        // re-blocked the loop; Stopping is now set, so wake it once more.
        self.shared.resume.notify_all();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            self.control.join(handle);
        }

        let mut state = self.shared.state.lock();
        state.wait_predicate = None;
        state.transition(WorkerStatus::Idle);
        debug!(worker = %self.name, "worker stopped");
        state.status
    }

    /// Block the work loop indefinitely until [`wake_up`]. Valid only while
    /// `Running`; otherwise the unchanged status is returned.
    ///
    /// [`wake_up`]: ControllableWorker::wake_up
    pub fn suspend(&self) -> WorkerStatus {
        let mut state = self.shared.state.lock();
        if state.transition(WorkerStatus::Waiting) {
            debug!(worker = %self.name, "worker suspended");
        }
        state.status
    }

    /// Block the work loop, re-checking `predicate` every `poll_interval`
    /// until it reports true or [`wake_up`] arrives. Valid only while
    /// `Running`; a zero interval is rejected.
    ///
    /// The predicate runs on the worker thread with the lifecycle lock held:
    /// keep it a cheap check and do not call control operations from it.
    ///
    /// [`wake_up`]: ControllableWorker::wake_up
    pub fn suspend_until(
        &self,
        poll_interval: Duration,
        predicate: impl Fn() -> bool + Send + 'static,
    ) -> WorkerStatus {
        let mut state = self.shared.state.lock();
        if poll_interval.is_zero() {
            return state.status;
        }
        if state.transition(WorkerStatus::WaitingForCondition) {
            state.wait_predicate = Some(Box::new(predicate));
            state.poll_interval = poll_interval;
            debug!(worker = %self.name, ?poll_interval, "worker suspended on condition");
        }
        state.status
    }

    /// Resume a suspended work loop. No-op in any other state.
    pub fn wake_up(&self) -> WorkerStatus {
        let mut state = self.shared.state.lock();
        if matches!(
            state.status,
            WorkerStatus::Waiting | WorkerStatus::WaitingForCondition
        ) && state.transition(WorkerStatus::Running)
        {
            state.wait_predicate = None;
            self.shared.resume.notify_one();
            debug!(worker = %self.name, "worker woken");
        }
        state.status
    }

    pub fn get_status(&self) -> WorkerStatus {
        self.shared.state.lock().status
    }
}

impl<T: ThreadControl> Drop for ControllableWorker<T> {
    fn drop(&mut self) {
        if self.get_status() != WorkerStatus::Idle {
            self.stop();
        }
    }
}

/// The loop run by the owned thread.
///
/// Each iteration first honors the current state (indefinite wait, predicate
/// poll, or exit on `Stopping`), then runs one work unit. A work unit
/// returning `false` fires the finished hook and ends the loop without
/// touching the status; releasing the thread still requires `stop()`.
fn run_work_loop(name: &str, shared: &Shared) {
    let Some(mut work) = shared.work.lock().take() else {
        return;
    };

    'work: loop {
        {
            let mut state = shared.state.lock();
            loop {
                match state.status {
                    WorkerStatus::Waiting => shared.resume.wait(&mut state),
                    WorkerStatus::WaitingForCondition => {
                        let satisfied = state.wait_predicate.as_ref().map_or(true, |p| p());
                        if satisfied {
                            state.transition(WorkerStatus::Running);
                            state.wait_predicate = None;
                        } else {
                            let interval = state.poll_interval;
                            let _ = shared.resume.wait_for(&mut state, interval);
                        }
                    }
                    WorkerStatus::Stopping => break 'work,
                    _ => break,
                }
            }
        }

        if !work() {
            if let Some(hook) = shared.finished_hook.lock().as_mut() {
                hook();
            }
            debug!(worker = %name, "work unit finished");
            break;
        }
    }

    *shared.work.lock() = Some(work);
    trace!(worker = %name, "work loop exited");
}
