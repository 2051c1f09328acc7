use std::io;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Stack size for spawned worker threads (1 MiB).
const WORKER_STACK_SIZE: usize = 1024 * 1024;

/// Scheduling hint for a worker's owned thread.
///
/// The numeric mapping to OS scheduler parameters is platform-defined and
/// left to the [`ThreadControl`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadPriority {
    Low,
    #[default]
    Normal,
    High,
    Highest,
    Realtime,
}

/// Raw thread control consumed by the worker: spawn, join, priority, naming.
///
/// The worker owns exactly one handle at a time, created on start and joined
/// on stop. Implementations that integrate with a real scheduler (SCHED_FIFO,
/// audio workgroups, ...) plug in here.
pub trait ThreadControl: Send + Sync + 'static {
    /// Handle to one spawned thread, consumed by [`ThreadControl::join`].
    type Handle: Send;

    /// Spawn a named OS thread running `entry`.
    fn spawn(
        &self,
        name: &str,
        entry: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<Self::Handle>;

    /// Block until the thread behind `handle` has exited.
    fn join(&self, handle: Self::Handle);

    /// Rename the calling thread, for platforms where naming is separate from
    /// spawning. The default does nothing; [`StdThreads`] names at spawn.
    fn set_current_name(&self, _name: &str) {}

    /// Apply `priority` to the calling thread. Returns whether the hint was
    /// actually applied.
    fn set_current_priority(&self, priority: ThreadPriority) -> bool;
}

/// `std::thread`-backed [`ThreadControl`].
///
/// Threads are named at spawn through [`thread::Builder`]. Priority is
/// accepted as a hint but no scheduler call is made; callers that need real
/// priorities supply their own [`ThreadControl`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StdThreads;

impl ThreadControl for StdThreads {
    type Handle = thread::JoinHandle<()>;

    fn spawn(
        &self,
        name: &str,
        entry: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<Self::Handle> {
        thread::Builder::new()
            .name(name.to_string())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(entry)
    }

    fn join(&self, handle: Self::Handle) {
        if handle.join().is_err() {
            warn!("worker thread panicked before join");
        }
    }

    fn set_current_priority(&self, _priority: ThreadPriority) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_spawn_names_the_thread() {
        let (tx, rx) = mpsc::channel();
        let handle = StdThreads
            .spawn(
                "conveyor-test",
                Box::new(move || {
                    let name = thread::current().name().map(String::from);
                    tx.send(name).unwrap();
                }),
            )
            .expect("spawn thread");
        let name = rx.recv().expect("thread reported its name");
        assert_eq!(name.as_deref(), Some("conveyor-test"));
        StdThreads.join(handle);
    }

    #[test]
    fn test_join_waits_for_exit() {
        let (tx, rx) = mpsc::channel();
        let handle = StdThreads
            .spawn(
                "conveyor-join",
                Box::new(move || {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    tx.send(42u8).unwrap();
                }),
            )
            .expect("spawn thread");
        StdThreads.join(handle);
        // The value must already be in the channel once join returns
        assert_eq!(rx.try_recv(), Ok(42));
    }

    #[test]
    fn test_std_priority_is_a_hint_only() {
        assert!(!StdThreads.set_current_priority(ThreadPriority::Realtime));
    }

    #[test]
    fn test_priority_parses_from_config_names() {
        let p: ThreadPriority = serde_yaml::from_str("realtime").unwrap();
        assert_eq!(p, ThreadPriority::Realtime);
        let p: ThreadPriority = serde_yaml::from_str("normal").unwrap();
        assert_eq!(p, ThreadPriority::Normal);
    }
}
