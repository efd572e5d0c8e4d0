//! Thread-affine event-loop actor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tickforge_common::Event;
use tracing::{debug, error};

use crate::pubsub::EventBus;
use crate::queue::EventQueue;

/// How long the worker waits when the inbox is empty before re-checking
/// the running flag. Short enough that `stop()` is responsive; long enough
/// to avoid busy-waiting.
const IDLE_WAIT: Duration = Duration::from_millis(10);

/// An actor: a worker thread draining an owned inbox into an owned bus.
///
/// All subscribers on [`bus`](Self::bus) run exclusively on this actor's
/// thread, so component state reachable only from handlers needs no
/// cross-thread synchronization. Events pushed by a single producer are
/// delivered in push order; across producers, in enqueue order.
///
/// `start` and `stop` are idempotent. Events still queued when the loop
/// stops are discarded. A handler panic terminates the worker; the panic
/// is surfaced as an error log when `stop()` joins the thread.
pub struct EventLoop {
    name: String,
    inbox: Arc<EventQueue<Event>>,
    bus: Arc<EventBus>,
    running: Arc<AtomicBool>,
    idle: Arc<(Mutex<()>, Condvar)>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    /// A stopped loop named `name` (the name becomes the thread name).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inbox: Arc::new(EventQueue::new()),
            bus: Arc::new(EventBus::new()),
            running: Arc::new(AtomicBool::new(false)),
            idle: Arc::new((Mutex::new(()), Condvar::new())),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the worker thread. Does nothing if already running.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        // The flag must be true before the thread observes it.
        self.running.store(true, Ordering::Release);

        let name = self.name.clone();
        let inbox = Arc::clone(&self.inbox);
        let bus = Arc::clone(&self.bus);
        let running = Arc::clone(&self.running);
        let idle = Arc::clone(&self.idle);

        let handle = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                debug!(actor = %name, "event loop started");
                while running.load(Ordering::Acquire) {
                    if let Some(event) = inbox.try_pop() {
                        // All subscribers run here, serialized on this
                        // thread. The bus holds no lock during dispatch.
                        bus.publish(&event);
                        continue;
                    }

                    // Empty inbox: sleep briefly, waking early if stop()
                    // signals. The flag is re-checked at the loop head.
                    let (lock, condvar) = &*idle;
                    let mut guard = lock.lock();
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    condvar.wait_for(&mut guard, IDLE_WAIT);
                }
                debug!(actor = %name, "event loop exited");
            })
            .expect("failed to spawn event loop thread");

        *worker = Some(handle);
    }

    /// Signal the worker and join it. Does nothing if not running.
    pub fn stop(&self) {
        let handle = {
            let mut worker = self.worker.lock();
            match worker.take() {
                Some(handle) => handle,
                None => return,
            }
        };

        self.running.store(false, Ordering::Release);
        // Wake the worker if it is parked in the idle wait.
        self.idle.1.notify_all();

        if handle.join().is_err() {
            error!(actor = %self.name, "event loop terminated by a panicked handler");
        }

        // Events still queued at shutdown are discarded, not replayed on a
        // later start().
        let discarded = {
            let mut count = 0usize;
            while self.inbox.try_pop().is_some() {
                count += 1;
            }
            count
        };
        if discarded > 0 {
            debug!(actor = %self.name, discarded, "dropped in-flight events at stop");
        }
    }

    /// Enqueue an event for this actor. Never blocks; safe from any thread.
    pub fn push(&self, event: Event) {
        self.inbox.push(event);
    }

    /// This actor's bus, for registering subscribers.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The actor's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker thread is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("queued", &self.inbox.len())
            .finish()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
