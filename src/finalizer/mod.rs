//! Background finalizer - asynchronous disposal off the dropping thread
//!
//! Wrappers registered with a `Finalizer` hand their handle to a dedicated
//! thread when dropped, instead of running the foreign destructor inline.
//! This is the safety net, not the primary release path: callers that need
//! to control timing or thread should call `dispose()` themselves.
//!
//! ```text
//!   wrapper drop ──enqueue──▶ [ channel ] ──▶ finalizer thread
//!                                                 │ catch_unwind(finalize)
//!                                                 ├── ok      → finalized++
//!                                                 └── err/panic → failures++,
//!                                                                 log + callback
//! ```
//!
//! A failing destructor never stops the loop, and nothing here ever waits
//! on the finalizer thread from the finalizer thread: `enqueue` from a
//! destructor, or on a full queue, hands disposal back to the caller.


use crate::config::FinalizerConfig;
use crate::errors::{panic_message, HandleError, Result};
use crate::handle::{Destructor, ForeignRef, HybridHandle};
use crate::logging::{debug, info, log_destructor_failure, log_leak, warn};
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// Something the finalizer thread can dispose
pub trait Finalize: Send + Sync {
    /// The reference that would be destroyed, without claiming it
    fn pending_reference(&self) -> Option<ForeignRef>;

    /// Run disposal
    fn finalize(&self) -> Result<()>;

    /// Give up the reference without destroying it
    fn abandon(&self) -> Option<ForeignRef>;
}

impl<D: Destructor> Finalize for HybridHandle<D> {
    fn pending_reference(&self) -> Option<ForeignRef> {
        self.access_reference().ok()
    }

    fn finalize(&self) -> Result<()> {
        self.dispose_catching()
    }

    fn abandon(&self) -> Option<ForeignRef> {
        self.release()
    }
}

/// Out-of-band channel for destructor failures on the finalizer thread
pub type FailureCallback = Arc<dyn Fn(&HandleError) + Send + Sync>;

enum Message {
    Finalize(Arc<dyn Finalize>),
    Flush(Sender<()>),
}

/// Finalizer statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinalizerStats {
    pub enqueued: usize,
    pub finalized: usize,
    pub failures: usize,
    pub leaked: usize,
    pub pending: usize,
}

/// State shared with the worker thread (lock-free counters + rare-write callback)
struct WorkerState {
    enqueued: AtomicUsize,
    finalized: AtomicUsize,
    failures: AtomicUsize,
    leaked: AtomicUsize,
    closing: AtomicBool,
    drain_on_shutdown: bool,
    on_failure: RwLock<Option<FailureCallback>>,
}

impl WorkerState {
    fn new(drain_on_shutdown: bool) -> Self {
        Self {
            enqueued: AtomicUsize::new(0),
            finalized: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            leaked: AtomicUsize::new(0),
            closing: AtomicBool::new(false),
            drain_on_shutdown,
            on_failure: RwLock::new(None),
        }
    }

    fn run(&self, rx: Receiver<Message>) {
        info!(event = "finalizer_start", "Finalizer thread running");

        for message in rx.iter() {
            match message {
                Message::Finalize(item) => self.process(item),
                Message::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        info!(event = "finalizer_stop", "Finalizer thread stopped");
    }

    fn process(&self, item: Arc<dyn Finalize>) {
        if self.closing.load(Ordering::Acquire) && !self.drain_on_shutdown {
            if let Some(reference) = item.abandon() {
                log_leak(reference, "finalizer shut down without draining");
            }
            self.leaked.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let reference = item.pending_reference();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| item.finalize()));

        match outcome {
            Ok(Ok(())) => {
                self.finalized.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(err)) => self.report(err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let err = match reference {
                    Some(reference) => HandleError::DestructorFailure { reference, message },
                    None => HandleError::FinalizerUnavailable(message),
                };
                self.report(err);
            }
        }
    }

    fn report(&self, err: HandleError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        log_destructor_failure(&err, "finalizer");

        let callback = self.on_failure.read().clone();
        if let Some(callback) = callback {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&err))).is_err() {
                warn!(event = "failure_callback_panic", "Failure callback panicked");
            }
        }
    }

    fn stats(&self) -> FinalizerStats {
        let enqueued = self.enqueued.load(Ordering::Relaxed);
        let finalized = self.finalized.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let leaked = self.leaked.load(Ordering::Relaxed);

        FinalizerStats {
            enqueued,
            finalized,
            failures,
            leaked,
            pending: enqueued.saturating_sub(finalized + failures + leaked),
        }
    }
}

struct Inner {
    sender: Mutex<Option<Sender<Message>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    state: Arc<WorkerState>,
    config: FinalizerConfig,
}

impl Inner {
    fn shutdown(&self) {
        let sender = {
            let mut guard = self.sender.lock();
            if guard.is_some() {
                // Visible to the worker before anyone can observe !is_running
                self.state.closing.store(true, Ordering::Release);
            }
            guard.take()
        };
        let Some(sender) = sender else {
            return;
        };

        debug!(
            event = "finalizer_shutdown",
            drain = self.config.drain_on_shutdown,
            pending = self.state.stats().pending,
            "Finalizer shutting down"
        );

        // Worker exits once it has seen every queued message
        drop(sender);

        if thread::current().id() == self.worker_id {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!(event = "finalizer_join", "Finalizer thread panicked");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to a finalizer thread. Clones share the same thread; the thread
/// shuts down when `shutdown` is called or the last clone is dropped.
#[derive(Clone)]
pub struct Finalizer {
    inner: Arc<Inner>,
}

static GLOBAL: OnceCell<Finalizer> = OnceCell::new();

impl Finalizer {
    /// Spawn a finalizer thread
    pub fn spawn(config: FinalizerConfig) -> Result<Self> {
        let (tx, rx) = match config.queue_capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };

        let state = Arc::new(WorkerState::new(config.drain_on_shutdown));
        let worker_state = Arc::clone(&state);

        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker_state.run(rx))
            .map_err(|e| HandleError::FinalizerUnavailable(e.to_string()))?;

        info!(
            event = "finalizer_spawn",
            thread = %config.thread_name,
            capacity = ?config.queue_capacity,
            "Finalizer spawned"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(tx)),
                worker_id: worker.thread().id(),
                worker: Mutex::new(Some(worker)),
                state,
                config,
            }),
        })
    }

    /// Process-wide finalizer configured from `.hybridrc` and the environment.
    /// Never shut down, so handles still queued at process exit are leaked.
    pub fn global() -> Result<&'static Finalizer> {
        GLOBAL.get_or_try_init(|| {
            let config = crate::config::HybridConfig::discover();
            Self::spawn(config.finalizer)
        })
    }

    /// Queue an item for disposal on the finalizer thread.
    ///
    /// Never blocks. Returns `false`, leaving disposal to the caller, when the
    /// finalizer has shut down, when the queue is full, or when called from
    /// the finalizer thread itself (a destructor dropping another registered
    /// wrapper). The item is not consumed in that case beyond dropping this
    /// reference to it.
    pub fn enqueue(&self, item: Arc<dyn Finalize>) -> bool {
        if self.on_worker_thread() {
            return false;
        }
        let Some(sender) = self.sender() else {
            return false;
        };

        self.inner.state.enqueued.fetch_add(1, Ordering::Relaxed);
        match sender.try_send(Message::Finalize(item)) {
            Ok(()) => true,
            Err(err) => {
                self.inner.state.enqueued.fetch_sub(1, Ordering::Relaxed);
                if err.is_full() {
                    debug!(event = "finalizer_full", "Finalizer queue full");
                }
                false
            }
        }
    }

    /// Block until every item queued so far has been processed. No-op on
    /// the finalizer thread, which cannot wait on itself.
    pub fn flush(&self) {
        if self.on_worker_thread() {
            return;
        }
        let Some(sender) = self.sender() else {
            return;
        };

        let (ack_tx, ack_rx) = bounded(1);
        let sent = sender.send(Message::Flush(ack_tx)).is_ok();
        drop(sender);

        if sent {
            let _ = ack_rx.recv();
        }
    }

    /// Clone the sender out of the lock so no send ever happens under it
    fn sender(&self) -> Option<Sender<Message>> {
        self.inner.sender.lock().clone()
    }

    fn on_worker_thread(&self) -> bool {
        thread::current().id() == self.inner.worker_id
    }

    /// Stop accepting work, finalize (or leak, per config) what is queued,
    /// and join the thread. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.inner.sender.lock().is_some()
    }

    /// Install the out-of-band failure callback
    pub fn on_failure<F>(&self, callback: F)
    where
        F: Fn(&HandleError) + Send + Sync + 'static,
    {
        *self.inner.state.on_failure.write() = Some(Arc::new(callback));
    }

    pub fn stats(&self) -> FinalizerStats {
        self.inner.state.stats()
    }

    pub fn config(&self) -> &FinalizerConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finalizer")
            .field("thread", &self.inner.config.thread_name)
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish()
    }
}
