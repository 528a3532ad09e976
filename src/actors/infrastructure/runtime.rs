use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{self as cb, RecvTimeoutError};
use tokio::runtime::{Handle, Runtime};

use crate::actors::core::{
    ActorError, EventizerRegistry, FailureHandler, MessageListener, NullMessageListener,
    TracingFailureLogger,
};
use crate::config::ActorsConfig;

use super::actor_thread::{panic_message, ActorServices, ActorThread, EventPoller};
use super::mailbox::{self, Interrupt};

// ============================================================================
// Actors - Thread-Per-Actor Runtime
// ============================================================================
//
// Responsibilities:
// - Start actor threads (one OS thread and one mailbox each)
// - Run unattended fire-and-forget work on a shared worker pool
// - Coordinate an advisory shutdown: interrupt, stop admitting, wait briefly
//
// Termination is observed through "alive" latches: every actor thread and
// every unattended worker holds a clone of a crossbeam sender. Once the
// runtime drops its own copy, the channel disconnects exactly when the last
// holder is gone.
//
// ============================================================================

pub struct Actors {
    services: ActorServices,
    config: ActorsConfig,
    threads: Mutex<ThreadRegistry>,
    threads_alive: cb::Receiver<()>,
    workers: WorkerPool,
}

struct ThreadRegistry {
    /// `None` once shutdown has started
    alive: Option<cb::Sender<()>>,
    threads: Vec<RegisteredThread>,
}

struct RegisteredThread {
    name: Arc<str>,
    interrupt: Arc<Interrupt>,
    handle: JoinHandle<()>,
}

/// What `shutdown` could and could not stop within its timeout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Actor threads that were stopped and joined
    pub stopped_threads: usize,
    /// Actor threads still running when the timeout expired
    pub lingering_threads: Vec<String>,
    /// Unattended workers still running when the timeout expired
    pub lingering_workers: usize,
}

impl ShutdownReport {
    pub fn is_complete(&self) -> bool {
        self.lingering_threads.is_empty() && self.lingering_workers == 0
    }
}

impl Actors {
    /// Create a runtime with silent message flow and logged failures
    pub fn new(registry: EventizerRegistry, config: ActorsConfig) -> Result<Self, ActorError> {
        Self::with_hooks(
            registry,
            config,
            Arc::new(NullMessageListener),
            Arc::new(TracingFailureLogger),
        )
    }

    pub fn with_hooks(
        registry: EventizerRegistry,
        config: ActorsConfig,
        listener: Arc<dyn MessageListener>,
        failures: Arc<dyn FailureHandler>,
    ) -> Result<Self, ActorError> {
        let workers = WorkerPool::new(&config)?;
        let (alive, threads_alive) = cb::bounded(0);

        tracing::info!(
            contracts = ?registry.contracts(),
            worker_threads = config.worker_threads,
            "Actor runtime created"
        );

        Ok(Self {
            services: ActorServices {
                registry: Arc::new(registry),
                listener,
                failures,
            },
            config,
            threads: Mutex::new(ThreadRegistry {
                alive: Some(alive),
                threads: Vec::new(),
            }),
            threads_alive,
            workers,
        })
    }

    /// Start a new actor thread with its own mailbox
    pub fn start_actor_thread(&self, name: &str) -> Result<ActorThread, ActorError> {
        let mut registry = self.lock_threads();
        let alive = registry.alive.clone().ok_or(ActorError::ShutDown)?;

        let name: Arc<str> = Arc::from(format!("{}{}", self.config.thread_name_prefix, name));
        let (sender, mailbox) = mailbox::channel();
        let interrupt = Arc::new(Interrupt::new());

        let poller = EventPoller::new(
            name.clone(),
            mailbox,
            interrupt.clone(),
            self.services.clone(),
            alive,
        );
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || poller.run())
            .map_err(|source| ActorError::ResourceExhaustion {
                what: format!("actor thread {name}"),
                source,
            })?;

        registry.threads.push(RegisteredThread {
            name: name.clone(),
            interrupt: interrupt.clone(),
            handle,
        });

        tracing::info!(actor = %name, "🎭 Actor thread started");
        Ok(ActorThread::new(name, sender, interrupt, self.services.clone()))
    }

    /// Run `task` once on the worker pool. No mailbox, no ordering guarantees.
    pub fn start_unattended_worker<F>(&self, task: F) -> Result<(), ActorError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.workers.execute(task, self.services.failures.clone())
    }

    /// Spawn an async I/O task on the worker pool. Cancelled when the pool is released.
    pub fn spawn_io<F>(&self, future: F) -> Result<tokio::task::JoinHandle<F::Output>, ActorError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.workers.spawn_io(future)
    }

    /// Interrupt every actor thread, stop admitting work and wait up to
    /// `timeout` for threads and then up to `timeout` for unattended workers.
    ///
    /// Advisory: whatever is still running afterwards keeps running and is
    /// listed in the returned report.
    pub fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        let threads = {
            let mut registry = self.lock_threads();
            registry.alive = None;
            std::mem::take(&mut registry.threads)
        };

        tracing::info!(
            threads = threads.len(),
            timeout_ms = timeout.as_millis() as u64,
            "🛑 Shutting down actor runtime"
        );

        for thread in &threads {
            thread.interrupt.fire();
        }
        self.workers.stop_admitting();

        // The latch drops when a poller returns, slightly before its OS thread
        // ends. Once every poller is gone the joins below are bounded.
        let all_exited = wait_for_disconnect(&self.threads_alive, timeout);

        let mut report = ShutdownReport::default();
        for thread in threads {
            if all_exited || thread.handle.is_finished() {
                if thread.handle.join().is_err() {
                    tracing::warn!(actor = %thread.name, "Actor thread panicked");
                }
                report.stopped_threads += 1;
            } else {
                report.lingering_threads.push(thread.name.to_string());
            }
        }

        report.lingering_workers = self.workers.await_termination(timeout);

        if report.is_complete() {
            tracing::info!(stopped = report.stopped_threads, "✅ Actor runtime shut down");
        } else {
            tracing::warn!(
                lingering_threads = ?report.lingering_threads,
                lingering_workers = report.lingering_workers,
                "Shutdown timed out; some work is still running"
            );
        }
        report
    }

    fn lock_threads(&self) -> std::sync::MutexGuard<'_, ThreadRegistry> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Block until every sender of `alive` is gone or `timeout` expires
fn wait_for_disconnect(alive: &cb::Receiver<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match alive.recv_deadline(deadline) {
            Ok(()) => continue,
            Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => return false,
        }
    }
}

// ============================================================================
// Worker Pool - Unattended Work on a Tokio Runtime
// ============================================================================

struct WorkerPool {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    admission: Mutex<Option<cb::Sender<()>>>,
    drained: cb::Receiver<()>,
    in_flight: Arc<AtomicUsize>,
}

/// Held by a running worker; releases its latch and count when dropped
struct WorkerGuard {
    _alive: cb::Sender<()>,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    fn new(config: &ActorsConfig) -> Result<Self, ActorError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .max_blocking_threads(config.max_unattended_workers.max(1))
            .thread_name(format!("{}worker", config.thread_name_prefix))
            .enable_all()
            .build()
            .map_err(|source| ActorError::ResourceExhaustion {
                what: "unattended worker pool".to_string(),
                source,
            })?;
        let handle = runtime.handle().clone();
        let (admission, drained) = cb::bounded(0);

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            handle,
            admission: Mutex::new(Some(admission)),
            drained,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn execute<F>(&self, task: F, failures: Arc<dyn FailureHandler>) -> Result<(), ActorError>
    where
        F: FnOnce() + Send + 'static,
    {
        let admission = self.admission.lock().unwrap_or_else(PoisonError::into_inner);
        let alive = admission.clone().ok_or(ActorError::ShutDown)?;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = WorkerGuard {
            _alive: alive,
            in_flight: self.in_flight.clone(),
        };

        self.handle.spawn_blocking(move || {
            let _guard = guard;
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
                failures.uncaught_failure("unattended-worker", "run", &panic_message(panic.as_ref()));
            }
        });
        Ok(())
    }

    fn spawn_io<F>(&self, future: F) -> Result<tokio::task::JoinHandle<F::Output>, ActorError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let admission = self.admission.lock().unwrap_or_else(PoisonError::into_inner);
        if admission.is_none() {
            return Err(ActorError::ShutDown);
        }
        Ok(self.handle.spawn(future))
    }

    fn stop_admitting(&self) {
        self.admission
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Wait for in-flight workers, then release the runtime. Returns how many are still running.
    fn await_termination(&self, timeout: Duration) -> usize {
        wait_for_disconnect(&self.drained, timeout);
        let lingering = self.in_flight.load(Ordering::SeqCst);

        // Lingering blocking tasks keep running detached; async I/O tasks are dropped
        if let Some(runtime) = self.runtime.lock().unwrap_or_else(PoisonError::into_inner).take() {
            runtime.shutdown_background();
        }
        lingering
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.lock().unwrap_or_else(PoisonError::into_inner).take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{
        RunId, SuiteEvent, SuiteListener, SuiteListenerEventizer, TestClassListener,
        TestClassListenerEventizer, TestId, FailureCause,
    };
    use std::sync::atomic::AtomicBool;

    /// Forwards every call into a channel so tests can wait on it
    struct ChannelListener {
        tx: cb::Sender<String>,
    }

    impl SuiteListener for ChannelListener {
        fn on_suite_started(&mut self) {
            let _ = self.tx.send("suite started".to_string());
        }

        fn on_test_found(&mut self, test_class: String, test_id: TestId, name: String) {
            let _ = self.tx.send(format!("found {test_class} {test_id} {name}"));
        }

        fn on_run_started(&mut self, run_id: RunId, test_class: String) {
            let _ = self.tx.send(format!("run started {run_id} {test_class}"));
        }

        fn on_test_started(&mut self, run_id: RunId, test_id: TestId) {
            let _ = self.tx.send(format!("test started {run_id} {test_id}"));
        }

        fn on_failure(&mut self, run_id: RunId, cause: FailureCause) {
            if cause.message == "boom" {
                panic!("handler exploded");
            }
            let _ = self.tx.send(format!("failure {run_id} {}", cause.message));
        }

        fn on_test_finished(&mut self, run_id: RunId) {
            let _ = self.tx.send(format!("test finished {run_id}"));
        }

        fn on_run_finished(&mut self, run_id: RunId) {
            let _ = self.tx.send(format!("run finished {run_id}"));
        }

        fn on_suite_finished(&mut self) {
            let _ = self.tx.send("suite finished".to_string());
        }
    }

    struct ClassListener {
        tx: cb::Sender<String>,
    }

    impl TestClassListener for ClassListener {
        fn on_test_class_finished(&mut self, test_class: String) {
            let _ = self.tx.send(format!("class finished {test_class}"));
        }
    }

    fn registry() -> EventizerRegistry {
        EventizerRegistry::new()
            .register(SuiteListenerEventizer)
            .register(TestClassListenerEventizer)
    }

    fn actors() -> Actors {
        Actors::new(registry(), ActorsConfig::default().with_worker_threads(2)).unwrap()
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_messages_from_one_sender_arrive_in_send_order() {
        let actors = actors();
        let thread = actors.start_actor_thread("fifo").unwrap();
        let (tx, rx) = cb::unbounded();
        let actor = thread
            .bind_actor::<SuiteListenerEventizer>(Box::new(ChannelListener { tx }))
            .unwrap();

        let count = 200;
        let mut listener = actor.tell();
        for i in 1..=count {
            listener.on_run_finished(RunId::new(i));
        }

        for i in 1..=count {
            assert_eq!(rx.recv_timeout(WAIT).unwrap(), format!("run finished {}", RunId::new(i)));
        }
        assert!(actors.shutdown(WAIT).is_complete());
    }

    #[test]
    fn test_zero_messages_is_fine() {
        let actors = actors();
        let thread = actors.start_actor_thread("idle").unwrap();
        let (tx, rx) = cb::unbounded();
        let _actor = thread
            .bind_actor::<SuiteListenerEventizer>(Box::new(ChannelListener { tx }))
            .unwrap();

        let report = actors.shutdown(WAIT);

        assert!(report.is_complete());
        assert_eq!(report.stopped_threads, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handlers_on_one_thread_share_a_total_order() {
        let actors = actors();
        let thread = actors.start_actor_thread("shared").unwrap();
        let (tx, rx) = cb::unbounded();
        let suite = thread
            .bind_actor::<SuiteListenerEventizer>(Box::new(ChannelListener { tx: tx.clone() }))
            .unwrap();
        let classes = thread
            .bind_actor::<TestClassListenerEventizer>(Box::new(ClassListener { tx }))
            .unwrap();

        suite.tell().on_suite_started();
        classes.tell().on_test_class_finished("Foo".to_string());
        suite.tell().on_suite_finished();

        let received: Vec<_> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(
            received,
            vec!["suite started", "class finished Foo", "suite finished"]
        );
        actors.shutdown(WAIT);
    }

    #[test]
    fn test_send_accepts_prebuilt_events() {
        let actors = actors();
        let thread = actors.start_actor_thread("prebuilt").unwrap();
        let (tx, rx) = cb::unbounded();
        let actor = thread
            .bind_actor::<SuiteListenerEventizer>(Box::new(ChannelListener { tx }))
            .unwrap();

        actor.send(SuiteEvent::RunStarted {
            run_id: RunId::new(7),
            test_class: "Bar".to_string(),
        });

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "run started RunId(7) Bar");
        actors.shutdown(WAIT);
    }

    #[test]
    fn test_binding_unregistered_contract_fails_at_bind_time() {
        let actors = Actors::new(
            EventizerRegistry::new().register(TestClassListenerEventizer),
            ActorsConfig::default(),
        )
        .unwrap();
        let thread = actors.start_actor_thread("narrow").unwrap();
        let (tx, _rx) = cb::unbounded();

        let result = thread.bind_actor::<SuiteListenerEventizer>(Box::new(ChannelListener { tx }));

        assert!(matches!(
            result,
            Err(ActorError::UnsupportedContract { contract: "SuiteListener" })
        ));
        actors.shutdown(WAIT);
    }

    #[test]
    fn test_handler_panic_does_not_kill_the_actor() {
        struct Recording(Mutex<Vec<String>>);
        impl FailureHandler for Recording {
            fn uncaught_failure(&self, _actor: &str, message: &'static str, cause: &str) {
                self.0.lock().unwrap().push(format!("{message}: {cause}"));
            }
        }

        let failures = Arc::new(Recording(Mutex::new(Vec::new())));
        let actors = Actors::with_hooks(
            registry(),
            ActorsConfig::default(),
            Arc::new(NullMessageListener),
            failures.clone(),
        )
        .unwrap();
        let thread = actors.start_actor_thread("fragile").unwrap();
        let (tx, rx) = cb::unbounded();
        let actor = thread
            .bind_actor::<SuiteListenerEventizer>(Box::new(ChannelListener { tx }))
            .unwrap();

        actor
            .tell()
            .on_failure(RunId::new(1), FailureCause::new("Error", "boom"));
        actor.tell().on_suite_finished();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "suite finished");
        assert_eq!(
            failures.0.lock().unwrap().as_slice(),
            &["on_failure: handler exploded".to_string()]
        );
        actors.shutdown(WAIT);
    }

    #[test]
    fn test_stop_interrupts_only_that_thread() {
        let actors = actors();
        let stopped = actors.start_actor_thread("stopped").unwrap();
        let running = actors.start_actor_thread("running").unwrap();
        let (tx, rx) = cb::unbounded();
        let _ = stopped
            .bind_actor::<SuiteListenerEventizer>(Box::new(ChannelListener { tx: tx.clone() }))
            .unwrap();
        let alive = running
            .bind_actor::<SuiteListenerEventizer>(Box::new(ChannelListener { tx }))
            .unwrap();

        stopped.stop();
        alive.tell().on_suite_started();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "suite started");
        assert_eq!(actors.shutdown(WAIT).stopped_threads, 2);
    }

    #[test]
    fn test_unattended_workers_run_and_report_back_by_message() {
        let actors = actors();
        let thread = actors.start_actor_thread("collector").unwrap();
        let (tx, rx) = cb::unbounded();
        let collector = thread
            .bind_actor::<TestClassListenerEventizer>(Box::new(ClassListener { tx }))
            .unwrap();

        for name in ["A", "B", "C"] {
            let collector = collector.clone();
            actors
                .start_unattended_worker(move || {
                    collector.tell().on_test_class_finished(name.to_string());
                })
                .unwrap();
        }

        let mut received: Vec<_> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        received.sort();
        assert_eq!(
            received,
            vec!["class finished A", "class finished B", "class finished C"]
        );
        assert!(actors.shutdown(WAIT).is_complete());
    }

    #[test]
    fn test_shutdown_waits_for_draining_workers_and_rejects_new_work() {
        let actors = actors();
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = cb::bounded(1);

        let flag = finished.clone();
        actors
            .start_unattended_worker(move || {
                let _ = started_tx.send(());
                std::thread::sleep(Duration::from_millis(50));
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        started_rx.recv_timeout(WAIT).unwrap();

        let report = actors.shutdown(WAIT);

        assert!(report.is_complete());
        assert!(finished.load(Ordering::SeqCst));
        assert!(matches!(
            actors.start_unattended_worker(|| {}),
            Err(ActorError::ShutDown)
        ));
        assert!(matches!(
            actors.start_actor_thread("late"),
            Err(ActorError::ShutDown)
        ));
    }

    #[test]
    fn test_shutdown_reports_stuck_actor_threads() {
        let actors = actors();
        let thread = actors.start_actor_thread("stuck").unwrap();
        let (tx, rx) = cb::unbounded::<String>();
        let (release_tx, release_rx) = cb::bounded::<()>(0);

        struct Blocking {
            entered: cb::Sender<String>,
            release: cb::Receiver<()>,
        }
        impl TestClassListener for Blocking {
            fn on_test_class_finished(&mut self, _test_class: String) {
                let _ = self.entered.send("entered".to_string());
                let _ = self.release.recv();
            }
        }

        let actor = thread
            .bind_actor::<TestClassListenerEventizer>(Box::new(Blocking {
                entered: tx,
                release: release_rx,
            }))
            .unwrap();
        actor.tell().on_test_class_finished("Slow".to_string());
        rx.recv_timeout(WAIT).unwrap();

        let report = actors.shutdown(Duration::from_millis(50));

        assert!(!report.is_complete());
        assert_eq!(
            report.lingering_threads,
            vec![format!("{}stuck", ActorsConfig::default().thread_name_prefix)]
        );
        drop(release_tx);
    }

    #[test]
    fn test_messages_to_stopped_thread_are_dropped_silently() {
        let actors = actors();
        let thread = actors.start_actor_thread("gone").unwrap();
        let (tx, rx) = cb::unbounded();
        let actor = thread
            .bind_actor::<SuiteListenerEventizer>(Box::new(ChannelListener { tx }))
            .unwrap();

        actors.shutdown(WAIT);
        actor.tell().on_suite_started();

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_idle_shutdown_always_reports_complete() {
        for round in 0..200 {
            let actors = actors();
            actors.start_actor_thread("idle").unwrap();

            let report = actors.shutdown(WAIT);

            assert!(report.is_complete(), "round {round}: {report:?}");
            assert_eq!(report.stopped_threads, 1);
        }
    }

    #[test]
    fn test_zero_sized_pool_is_clamped() {
        let config = ActorsConfig {
            worker_threads: 0,
            max_unattended_workers: 0,
            ..ActorsConfig::default()
        };

        let actors = Actors::new(registry(), config).unwrap();
        let (tx, rx) = cb::bounded(1);
        actors
            .start_unattended_worker(move || {
                let _ = tx.send(());
            })
            .unwrap();

        rx.recv_timeout(WAIT).unwrap();
        assert!(actors.shutdown(WAIT).is_complete());
    }
}
