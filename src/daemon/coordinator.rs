use std::sync::Arc;

use crate::actors::{ActorRef, ActorThread, Actors, MessageSender};
use crate::events::{
    CommandListener, RunIdSequence, SuiteEvent, SuiteListener, SuiteListenerToEvent, SuiteRequest,
    TestClassListener, TestClassListenerEventizer,
};

use super::exit::ExitPolicy;
use super::runner::TestClassRunner;

// ============================================================================
// Test Run Coordinator - Daemon-Side Command Handler
// ============================================================================
//
// Lives on the "coordinator" actor thread. Each test class runs as an
// unattended worker that reports suite events straight to the launcher and
// its own completion back to a `SuiteCompletion` bound on the same thread.
// The suite is finished once every class has reported.
//
// ============================================================================

pub struct TestRunCoordinator {
    actors: Arc<Actors>,
    thread: ActorThread,
    launcher: Arc<dyn MessageSender<SuiteEvent>>,
    runner: Arc<dyn TestClassRunner>,
    run_ids: Arc<RunIdSequence>,
    exit: Arc<dyn ExitPolicy>,
}

impl TestRunCoordinator {
    pub fn new(
        actors: Arc<Actors>,
        thread: ActorThread,
        launcher: Arc<dyn MessageSender<SuiteEvent>>,
        runner: Arc<dyn TestClassRunner>,
        exit: Arc<dyn ExitPolicy>,
    ) -> Self {
        Self {
            actors,
            thread,
            launcher,
            runner,
            run_ids: Arc::new(RunIdSequence::new()),
            exit,
        }
    }

    fn suite_listener(&self) -> SuiteListenerToEvent {
        SuiteListenerToEvent::new(self.launcher.clone())
    }

    fn start_test_class(&self, test_class: String, completion: &ActorRef<TestClassListenerEventizer>) {
        let guard = ReportCompletion {
            test_class: test_class.clone(),
            completion: completion.clone(),
        };
        let runner = self.runner.clone();
        let run_ids = self.run_ids.clone();
        let launcher = self.launcher.clone();

        let started = self.actors.start_unattended_worker(move || {
            let mut listener = SuiteListenerToEvent::new(launcher);
            runner.run_test_class(&test_class, &run_ids, &mut listener);
            drop(guard);
        });

        // On failure the closure, and the guard inside it, is already dropped
        if let Err(error) = started {
            tracing::error!(error = %error, "Could not start test class worker");
        }
    }
}

impl CommandListener for TestRunCoordinator {
    fn run_tests(&mut self, request: SuiteRequest) {
        let classes = request.test_classes.len();
        tracing::info!(classes, "▶️ Running test suite");

        let mut suite = self.suite_listener();
        suite.on_suite_started();

        if classes == 0 {
            suite.on_suite_finished();
            return;
        }

        let completion = match self
            .thread
            .bind_actor::<TestClassListenerEventizer>(Box::new(SuiteCompletion::new(classes, suite)))
        {
            Ok(completion) => completion,
            Err(error) => {
                tracing::error!(error = %error, "Could not track suite completion");
                self.suite_listener().on_suite_finished();
                return;
            }
        };

        for test_class in request.test_classes {
            self.start_test_class(test_class, &completion);
        }
    }

    fn shutdown(&mut self) {
        tracing::info!("Shutdown requested by launcher");
        self.exit.on_shutdown_requested();
    }
}

/// Reports the class as finished when the worker is done with it, even if
/// the runner panicked
struct ReportCompletion {
    test_class: String,
    completion: ActorRef<TestClassListenerEventizer>,
}

impl Drop for ReportCompletion {
    fn drop(&mut self) {
        let test_class = std::mem::take(&mut self.test_class);
        self.completion.tell().on_test_class_finished(test_class);
    }
}

/// Counts finished test classes and finishes the suite after the last one
pub struct SuiteCompletion {
    remaining: usize,
    suite: Box<dyn SuiteListener>,
}

impl SuiteCompletion {
    pub fn new(test_classes: usize, suite: impl SuiteListener + 'static) -> Self {
        Self {
            remaining: test_classes,
            suite: Box::new(suite),
        }
    }
}

impl TestClassListener for SuiteCompletion {
    fn on_test_class_finished(&mut self, test_class: String) {
        if self.remaining == 0 {
            tracing::warn!(test_class = %test_class, "Test class finished after the suite");
            return;
        }

        self.remaining -= 1;
        tracing::debug!(test_class = %test_class, remaining = self.remaining, "Test class finished");

        if self.remaining == 0 {
            tracing::info!("✅ Test suite finished");
            self.suite.on_suite_finished();
        }
    }
}
