use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::actors::{Event, Eventizer, Message, MessageSender};
use super::ids::{RunId, TestId};

// ============================================================================
// SuiteListener - Suite Lifecycle Contract
// ============================================================================
//
// Events flow daemon → launcher. Within one run the order is:
//   run started → (test started | failure | test finished)* → run finished
// `on_test_found` and the suite-level events are not tied to any run.
//
// ============================================================================

pub trait SuiteListener: Send {
    fn on_suite_started(&mut self);

    fn on_test_found(&mut self, test_class: String, test_id: TestId, name: String);

    fn on_run_started(&mut self, run_id: RunId, test_class: String);

    fn on_test_started(&mut self, run_id: RunId, test_id: TestId);

    fn on_failure(&mut self, run_id: RunId, cause: FailureCause);

    fn on_test_finished(&mut self, run_id: RunId);

    fn on_run_finished(&mut self, run_id: RunId);

    fn on_suite_finished(&mut self);
}

/// Serializable description of a test failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub kind: String,
    pub message: String,
    pub details: Option<String>,
}

impl FailureCause {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Suite Event - one variant per `SuiteListener` method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SuiteEvent {
    SuiteStarted,
    TestFound {
        test_class: String,
        test_id: TestId,
        name: String,
    },
    RunStarted {
        run_id: RunId,
        test_class: String,
    },
    TestStarted {
        run_id: RunId,
        test_id: TestId,
    },
    Failure {
        run_id: RunId,
        cause: FailureCause,
    },
    TestFinished {
        run_id: RunId,
    },
    RunFinished {
        run_id: RunId,
    },
    SuiteFinished,
}

impl SuiteEvent {
    /// The run this event belongs to, if any
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            SuiteEvent::RunStarted { run_id, .. }
            | SuiteEvent::TestStarted { run_id, .. }
            | SuiteEvent::Failure { run_id, .. }
            | SuiteEvent::TestFinished { run_id }
            | SuiteEvent::RunFinished { run_id } => Some(*run_id),
            SuiteEvent::SuiteStarted
            | SuiteEvent::TestFound { .. }
            | SuiteEvent::SuiteFinished => None,
        }
    }
}

impl Message for SuiteEvent {
    fn name(&self) -> &'static str {
        match self {
            SuiteEvent::SuiteStarted => "on_suite_started",
            SuiteEvent::TestFound { .. } => "on_test_found",
            SuiteEvent::RunStarted { .. } => "on_run_started",
            SuiteEvent::TestStarted { .. } => "on_test_started",
            SuiteEvent::Failure { .. } => "on_failure",
            SuiteEvent::TestFinished { .. } => "on_test_finished",
            SuiteEvent::RunFinished { .. } => "on_run_finished",
            SuiteEvent::SuiteFinished => "on_suite_finished",
        }
    }
}

impl<T: SuiteListener + ?Sized> Event<T> for SuiteEvent {
    fn fire_on(&self, target: &mut T) {
        match self {
            SuiteEvent::SuiteStarted => target.on_suite_started(),
            SuiteEvent::TestFound {
                test_class,
                test_id,
                name,
            } => target.on_test_found(test_class.clone(), test_id.clone(), name.clone()),
            SuiteEvent::RunStarted { run_id, test_class } => {
                target.on_run_started(*run_id, test_class.clone())
            }
            SuiteEvent::TestStarted { run_id, test_id } => {
                target.on_test_started(*run_id, test_id.clone())
            }
            SuiteEvent::Failure { run_id, cause } => target.on_failure(*run_id, cause.clone()),
            SuiteEvent::TestFinished { run_id } => target.on_test_finished(*run_id),
            SuiteEvent::RunFinished { run_id } => target.on_run_finished(*run_id),
            SuiteEvent::SuiteFinished => target.on_suite_finished(),
        }
    }
}

/// Frontend: turns `SuiteListener` calls into `SuiteEvent`s
pub struct SuiteListenerToEvent {
    sink: Arc<dyn MessageSender<SuiteEvent>>,
}

impl SuiteListenerToEvent {
    pub fn new(sink: Arc<dyn MessageSender<SuiteEvent>>) -> Self {
        Self { sink }
    }
}

impl SuiteListener for SuiteListenerToEvent {
    fn on_suite_started(&mut self) {
        self.sink.send(SuiteEvent::SuiteStarted);
    }

    fn on_test_found(&mut self, test_class: String, test_id: TestId, name: String) {
        self.sink.send(SuiteEvent::TestFound {
            test_class,
            test_id,
            name,
        });
    }

    fn on_run_started(&mut self, run_id: RunId, test_class: String) {
        self.sink.send(SuiteEvent::RunStarted { run_id, test_class });
    }

    fn on_test_started(&mut self, run_id: RunId, test_id: TestId) {
        self.sink.send(SuiteEvent::TestStarted { run_id, test_id });
    }

    fn on_failure(&mut self, run_id: RunId, cause: FailureCause) {
        self.sink.send(SuiteEvent::Failure { run_id, cause });
    }

    fn on_test_finished(&mut self, run_id: RunId) {
        self.sink.send(SuiteEvent::TestFinished { run_id });
    }

    fn on_run_finished(&mut self, run_id: RunId) {
        self.sink.send(SuiteEvent::RunFinished { run_id });
    }

    fn on_suite_finished(&mut self) {
        self.sink.send(SuiteEvent::SuiteFinished);
    }
}

pub struct SuiteListenerEventizer;

impl Eventizer for SuiteListenerEventizer {
    type Target = dyn SuiteListener;
    type Event = SuiteEvent;

    const CONTRACT: &'static str = "SuiteListener";

    fn new_frontend(&self, sink: Arc<dyn MessageSender<SuiteEvent>>) -> Box<dyn SuiteListener> {
        Box::new(SuiteListenerToEvent::new(sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::DirectSender;
    use std::sync::Mutex;

    /// Records every call as a `SuiteEvent` to compare against what was sent
    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<SuiteEvent>>>,
    }

    impl Recorder {
        fn record(&self, event: SuiteEvent) {
            self.calls.lock().unwrap().push(event);
        }
    }

    impl SuiteListener for Recorder {
        fn on_suite_started(&mut self) {
            self.record(SuiteEvent::SuiteStarted);
        }

        fn on_test_found(&mut self, test_class: String, test_id: TestId, name: String) {
            self.record(SuiteEvent::TestFound { test_class, test_id, name });
        }

        fn on_run_started(&mut self, run_id: RunId, test_class: String) {
            self.record(SuiteEvent::RunStarted { run_id, test_class });
        }

        fn on_test_started(&mut self, run_id: RunId, test_id: TestId) {
            self.record(SuiteEvent::TestStarted { run_id, test_id });
        }

        fn on_failure(&mut self, run_id: RunId, cause: FailureCause) {
            self.record(SuiteEvent::Failure { run_id, cause });
        }

        fn on_test_finished(&mut self, run_id: RunId) {
            self.record(SuiteEvent::TestFinished { run_id });
        }

        fn on_run_finished(&mut self, run_id: RunId) {
            self.record(SuiteEvent::RunFinished { run_id });
        }

        fn on_suite_finished(&mut self) {
            self.record(SuiteEvent::SuiteFinished);
        }
    }

    #[test]
    fn test_frontend_to_backend_invokes_each_method_once_with_same_arguments() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let eventizer = SuiteListenerEventizer;
        let backend = eventizer.new_backend(Box::new(Recorder { calls: calls.clone() }));
        let mut frontend = eventizer.new_frontend(Arc::new(DirectSender::new(backend)));

        let run = RunId::new(3);
        let cause = FailureCause::new("AssertionError", "expected 1").with_details("at line 7");
        frontend.on_suite_started();
        frontend.on_test_found("Foo".into(), TestId::of(&[0]), "testBar".into());
        frontend.on_run_started(run, "Foo".into());
        frontend.on_test_started(run, TestId::of(&[0]));
        frontend.on_failure(run, cause.clone());
        frontend.on_test_finished(run);
        frontend.on_run_finished(run);
        frontend.on_suite_finished();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                SuiteEvent::SuiteStarted,
                SuiteEvent::TestFound {
                    test_class: "Foo".into(),
                    test_id: TestId::of(&[0]),
                    name: "testBar".into(),
                },
                SuiteEvent::RunStarted { run_id: run, test_class: "Foo".into() },
                SuiteEvent::TestStarted { run_id: run, test_id: TestId::of(&[0]) },
                SuiteEvent::Failure { run_id: run, cause },
                SuiteEvent::TestFinished { run_id: run },
                SuiteEvent::RunFinished { run_id: run },
                SuiteEvent::SuiteFinished,
            ]
        );
    }

    #[test]
    fn test_event_can_be_fired_repeatedly() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut recorder = Recorder { calls: calls.clone() };
        let event = SuiteEvent::RunFinished { run_id: RunId::FIRST };

        event.fire_on(&mut recorder);
        event.fire_on(&mut recorder);

        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_run_id_classification() {
        assert_eq!(SuiteEvent::TestFinished { run_id: RunId::new(2) }.run_id(), Some(RunId::new(2)));
        assert_eq!(SuiteEvent::SuiteFinished.run_id(), None);
        assert_eq!(SuiteEvent::SuiteFinished.name(), "on_suite_finished");
    }
}
