use std::sync::Arc;

use crate::actors::{Event, Eventizer, Message, MessageSender};

// ============================================================================
// TestClassListener - Worker → Coordinator Completion Contract
// ============================================================================
//
// Unattended workers share no state with actors; they report completion of
// a test class by sending this message into the coordinator's mailbox.
//
// ============================================================================

pub trait TestClassListener: Send {
    fn on_test_class_finished(&mut self, test_class: String);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestClassEvent {
    TestClassFinished { test_class: String },
}

impl Message for TestClassEvent {
    fn name(&self) -> &'static str {
        match self {
            TestClassEvent::TestClassFinished { .. } => "on_test_class_finished",
        }
    }
}

impl<T: TestClassListener + ?Sized> Event<T> for TestClassEvent {
    fn fire_on(&self, target: &mut T) {
        match self {
            TestClassEvent::TestClassFinished { test_class } => {
                target.on_test_class_finished(test_class.clone())
            }
        }
    }
}

pub struct TestClassListenerToEvent {
    sink: Arc<dyn MessageSender<TestClassEvent>>,
}

impl TestClassListener for TestClassListenerToEvent {
    fn on_test_class_finished(&mut self, test_class: String) {
        self.sink.send(TestClassEvent::TestClassFinished { test_class });
    }
}

pub struct TestClassListenerEventizer;

impl Eventizer for TestClassListenerEventizer {
    type Target = dyn TestClassListener;
    type Event = TestClassEvent;

    const CONTRACT: &'static str = "TestClassListener";

    fn new_frontend(&self, sink: Arc<dyn MessageSender<TestClassEvent>>) -> Box<dyn TestClassListener> {
        Box::new(TestClassListenerToEvent { sink })
    }
}
