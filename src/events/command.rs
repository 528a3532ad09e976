use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::actors::{Event, Eventizer, Message, MessageSender};

// ============================================================================
// CommandListener - Launcher → Daemon Contract
// ============================================================================

pub trait CommandListener: Send {
    fn run_tests(&mut self, request: SuiteRequest);

    fn shutdown(&mut self);
}

/// What the launcher asks the daemon to run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteRequest {
    pub test_classes: Vec<String>,
}

impl SuiteRequest {
    pub fn new<I, S>(test_classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            test_classes: test_classes.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CommandEvent {
    RunTests(SuiteRequest),
    Shutdown,
}

impl Message for CommandEvent {
    fn name(&self) -> &'static str {
        match self {
            CommandEvent::RunTests(_) => "run_tests",
            CommandEvent::Shutdown => "shutdown",
        }
    }
}

impl<T: CommandListener + ?Sized> Event<T> for CommandEvent {
    fn fire_on(&self, target: &mut T) {
        match self {
            CommandEvent::RunTests(request) => target.run_tests(request.clone()),
            CommandEvent::Shutdown => target.shutdown(),
        }
    }
}

pub struct CommandListenerToEvent {
    sink: Arc<dyn MessageSender<CommandEvent>>,
}

impl CommandListener for CommandListenerToEvent {
    fn run_tests(&mut self, request: SuiteRequest) {
        self.sink.send(CommandEvent::RunTests(request));
    }

    fn shutdown(&mut self) {
        self.sink.send(CommandEvent::Shutdown);
    }
}

pub struct CommandListenerEventizer;

impl Eventizer for CommandListenerEventizer {
    type Target = dyn CommandListener;
    type Event = CommandEvent;

    const CONTRACT: &'static str = "CommandListener";

    fn new_frontend(&self, sink: Arc<dyn MessageSender<CommandEvent>>) -> Box<dyn CommandListener> {
        Box::new(CommandListenerToEvent { sink })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::DirectSender;
    use std::sync::Mutex;

    struct Recorder(Arc<Mutex<Vec<CommandEvent>>>);

    impl CommandListener for Recorder {
        fn run_tests(&mut self, request: SuiteRequest) {
            self.0.lock().unwrap().push(CommandEvent::RunTests(request));
        }

        fn shutdown(&mut self) {
            self.0.lock().unwrap().push(CommandEvent::Shutdown);
        }
    }

    #[test]
    fn test_command_round_trip() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = CommandListenerEventizer.new_backend(Box::new(Recorder(calls.clone())));
        let mut frontend = CommandListenerEventizer.new_frontend(Arc::new(DirectSender::new(backend)));

        frontend.run_tests(SuiteRequest::new(["a", "b"]));
        frontend.shutdown();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                CommandEvent::RunTests(SuiteRequest::new(["a", "b"])),
                CommandEvent::Shutdown,
            ]
        );
    }
}
