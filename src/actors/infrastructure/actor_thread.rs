use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel as cb;

use crate::actors::core::{
    ActorError, Eventizer, EventizerRegistry, FailureHandler, Message, MessageListener,
    MessageSender,
};

use super::mailbox::{
    BoundHandler, ContractHandler, Envelope, HandlerId, Interrupt, Interrupted, Mailbox,
    MailboxSender, Payload,
};

// ============================================================================
// Actor Thread - One OS Thread, One Mailbox, Many Handlers
// ============================================================================
//
// Every handler bound to an actor thread shares its mailbox, so all of them
// are processed in one total order with full mutual exclusion. Handler state
// lives on the thread itself and is never touched from anywhere else.
//
// ============================================================================

/// Shared runtime services handed to each actor thread
#[derive(Clone)]
pub(crate) struct ActorServices {
    pub(crate) registry: Arc<EventizerRegistry>,
    pub(crate) listener: Arc<dyn MessageListener>,
    pub(crate) failures: Arc<dyn FailureHandler>,
}

/// Handle to a running actor thread. Cheap to clone.
#[derive(Clone)]
pub struct ActorThread {
    name: Arc<str>,
    mailbox: MailboxSender,
    interrupt: Arc<Interrupt>,
    next_handler: Arc<AtomicU64>,
    services: ActorServices,
}

impl ActorThread {
    pub(crate) fn new(
        name: Arc<str>,
        mailbox: MailboxSender,
        interrupt: Arc<Interrupt>,
        services: ActorServices,
    ) -> Self {
        Self {
            name,
            mailbox,
            interrupt,
            next_handler: Arc::new(AtomicU64::new(1)),
            services,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind `handler` to this thread and return a reference for sending it messages.
    ///
    /// Fails with `UnsupportedContract` when `E` is not registered with the
    /// runtime and with `ShutDown` when the thread has already terminated.
    pub fn bind_actor<E: Eventizer>(&self, handler: Box<E::Target>) -> Result<ActorRef<E>, ActorError> {
        let eventizer = self.services.registry.get::<E>()?;
        let handler_id = self.next_handler.fetch_add(1, Ordering::Relaxed);

        let backend = eventizer.new_backend(handler);
        self.mailbox.enqueue(Envelope {
            handler: handler_id,
            payload: Payload::Bind(Box::new(ContractHandler::<E>::new(backend))),
        })?;

        tracing::debug!(
            actor = %self.name,
            contract = E::CONTRACT,
            handler_id,
            "Bound actor handler"
        );

        Ok(ActorRef {
            eventizer,
            sink: Arc::new(MailboxSink {
                actor: self.name.clone(),
                handler: handler_id,
                mailbox: self.mailbox.clone(),
                listener: self.services.listener.clone(),
                _message: std::marker::PhantomData,
            }),
        })
    }

    /// Interrupt this thread. Messages still queued are not processed.
    pub fn stop(&self) {
        tracing::debug!(actor = %self.name, "Stopping actor thread");
        self.interrupt.fire();
    }
}

/// Typed reference to an actor. Every call is fire-and-forget.
pub struct ActorRef<E: Eventizer> {
    eventizer: Arc<E>,
    sink: Arc<MailboxSink<E::Event>>,
}

impl<E: Eventizer> ActorRef<E> {
    /// Frontend whose method calls are enqueued into the actor's mailbox
    pub fn tell(&self) -> Box<E::Target> {
        self.eventizer.new_frontend(self.sink.clone())
    }

    /// Enqueue an already reified call
    pub fn send(&self, event: E::Event) {
        self.sink.send(event);
    }

    /// The sink behind this reference, for plugging into other frontends
    pub fn sender(&self) -> Arc<dyn MessageSender<E::Event>> {
        self.sink.clone()
    }
}

impl<E: Eventizer> Clone for ActorRef<E> {
    fn clone(&self) -> Self {
        Self {
            eventizer: self.eventizer.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<E: Eventizer> std::fmt::Debug for ActorRef<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef")
            .field("contract", &E::CONTRACT)
            .field("actor", &self.sink.actor)
            .field("handler", &self.sink.handler)
            .finish()
    }
}

struct MailboxSink<M> {
    actor: Arc<str>,
    handler: HandlerId,
    mailbox: MailboxSender,
    listener: Arc<dyn MessageListener>,
    // `fn() -> M` keeps the sink `Sync` without requiring it of `M`
    _message: std::marker::PhantomData<fn() -> M>,
}

impl<M: Message> MessageSender<M> for MailboxSink<M> {
    fn send(&self, message: M) {
        let name = message.name();
        let envelope = Envelope {
            handler: self.handler,
            payload: Payload::Deliver {
                name,
                event: Box::new(message),
            },
        };
        match self.mailbox.enqueue(envelope) {
            Ok(()) => self.listener.on_message_sent(&self.actor, name),
            Err(_) => {
                tracing::debug!(
                    actor = %self.actor,
                    message = name,
                    "Dropped message for terminated actor thread"
                );
            }
        }
    }
}

// ============================================================================
// Event Poller - The Actor Thread's Main Loop
// ============================================================================

pub(crate) struct EventPoller {
    name: Arc<str>,
    mailbox: Mailbox,
    interrupt: Arc<Interrupt>,
    handlers: HashMap<HandlerId, Box<dyn BoundHandler>>,
    services: ActorServices,
    // Dropped when the loop exits; lets the runtime wait for termination
    _alive: cb::Sender<()>,
}

impl EventPoller {
    pub(crate) fn new(
        name: Arc<str>,
        mailbox: Mailbox,
        interrupt: Arc<Interrupt>,
        services: ActorServices,
        alive: cb::Sender<()>,
    ) -> Self {
        Self {
            name,
            mailbox,
            interrupt,
            handlers: HashMap::new(),
            services,
            _alive: alive,
        }
    }

    pub(crate) fn run(mut self) {
        tracing::debug!(actor = %self.name, "Actor thread started");

        let reason = loop {
            if let Err(reason) = self.process_next_message() {
                break reason;
            }
        };

        tracing::debug!(
            actor = %self.name,
            reason = ?reason,
            pending = self.mailbox.len(),
            "Actor thread exited"
        );
    }

    /// Take the next message and dispatch it. The only place actor state changes.
    pub(crate) fn process_next_message(&mut self) -> Result<(), Interrupted> {
        let envelope = self.mailbox.next(&self.interrupt)?;

        match envelope.payload {
            Payload::Bind(handler) => {
                self.handlers.insert(envelope.handler, handler);
            }
            Payload::Deliver { name, event } => {
                self.deliver(envelope.handler, name, event);
            }
        }
        Ok(())
    }

    fn deliver(&mut self, handler_id: HandlerId, name: &'static str, event: Box<dyn std::any::Any + Send>) {
        let Some(handler) = self.handlers.get_mut(&handler_id) else {
            self.report_malformed(name, format!("no handler {handler_id} bound"));
            return;
        };

        self.services.listener.on_processing_started(&self.name, name);
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.deliver(event)));

        self.services
            .listener
            .on_processing_finished(&self.name, name, started.elapsed());

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => self.report_malformed(name, reason),
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                self.services.failures.uncaught_failure(&self.name, name, &cause);
            }
        }
    }

    fn report_malformed(&self, name: &'static str, reason: String) {
        let error = ActorError::MalformedMessage {
            actor: self.name.to_string(),
            message: name,
            reason,
        };
        self.services
            .failures
            .uncaught_failure(&self.name, name, &error.to_string());
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::actors::core::NullMessageListener;
    use crate::actors::infrastructure::mailbox;
    use crate::events::{TestClassEvent, TestClassListener, TestClassListenerEventizer};

    #[derive(Default)]
    struct RecordingFailures {
        causes: Mutex<Vec<String>>,
    }

    impl FailureHandler for RecordingFailures {
        fn uncaught_failure(&self, _actor: &str, _message: &'static str, cause: &str) {
            self.causes.lock().unwrap().push(cause.to_string());
        }
    }

    struct RecordingClasses(Arc<Mutex<Vec<String>>>);

    impl TestClassListener for RecordingClasses {
        fn on_test_class_finished(&mut self, test_class: String) {
            self.0.lock().unwrap().push(test_class);
        }
    }

    struct Fixture {
        poller: EventPoller,
        mailbox: MailboxSender,
        failures: Arc<RecordingFailures>,
        _alive: cb::Receiver<()>,
    }

    fn fixture() -> Fixture {
        let (mailbox, inbox) = mailbox::channel();
        let (alive, alive_rx) = cb::bounded(0);
        let failures = Arc::new(RecordingFailures::default());
        let services = ActorServices {
            registry: Arc::new(EventizerRegistry::new().register(TestClassListenerEventizer)),
            listener: Arc::new(NullMessageListener),
            failures: failures.clone(),
        };
        let poller = EventPoller::new(
            Arc::from("poller-under-test"),
            inbox,
            Arc::new(Interrupt::new()),
            services,
            alive,
        );
        Fixture {
            poller,
            mailbox,
            failures,
            _alive: alive_rx,
        }
    }

    fn bind_recorder(fixture: &Fixture, handler: HandlerId) -> Arc<Mutex<Vec<String>>> {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = TestClassListenerEventizer.new_backend(Box::new(RecordingClasses(calls.clone())));
        fixture
            .mailbox
            .enqueue(Envelope {
                handler,
                payload: Payload::Bind(Box::new(ContractHandler::<TestClassListenerEventizer>::new(backend))),
            })
            .unwrap();
        calls
    }

    fn deliver(fixture: &Fixture, handler: HandlerId, event: Box<dyn std::any::Any + Send>) {
        fixture
            .mailbox
            .enqueue(Envelope {
                handler,
                payload: Payload::Deliver {
                    name: "on_test_class_finished",
                    event,
                },
            })
            .unwrap();
    }

    #[test]
    fn test_delivery_to_unbound_handler_is_malformed() {
        let mut fixture = fixture();
        let calls = bind_recorder(&fixture, 1);
        deliver(
            &fixture,
            42,
            Box::new(TestClassEvent::TestClassFinished {
                test_class: "Orphan".to_string(),
            }),
        );

        fixture.poller.process_next_message().unwrap();
        fixture.poller.process_next_message().unwrap();

        let causes = fixture.failures.causes.lock().unwrap().clone();
        assert_eq!(causes.len(), 1);
        assert!(causes[0].starts_with("Malformed message on_test_class_finished"), "{causes:?}");
        assert!(causes[0].contains("no handler 42 bound"), "{causes:?}");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_wrong_event_type_is_malformed_and_not_dispatched() {
        let mut fixture = fixture();
        let calls = bind_recorder(&fixture, 1);
        deliver(&fixture, 1, Box::new("not a test class event".to_string()));

        fixture.poller.process_next_message().unwrap();
        fixture.poller.process_next_message().unwrap();

        let causes = fixture.failures.causes.lock().unwrap().clone();
        assert_eq!(causes.len(), 1);
        assert!(causes[0].starts_with("Malformed message on_test_class_finished"), "{causes:?}");
        assert!(causes[0].contains("handler expects TestClassListener events"), "{causes:?}");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_well_typed_event_reaches_bound_handler() {
        let mut fixture = fixture();
        let calls = bind_recorder(&fixture, 7);
        deliver(
            &fixture,
            7,
            Box::new(TestClassEvent::TestClassFinished {
                test_class: "Passing".to_string(),
            }),
        );

        fixture.poller.process_next_message().unwrap();
        fixture.poller.process_next_message().unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["Passing".to_string()]);
        assert!(fixture.failures.causes.lock().unwrap().is_empty());
    }
}
