use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{self as cb, select};

use crate::actors::core::{ActorError, Eventizer, MessageConsumer};

// ============================================================================
// Mailbox - Ordered Single-Consumer Queue
// ============================================================================
//
// Unbounded FIFO backed by a crossbeam channel. The receiving half is owned
// by exactly one actor thread; `Mailbox` is deliberately not `Clone`.
//
// ============================================================================

/// Identifies one handler bound to an actor thread
pub type HandlerId = u64;

/// A handler installed on an actor thread, with its contract erased
pub(crate) trait BoundHandler: Send {
    fn deliver(&mut self, event: Box<dyn Any + Send>) -> Result<(), String>;
}

/// Backend of contract `E`, accepting only `E::Event`
pub(crate) struct ContractHandler<E: Eventizer> {
    backend: Box<dyn MessageConsumer<E::Event>>,
}

impl<E: Eventizer> ContractHandler<E> {
    pub(crate) fn new(backend: Box<dyn MessageConsumer<E::Event>>) -> Self {
        Self { backend }
    }
}

impl<E: Eventizer> BoundHandler for ContractHandler<E> {
    fn deliver(&mut self, event: Box<dyn Any + Send>) -> Result<(), String> {
        let event = event
            .downcast::<E::Event>()
            .map_err(|_| format!("handler expects {} events", E::CONTRACT))?;
        self.backend.consume(*event);
        Ok(())
    }
}

pub(crate) enum Payload {
    /// Install a handler; always precedes any delivery to it
    Bind(Box<dyn BoundHandler>),
    /// Deliver one event to a bound handler
    Deliver {
        name: &'static str,
        event: Box<dyn Any + Send>,
    },
}

pub(crate) struct Envelope {
    pub(crate) handler: HandlerId,
    pub(crate) payload: Payload,
}

/// Why the mailbox stopped yielding messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupted {
    /// `stop()` or runtime shutdown
    Signaled,
    /// Every sender is gone; nothing can ever arrive
    Orphaned,
}

pub(crate) fn channel() -> (MailboxSender, Mailbox) {
    let (tx, rx) = cb::unbounded();
    (MailboxSender { tx }, Mailbox { rx })
}

#[derive(Clone)]
pub(crate) struct MailboxSender {
    tx: cb::Sender<Envelope>,
}

impl MailboxSender {
    pub(crate) fn enqueue(&self, envelope: Envelope) -> Result<(), ActorError> {
        self.tx.send(envelope).map_err(|_| ActorError::ShutDown)
    }
}

pub(crate) struct Mailbox {
    rx: cb::Receiver<Envelope>,
}

impl Mailbox {
    /// Take the head message, blocking until one arrives or `interrupt` fires.
    ///
    /// The interrupt is checked before waiting, so messages still queued when
    /// it fires are not processed.
    pub(crate) fn next(&self, interrupt: &Interrupt) -> Result<Envelope, Interrupted> {
        if interrupt.is_set() {
            return Err(Interrupted::Signaled);
        }
        select! {
            recv(self.rx) -> envelope => envelope.map_err(|_| Interrupted::Orphaned),
            recv(interrupt.wake) -> _ => Err(Interrupted::Signaled),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}

// ============================================================================
// Interrupt - Cooperative Cancellation
// ============================================================================
//
// Setting the flag and dropping the wake sender disconnects the wake channel,
// which makes every pending and future `select!` on it ready.
//
// ============================================================================

pub(crate) struct Interrupt {
    flag: AtomicBool,
    trigger: Mutex<Option<cb::Sender<()>>>,
    wake: cb::Receiver<()>,
}

impl Interrupt {
    pub(crate) fn new() -> Self {
        let (trigger, wake) = cb::bounded(0);
        Self {
            flag: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            wake,
        }
    }

    pub(crate) fn fire(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub(crate) fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn deliver(handler: HandlerId, name: &'static str) -> Envelope {
        Envelope {
            handler,
            payload: Payload::Deliver {
                name,
                event: Box::new(name),
            },
        }
    }

    fn name_of(envelope: Envelope) -> &'static str {
        match envelope.payload {
            Payload::Deliver { name, .. } => name,
            Payload::Bind(_) => "bind",
        }
    }

    #[test]
    fn test_mailbox_is_fifo() {
        let (tx, mailbox) = channel();
        let interrupt = Interrupt::new();

        for name in ["a", "b", "c"] {
            tx.enqueue(deliver(1, name)).unwrap();
        }

        assert_eq!(mailbox.len(), 3);
        let received: Vec<_> = (0..3)
            .map(|_| name_of(mailbox.next(&interrupt).unwrap()))
            .collect();
        assert_eq!(received, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_interrupt_wakes_blocked_receiver() {
        let (_tx, mailbox) = channel();
        let interrupt = Arc::new(Interrupt::new());

        let firing = interrupt.clone();
        let waker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            firing.fire();
        });

        assert_eq!(mailbox.next(&interrupt).err(), Some(Interrupted::Signaled));
        waker.join().unwrap();
    }

    #[test]
    fn test_interrupt_takes_precedence_over_queued_messages() {
        let (tx, mailbox) = channel();
        let interrupt = Interrupt::new();
        tx.enqueue(deliver(1, "queued")).unwrap();

        interrupt.fire();

        assert_eq!(mailbox.next(&interrupt).err(), Some(Interrupted::Signaled));
    }

    #[test]
    fn test_mailbox_without_senders_is_orphaned() {
        let (tx, mailbox) = channel();
        let interrupt = Interrupt::new();
        drop(tx);

        assert_eq!(mailbox.next(&interrupt).err(), Some(Interrupted::Orphaned));
    }
}
