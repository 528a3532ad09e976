use std::time::Duration;

// ============================================================================
// Runtime Hooks - Message Flow and Failure Reporting
// ============================================================================
//
// The runtime never logs or counts on its own; it reports to these hooks so
// the launcher and the daemon can choose between silence, logging and
// metrics.
//
// ============================================================================

/// Observes messages flowing through the actor runtime
pub trait MessageListener: Send + Sync {
    /// A message was accepted into the mailbox of `actor`
    fn on_message_sent(&self, actor: &str, message: &'static str);

    /// The thread of `actor` started processing a message
    fn on_processing_started(&self, actor: &str, message: &'static str);

    /// The thread of `actor` finished processing a message
    fn on_processing_finished(&self, actor: &str, message: &'static str, elapsed: Duration);
}

/// Receives failures that escaped actor handlers and unattended workers
pub trait FailureHandler: Send + Sync {
    fn uncaught_failure(&self, actor: &str, message: &'static str, cause: &str);
}

pub struct NullMessageListener;

impl MessageListener for NullMessageListener {
    fn on_message_sent(&self, _actor: &str, _message: &'static str) {}

    fn on_processing_started(&self, _actor: &str, _message: &'static str) {}

    fn on_processing_finished(&self, _actor: &str, _message: &'static str, _elapsed: Duration) {}
}

/// Logs message flow at trace level; useful with `RUST_LOG=testrun_actors=trace`
pub struct TracingMessageListener;

impl MessageListener for TracingMessageListener {
    fn on_message_sent(&self, actor: &str, message: &'static str) {
        tracing::trace!(actor = %actor, message, "Message sent");
    }

    fn on_processing_started(&self, actor: &str, message: &'static str) {
        tracing::trace!(actor = %actor, message, "Processing started");
    }

    fn on_processing_finished(&self, actor: &str, message: &'static str, elapsed: Duration) {
        tracing::trace!(
            actor = %actor,
            message,
            elapsed_us = elapsed.as_micros() as u64,
            "Processing finished"
        );
    }
}

pub struct TracingFailureLogger;

impl FailureHandler for TracingFailureLogger {
    fn uncaught_failure(&self, actor: &str, message: &'static str, cause: &str) {
        tracing::error!(
            actor = %actor,
            message,
            cause = %cause,
            "💥 Uncaught failure in actor"
        );
    }
}

/// Fans one notification out to several listeners
pub struct CompositeMessageListener {
    listeners: Vec<std::sync::Arc<dyn MessageListener>>,
}

impl CompositeMessageListener {
    pub fn new(listeners: Vec<std::sync::Arc<dyn MessageListener>>) -> Self {
        Self { listeners }
    }
}

impl MessageListener for CompositeMessageListener {
    fn on_message_sent(&self, actor: &str, message: &'static str) {
        for listener in &self.listeners {
            listener.on_message_sent(actor, message);
        }
    }

    fn on_processing_started(&self, actor: &str, message: &'static str) {
        for listener in &self.listeners {
            listener.on_processing_started(actor, message);
        }
    }

    fn on_processing_finished(&self, actor: &str, message: &'static str, elapsed: Duration) {
        for listener in &self.listeners {
            listener.on_processing_finished(actor, message, elapsed);
        }
    }
}
