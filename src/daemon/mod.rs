// ============================================================================
// Daemon - Runs Test Suites on Behalf of a Launcher
// ============================================================================
//
// Startup: create the actor runtime, bind the coordinator on its own actor
// thread, connect back to the launcher port and forward every command frame
// to the coordinator. The daemon exits through its `ExitPolicy`.
//
// ============================================================================

mod coordinator;
mod exit;
mod runner;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use crate::actors::{
    ActorError, Actors, EventizerRegistry, FailureHandler, MessageListener, ShutdownReport,
};
use crate::config::DaemonConfig;
use crate::events::{
    CommandEvent, CommandListenerEventizer, SuiteEvent, SuiteListenerEventizer,
    TestClassListenerEventizer,
};
use crate::messaging::{connect_with_retry, frame_channel, WireError};

pub use coordinator::{SuiteCompletion, TestRunCoordinator};
pub use exit::{shutdown_channel, DelayedExit, ExitPolicy, ShutdownSignal, ShutdownTrigger};
pub use runner::{ProcessTestClassRunner, TestClassRunner};

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("Actor runtime failed")]
    Actors(#[from] ActorError),

    #[error("Launcher connection failed")]
    Transport(#[from] WireError),
}

/// Contracts the daemon's runtime supports
pub fn daemon_registry() -> EventizerRegistry {
    EventizerRegistry::new()
        .register(CommandListenerEventizer)
        .register(SuiteListenerEventizer)
        .register(TestClassListenerEventizer)
}

pub struct Daemon {
    actors: Arc<Actors>,
    signal: ShutdownSignal,
    shutdown_timeout: Duration,
}

impl Daemon {
    pub fn start(
        config: &DaemonConfig,
        runner: Arc<dyn TestClassRunner>,
        listener: Arc<dyn MessageListener>,
        failures: Arc<dyn FailureHandler>,
    ) -> Result<Self, DaemonError> {
        let actors = Arc::new(Actors::with_hooks(
            daemon_registry(),
            config.actors.clone(),
            listener,
            failures,
        )?);

        let (trigger, signal) = shutdown_channel();
        let exit: Arc<dyn ExitPolicy> = Arc::new(DelayedExit::new(config.exit_delay, trigger));
        let (launcher, outgoing) = frame_channel::<SuiteEvent>();

        let thread = actors.start_actor_thread("coordinator")?;
        let coordinator = thread.bind_actor::<CommandListenerEventizer>(Box::new(TestRunCoordinator::new(
            actors.clone(),
            thread.clone(),
            Arc::new(launcher),
            runner,
            exit.clone(),
        )))?;

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.launcher_port));
        tracing::info!(addr = %addr, "🚀 Daemon started; connecting to launcher");

        connect_with_retry(
            &actors,
            addr,
            config.connect_retry.clone(),
            outgoing,
            move |command: CommandEvent| coordinator.send(command),
            move || exit.on_launcher_disconnected(),
        )?;

        Ok(Self {
            actors,
            signal,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    pub fn signal(&self) -> &ShutdownSignal {
        &self.signal
    }

    /// Block until the exit policy decides the daemon is no longer needed
    pub fn wait_for_exit(&self) {
        self.signal.wait();
    }

    pub fn shutdown(self) -> ShutdownReport {
        self.actors.shutdown(self.shutdown_timeout)
    }
}
