// ============================================================================
// Launcher - Client Side of a Test Run
// ============================================================================
//
// Binds an ephemeral loopback port, summons a daemon that connects back to
// it and then talks to the daemon only through typed events. Commands are
// told to a `CommandListener` actor on the "launcher" thread, which relays
// them onto the connection in the order they were sent. Suite events come
// back through a channel that the text UI drains.
//
// ============================================================================

mod summoner;
mod ui;

use std::net::{Ipv4Addr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as cb;

use crate::actors::{
    ActorError, ActorRef, Actors, Eventizer, EventizerRegistry, MessageListener,
    NullMessageListener, ShutdownReport, TracingFailureLogger, TracingMessageListener,
};
use crate::config::LauncherConfig;
use crate::events::{CommandEvent, CommandListener, CommandListenerEventizer, SuiteEvent};
use crate::messaging::{accept_one, frame_channel, WireError};

pub use summoner::{DaemonSummoner, ProcessDaemonSummoner};
pub use ui::{Summary, TextUi};

#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("Actor runtime failed")]
    Actors(#[from] ActorError),

    #[error("Daemon connection failed")]
    Transport(#[from] WireError),

    #[error("Could not bind the launcher port")]
    Bind(#[source] std::io::Error),

    #[error("Settings directory {path:?} is not usable")]
    SettingsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not start daemon program {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub struct Launcher {
    actors: Actors,
    port: u16,
    events: cb::Receiver<SuiteEvent>,
    commands: ActorRef<CommandListenerEventizer>,
    shutdown_timeout: Duration,
}

impl Launcher {
    /// Start listening for the daemon. Nothing connects until a daemon is summoned.
    pub fn start(config: &LauncherConfig) -> Result<Self, LauncherError> {
        let listener: Arc<dyn MessageListener> = if config.debug_logging {
            Arc::new(TracingMessageListener)
        } else {
            Arc::new(NullMessageListener)
        };
        let actors = Actors::with_hooks(
            EventizerRegistry::new().register(CommandListenerEventizer),
            config.actors.clone(),
            listener,
            Arc::new(TracingFailureLogger),
        )?;

        let socket = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(LauncherError::Bind)?;
        let port = socket.local_addr().map_err(LauncherError::Bind)?.port();

        let (wire, outgoing) = frame_channel::<CommandEvent>();
        let thread = actors.start_actor_thread("launcher")?;
        let commands = thread.bind_actor::<CommandListenerEventizer>(
            CommandListenerEventizer.new_frontend(Arc::new(wire)),
        )?;

        let (events_tx, events) = cb::unbounded();
        accept_one(
            &actors,
            socket,
            outgoing,
            move |event: SuiteEvent| {
                let _ = events_tx.send(event);
            },
            || tracing::info!("Daemon disconnected"),
        )?;

        tracing::info!(port, "🚀 Launcher listening for daemon");
        Ok(Self {
            actors,
            port,
            events,
            commands,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Suite events from the daemon; disconnects when the daemon goes away
    pub fn events(&self) -> cb::Receiver<SuiteEvent> {
        self.events.clone()
    }

    /// Commands queued before the daemon connects are delivered once it does
    pub fn commands(&self) -> Box<dyn CommandListener> {
        self.commands.tell()
    }

    pub fn summon_daemon(&self, summoner: &mut dyn DaemonSummoner) -> Result<(), LauncherError> {
        summoner.summon(self.port)
    }

    pub fn shutdown(self) -> ShutdownReport {
        self.actors.shutdown(self.shutdown_timeout)
    }
}
