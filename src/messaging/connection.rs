use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::actors::{Actors, MessageSender};
use crate::utils::{retry_with_backoff, RetryConfig};

use super::wire::{decode_frame, encode_frame, WireError};

// ============================================================================
// Connection - Launcher ⇄ Daemon Event Stream
// ============================================================================
//
// Each side runs one read loop and one write loop as async tasks on the
// runtime's worker pool. Outgoing events enter through a `FrameWriter`,
// which is an ordinary `MessageSender` and can back any eventizer frontend.
// Incoming frames are decoded and handed to `on_event` in arrival order.
//
// ============================================================================

/// Sends events to the peer. Dropping every writer closes the write side.
pub struct FrameWriter<E> {
    tx: UnboundedSender<E>,
}

impl<E> Clone for FrameWriter<E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<E: Send> MessageSender<E> for FrameWriter<E> {
    fn send(&self, event: E) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Connection closed; dropping outgoing frame");
        }
    }
}

/// Writer plus the queue the write loop drains
pub fn frame_channel<E>() -> (FrameWriter<E>, UnboundedReceiver<E>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FrameWriter { tx }, rx)
}

/// Accept exactly one peer on `listener` and run the connection
pub fn accept_one<In, Out, F, C>(
    actors: &Actors,
    listener: std::net::TcpListener,
    outgoing: UnboundedReceiver<Out>,
    on_event: F,
    on_close: C,
) -> Result<(), WireError>
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
    F: FnMut(In) + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    listener.set_nonblocking(true)?;

    actors.spawn_io(async move {
        let accepted = async {
            let listener = TcpListener::from_std(listener)?;
            let (stream, peer) = listener.accept().await?;
            tracing::info!(peer = %peer, "🔌 Peer connected");
            Ok::<_, WireError>(stream)
        }
        .await;

        match accepted {
            Ok(stream) => finish(run_connection(stream, outgoing, on_event, on_close).await),
            Err(error) => {
                tracing::error!(error = %error, "Failed to accept peer");
                on_close();
            }
        }
    })?;
    Ok(())
}

/// Connect to `addr`, retrying with backoff, and run the connection
pub fn connect_with_retry<In, Out, F, C>(
    actors: &Actors,
    addr: SocketAddr,
    retry: RetryConfig,
    outgoing: UnboundedReceiver<Out>,
    on_event: F,
    on_close: C,
) -> Result<(), WireError>
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
    F: FnMut(In) + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    actors.spawn_io(async move {
        let connected = retry_with_backoff(&retry, |attempt| {
            tracing::debug!(addr = %addr, attempt, "Connecting");
            TcpStream::connect(addr)
        })
        .await;

        match connected {
            Ok(stream) => {
                if let Err(error) = stream.set_nodelay(true) {
                    tracing::warn!(error = %error, "Could not disable Nagle's algorithm");
                }
                tracing::info!(addr = %addr, "🔌 Connected");
                finish(run_connection(stream, outgoing, on_event, on_close).await);
            }
            Err(error) => {
                tracing::error!(addr = %addr, error = %error, "Could not connect");
                on_close();
            }
        }
    })?;
    Ok(())
}

fn finish(result: Result<(), WireError>) {
    match result {
        Ok(()) => tracing::info!("Connection closed by peer"),
        Err(error) => tracing::error!(error = %error, "Connection failed"),
    }
}

/// Run both loops until the peer closes or sends something invalid
pub async fn run_connection<In, Out, F, C>(
    stream: TcpStream,
    outgoing: UnboundedReceiver<Out>,
    mut on_event: F,
    on_close: C,
) -> Result<(), WireError>
where
    In: DeserializeOwned,
    Out: Serialize + Send + 'static,
    F: FnMut(In),
    C: FnOnce(),
{
    let (reader, writer) = stream.into_split();
    let write_loop = tokio::spawn(write_frames(writer, outgoing));

    let mut lines = BufReader::new(reader).lines();
    let result = loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match decode_frame::<In>(&line) {
                Ok(frame) => on_event(frame.event),
                Err(error) => break Err(error),
            },
            Ok(None) => break Ok(()),
            Err(error) => break Err(WireError::Io(error)),
        }
    };

    write_loop.abort();
    on_close();
    result
}

async fn write_frames<E: Serialize>(
    mut writer: OwnedWriteHalf,
    mut outgoing: UnboundedReceiver<E>,
) -> Result<(), WireError> {
    while let Some(event) = outgoing.recv().await {
        let line = encode_frame(&event)?;
        writer.write_all(line.as_bytes()).await?;
    }
    writer.shutdown().await?;
    Ok(())
}
