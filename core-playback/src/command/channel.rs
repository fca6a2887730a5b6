//! Request/response transport between a controller and the playback service.
//!
//! [`CommandClient`] is a cheap, cloneable handle; [`CommandServer`] owns the
//! handler and answers requests one at a time, so commands take effect in the
//! order they were sent.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::command::protocol::{CommandEnvelope, CommandReply, PreloadCommand};
use crate::command::server::PreloadCommandHandler;
use crate::error::{PlaybackError, Result};
use crate::preload::PreloadStatus;

/// Default request queue depth.
pub const DEFAULT_COMMAND_CAPACITY: usize = 32;

struct CommandRequest {
    envelope: CommandEnvelope,
    respond_to: oneshot::Sender<CommandReply>,
}

#[derive(Clone)]
pub struct CommandClient {
    sender: mpsc::Sender<CommandRequest>,
}

impl CommandClient {
    pub async fn send(&self, command: PreloadCommand) -> Result<CommandReply> {
        self.send_envelope(command.to_envelope()).await
    }

    /// Send a raw envelope. Unknown actions come back as
    /// [`CommandReply::NotSupported`].
    pub async fn send_envelope(&self, envelope: CommandEnvelope) -> Result<CommandReply> {
        let (respond_to, reply) = oneshot::channel();
        self.sender
            .send(CommandRequest {
                envelope,
                respond_to,
            })
            .await
            .map_err(|_| PlaybackError::ChannelClosed)?;
        reply.await.map_err(|_| PlaybackError::ChannelClosed)
    }

    /// Send a JSON-encoded envelope, as received from another process.
    pub async fn send_json(&self, json: &str) -> Result<CommandReply> {
        let envelope = CommandEnvelope::from_json(json)?;
        self.send_envelope(envelope).await
    }

    pub async fn preload_adjacent_tracks(&self, current_index: i64) -> Result<CommandReply> {
        self.send(PreloadCommand::PreloadAdjacentTracks { current_index })
            .await
    }

    pub async fn play_preloaded(&self, media_id: impl Into<String>) -> Result<CommandReply> {
        self.send(PreloadCommand::PlayPreloaded {
            media_id: media_id.into(),
        })
        .await
    }

    pub async fn reset_preload(&self) -> Result<CommandReply> {
        self.send(PreloadCommand::ResetPreload).await
    }

    pub async fn preload_status(&self) -> Result<PreloadStatus> {
        match self.send(PreloadCommand::GetPreloadStatus).await? {
            CommandReply::Status { status } => Ok(status),
            other => Err(PlaybackError::Internal(format!(
                "unexpected reply to status request: {:?}",
                other
            ))),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub struct CommandServer {
    handler: PreloadCommandHandler,
    receiver: mpsc::Receiver<CommandRequest>,
}

impl CommandServer {
    /// Serve requests until `shutdown` fires or every client is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Preload command server started");
        loop {
            let request = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                request = self.receiver.recv() => request,
            };
            let Some(request) = request else {
                break;
            };

            let reply = self.handler.handle(request.envelope).await;
            if request.respond_to.send(reply).is_err() {
                debug!("Command caller went away before the reply");
            }
        }
        info!("Preload command server stopped");
    }
}

/// Create a connected client/server pair.
pub fn command_channel(
    handler: PreloadCommandHandler,
    capacity: usize,
) -> (CommandClient, CommandServer) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        CommandClient { sender },
        CommandServer { handler, receiver },
    )
}
