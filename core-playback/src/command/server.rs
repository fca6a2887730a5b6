//! Maps each preload command onto one scheduler or player operation.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::command::protocol::{CommandEnvelope, CommandReply, PreloadCommand};
use crate::player::PlaybackEngineAdapter;
use crate::preload::PrefetchScheduler;

pub struct PreloadCommandHandler {
    scheduler: Arc<PrefetchScheduler>,
    player: Arc<PlaybackEngineAdapter>,
}

impl PreloadCommandHandler {
    pub fn new(scheduler: Arc<PrefetchScheduler>, player: Arc<PlaybackEngineAdapter>) -> Self {
        Self { scheduler, player }
    }

    /// Decode and run one request. Unknown actions are answered with
    /// [`CommandReply::NotSupported`].
    pub async fn handle(&self, envelope: CommandEnvelope) -> CommandReply {
        match PreloadCommand::from_action(&envelope.action, &envelope.args) {
            Some(command) => self.dispatch(command).await,
            None => {
                warn!(action = %envelope.action, "Unsupported preload command");
                CommandReply::NotSupported {
                    action: envelope.action,
                }
            }
        }
    }

    #[instrument(skip(self), fields(action = command.action()))]
    pub async fn dispatch(&self, command: PreloadCommand) -> CommandReply {
        match command {
            PreloadCommand::PreloadAdjacentTracks { current_index } => {
                let items = self.player.media_items();
                match self.scheduler.on_index_changed(&items, current_index).await {
                    Ok(()) => CommandReply::Success,
                    Err(e) => CommandReply::Failed {
                        message: e.to_string(),
                    },
                }
            }
            PreloadCommand::PlayPreloaded { media_id } => self.play_preloaded(media_id).await,
            PreloadCommand::ResetPreload => {
                self.scheduler.reset().await;
                CommandReply::Success
            }
            PreloadCommand::GetPreloadStatus => CommandReply::Status {
                status: self.scheduler.status(),
            },
        }
    }

    /// Jump within the live play-list so the queue survives; the prefetched
    /// bytes are served by the cache-backed source. The preload window is
    /// re-planned by whoever follows the player's index, not here.
    async fn play_preloaded(&self, media_id: String) -> CommandReply {
        let Some(index) = self.player.playlist().position_of(&media_id) else {
            debug!(media_id = %media_id, "Track not in play-list");
            return CommandReply::NotFound { media_id };
        };

        if let Err(e) = self.player.play_at(index).await {
            warn!(media_id = %media_id, error = %e, "Failed to switch to preloaded track");
            return CommandReply::Failed {
                message: e.to_string(),
            };
        }
        info!(media_id = %media_id, index, "Switched to preloaded track");
        CommandReply::Success
    }
}
