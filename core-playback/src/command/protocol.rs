//! Wire types for the preload command channel.
//!
//! A request is an action name plus a small argument bundle, serialized as
//! JSON when it crosses a process boundary:
//!
//! ```json
//! {"action":"preload.PRELOAD_ADJACENT_TRACKS","args":{"current_index":4}}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, Result};
use crate::models::INDEX_UNSET;
use crate::preload::PreloadStatus;

pub const ACTION_PRELOAD_ADJACENT_TRACKS: &str = "preload.PRELOAD_ADJACENT_TRACKS";
pub const ACTION_PLAY_PRELOADED: &str = "preload.PLAY_PRELOADED";
pub const ACTION_RESET_PRELOAD: &str = "preload.RESET_PRELOAD";
pub const ACTION_GET_PRELOAD_STATUS: &str = "preload.GET_PRELOAD_STATUS";

pub const ARG_CURRENT_INDEX: &str = "current_index";
pub const ARG_MEDIA_ID: &str = "media_id";

/// A primitive argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Int(i64),
    Text(String),
}

/// Argument bundle with typed getters. Missing or mistyped keys read as the
/// caller's default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandArgs(BTreeMap<String, ArgValue>);

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_int(mut self, key: &str, value: i64) -> Self {
        self.0.insert(key.to_string(), ArgValue::Int(value));
        self
    }

    pub fn with_string(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), ArgValue::Text(value.into()));
        self
    }

    pub fn int(&self, key: &str, default: i64) -> i64 {
        match self.0.get(key) {
            Some(ArgValue::Int(value)) => *value,
            _ => default,
        }
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        match self.0.get(key) {
            Some(ArgValue::Text(value)) => value.clone(),
            _ => default.to_string(),
        }
    }

    pub fn current_index(&self) -> i64 {
        self.int(ARG_CURRENT_INDEX, INDEX_UNSET)
    }

    pub fn media_id(&self) -> String {
        self.string(ARG_MEDIA_ID, "")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub action: String,
    #[serde(default)]
    pub args: CommandArgs,
}

impl CommandEnvelope {
    pub fn new(action: impl Into<String>, args: CommandArgs) -> Self {
        Self {
            action: action.into(),
            args,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PlaybackError::InvalidCommand(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PlaybackError::InvalidCommand(e.to_string()))
    }
}

/// Commands understood by the playback service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadCommand {
    /// Re-plan the prefetch window around `current_index` of the live
    /// play-list.
    PreloadAdjacentTracks { current_index: i64 },
    /// Switch to `media_id` within the live play-list.
    PlayPreloaded { media_id: String },
    ResetPreload,
    GetPreloadStatus,
}

impl PreloadCommand {
    pub fn action(&self) -> &'static str {
        match self {
            PreloadCommand::PreloadAdjacentTracks { .. } => ACTION_PRELOAD_ADJACENT_TRACKS,
            PreloadCommand::PlayPreloaded { .. } => ACTION_PLAY_PRELOADED,
            PreloadCommand::ResetPreload => ACTION_RESET_PRELOAD,
            PreloadCommand::GetPreloadStatus => ACTION_GET_PRELOAD_STATUS,
        }
    }

    /// Decode an action and its arguments. `None` for unknown actions.
    pub fn from_action(action: &str, args: &CommandArgs) -> Option<Self> {
        let command = match action {
            ACTION_PRELOAD_ADJACENT_TRACKS => PreloadCommand::PreloadAdjacentTracks {
                current_index: args.current_index(),
            },
            ACTION_PLAY_PRELOADED => PreloadCommand::PlayPreloaded {
                media_id: args.media_id(),
            },
            ACTION_RESET_PRELOAD => PreloadCommand::ResetPreload,
            ACTION_GET_PRELOAD_STATUS => PreloadCommand::GetPreloadStatus,
            _ => return None,
        };
        Some(command)
    }

    pub fn to_envelope(&self) -> CommandEnvelope {
        let args = match self {
            PreloadCommand::PreloadAdjacentTracks { current_index } => {
                CommandArgs::new().with_int(ARG_CURRENT_INDEX, *current_index)
            }
            PreloadCommand::PlayPreloaded { media_id } => {
                CommandArgs::new().with_string(ARG_MEDIA_ID, media_id.clone())
            }
            PreloadCommand::ResetPreload | PreloadCommand::GetPreloadStatus => CommandArgs::new(),
        };
        CommandEnvelope::new(self.action(), args)
    }
}

impl TryFrom<&CommandEnvelope> for PreloadCommand {
    type Error = PlaybackError;

    fn try_from(envelope: &CommandEnvelope) -> Result<Self> {
        PreloadCommand::from_action(&envelope.action, &envelope.args).ok_or_else(|| {
            PlaybackError::InvalidCommand(format!("unknown action {}", envelope.action))
        })
    }
}

/// Typed response. Failures are values, never panics across the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandReply {
    Success,
    Status { status: PreloadStatus },
    NotFound { media_id: String },
    NotSupported { action: String },
    Failed { message: String },
}

impl CommandReply {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandReply::Success | CommandReply::Status { .. })
    }
}
