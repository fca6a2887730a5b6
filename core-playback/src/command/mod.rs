//! # Preload Command Channel
//!
//! Lets a controller (typically the UI process) drive the prefetch scheduler
//! and switch to a preloaded track inside the playback service.
//!
//! | action                             | effect                                   |
//! |------------------------------------|------------------------------------------|
//! | `preload.PRELOAD_ADJACENT_TRACKS`  | re-plan the window around `current_index` |
//! | `preload.PLAY_PRELOADED`           | jump to `media_id` in the live play-list |
//! | `preload.RESET_PRELOAD`            | cancel all jobs                          |
//! | `preload.GET_PRELOAD_STATUS`       | report the scheduler's job table         |

pub mod channel;
pub mod protocol;
pub mod server;

pub use channel::{command_channel, CommandClient, CommandServer, DEFAULT_COMMAND_CAPACITY};
pub use protocol::{
    ArgValue, CommandArgs, CommandEnvelope, CommandReply, PreloadCommand,
    ACTION_GET_PRELOAD_STATUS, ACTION_PLAY_PRELOADED, ACTION_PRELOAD_ADJACENT_TRACKS,
    ACTION_RESET_PRELOAD, ARG_CURRENT_INDEX, ARG_MEDIA_ID,
};
pub use server::PreloadCommandHandler;
