// File: memequeue-common/src/models/queue.rs
//
// Result types for the queue coordinator and admission operations, plus the
// minimal payload overlay clients need to render the current clip.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who asked for a skip/clear. Stored on the closed activation row.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
pub enum ActorRole {
    Streamer,
    Moderator,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Streamer => write!(f, "streamer"),
            ActorRole::Moderator => write!(f, "moderator"),
        }
    }
}

impl FromStr for ActorRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "streamer" => Ok(ActorRole::Streamer),
            "moderator" => Ok(ActorRole::Moderator),
            _ => Err(format!("Unknown actor role: {}", s)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct Initiator {
    pub user_id: Uuid,
    pub role: ActorRole,
}

/// Everything the overlay needs to start rendering a promoted activation.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct PlaybackPayload {
    pub activation_id: Uuid,
    pub channel_meme_id: Uuid,
    pub title: String,
    pub asset_id: String,
    pub media_url: String,
    pub duration_ms: i32,
    pub sender_name: String,
}

/// Result of `finish_current` (and therefore `skip`).
#[derive(Debug, Clone)]
pub enum FinishOutcome {
    Finished {
        activation_id: Uuid,
        /// Coins credited back to the requester; 0 when no refund applied.
        refunded_coins: i64,
        /// The next activation promoted into the slot, if any.
        next: Option<PlaybackPayload>,
        /// True when promotion was withheld because playback is paused.
        playback_paused: bool,
        queue_revision: i64,
    },
    /// Nothing was playing on the channel.
    NoCurrent,
    /// The slot pointed at an activation some other actor already resolved.
    NotPlaying,
}

/// Result of `clear`.
#[derive(Debug, Clone)]
pub struct ClearOutcome {
    pub cleared: u64,
    pub refunded: u64,
    pub refunded_coins: i64,
    pub queue_revision: i64,
}

/// Result of the pause-flag setters.
#[derive(Debug, Clone, Copy)]
pub struct ToggleOutcome {
    /// False when the flag already had the requested value (no revision bump).
    pub changed: bool,
    pub queue_revision: i64,
}

/// Result of `resume_playback`.
#[derive(Debug, Clone)]
pub enum ResumeOutcome {
    /// A playing activation already occupies the slot.
    AlreadyPlaying {
        activation_id: Uuid,
        queue_revision: i64,
    },
    /// The oldest queued activation was promoted.
    Promoted {
        next: PlaybackPayload,
        queue_revision: i64,
    },
    /// Nothing queued (or a racing writer promoted first); slot left empty.
    Idle { queue_revision: i64 },
}

/// Result of admission's `enqueue`.
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    Queued {
        activation_id: Uuid,
        /// 1-based position in the queue at insert time.
        position: i64,
        charged_coins: i64,
        queue_revision: i64,
    },
    /// The channel has intake disabled.
    IntakePaused,
    /// Unknown, disabled, or foreign-channel meme.
    MemeNotFound,
    InsufficientFunds {
        balance: i64,
        required: i64,
    },
}
