// File: memequeue-common/src/models/activation.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::queue::ActorRole;

/// Lifecycle of an activation. `Queued` and `Playing` are live; the other
/// three are terminal and never transition again.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
pub enum ActivationStatus {
    Queued,
    Playing,
    Done,
    Skipped,
    Cancelled,
}

impl fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationStatus::Queued => write!(f, "queued"),
            ActivationStatus::Playing => write!(f, "playing"),
            ActivationStatus::Done => write!(f, "done"),
            ActivationStatus::Skipped => write!(f, "skipped"),
            ActivationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ActivationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(ActivationStatus::Queued),
            "playing" => Ok(ActivationStatus::Playing),
            "done" => Ok(ActivationStatus::Done),
            "skipped" => Ok(ActivationStatus::Skipped),
            "cancelled" => Ok(ActivationStatus::Cancelled),
            _ => Err(format!("Unknown activation status: {}", s)),
        }
    }
}

/// Why a `Playing` (or, for `Cleared`, a `Queued`) activation ended.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "snake_case")]
pub enum EndReason {
    Natural,
    SkippedByStreamer,
    SkippedByMod,
    Error,
    Timeout,
    Cleared,
}

impl EndReason {
    /// Terminal status the reason maps to: natural completion is `Done`,
    /// a skip by a person is `Skipped`, everything else is `Cancelled`.
    pub fn terminal_status(&self) -> ActivationStatus {
        match self {
            EndReason::Natural => ActivationStatus::Done,
            EndReason::SkippedByStreamer | EndReason::SkippedByMod => ActivationStatus::Skipped,
            EndReason::Error | EndReason::Timeout | EndReason::Cleared => {
                ActivationStatus::Cancelled
            }
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, EndReason::SkippedByStreamer | EndReason::SkippedByMod)
    }

    pub fn for_skip_by(role: ActorRole) -> Self {
        match role {
            ActorRole::Streamer => EndReason::SkippedByStreamer,
            ActorRole::Moderator => EndReason::SkippedByMod,
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Natural => write!(f, "natural"),
            EndReason::SkippedByStreamer => write!(f, "skipped_by_streamer"),
            EndReason::SkippedByMod => write!(f, "skipped_by_mod"),
            EndReason::Error => write!(f, "error"),
            EndReason::Timeout => write!(f, "timeout"),
            EndReason::Cleared => write!(f, "cleared"),
        }
    }
}

impl FromStr for EndReason {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "natural" => Ok(EndReason::Natural),
            "skipped_by_streamer" => Ok(EndReason::SkippedByStreamer),
            "skipped_by_mod" => Ok(EndReason::SkippedByMod),
            "error" => Ok(EndReason::Error),
            "timeout" => Ok(EndReason::Timeout),
            "cleared" => Ok(EndReason::Cleared),
            _ => Err(format!("Unknown end reason: {}", s)),
        }
    }
}

/// One paid request to play a clip on a channel.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Activation {
    pub activation_id: Uuid,
    pub channel_id: Uuid,
    pub channel_meme_id: Uuid,
    pub user_id: Uuid,
    /// Coins actually charged at admission; 0 for the channel owner.
    pub price_coins: i64,
    pub status: ActivationStatus,
    pub created_at: DateTime<Utc>,
    /// Set once, when the coordinator promotes the row to `playing`.
    pub played_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ended_reason: Option<EndReason>,
    pub ended_by_id: Option<Uuid>,
    pub ended_by_role: Option<ActorRole>,
    /// Set at most once over the row's lifetime.
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Activation {
    pub fn new(channel_id: Uuid, channel_meme_id: Uuid, user_id: Uuid, price_coins: i64) -> Self {
        Self {
            activation_id: Uuid::new_v4(),
            channel_id,
            channel_meme_id,
            user_id,
            price_coins,
            status: ActivationStatus::Queued,
            created_at: Utc::now(),
            played_at: None,
            ended_at: None,
            ended_reason: None,
            ended_by_id: None,
            ended_by_role: None,
            refunded_at: None,
        }
    }
}
