// File: memequeue-common/src/models/channel_state.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-channel playback slot. `current_activation_id` is non-null iff exactly
/// one activation on the channel has status `playing`, and it is that one.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct ChannelPlaybackState {
    pub channel_id: Uuid,
    pub current_activation_id: Option<Uuid>,
    /// Overlay clients stop advancing while this is set; the coordinator
    /// will not promote the next queued activation.
    pub overlay_playback_paused: bool,
    /// Inverse of "intake paused": admission refuses new rows while false.
    pub activations_enabled: bool,
    /// Monotonic stamp bumped on every observable queue/playback change,
    /// so watchers can detect change without diffing full payloads.
    pub queue_revision: i64,
    pub updated_at: DateTime<Utc>,
}
