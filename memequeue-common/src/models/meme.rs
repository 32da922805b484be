// File: memequeue-common/src/models/meme.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A clip in a channel's catalog that viewers can pay to queue.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct ChannelMeme {
    pub channel_meme_id: Uuid,
    pub channel_id: Uuid,
    pub title: String,
    /// Opaque reference into the asset store.
    pub asset_id: String,
    pub media_url: String,
    pub duration_ms: i32,
    pub price_coins: i64,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelMeme {
    pub fn new(
        channel_id: Uuid,
        title: &str,
        asset_id: &str,
        media_url: &str,
        duration_ms: i32,
        price_coins: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            channel_meme_id: Uuid::new_v4(),
            channel_id,
            title: title.to_string(),
            asset_id: asset_id.to_string(),
            media_url: media_url.to_string(),
            duration_ms,
            price_coins,
            is_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}
