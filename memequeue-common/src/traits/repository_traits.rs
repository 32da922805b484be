// File: memequeue-common/src/traits/repository_traits.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::Error;
use crate::models::activation::{Activation, EndReason};
use crate::models::channel_state::ChannelPlaybackState;
use crate::models::meme::ChannelMeme;
use crate::models::queue::{Initiator, PlaybackPayload};
use crate::models::user::User;
use crate::models::wallet::Wallet;

/// Activation rows. Methods take the caller's connection so that every write
/// belonging to one coordinator operation joins the same transaction; the
/// guarded mutations return whether a row was actually affected, which is the
/// conflict signal under concurrent writers.
#[async_trait]
pub trait ActivationRepository: Send + Sync {
    async fn insert(&self, conn: &mut PgConnection, act: &Activation) -> Result<(), Error>;

    async fn get(
        &self,
        conn: &mut PgConnection,
        activation_id: Uuid,
    ) -> Result<Option<Activation>, Error>;

    /// Oldest `queued` activation for the channel: `created_at` ascending,
    /// `activation_id` as tiebreak.
    async fn oldest_queued(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
    ) -> Result<Option<Activation>, Error>;

    async fn list_queued(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
    ) -> Result<Vec<Activation>, Error>;

    /// Count of `queued` rows for the channel.
    async fn queued_count(&self, conn: &mut PgConnection, channel_id: Uuid)
        -> Result<i64, Error>;

    /// Guarded `queued -> playing` promotion stamp. False means the row was
    /// no longer `queued` when the write landed.
    async fn mark_playing(
        &self,
        conn: &mut PgConnection,
        activation_id: Uuid,
        played_at: DateTime<Utc>,
    ) -> Result<bool, Error>;

    /// Guarded close of a `playing` row: terminal status derived from
    /// `reason`, end metadata stamped, `refunded_at` set when `refund` is
    /// true. False means another writer closed it first.
    async fn finish_playing(
        &self,
        conn: &mut PgConnection,
        activation_id: Uuid,
        reason: EndReason,
        initiator: Option<&Initiator>,
        refund: bool,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, Error>;

    /// Guarded `queued -> cancelled` close used by `clear`. Stamps the
    /// `cleared` reason and, when `refund` is true, `refunded_at`.
    async fn cancel_queued(
        &self,
        conn: &mut PgConnection,
        activation_id: Uuid,
        initiator: Option<&Initiator>,
        refund: bool,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, Error>;

    /// Overlay payload for one activation (joins the meme catalog and the
    /// sender's display name).
    async fn playback_payload(
        &self,
        conn: &mut PgConnection,
        activation_id: Uuid,
    ) -> Result<Option<PlaybackPayload>, Error>;

    /// `playing` rows whose wall-clock playback time exceeds the clip's
    /// declared duration plus `grace_ms`. Used by the watchdog sweep.
    async fn list_overdue_playing(
        &self,
        conn: &mut PgConnection,
        grace_ms: i64,
    ) -> Result<Vec<Activation>, Error>;
}

/// Per-channel playback slot and pause flags. All mutations bump
/// `queue_revision` and return the new value; the compare-and-swap variants
/// return `None` when the guard did not match.
#[async_trait]
pub trait ChannelStateRepository: Send + Sync {
    /// Fetch the state row, creating a default (enabled, unpaused, empty
    /// slot) on first use.
    async fn ensure(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
    ) -> Result<ChannelPlaybackState, Error>;

    async fn get(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
    ) -> Result<Option<ChannelPlaybackState>, Error>;

    /// Set `current_activation_id` to `activation_id`, guarded on the slot
    /// being empty.
    async fn claim_current(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
        activation_id: Uuid,
    ) -> Result<Option<i64>, Error>;

    /// Clear `current_activation_id`, guarded on it still being `expected`.
    async fn release_current(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
        expected: Uuid,
    ) -> Result<Option<i64>, Error>;

    /// Flip `activations_enabled`, guarded on the old value.
    async fn set_intake_enabled(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
        enabled: bool,
        expected: bool,
    ) -> Result<Option<i64>, Error>;

    /// Flip `overlay_playback_paused`, guarded on the old value.
    async fn set_playback_paused(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
        paused: bool,
        expected: bool,
    ) -> Result<Option<i64>, Error>;

    /// Unconditional revision bump (queue content changed without any slot
    /// or flag write).
    async fn bump_revision(&self, conn: &mut PgConnection, channel_id: Uuid)
        -> Result<i64, Error>;
}

#[async_trait]
pub trait MemeRepository: Send + Sync {
    async fn create(&self, meme: &ChannelMeme) -> Result<(), Error>;
    async fn get(
        &self,
        conn: &mut PgConnection,
        channel_meme_id: Uuid,
    ) -> Result<Option<ChannelMeme>, Error>;
    async fn list_for_channel(&self, channel_id: Uuid) -> Result<Vec<ChannelMeme>, Error>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, user: &User) -> Result<(), Error>;
    async fn get(&self, user_id: Uuid) -> Result<Option<User>, Error>;
}

/// Narrow money capability shared by admission (debit) and the coordinator
/// (refund credit). Implementations must never let a balance go negative.
#[async_trait]
pub trait WalletLedger: Send + Sync {
    /// Read the wallet row with a write lock inside the caller's
    /// transaction, creating a zero-balance row on first use.
    async fn lock_for_update(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Wallet, Error>;

    /// Credit `amount` (>= 0) coins.
    async fn increment(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        channel_id: Uuid,
        amount: i64,
    ) -> Result<Wallet, Error>;

    /// Debit `amount` (>= 0) coins; fails with `InsufficientFunds` rather
    /// than going negative.
    async fn decrement(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        channel_id: Uuid,
        amount: i64,
    ) -> Result<Wallet, Error>;
}
