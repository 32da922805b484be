// File: memequeue-core/src/repositories/postgres/channel_state.rs

use async_trait::async_trait;
use sqlx::{PgConnection, Pool, Postgres, Row};
use uuid::Uuid;
use memequeue_common::error::Error;
use memequeue_common::models::channel_state::ChannelPlaybackState;
use memequeue_common::traits::repository_traits::ChannelStateRepository;

/// Every mutation here bumps `queue_revision` in the same statement and
/// returns the new value via RETURNING, so a caller that got `Some(rev)` knows
/// its guard held and what stamp watchers will observe.
pub struct PostgresChannelStateRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresChannelStateRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelStateRepository for PostgresChannelStateRepository {
    async fn ensure(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
    ) -> Result<ChannelPlaybackState, Error> {
        sqlx::query(
            r#"
            INSERT INTO channel_playback_state (channel_id)
            VALUES ($1)
            ON CONFLICT (channel_id) DO NOTHING
            "#,
        )
            .bind(channel_id)
            .execute(&mut *conn)
            .await?;

        let state = sqlx::query_as::<_, ChannelPlaybackState>(
            r#"
            SELECT *
            FROM channel_playback_state
            WHERE channel_id = $1
            "#,
        )
            .bind(channel_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(state)
    }

    async fn get(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
    ) -> Result<Option<ChannelPlaybackState>, Error> {
        let state = sqlx::query_as::<_, ChannelPlaybackState>(
            r#"
            SELECT *
            FROM channel_playback_state
            WHERE channel_id = $1
            "#,
        )
            .bind(channel_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(state)
    }

    async fn claim_current(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
        activation_id: Uuid,
    ) -> Result<Option<i64>, Error> {
        let row = sqlx::query(
            r#"
            UPDATE channel_playback_state
            SET current_activation_id = $2,
                queue_revision = queue_revision + 1,
                updated_at = now()
            WHERE channel_id = $1
              AND current_activation_id IS NULL
            RETURNING queue_revision
            "#,
        )
            .bind(channel_id)
            .bind(activation_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(|r| r.try_get("queue_revision")).transpose().map_err(Error::from)
    }

    async fn release_current(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
        expected: Uuid,
    ) -> Result<Option<i64>, Error> {
        let row = sqlx::query(
            r#"
            UPDATE channel_playback_state
            SET current_activation_id = NULL,
                queue_revision = queue_revision + 1,
                updated_at = now()
            WHERE channel_id = $1
              AND current_activation_id = $2
            RETURNING queue_revision
            "#,
        )
            .bind(channel_id)
            .bind(expected)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(|r| r.try_get("queue_revision")).transpose().map_err(Error::from)
    }

    async fn set_intake_enabled(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
        enabled: bool,
        expected: bool,
    ) -> Result<Option<i64>, Error> {
        let row = sqlx::query(
            r#"
            UPDATE channel_playback_state
            SET activations_enabled = $2,
                queue_revision = queue_revision + 1,
                updated_at = now()
            WHERE channel_id = $1
              AND activations_enabled = $3
            RETURNING queue_revision
            "#,
        )
            .bind(channel_id)
            .bind(enabled)
            .bind(expected)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(|r| r.try_get("queue_revision")).transpose().map_err(Error::from)
    }

    async fn set_playback_paused(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
        paused: bool,
        expected: bool,
    ) -> Result<Option<i64>, Error> {
        let row = sqlx::query(
            r#"
            UPDATE channel_playback_state
            SET overlay_playback_paused = $2,
                queue_revision = queue_revision + 1,
                updated_at = now()
            WHERE channel_id = $1
              AND overlay_playback_paused = $3
            RETURNING queue_revision
            "#,
        )
            .bind(channel_id)
            .bind(paused)
            .bind(expected)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(|r| r.try_get("queue_revision")).transpose().map_err(Error::from)
    }

    async fn bump_revision(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
    ) -> Result<i64, Error> {
        let row = sqlx::query(
            r#"
            UPDATE channel_playback_state
            SET queue_revision = queue_revision + 1,
                updated_at = now()
            WHERE channel_id = $1
            RETURNING queue_revision
            "#,
        )
            .bind(channel_id)
            .fetch_one(&mut *conn)
            .await?;
        row.try_get("queue_revision").map_err(Error::from)
    }
}
