// File: memequeue-core/src/repositories/postgres/activations.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;
use memequeue_common::error::Error;
use memequeue_common::models::activation::{Activation, EndReason};
use memequeue_common::models::queue::{Initiator, PlaybackPayload};
use memequeue_common::traits::repository_traits::ActivationRepository;

pub struct PostgresActivationRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresActivationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivationRepository for PostgresActivationRepository {
    async fn insert(&self, conn: &mut PgConnection, act: &Activation) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO activations (
                activation_id,
                channel_id,
                channel_meme_id,
                user_id,
                price_coins,
                status,
                created_at,
                played_at,
                ended_at,
                ended_reason,
                ended_by_id,
                ended_by_role,
                refunded_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            "#,
        )
            .bind(act.activation_id)
            .bind(act.channel_id)
            .bind(act.channel_meme_id)
            .bind(act.user_id)
            .bind(act.price_coins)
            .bind(act.status)
            .bind(act.created_at)
            .bind(act.played_at)
            .bind(act.ended_at)
            .bind(act.ended_reason)
            .bind(act.ended_by_id)
            .bind(act.ended_by_role)
            .bind(act.refunded_at)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn get(
        &self,
        conn: &mut PgConnection,
        activation_id: Uuid,
    ) -> Result<Option<Activation>, Error> {
        let row = sqlx::query_as::<_, Activation>(
            r#"
            SELECT *
            FROM activations
            WHERE activation_id = $1
            "#,
        )
            .bind(activation_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    async fn oldest_queued(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
    ) -> Result<Option<Activation>, Error> {
        let row = sqlx::query_as::<_, Activation>(
            r#"
            SELECT *
            FROM activations
            WHERE channel_id = $1
              AND status = 'queued'
            ORDER BY created_at ASC, activation_id ASC
            LIMIT 1
            "#,
        )
            .bind(channel_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    async fn list_queued(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
    ) -> Result<Vec<Activation>, Error> {
        let rows = sqlx::query_as::<_, Activation>(
            r#"
            SELECT *
            FROM activations
            WHERE channel_id = $1
              AND status = 'queued'
            ORDER BY created_at ASC, activation_id ASC
            "#,
        )
            .bind(channel_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    async fn queued_count(
        &self,
        conn: &mut PgConnection,
        channel_id: Uuid,
    ) -> Result<i64, Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM activations
            WHERE channel_id = $1
              AND status = 'queued'
            "#,
        )
            .bind(channel_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    async fn mark_playing(
        &self,
        conn: &mut PgConnection,
        activation_id: Uuid,
        played_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE activations
            SET status = 'playing',
                played_at = $2
            WHERE activation_id = $1
              AND status = 'queued'
            "#,
        )
            .bind(activation_id)
            .bind(played_at)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn finish_playing(
        &self,
        conn: &mut PgConnection,
        activation_id: Uuid,
        reason: EndReason,
        initiator: Option<&Initiator>,
        refund: bool,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE activations
            SET status = $2,
                ended_at = $3,
                ended_reason = $4,
                ended_by_id = $5,
                ended_by_role = $6,
                refunded_at = CASE WHEN $7 THEN $3 ELSE refunded_at END
            WHERE activation_id = $1
              AND status = 'playing'
            "#,
        )
            .bind(activation_id)
            .bind(reason.terminal_status())
            .bind(ended_at)
            .bind(reason)
            .bind(initiator.map(|i| i.user_id))
            .bind(initiator.map(|i| i.role))
            .bind(refund)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cancel_queued(
        &self,
        conn: &mut PgConnection,
        activation_id: Uuid,
        initiator: Option<&Initiator>,
        refund: bool,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE activations
            SET status = 'cancelled',
                ended_at = $2,
                ended_reason = 'cleared',
                ended_by_id = $3,
                ended_by_role = $4,
                refunded_at = CASE WHEN $5 THEN $2 ELSE refunded_at END
            WHERE activation_id = $1
              AND status = 'queued'
            "#,
        )
            .bind(activation_id)
            .bind(ended_at)
            .bind(initiator.map(|i| i.user_id))
            .bind(initiator.map(|i| i.role))
            .bind(refund)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn playback_payload(
        &self,
        conn: &mut PgConnection,
        activation_id: Uuid,
    ) -> Result<Option<PlaybackPayload>, Error> {
        let row = sqlx::query_as::<_, PlaybackPayload>(
            r#"
            SELECT
                a.activation_id,
                a.channel_meme_id,
                m.title,
                m.asset_id,
                m.media_url,
                m.duration_ms,
                u.display_name AS sender_name
            FROM activations a
            JOIN channel_memes m ON m.channel_meme_id = a.channel_meme_id
            JOIN users u ON u.user_id = a.user_id
            WHERE a.activation_id = $1
            "#,
        )
            .bind(activation_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    async fn list_overdue_playing(
        &self,
        conn: &mut PgConnection,
        grace_ms: i64,
    ) -> Result<Vec<Activation>, Error> {
        let rows = sqlx::query_as::<_, Activation>(
            r#"
            SELECT a.*
            FROM activations a
            JOIN channel_memes m ON m.channel_meme_id = a.channel_meme_id
            WHERE a.status = 'playing'
              AND a.played_at IS NOT NULL
              AND a.played_at
                  + make_interval(secs => (m.duration_ms::bigint + $1)::float8 / 1000.0)
                  < now()
            "#,
        )
            .bind(grace_ms)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }
}
