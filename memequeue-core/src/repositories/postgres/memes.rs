// File: memequeue-core/src/repositories/postgres/memes.rs

use async_trait::async_trait;
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;
use memequeue_common::error::Error;
use memequeue_common::models::meme::ChannelMeme;
use memequeue_common::traits::repository_traits::MemeRepository;

pub struct PostgresMemeRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresMemeRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemeRepository for PostgresMemeRepository {
    async fn create(&self, meme: &ChannelMeme) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO channel_memes (
                channel_meme_id,
                channel_id,
                title,
                asset_id,
                media_url,
                duration_ms,
                price_coins,
                is_enabled,
                created_at,
                updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
            .bind(meme.channel_meme_id)
            .bind(meme.channel_id)
            .bind(&meme.title)
            .bind(&meme.asset_id)
            .bind(&meme.media_url)
            .bind(meme.duration_ms)
            .bind(meme.price_coins)
            .bind(meme.is_enabled)
            .bind(meme.created_at)
            .bind(meme.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(
        &self,
        conn: &mut PgConnection,
        channel_meme_id: Uuid,
    ) -> Result<Option<ChannelMeme>, Error> {
        let row = sqlx::query_as::<_, ChannelMeme>(
            r#"
            SELECT *
            FROM channel_memes
            WHERE channel_meme_id = $1
            "#,
        )
            .bind(channel_meme_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    async fn list_for_channel(&self, channel_id: Uuid) -> Result<Vec<ChannelMeme>, Error> {
        let rows = sqlx::query_as::<_, ChannelMeme>(
            r#"
            SELECT *
            FROM channel_memes
            WHERE channel_id = $1
            ORDER BY title ASC
            "#,
        )
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
