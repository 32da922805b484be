// File: memequeue-core/src/repositories/postgres/wallets.rs

use async_trait::async_trait;
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;
use memequeue_common::error::Error;
use memequeue_common::models::wallet::Wallet;
use memequeue_common::traits::repository_traits::WalletLedger;

/// Postgres wallet ledger. Callers hold the row via `lock_for_update` inside
/// the same transaction as the activation/state writes they pair with, so a
/// refund and its status change commit or roll back together.
pub struct PostgresWalletLedger {
    pub pool: Pool<Postgres>,
}

impl PostgresWalletLedger {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletLedger for PostgresWalletLedger {
    async fn lock_for_update(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        channel_id: Uuid,
    ) -> Result<Wallet, Error> {
        // First use creates a zero-balance row; the following SELECT takes
        // the row lock either way.
        sqlx::query(
            r#"
            INSERT INTO wallets (user_id, channel_id, balance)
            VALUES ($1, $2, 0)
            ON CONFLICT (user_id, channel_id) DO NOTHING
            "#,
        )
            .bind(user_id)
            .bind(channel_id)
            .execute(&mut *conn)
            .await?;

        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT *
            FROM wallets
            WHERE user_id = $1
              AND channel_id = $2
            FOR UPDATE
            "#,
        )
            .bind(user_id)
            .bind(channel_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(wallet)
    }

    async fn increment(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        channel_id: Uuid,
        amount: i64,
    ) -> Result<Wallet, Error> {
        if amount < 0 {
            return Err(Error::Parse(format!("negative credit amount: {}", amount)));
        }
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET balance = balance + $3,
                updated_at = now()
            WHERE user_id = $1
              AND channel_id = $2
            RETURNING *
            "#,
        )
            .bind(user_id)
            .bind(channel_id)
            .bind(amount)
            .fetch_optional(&mut *conn)
            .await?;
        wallet.ok_or_else(|| {
            Error::NotFound(format!("wallet ({}, {})", user_id, channel_id))
        })
    }

    async fn decrement(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        channel_id: Uuid,
        amount: i64,
    ) -> Result<Wallet, Error> {
        if amount < 0 {
            return Err(Error::Parse(format!("negative debit amount: {}", amount)));
        }
        // The balance guard lives in the WHERE clause; the CHECK constraint
        // is the last line of defense.
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET balance = balance - $3,
                updated_at = now()
            WHERE user_id = $1
              AND channel_id = $2
              AND balance >= $3
            RETURNING *
            "#,
        )
            .bind(user_id)
            .bind(channel_id)
            .bind(amount)
            .fetch_optional(&mut *conn)
            .await?;
        wallet.ok_or_else(|| {
            Error::InsufficientFunds(format!(
                "wallet ({}, {}) cannot cover {} coins",
                user_id, channel_id, amount
            ))
        })
    }
}
