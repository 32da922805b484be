// File: memequeue-core/src/test_utils/helpers.rs

use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, Pool, Postgres};
use uuid::Uuid;
use memequeue_common::models::meme::ChannelMeme;
use memequeue_common::models::user::User;
use crate::db::Database;
use crate::Error;

/// Create the test database if it does not exist yet.
pub async fn ensure_test_database_exists() -> Result<(), Error> {
    // Connect to the "postgres" database as an admin or superuser.
    // Adjust username/host as needed for your environment:
    let admin_url = std::env::var("DATABASE_ADMIN_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/postgres".to_string());

    let mut conn = PgConnection::connect(&admin_url).await?;

    let test_db = "memequeue_test";

    // `CREATE DATABASE IF NOT EXISTS` is non-standard; try and ignore the
    // duplicate_database error instead.
    let create_db_sql = format!("CREATE DATABASE {test_db};");
    match sqlx::query(&create_db_sql).execute(&mut conn).await {
        Ok(_) => {}
        Err(e) => {
            // 42P04 => "duplicate_database"
            let duplicate = e
                .as_database_error()
                .and_then(|db_err| db_err.code())
                .map(|code| code == "42P04")
                .unwrap_or(false);
            if !duplicate {
                return Err(Error::Database(e));
            }
        }
    }

    Ok(())
}

/// Create a connection pool to the test DB.
/// By default looks for `TEST_DATABASE_URL` in env,
/// else uses `postgres://postgres@localhost/memequeue_test`.
pub async fn create_test_db_pool() -> Result<Pool<Postgres>, Error> {
    let url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/memequeue_test".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    Ok(pool)
}

/// Opt into test log output with RUST_LOG; repeated calls are fine.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One-stop setup for integration tests: ensure the test DB exists, connect,
/// and apply migrations (idempotent; sqlx takes an advisory lock).
///
/// Tests isolate by key-space (fresh UUIDs per test) rather than truncating,
/// so they can share the database and run in parallel.
pub async fn setup_test_database() -> Result<Database, Error> {
    dotenv::dotenv().ok();
    init_test_tracing();
    ensure_test_database_exists().await?;
    let pool = create_test_db_pool().await?;
    let db = Database::from_pool(pool);
    db.migrate().await?;
    Ok(db)
}

/// Wipes out test data for a manual fresh start.
pub async fn clean_database(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            channel_playback_state,
            activations,
            wallets,
            channel_memes,
            users
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a user with a fresh id.
pub async fn seed_user(pool: &Pool<Postgres>, display_name: &str) -> Result<User, Error> {
    let user = User::new(display_name);
    sqlx::query(
        r#"
        INSERT INTO users (user_id, display_name, created_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user.user_id)
    .bind(&user.display_name)
    .bind(user.created_at)
    .execute(pool)
    .await?;
    Ok(user)
}

/// Insert a catalog entry for a channel.
pub async fn seed_meme(
    pool: &Pool<Postgres>,
    channel_id: Uuid,
    title: &str,
    duration_ms: i32,
    price_coins: i64,
) -> Result<ChannelMeme, Error> {
    let meme = ChannelMeme::new(
        channel_id,
        title,
        &format!("asset-{}", title),
        &format!("https://cdn.example/{}.mp4", title),
        duration_ms,
        price_coins,
    );
    sqlx::query(
        r#"
        INSERT INTO channel_memes (
            channel_meme_id, channel_id, title, asset_id, media_url,
            duration_ms, price_coins, is_enabled, created_at, updated_at
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
    .execute(pool)
    .await?;
    Ok(meme)
}

/// Set a wallet balance directly (upsert).
pub async fn fund_wallet(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    channel_id: Uuid,
    balance: i64,
) -> Result<(), Error> {
    sqlx::query(
        r#"
        INSERT INTO wallets (user_id, channel_id, balance)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, channel_id)
        DO UPDATE SET balance = EXCLUDED.balance, updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .bind(balance)
    .execute(pool)
    .await?;
    Ok(())
}

/// Current wallet balance, 0 if the row does not exist yet.
pub async fn wallet_balance(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    channel_id: Uuid,
) -> Result<i64, Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT balance FROM wallets
        WHERE user_id = $1 AND channel_id = $2
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(b,)| b).unwrap_or(0))
}
