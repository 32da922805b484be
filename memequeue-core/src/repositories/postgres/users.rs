// File: memequeue-core/src/repositories/postgres/users.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;
use memequeue_common::error::Error;
use memequeue_common::models::user::User;
use memequeue_common::traits::repository_traits::UserRepo;

pub struct PostgresUserRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PostgresUserRepository {
    async fn create(&self, user: &User) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, display_name, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
            .bind(user.user_id)
            .bind(&user.display_name)
            .bind(user.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT *
            FROM users
            WHERE user_id = $1
            "#,
        )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
