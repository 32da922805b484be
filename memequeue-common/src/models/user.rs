// File: memequeue-common/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(display_name: &str) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        }
    }
}
