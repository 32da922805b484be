// File: memequeue-common/src/models/wallet.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-(user, channel) coin balance. Admission debits it, the coordinator
/// credits refunds; nothing else writes it directly.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Wallet {
    pub user_id: Uuid,
    pub channel_id: Uuid,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}
