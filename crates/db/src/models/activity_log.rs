//! Activity log entries. Append-only, no `updated_at`.

use dailywatch_core::types::{DbId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `activity_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivityLog {
    pub id: DbId,
    pub user_id: Option<UserId>,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for appending an entry.
#[derive(Debug, Clone)]
pub struct CreateActivityLog {
    pub user_id: Option<UserId>,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}
