//! Repository for the append-only `activity_logs` table.

use sqlx::PgExecutor;

use crate::models::activity_log::{ActivityLog, CreateActivityLog};

const COLUMNS: &str = "id, user_id, action, details, ip_address, created_at";

pub struct ActivityLogRepo;

impl ActivityLogRepo {
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        input: &CreateActivityLog,
    ) -> Result<ActivityLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO activity_logs (user_id, action, details, ip_address)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ActivityLog>(&query)
            .bind(input.user_id)
            .bind(&input.action)
            .bind(&input.details)
            .bind(&input.ip_address)
            .fetch_one(executor)
            .await
    }
}
