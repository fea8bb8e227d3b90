/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Users are identified by the UUID `sub` claim issued by the auth provider.
pub type UserId = uuid::Uuid;
