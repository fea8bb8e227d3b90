//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus the DTOs used to insert or change it.

pub mod activity_log;
pub mod payment_attempt;
pub mod subscription;
pub mod trial_session;
