//! Domain logic for the DailyWatch access service.
//!
//! Everything in this crate is pure: no I/O, no database, no HTTP. The db,
//! api and client crates build on these rules.

pub mod clock;
pub mod error;
pub mod fingerprint;
pub mod hashing;
pub mod payment;
pub mod subscription;
pub mod trial;
pub mod types;
pub mod video;
