//! Request extractors.
//!
//! - [`auth::AuthUser`]: the user behind a Bearer token. Also usable as
//!   `Option<AuthUser>` on routes where signing in is optional.
//! - [`client_ip::ClientIp`]: the caller's address from proxy headers.

pub mod auth;
pub mod client_ip;
