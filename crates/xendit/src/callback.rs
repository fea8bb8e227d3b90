//! Verification of provider callbacks.
//!
//! The provider sends the account's callback verification token in the
//! `x-callback-token` header. It is compared in constant time.

use subtle::ConstantTimeEq;

/// Header carrying the callback verification token.
pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

/// Whether `provided` matches the configured token. An empty configured
/// token never matches.
pub fn verify_callback_token(expected: &str, provided: Option<&str>) -> bool {
    let Some(provided) = provided else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
