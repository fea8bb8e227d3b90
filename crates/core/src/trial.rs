//! Trial window rules, abuse window, and the trial phase state machine.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of a free trial, fixed at session creation.
pub const TRIAL_DURATION_MINUTES: i64 = 15;

/// A fingerprint or IP whose trial ended less than this long ago may not
/// start another one.
pub const ABUSE_WINDOW_HOURS: i64 = 24;

/// Number of random characters in a minted session token.
pub const TOKEN_RANDOM_LENGTH: usize = 13;

/// Prefix of every minted session token.
pub const TOKEN_PREFIX: &str = "trial_";

/// Reason returned when a fingerprint or IP already consumed a trial.
pub const REASON_TRIAL_USED: &str = "Trial already used. Please purchase lifetime access.";

/// Reason returned when the store is down and the policy is fail-closed.
pub const REASON_UNAVAILABLE: &str =
    "Trial validation is temporarily unavailable. Please try again shortly.";

/// Reason returned when a session is used before it passed the abuse check.
pub const REASON_NOT_VALIDATED: &str = "Trial has not been validated for this device yet.";

/// Reason returned for a session whose window has elapsed.
pub const REASON_EXPIRED: &str =
    "Your 15-minute trial has ended. Purchase lifetime access to continue.";

pub fn trial_duration() -> Duration {
    Duration::minutes(TRIAL_DURATION_MINUTES)
}

pub fn abuse_window() -> Duration {
    Duration::hours(ABUSE_WINDOW_HOURS)
}

// ---------------------------------------------------------------------------
// Window arithmetic
// ---------------------------------------------------------------------------

/// Expiry of a trial that starts at `started_at`.
pub fn expiry_for(started_at: Timestamp) -> Timestamp {
    started_at + trial_duration()
}

/// Time left in a trial, clamped at zero.
pub fn remaining(expires_at: Timestamp, now: Timestamp) -> Duration {
    (expires_at - now).max(Duration::zero())
}

/// Whole seconds left in a trial, clamped at zero.
pub fn remaining_secs(expires_at: Timestamp, now: Timestamp) -> i64 {
    remaining(expires_at, now).num_seconds()
}

pub fn is_expired(expires_at: Timestamp, now: Timestamp) -> bool {
    expires_at <= now
}

/// Earliest `expires_at` that still counts as a recent trial at `now`.
///
/// A prior session is recent when `now - expires_at < 24h`, which also
/// covers trials that have not expired yet.
pub fn recent_since(now: Timestamp) -> Timestamp {
    now - abuse_window()
}

pub fn is_recent_trial(expires_at: Timestamp, now: Timestamp) -> bool {
    expires_at > recent_since(now)
}

/// Render a countdown as `m:ss`.
pub fn format_remaining(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

// ---------------------------------------------------------------------------
// Session tokens
// ---------------------------------------------------------------------------

/// Mint a new opaque session token: `trial_{unix_millis}_{random}`.
pub fn generate_session_token(now: Timestamp) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_RANDOM_LENGTH)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{TOKEN_PREFIX}{}_{suffix}", now.timestamp_millis())
}

// ---------------------------------------------------------------------------
// Phase state machine
// ---------------------------------------------------------------------------

/// Client-visible phase of a trial.
///
/// `Validating -> Active | Blocked`, `Active -> Expired`. `Blocked` and
/// `Expired` are terminal; only a purchase leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialPhase {
    Validating,
    Active,
    Blocked,
    Expired,
}

impl TrialPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TrialPhase::Blocked | TrialPhase::Expired)
    }

    pub fn can_transition_to(self, next: TrialPhase) -> bool {
        matches!(
            (self, next),
            (TrialPhase::Validating, TrialPhase::Active)
                | (TrialPhase::Validating, TrialPhase::Blocked)
                | (TrialPhase::Active, TrialPhase::Expired)
        )
    }

    /// Apply a validation verdict. Only meaningful while validating.
    pub fn on_verdict(self, allowed: bool) -> TrialPhase {
        let next = if allowed {
            TrialPhase::Active
        } else {
            TrialPhase::Blocked
        };
        if self.can_transition_to(next) {
            next
        } else {
            self
        }
    }

    /// Apply a clock tick carrying the seconds left.
    pub fn on_tick(self, remaining_secs: i64) -> TrialPhase {
        if self == TrialPhase::Active && remaining_secs <= 0 {
            TrialPhase::Expired
        } else {
            self
        }
    }

    /// Phase implied by a stored session at `now`.
    ///
    /// A session is only `Active` once it has passed the abuse check.
    pub fn for_session(
        is_blocked: bool,
        validated: bool,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> TrialPhase {
        if is_blocked {
            TrialPhase::Blocked
        } else if is_expired(expires_at, now) {
            TrialPhase::Expired
        } else if validated {
            TrialPhase::Active
        } else {
            TrialPhase::Validating
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict and failure policy
// ---------------------------------------------------------------------------

/// Outcome of a trial validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialVerdict {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TrialVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// What the validator answers when its own store is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Treat the session as allowed.
    Open,
    /// Treat the session as denied.
    #[default]
    Closed,
}

impl FailurePolicy {
    pub fn verdict(self) -> TrialVerdict {
        match self {
            FailurePolicy::Open => TrialVerdict::allow(),
            FailurePolicy::Closed => TrialVerdict::deny(REASON_UNAVAILABLE),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "fail-open" | "fail_open" => Ok(FailurePolicy::Open),
            "closed" | "fail-closed" | "fail_closed" => Ok(FailurePolicy::Closed),
            other => Err(format!("unknown trial failure policy '{other}'")),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Open => f.write_str("open"),
            FailurePolicy::Closed => f.write_str("closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    // -- Window arithmetic --------------------------------------------------

    #[test]
    fn expiry_is_exactly_fifteen_minutes_after_start() {
        assert_eq!(expiry_for(t0()) - t0(), Duration::minutes(15));
    }

    #[test]
    fn remaining_clamps_at_zero() {
        let expires = expiry_for(t0());
        assert_eq!(remaining_secs(expires, t0()), 900);
        assert_eq!(remaining_secs(expires, t0() + Duration::minutes(14)), 60);
        assert_eq!(remaining_secs(expires, t0() + Duration::hours(2)), 0);
    }

    #[test]
    fn expired_at_boundary() {
        let expires = expiry_for(t0());
        assert!(!is_expired(expires, expires - Duration::seconds(1)));
        assert!(is_expired(expires, expires));
    }

    #[test]
    fn recent_trial_window() {
        let expires = expiry_for(t0());
        assert!(is_recent_trial(expires, expires + Duration::minutes(10)));
        assert!(is_recent_trial(expires, expires + Duration::hours(23)));
        assert!(!is_recent_trial(expires, expires + Duration::hours(24)));
        assert!(!is_recent_trial(expires, expires + Duration::hours(25)));
        // A trial still running counts as recent.
        assert!(is_recent_trial(expires, t0()));
    }

    #[test]
    fn format_remaining_renders_minutes_and_seconds() {
        assert_eq!(format_remaining(900), "15:00");
        assert_eq!(format_remaining(61), "1:01");
        assert_eq!(format_remaining(0), "0:00");
        assert_eq!(format_remaining(-5), "0:00");
    }

    // -- Tokens -------------------------------------------------------------

    #[test]
    fn token_has_prefix_millis_and_random_suffix() {
        let token = generate_session_token(t0());
        let rest = token.strip_prefix(TOKEN_PREFIX).unwrap();
        let (millis, suffix) = rest.split_once('_').unwrap();
        assert_eq!(millis, t0().timestamp_millis().to_string());
        assert_eq!(suffix.len(), TOKEN_RANDOM_LENGTH);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn tokens_are_distinct() {
        assert_ne!(generate_session_token(t0()), generate_session_token(t0()));
    }

    // -- Phases -------------------------------------------------------------

    #[test]
    fn validating_moves_to_active_or_blocked() {
        assert_eq!(TrialPhase::Validating.on_verdict(true), TrialPhase::Active);
        assert_eq!(TrialPhase::Validating.on_verdict(false), TrialPhase::Blocked);
    }

    #[test]
    fn terminal_phases_ignore_events() {
        assert_eq!(TrialPhase::Blocked.on_verdict(true), TrialPhase::Blocked);
        assert_eq!(TrialPhase::Expired.on_verdict(true), TrialPhase::Expired);
        assert_eq!(TrialPhase::Blocked.on_tick(0), TrialPhase::Blocked);
        assert!(TrialPhase::Blocked.is_terminal());
        assert!(TrialPhase::Expired.is_terminal());
    }

    #[test]
    fn active_expires_only_at_zero() {
        assert_eq!(TrialPhase::Active.on_tick(1), TrialPhase::Active);
        assert_eq!(TrialPhase::Active.on_tick(0), TrialPhase::Expired);
        assert!(!TrialPhase::Expired.can_transition_to(TrialPhase::Active));
    }

    #[test]
    fn phase_for_stored_session() {
        let expires = expiry_for(t0());
        assert_eq!(TrialPhase::for_session(false, true, expires, t0()), TrialPhase::Active);
        assert_eq!(TrialPhase::for_session(false, true, expires, expires), TrialPhase::Expired);
        assert_eq!(TrialPhase::for_session(true, true, expires, t0()), TrialPhase::Blocked);
    }

    #[test]
    fn unvalidated_session_is_still_validating() {
        let expires = expiry_for(t0());
        assert_eq!(TrialPhase::for_session(false, false, expires, t0()), TrialPhase::Validating);
        assert_eq!(TrialPhase::for_session(true, false, expires, t0()), TrialPhase::Blocked);
        assert_eq!(TrialPhase::for_session(false, false, expires, expires), TrialPhase::Expired);
    }

    // -- Policy -------------------------------------------------------------

    #[test]
    fn failure_policy_parses_and_defaults_closed() {
        assert_eq!("open".parse::<FailurePolicy>(), Ok(FailurePolicy::Open));
        assert_eq!("Fail-Closed".parse::<FailurePolicy>(), Ok(FailurePolicy::Closed));
        assert!("maybe".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::default(), FailurePolicy::Closed);
    }

    #[test]
    fn failure_policy_verdicts() {
        assert!(FailurePolicy::Open.verdict().allowed);
        let closed = FailurePolicy::Closed.verdict();
        assert!(!closed.allowed);
        assert_eq!(closed.reason.as_deref(), Some(REASON_UNAVAILABLE));
    }
}
