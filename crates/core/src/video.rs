//! Dailymotion link parsing and embed URL construction.
//!
//! Accepted inputs:
//!
//! - `https://www.dailymotion.com/video/x8qr2ml`
//! - `https://dailymotion.com/embed/video/x8qr2ml`
//! - `https://dai.ly/x8qr2ml`
//! - `x8qr2ml` (bare id, 6 to 10 alphanumerics)

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Bare ids are between these lengths (inclusive).
const MIN_BARE_ID_LEN: usize = 6;
const MAX_BARE_ID_LEN: usize = 10;

/// URL forms, tried in order. Group 1 captures the id.
static URL_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)dailymotion\.com/video/([a-z0-9]+)").expect("valid regex"),
        Regex::new(r"(?i)dai\.ly/([a-z0-9]+)").expect("valid regex"),
        Regex::new(r"(?i)dailymotion\.com/embed/video/([a-z0-9]+)").expect("valid regex"),
    ]
});

/// A parsed video ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVideo {
    pub video_id: String,
    pub embed_url: String,
    pub thumbnail_url: String,
}

/// Extract the canonical video id from any supported input.
pub fn extract_video_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if (MIN_BARE_ID_LEN..=MAX_BARE_ID_LEN).contains(&trimmed.len())
        && trimmed.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Some(trimmed.to_string());
    }

    URL_PATTERNS
        .iter()
        .find_map(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Player URL with autoplay on and branding off.
pub fn embed_url(video_id: &str) -> String {
    format!(
        "https://www.dailymotion.com/embed/video/{video_id}\
         ?autoplay=1&mute=0&quality=auto&ui-logo=0&ui-start-screen-info=0"
    )
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://www.dailymotion.com/thumbnail/video/{video_id}")
}

pub fn resolve(input: &str) -> Option<ResolvedVideo> {
    let video_id = extract_video_id(input)?;
    Some(ResolvedVideo {
        embed_url: embed_url(&video_id),
        thumbnail_url: thumbnail_url(&video_id),
        video_id,
    })
}
