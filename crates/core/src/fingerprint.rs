//! Heuristic device fingerprint.
//!
//! A fingerprint is the SHA-256 of a fixed, ordered list of `name:value`
//! components read from the host environment (screen, locale, hardware,
//! rendering samples). Any component that cannot be read is replaced by
//! `name:unknown`, so generation never fails.
//!
//! The result is an abuse-detection signal only. It is neither unique nor
//! stable across browser updates and is always paired with the IP address.

use serde::{Deserialize, Serialize};

use crate::hashing::sha256_hex;

/// Separator between rendered components.
pub const COMPONENT_SEPARATOR: &str = "|";

/// Placeholder value for a signal that is missing or failed to read.
pub const UNKNOWN: &str = "unknown";

/// Maximum accepted length for a fingerprint submitted by a client.
pub const MAX_FINGERPRINT_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// The device characteristics that feed the fingerprint, in hashing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Screen,
    Timezone,
    Language,
    Platform,
    Cores,
    Memory,
    Touch,
    Gpu,
    Canvas,
    Audio,
}

impl Signal {
    /// Every signal in the order it is concatenated.
    pub const ALL: [Signal; 10] = [
        Signal::Screen,
        Signal::Timezone,
        Signal::Language,
        Signal::Platform,
        Signal::Cores,
        Signal::Memory,
        Signal::Touch,
        Signal::Gpu,
        Signal::Canvas,
        Signal::Audio,
    ];

    /// Component prefix used in the hashed string.
    pub fn key(self) -> &'static str {
        match self {
            Signal::Screen => "screen",
            Signal::Timezone => "tz",
            Signal::Language => "lang",
            Signal::Platform => "platform",
            Signal::Cores => "cores",
            Signal::Memory => "memory",
            Signal::Touch => "touch",
            Signal::Gpu => "gpu",
            Signal::Canvas => "canvas",
            Signal::Audio => "audio",
        }
    }
}

/// Returned by a [`SignalSource`] when a signal cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("signal '{0}' is unavailable")]
pub struct SignalUnavailable(pub &'static str);

/// Something that can probe device signals one at a time.
///
/// Probes are allowed to fail; [`generate_fingerprint`] substitutes the
/// placeholder for any failed probe.
pub trait SignalSource {
    fn read(&self, signal: Signal) -> Result<String, SignalUnavailable>;
}

// ---------------------------------------------------------------------------
// DeviceSignals
// ---------------------------------------------------------------------------

/// Screen width, height and colour depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
}

/// A snapshot of already-collected device signals.
///
/// Every field is optional; absent fields hash as the placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSignals {
    pub screen: Option<ScreenGeometry>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub platform: Option<String>,
    pub hardware_concurrency: Option<u32>,
    /// Approximate device memory in GiB.
    pub device_memory: Option<f32>,
    pub max_touch_points: Option<u32>,
    pub gpu_renderer: Option<String>,
    /// Tail of a rendered canvas sample (data URL suffix).
    pub canvas_sample: Option<String>,
    pub audio_sample_rate: Option<u32>,
}

impl SignalSource for DeviceSignals {
    fn read(&self, signal: Signal) -> Result<String, SignalUnavailable> {
        let value = match signal {
            Signal::Screen => self
                .screen
                .map(|s| format!("{}x{}x{}", s.width, s.height, s.color_depth)),
            Signal::Timezone => self.timezone.clone(),
            Signal::Language => self.language.clone(),
            Signal::Platform => self.platform.clone(),
            Signal::Cores => self.hardware_concurrency.map(|c| c.to_string()),
            Signal::Memory => self.device_memory.map(|m| m.to_string()),
            Signal::Touch => self.max_touch_points.map(|t| t.to_string()),
            Signal::Gpu => self.gpu_renderer.clone(),
            Signal::Canvas => self.canvas_sample.clone(),
            Signal::Audio => self.audio_sample_rate.map(|r| r.to_string()),
        };
        value
            .filter(|v| !v.trim().is_empty())
            .ok_or(SignalUnavailable(signal.key()))
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Render every signal as a `name:value` component, in hashing order.
pub fn components<S: SignalSource + ?Sized>(source: &S) -> Vec<String> {
    Signal::ALL
        .iter()
        .map(|&signal| {
            let value = source
                .read(signal)
                .unwrap_or_else(|_| UNKNOWN.to_string());
            format!("{}:{}", signal.key(), value)
        })
        .collect()
}

/// Compute the fingerprint digest (64 lowercase hex characters).
pub fn generate_fingerprint<S: SignalSource + ?Sized>(source: &S) -> String {
    let joined = components(source).join(COMPONENT_SEPARATOR);
    sha256_hex(joined.as_bytes())
}

/// Whether a client-submitted fingerprint is acceptable for storage.
pub fn is_acceptable(fingerprint: &str) -> bool {
    let trimmed = fingerprint.trim();
    !trimmed.is_empty()
        && trimmed.len() <= MAX_FINGERPRINT_LEN
        && trimmed.chars().all(|c| c.is_ascii_graphic())
}
