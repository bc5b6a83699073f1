//! Host engine quirk detection.
//!
//! Two legacy media-engine bugs are compensated for in the sample layout:
//! a positive baseMediaDecodeTime requirement and a first-sample sync-flag
//! requirement. Both are derived once per process from the host identifier
//! string handed to `Mp4Remuxer::new` and treated as immutable afterwards.

use std::sync::OnceLock;

static QUIRKS: OnceLock<EngineQuirks> = OnceLock::new();

/// Engine version facts relevant to fragment layout.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EngineQuirks {
    pub chromium_version: Option<u32>,
    pub webkit_version: Option<u32>,
    /// The engine rejects fragments whose first DTS is negative.
    pub requires_positive_dts: bool,
}

impl EngineQuirks {
    /// Parses the host identifier on first use; later calls return the
    /// cached result whatever their argument.
    pub fn detect(vendor: &str) -> Self {
        *QUIRKS.get_or_init(|| Self::parse(vendor))
    }

    pub(crate) fn parse(vendor: &str) -> Self {
        let chromium_version = scan_version(vendor, "Chrome/");
        let webkit_version = scan_version(vendor, "Safari/");
        let requires_positive_dts = chromium_version.is_some_and(|v| v < 75)
            || webkit_version.is_some_and(|v| v < 600);
        Self {
            chromium_version,
            webkit_version,
            requires_positive_dts,
        }
    }

    /// Old Chromium builds drop fragments whose first sample is not flagged
    /// as a random access point.
    pub fn force_first_sample_sync(&self) -> bool {
        self.chromium_version.is_some_and(|v| v < 70)
    }
}

/// Extracts the major version following `key` in an engine identifier.
fn scan_version(haystack: &str, key: &str) -> Option<u32> {
    let start = haystack.find(key)? + key.len();
    let digits: String = haystack[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
