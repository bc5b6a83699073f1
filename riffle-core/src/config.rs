//! Centralized configuration for the remuxer core.
//!
//! All tunable parameters consumed by [`crate::remux::Mp4Remuxer`] are
//! defined here to avoid hard-coded values scattered throughout the
//! codebase.

use serde::{Deserialize, Serialize};

/// Tunables for timestamp repair and sample-layout decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemuxConfig {
    /// Drop leading non-keyframe video samples after a discontinuity so
    /// the first emitted fragment is independently decodable
    pub force_key_frame_on_discontinuity: bool,
    /// Inflate the duration of the last video frame of a fragment when the
    /// audio track outlasts the video track
    pub stretch_short_video_track: bool,
    /// Largest tolerated gap to the next fragment, in seconds, before the
    /// last video frame is stretched over it
    pub max_buffer_hole: f32,
    /// Audio drift, in frames, beyond which gaps are filled with silence
    /// and head overlaps are re-anchored
    pub max_audio_frames_drift: u32,
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            force_key_frame_on_discontinuity: true,
            stretch_short_video_track: false,
            max_buffer_hole: 0.1, // 100 ms
            max_audio_frames_drift: 1,
        }
    }
}

/// MIME capability flags reported by the media sink.
///
/// Consulted when selecting the output container for non-AAC audio: engines
/// with native `audio/mpeg` support receive raw MPEG frames without an init
/// segment, engines with `mp3`-in-MP4 support keep the MP4 container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TypeSupported {
    /// `video/mp4` (and `audio/mp4`) byte streams are accepted
    pub mp4: bool,
    /// Raw `audio/mpeg` byte streams are accepted
    pub mpeg: bool,
    /// `audio/mp4; codecs="mp3"` is accepted
    pub mp3: bool,
}

impl Default for TypeSupported {
    fn default() -> Self {
        Self {
            mp4: true,
            mpeg: false,
            mp3: false,
        }
    }
}
